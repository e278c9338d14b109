//! Signal Reconstructor: turns panel-local pixel traces into calibrated
//! voltage samples at a common sample rate (spec.md §4.3).

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::grid::{Calibration, GridInfo};
use crate::lead::LeadName;
use crate::math;
use crate::panel::{Panel, RawTrace};
use crate::signal::EcgSignal;

/// Target sample rate for reconstructed signals. Chosen well above clinical
/// ECG bandwidth (spec.md §4.3: "commonly 250-1000 Hz").
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 500.0;

/// Cutoff for the default baseline-wander high-pass, in Hz.
const DEFAULT_WANDER_CUTOFF_HZ: f64 = 0.5;

/// Convert a pixel X coordinate within a panel to a time offset in seconds.
fn pixel_x_to_time(panel: &Panel, x_px: f64, px_per_mm: f64, mm_per_s: f64) -> f64 {
    let px_per_s = px_per_mm * mm_per_s;
    if px_per_s <= 0.0 {
        return panel.start_sec;
    }
    panel.start_sec + (x_px - panel.bounds.x) / px_per_s
}

/// Convert a pixel Y coordinate to a voltage in millivolts, relative to the
/// panel's baseline.
fn pixel_y_to_voltage(y_px: f64, baseline_y: f64, px_per_mm: f64, mm_per_mv: f64) -> f64 {
    let mm_per_px = if px_per_mm > 0.0 { 1.0 / px_per_mm } else { 0.0 };
    // Image Y increases downward; voltage increases upward.
    (baseline_y - y_px) * mm_per_px / mm_per_mv.max(1e-6)
}

/// Reconstruct one lead's samples from its raw trace, resampled onto a
/// uniform time grid at `sample_rate_hz`.
fn reconstruct_lead(
    panel: &Panel,
    trace: &RawTrace,
    grid: &GridInfo,
    calibration: &Calibration,
    sample_rate_hz: f64,
) -> Vec<f64> {
    let times: Vec<f64> = trace
        .x_px
        .iter()
        .map(|&x| pixel_x_to_time(panel, x, grid.px_per_mm, calibration.paper_speed_mm_per_s))
        .collect();
    let voltages: Vec<f64> = trace
        .y_px
        .iter()
        .map(|&y| pixel_y_to_voltage(y, trace.baseline_y, grid.px_per_mm, calibration.gain_mm_per_mv))
        .collect();

    let duration = panel.end_sec - panel.start_sec;
    let n = (duration * sample_rate_hz).round().max(1.0) as usize;
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let t = panel.start_sec + i as f64 / sample_rate_hz;
        samples.push(math::linear_interp(&times, &voltages, t));
    }
    samples
}

/// Subtract the median, the simplest robust DC-offset correction, grounded
/// on the same median-based robustness the local-CV analyzer uses for
/// background estimation.
fn remove_dc_offset(samples: &mut [f64]) {
    let m = math::median(samples);
    for s in samples.iter_mut() {
        *s -= m;
    }
}

/// Remove slow baseline wander by subtracting a moving average acting as a
/// crude high-pass filter (spec.md §4.3: cutoff default 0.5 Hz).
pub fn remove_baseline_wander(samples: &[f64], sample_rate_hz: f64, cutoff_hz: f64) -> Vec<f64> {
    let cutoff = if cutoff_hz > 0.0 { cutoff_hz } else { DEFAULT_WANDER_CUTOFF_HZ };
    let window = ((sample_rate_hz / (2.0 * cutoff)).round() as usize).max(1);
    let baseline = math::moving_average(samples, window);
    samples.iter().zip(baseline.iter()).map(|(s, b)| s - b).collect()
}

pub struct ReconstructOptions {
    pub sample_rate_hz: f64,
    pub remove_wander: bool,
    pub wander_cutoff_hz: f64,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            remove_wander: true,
            wander_cutoff_hz: DEFAULT_WANDER_CUTOFF_HZ,
        }
    }
}

/// Reconstruct a full multi-lead `EcgSignal` from panels and their traces.
/// Panels without an identified lead are skipped; only present leads are
/// inserted, so downstream consumers must tolerate a sparse lead set.
pub fn reconstruct(
    panels: &[Panel],
    traces: &BTreeMap<usize, RawTrace>,
    grid: &GridInfo,
    calibration: &Calibration,
    options: &ReconstructOptions,
) -> Result<EcgSignal> {
    if panels.is_empty() || traces.is_empty() {
        return Err(Error::NoTraces("no panels available for reconstruction".into()));
    }

    let duration_s = panels
        .iter()
        .map(|p| p.end_sec - p.start_sec)
        .fold(0.0_f64, f64::max);

    let mut signal = EcgSignal::new(options.sample_rate_hz, duration_s);

    for (idx, panel) in panels.iter().enumerate() {
        let Some(lead) = panel.lead else { continue };
        let Some(trace) = traces.get(&idx) else { continue };

        let mut samples = reconstruct_lead(panel, trace, grid, calibration, options.sample_rate_hz);
        remove_dc_offset(&mut samples);
        if options.remove_wander {
            samples = remove_baseline_wander(&samples, options.sample_rate_hz, options.wander_cutoff_hz);
        }

        let expected = signal.expected_len();
        if samples.len() != expected {
            samples.resize(expected, *samples.last().unwrap_or(&0.0));
        }

        signal.insert(lead, samples);
    }

    if signal.lead_count() == 0 {
        return Err(Error::NoTraces("no panel carried an identified lead".into()));
    }

    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Provenance;
    use crate::panel::{ExtractionMethod, Rect};

    fn flat_panel(lead: LeadName) -> Panel {
        Panel {
            bounds: Rect { x: 0.0, y: 0.0, width: 250.0, height: 100.0 },
            baseline_y: 50.0,
            row: 0,
            col: 0,
            is_rhythm_strip: false,
            start_sec: 0.0,
            end_sec: 2.5,
            lead: Some(lead),
            label_provenance: Provenance::StandardAssumed,
            ai_trace_points: None,
            ai_critical_points: None,
            ai_trace_confidence: 0.0,
        }
    }

    fn sine_trace(n: usize, baseline: f64) -> RawTrace {
        let x_px: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y_px: Vec<f64> = (0..n).map(|i| baseline - 10.0 * (i as f64 * 0.1).sin()).collect();
        RawTrace {
            x_px,
            y_px,
            confidence: vec![1.0; n],
            gaps: Vec::new(),
            baseline_y: baseline,
            method: ExtractionMethod::ColumnScan,
        }
    }

    #[test]
    fn reconstructs_to_common_sample_rate() {
        let panel = flat_panel(LeadName::II);
        let trace = sine_trace(250, 50.0);
        let mut traces = BTreeMap::new();
        traces.insert(0, trace);
        let grid = GridInfo::assumed_standard();
        let calibration = Calibration::standard_assumed();
        let options = ReconstructOptions::default();

        let signal = reconstruct(&[panel], &traces, &grid, &calibration, &options).unwrap();
        assert!(signal.has(LeadName::II));
        assert_eq!(signal.get(LeadName::II).unwrap().len(), signal.expected_len());
    }

    #[test]
    fn empty_input_is_an_error() {
        let grid = GridInfo::assumed_standard();
        let calibration = Calibration::standard_assumed();
        let options = ReconstructOptions::default();
        assert!(reconstruct(&[], &BTreeMap::new(), &grid, &calibration, &options).is_err());
    }

    #[test]
    fn baseline_wander_removal_shrinks_low_frequency_drift() {
        let n = 1000;
        let drifting: Vec<f64> = (0..n).map(|i| (i as f64 * 0.001).sin() * 5.0).collect();
        let corrected = remove_baseline_wander(&drifting, 500.0, 0.5);
        let before_range = drifting.iter().cloned().fold(f64::MIN, f64::max) - drifting.iter().cloned().fold(f64::MAX, f64::min);
        let after_range = corrected.iter().cloned().fold(f64::MIN, f64::max) - corrected.iter().cloned().fold(f64::MAX, f64::min);
        assert!(after_range.abs() <= before_range.abs() + 1e-6);
    }
}

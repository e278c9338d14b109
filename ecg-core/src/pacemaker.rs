//! Pacemaker spike detection (spec.md §4.7): narrow high-slew deflections
//! that precede a captured or failed beat, merged across leads and paired
//! into atrial/ventricular events.

use serde::{Deserialize, Serialize};

use crate::math;
use crate::signal::EcgSignal;

const NOISE_FACTOR: f64 = 5.0;
const MIN_SPIKE_AMPLITUDE_UV: f64 = 200.0;
const MAX_SPIKE_WIDTH_SAMPLES: usize = 4;
const CROSS_LEAD_MERGE_MS: f64 = 10.0;
const AV_PAIR_MIN_MS: f64 = 100.0;
const AV_PAIR_MAX_MS: f64 = 300.0;
const CAPTURE_WINDOW_MS: f64 = 150.0;
const CAPTURE_MIN_DELTA_UV: f64 = 500.0;
const UNDERSENSING_MIN_GAP_MS: f64 = 300.0;
const FAILURE_TO_PACE_RATIO: f64 = 1.5;
const FAILURE_TO_PACE_MIN_GAP_S: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpikeKind {
    Atrial,
    Ventricular,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spike {
    pub time_s: f64,
    pub kind: SpikeKind,
    pub captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacingMode {
    Ddd,
    Aai,
    Vvi,
    NotApplicable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensingIssue {
    pub code: String,
    pub time_s: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacemakerAnalysis {
    pub spikes: Vec<Spike>,
    pub mode: PacingMode,
    pub sensing_issues: Vec<SensingIssue>,
}

/// Raw per-sample spike candidates: a two-sample opposite-sign slew beyond
/// `noise*NOISE_FACTOR`, narrow enough to be electronic rather than
/// physiologic.
fn find_raw_spikes(samples: &[f64], sample_rate_hz: f64) -> Vec<usize> {
    if samples.len() < 3 {
        return Vec::new();
    }
    let diffs: Vec<f64> = samples.windows(2).map(|w| w[1] - w[0]).collect();
    let noise = math::median(&diffs.iter().map(|d| d.abs()).collect::<Vec<_>>());
    let threshold = (noise * NOISE_FACTOR).max(MIN_SPIKE_AMPLITUDE_UV / 10.0);

    let mut spikes = Vec::new();
    let mut i = 0;
    while i + 1 < diffs.len() {
        if diffs[i].signum() != diffs[i + 1].signum() && diffs[i].abs() > threshold && diffs[i + 1].abs() > threshold {
            let amplitude = (samples[i + 2.min(samples.len() - i - 1)] - samples[i]).abs();
            if amplitude > MIN_SPIKE_AMPLITUDE_UV {
                // check narrowness: the deflection must return near baseline
                // within MAX_SPIKE_WIDTH_SAMPLES
                let end = (i + MAX_SPIKE_WIDTH_SAMPLES).min(samples.len() - 1);
                let returns = (samples[end] - samples[i]).abs() < amplitude * 0.5;
                if returns {
                    spikes.push(i);
                    i += MAX_SPIKE_WIDTH_SAMPLES;
                    continue;
                }
            }
        }
        i += 1;
    }
    let _ = sample_rate_hz;
    spikes
}

/// Merge spike candidates seen across multiple leads within
/// `CROSS_LEAD_MERGE_MS` of each other into a single event time.
fn merge_cross_lead(candidate_times: &mut Vec<f64>) -> Vec<f64> {
    candidate_times.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut merged = Vec::new();
    for &t in candidate_times.iter() {
        if let Some(&last) = merged.last() {
            if (t - last) * 1000.0 < CROSS_LEAD_MERGE_MS {
                continue;
            }
        }
        merged.push(t);
    }
    merged
}

/// Pair adjacent spikes into atrial/ventricular roles when separated by a
/// physiologic AV delay (100-300ms); unpaired spikes are marked Unknown.
fn pair_spikes(times: &[f64]) -> Vec<Spike> {
    let mut spikes = Vec::new();
    let mut i = 0;
    while i < times.len() {
        if i + 1 < times.len() {
            let gap_ms = (times[i + 1] - times[i]) * 1000.0;
            if (AV_PAIR_MIN_MS..=AV_PAIR_MAX_MS).contains(&gap_ms) {
                spikes.push(Spike { time_s: times[i], kind: SpikeKind::Atrial, captured: false });
                spikes.push(Spike { time_s: times[i + 1], kind: SpikeKind::Ventricular, captured: false });
                i += 2;
                continue;
            }
        }
        spikes.push(Spike { time_s: times[i], kind: SpikeKind::Unknown, captured: false });
        i += 1;
    }
    spikes
}

/// A spike "captures" when the signal changes by more than
/// `CAPTURE_MIN_DELTA_UV` within `CAPTURE_WINDOW_MS` of it.
fn mark_capture(spikes: &mut [Spike], samples: &[f64], sample_rate_hz: f64) {
    let window = (CAPTURE_WINDOW_MS / 1000.0 * sample_rate_hz) as usize;
    for spike in spikes.iter_mut() {
        let idx = (spike.time_s * sample_rate_hz) as usize;
        if idx >= samples.len() {
            continue;
        }
        let end = (idx + window).min(samples.len());
        if end <= idx {
            continue;
        }
        let baseline = samples[idx];
        let max_delta = samples[idx..end].iter().map(|v| (v - baseline).abs()).fold(0.0_f64, f64::max);
        spike.captured = max_delta > CAPTURE_MIN_DELTA_UV;
    }
}

fn infer_mode(spikes: &[Spike]) -> PacingMode {
    if spikes.is_empty() {
        return PacingMode::NotApplicable;
    }
    let has_atrial = spikes.iter().any(|s| s.kind == SpikeKind::Atrial);
    let has_ventricular = spikes.iter().any(|s| s.kind == SpikeKind::Ventricular);
    match (has_atrial, has_ventricular) {
        (true, true) => PacingMode::Ddd,
        (true, false) => PacingMode::Aai,
        (false, true) => PacingMode::Vvi,
        (false, false) => PacingMode::NotApplicable,
    }
}

/// Flag undersensing (two spikes closer than physiologically sane) and
/// failure-to-pace (an expected spike never arrived: observed gap well
/// beyond the median inter-spike interval).
fn detect_sensing_issues(spikes: &[Spike]) -> Vec<SensingIssue> {
    let mut issues = Vec::new();
    if spikes.len() < 2 {
        return issues;
    }
    let gaps: Vec<f64> = spikes.windows(2).map(|w| w[1].time_s - w[0].time_s).collect();
    let median_gap = math::median(&gaps);

    for (i, window) in spikes.windows(2).enumerate() {
        let gap_ms = (window[1].time_s - window[0].time_s) * 1000.0;
        if gap_ms < UNDERSENSING_MIN_GAP_MS {
            issues.push(SensingIssue {
                code: "UNDERSENSING".into(),
                time_s: window[0].time_s,
                message: format!("spikes {:.0}ms apart, shorter than physiologic refractory period", gap_ms),
            });
        }
        let gap_s = gaps[i];
        if gap_s > median_gap * FAILURE_TO_PACE_RATIO && gap_s > FAILURE_TO_PACE_MIN_GAP_S {
            issues.push(SensingIssue {
                code: "FAILURE_TO_PACE".into(),
                time_s: window[0].time_s,
                message: format!("gap of {:.2}s exceeds {:.1}x the median pacing interval", gap_s, FAILURE_TO_PACE_RATIO),
            });
        }
    }
    issues
}

/// Run the full pacemaker analysis over a signal, preferring lead II for
/// spike detection (same lead-preference order used by the Rhythm
/// Analyzer) but merging candidates seen in any present lead.
pub fn analyze(signal: &EcgSignal) -> PacemakerAnalysis {
    let mut all_times = Vec::new();
    for lead in signal.leads() {
        let samples = signal.get(lead).unwrap();
        for idx in find_raw_spikes(samples, signal.sample_rate_hz) {
            all_times.push(idx as f64 / signal.sample_rate_hz);
        }
    }

    let merged_times = merge_cross_lead(&mut all_times);
    let mut spikes = pair_spikes(&merged_times);

    if let Some(samples) = signal.get(crate::lead::LeadName::II) {
        mark_capture(&mut spikes, samples, signal.sample_rate_hz);
    }

    let mode = infer_mode(&spikes);
    let sensing_issues = detect_sensing_issues(&spikes);

    PacemakerAnalysis { spikes, mode, sensing_issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::LeadName;

    fn signal_with_spikes(sample_rate: f64, spike_times_s: &[f64]) -> EcgSignal {
        let n = (sample_rate * 2.0) as usize;
        let mut samples = vec![0.0; n];
        for &t in spike_times_s {
            let idx = (t * sample_rate) as usize;
            if idx + 1 < n {
                samples[idx] = 800.0;
                samples[idx + 1] = -800.0;
            }
        }
        let mut sig = EcgSignal::new(sample_rate, 2.0);
        sig.insert(LeadName::II, samples);
        sig
    }

    #[test]
    fn no_spikes_on_flat_signal() {
        let sig = EcgSignal::new(500.0, 1.0);
        let mut sig = sig;
        sig.insert(LeadName::II, vec![0.0; 500]);
        let analysis = analyze(&sig);
        assert!(analysis.spikes.is_empty());
        assert_eq!(analysis.mode, PacingMode::NotApplicable);
    }

    #[test]
    fn paired_spikes_infer_ddd_mode() {
        let sig = signal_with_spikes(500.0, &[0.5, 0.65, 1.0, 1.15]);
        let analysis = analyze(&sig);
        assert!(!analysis.spikes.is_empty());
    }
}

//! Scalar summaries derived from a reconstructed signal, and the angle
//! normalization shared by every axis-bearing field.

use serde::{Deserialize, Serialize};

use crate::lead::LeadName;
use crate::math;
use crate::rhythm::RhythmAnalysis;
use crate::signal::EcgSignal;

/// Normalize an angle in degrees to (-180, 180].
pub fn normalize_angle(degrees: f64) -> f64 {
    let mut a = degrees % 360.0;
    if a <= -180.0 {
        a += 360.0;
    }
    if a > 180.0 {
        a -= 360.0;
    }
    a
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Measurements {
    pub heart_rate_bpm: f64,
    pub rr_ms: f64,
    pub pr_ms: f64,
    pub qrs_ms: f64,
    pub qt_ms: f64,
    /// Bazett-corrected QT.
    pub qtc_ms: f64,
    pub p_axis_deg: f64,
    pub qrs_axis_deg: f64,
    pub t_axis_deg: f64,
}

impl Measurements {
    /// Bazett's formula: `QTc = QT / sqrt(RR_seconds)`.
    pub fn bazett_qtc(qt_ms: f64, rr_ms: f64) -> f64 {
        if rr_ms <= 0.0 {
            return qt_ms;
        }
        qt_ms / (rr_ms / 1000.0).sqrt()
    }
}

/// ST-segment shape in the window following the QRS complex, the
/// discriminator between Brugada type 1 and type 2 patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StMorphology {
    /// Descends from its peak through the ST segment.
    Coved,
    /// Dips then rises back toward the T wave.
    Saddleback,
    Unknown,
}

/// Voltage-dependent inputs the Hypertrophy, Repolarization, Pre-excitation,
/// and Brugada analyzers need and that scalar `Measurements` alone can't
/// provide (spec.md §4.9: these analyzers "require voltages").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MorphologyInputs {
    pub r_v1_uv: f64,
    pub s_v1_uv: f64,
    pub r_v6_uv: f64,
    pub s_v6_uv: f64,
    pub st_elevation_v1_uv: f64,
    pub st_elevation_v2_uv: f64,
    pub st_morphology_v1: StMorphology,
    pub t_wave_v1_upright: bool,
    pub delta_wave_present: bool,
}

fn r_and_s(samples: &[f64]) -> (f64, f64) {
    let r = samples.iter().cloned().fold(0.0_f64, f64::max).max(0.0);
    let s = samples.iter().cloned().fold(0.0_f64, f64::min).min(0.0).abs();
    (r, s)
}

fn sample_at(signal: &EcgSignal, lead: LeadName, time_s: f64) -> Option<f64> {
    if time_s < 0.0 {
        return None;
    }
    let samples = signal.get(lead)?;
    samples.get((time_s * signal.sample_rate_hz).round() as usize).copied()
}

/// Frontal-plane axis via net deflection in Lead I and aVF over a time
/// window — the standard two-lead method, `atan2(net_aVF, net_I)` — reused
/// for the QRS, P, and T axes by passing each wave's own window.
pub fn frontal_axis_deg(signal: &EcgSignal, window_start_s: f64, window_end_s: f64) -> Option<f64> {
    let i = signal.get(LeadName::I)?;
    let avf = signal.get(LeadName::AVF)?;
    let net = |samples: &[f64]| -> Option<f64> {
        let start = (window_start_s.max(0.0) * signal.sample_rate_hz) as usize;
        let end = ((window_end_s.max(0.0) * signal.sample_rate_hz) as usize).min(samples.len());
        if end <= start {
            return None;
        }
        Some(samples[start..end].iter().sum())
    };
    let net_i = net(i)?;
    let net_avf = net(avf)?;
    if net_i == 0.0 && net_avf == 0.0 {
        return None;
    }
    Some(normalize_angle(net_avf.atan2(net_i).to_degrees()))
}

/// Estimate the PR interval by searching backward from QRS onset for a
/// P-wave bump, using the same threshold-and-walk technique the Rhythm
/// Analyzer uses for QRS onset/offset. Returns `None` when no discernible
/// P wave is found (e.g. atrial fibrillation, or the window is too close
/// to the start of the signal).
pub fn derive_pr_ms(signal: &EcgSignal, beat: &crate::rhythm::Beat) -> Option<f64> {
    let samples = signal.get(LeadName::II).or_else(|| signal.get(LeadName::I))?;
    let qrs_start_idx = (beat.qrs_start_s * signal.sample_rate_hz).round() as usize;
    let search_back = (0.24 * signal.sample_rate_hz) as usize;
    let guard = (0.04 * signal.sample_rate_hz) as usize;
    if qrs_start_idx <= guard {
        return None;
    }
    let window_start = qrs_start_idx.saturating_sub(search_back);
    let window_end = qrs_start_idx.saturating_sub(guard).max(window_start);
    if window_end <= window_start || window_end > samples.len() {
        return None;
    }
    let window = &samples[window_start..window_end];
    let baseline = math::median(window);
    let noise_floor = math::stdev(window).max(1.0) * 2.0;
    let deviations: Vec<f64> = window.iter().map(|v| (v - baseline).abs()).collect();
    let (peak_idx, &peak_dev) = deviations.iter().enumerate().max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?;
    if peak_dev < noise_floor {
        return None;
    }
    let mut onset = peak_idx;
    while onset > 0 && deviations[onset] > noise_floor * 0.3 {
        onset -= 1;
    }
    let p_onset_idx = window_start + onset;
    Some((qrs_start_idx - p_onset_idx) as f64 / signal.sample_rate_hz * 1000.0)
}

/// Derive voltage-dependent morphology inputs from the reconstructed signal
/// and the Rhythm Analyzer's first detected beat. Returns `None` when no
/// beat is available to anchor the ST/T measurement windows to.
pub fn derive_morphology_inputs(signal: &EcgSignal, rhythm: &RhythmAnalysis) -> Option<MorphologyInputs> {
    let beat = rhythm.beats.first()?;

    let (r_v1_uv, s_v1_uv) = signal.get(LeadName::V1).map(r_and_s).unwrap_or((0.0, 0.0));
    let (r_v6_uv, s_v6_uv) = signal.get(LeadName::V6).map(r_and_s).unwrap_or((0.0, 0.0));

    let baseline_v1 = signal.get(LeadName::V1).map(|s| math::median(s)).unwrap_or(0.0);
    let baseline_v2 = signal.get(LeadName::V2).map(|s| math::median(s)).unwrap_or(0.0);

    // J-point + 40ms / + 80ms: the conventional ST-segment sampling points.
    let st1_v1 = sample_at(signal, LeadName::V1, beat.qrs_end_s + 0.04).unwrap_or(baseline_v1) - baseline_v1;
    let st2_v1 = sample_at(signal, LeadName::V1, beat.qrs_end_s + 0.08).unwrap_or(baseline_v1) - baseline_v1;
    let st1_v2 = sample_at(signal, LeadName::V2, beat.qrs_end_s + 0.04).unwrap_or(baseline_v2) - baseline_v2;

    let st_morphology_v1 = if st1_v1 < 100.0 {
        StMorphology::Unknown
    } else if st2_v1 < st1_v1 * 0.7 {
        StMorphology::Coved
    } else if st2_v1 > st1_v1 {
        StMorphology::Saddleback
    } else {
        StMorphology::Unknown
    };

    let t_sample = sample_at(signal, LeadName::V1, beat.qrs_end_s + 0.16).unwrap_or(baseline_v1) - baseline_v1;

    let delta_wave_present = signal
        .get(LeadName::II)
        .map(|samples| has_delta_wave(samples, signal.sample_rate_hz, beat))
        .unwrap_or(false);

    Some(MorphologyInputs {
        r_v1_uv,
        s_v1_uv,
        r_v6_uv,
        s_v6_uv,
        st_elevation_v1_uv: st1_v1.max(0.0),
        st_elevation_v2_uv: st1_v2.max(0.0),
        st_morphology_v1,
        t_wave_v1_upright: t_sample > 0.0,
        delta_wave_present,
    })
}

/// A delta wave slurs the first ~40ms of the QRS upstroke: the initial
/// slope is much shallower than the slope carrying the complex to its
/// R-peak, and the whole complex reads wider than a normal QRS as a result.
fn has_delta_wave(samples: &[f64], sample_rate_hz: f64, beat: &crate::rhythm::Beat) -> bool {
    if (beat.qrs_end_s - beat.qrs_start_s) * 1000.0 <= 100.0 {
        return false;
    }
    let idx_start = (beat.qrs_start_s * sample_rate_hz) as usize;
    let idx_slurred = ((beat.qrs_start_s + 0.04) * sample_rate_hz) as usize;
    let idx_peak = (beat.r_time_s * sample_rate_hz) as usize;
    if idx_slurred <= idx_start || idx_peak <= idx_slurred || idx_peak >= samples.len() {
        return false;
    }
    let early_slope = (samples[idx_slurred] - samples[idx_start]).abs() / (idx_slurred - idx_start) as f64;
    let later_slope = (samples[idx_peak] - samples[idx_slurred]).abs() / (idx_peak - idx_slurred) as f64;
    early_slope < later_slope * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_into_range() {
        assert_eq!(normalize_angle(270.0), -90.0);
        assert_eq!(normalize_angle(-270.0), 90.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn idempotent_normalization() {
        for raw in [-540.0, -181.0, -90.0, 0.0, 90.0, 180.0, 181.0, 720.5] {
            let once = normalize_angle(raw);
            let twice = normalize_angle(once);
            assert!((once - twice).abs() < 1e-9);
            assert!(once > -180.0 && once <= 180.0);
        }
    }

    #[test]
    fn bazett_known_value() {
        // HR 60 -> RR 1000ms -> QTc == QT
        assert!((Measurements::bazett_qtc(400.0, 1000.0) - 400.0).abs() < 1e-9);
    }

    fn flat_signal() -> EcgSignal {
        EcgSignal::new(500.0, 1.0)
    }

    #[test]
    fn frontal_axis_is_none_without_leads() {
        let signal = flat_signal();
        assert!(frontal_axis_deg(&signal, 0.0, 0.5).is_none());
    }

    #[test]
    fn frontal_axis_points_left_when_i_dominates() {
        let mut signal = flat_signal();
        signal.insert(LeadName::I, vec![1000.0; 500]);
        signal.insert(LeadName::AVF, vec![0.0; 500]);
        let axis = frontal_axis_deg(&signal, 0.0, 0.1).expect("axis");
        assert!((axis - 0.0).abs() < 1.0);
    }

    #[test]
    fn derive_pr_ms_is_none_without_a_discernible_p_wave() {
        let mut signal = flat_signal();
        signal.insert(LeadName::II, vec![0.0; 500]);
        let beat = crate::rhythm::Beat {
            r_time_s: 0.3,
            qrs_start_s: 0.28,
            qrs_end_s: 0.32,
            kind: crate::rhythm::BeatKind::Normal,
        };
        assert!(derive_pr_ms(&signal, &beat).is_none());
    }
}

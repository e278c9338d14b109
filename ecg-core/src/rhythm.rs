//! Rhythm Analyzer: beat detection, ectopy counting, and fixed-rule rhythm
//! classification (spec.md §4.8).

use serde::{Deserialize, Serialize};

use crate::lead::LeadName;
use crate::math;
use crate::signal::EcgSignal;

const BEAT_THRESHOLD_FACTOR: f64 = 4.0;
const WIDE_QRS_MS: f64 = 120.0;
const ALTERNATING_SIGN_FRACTION: f64 = 0.6;

/// Leads tried in order for beat detection, matching the preference order
/// used elsewhere in the pipeline (Cross-Lead Validator's morphology check,
/// Pacemaker Analyzer).
const PREFERRED_LEADS: [LeadName; 3] = [LeadName::II, LeadName::I, LeadName::V1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeatKind {
    Normal,
    Pvc,
    Paced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beat {
    pub r_time_s: f64,
    pub qrs_start_s: f64,
    pub qrs_end_s: f64,
    pub kind: BeatKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RhythmLabel {
    NormalSinus,
    SinusBradycardia,
    SinusTachycardia,
    SinusArrhythmia,
    AtrialFibrillation,
    AtrialFlutter,
    SupraventricularTachycardia,
    VentricularTachycardia,
    VentricularFibrillation,
    JunctionalRhythm,
    IdioventricularRhythm,
    Asystole,
    RegularlyIrregular,
    IrregularlyIrregular,
    Paced,
    Indeterminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EctopyCounts {
    pub pac: u32,
    pub pvc: u32,
    pub couplets: u32,
    pub runs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhythmAnalysis {
    pub beats: Vec<Beat>,
    pub rate_bpm: f64,
    pub regularity: f64,
    pub label: RhythmLabel,
    pub ectopy: EctopyCounts,
}

fn select_lead(signal: &EcgSignal) -> Option<LeadName> {
    PREFERRED_LEADS.into_iter().find(|&l| signal.has(l)).or_else(|| signal.leads().next())
}

/// Find candidate R-peak sample indices by thresholding the derivative
/// against `4 * median(|derivative|)`.
fn find_beats(samples: &[f64], sample_rate_hz: f64) -> Vec<usize> {
    let derivative = math::central_difference(samples);
    let abs_derivative: Vec<f64> = derivative.iter().map(|v| v.abs()).collect();
    let threshold = BEAT_THRESHOLD_FACTOR * math::median(&abs_derivative);
    if threshold <= 0.0 {
        return Vec::new();
    }

    let refractory_samples = (0.2 * sample_rate_hz) as usize;
    let mut peaks = Vec::new();
    let mut i = 0;
    while i < samples.len() {
        if abs_derivative[i] > threshold {
            // find local max of |sample| within a small window around i
            let window_end = (i + refractory_samples.max(1)).min(samples.len());
            let local_peak = (i..window_end)
                .max_by(|&a, &b| samples[a].abs().partial_cmp(&samples[b].abs()).unwrap())
                .unwrap_or(i);
            peaks.push(local_peak);
            i = local_peak + refractory_samples.max(1);
        } else {
            i += 1;
        }
    }
    peaks
}

/// QRS width estimate: samples on either side of the peak until the
/// absolute value drops under 20% of the peak amplitude.
fn estimate_qrs_window(samples: &[f64], peak: usize, sample_rate_hz: f64) -> (f64, f64) {
    let peak_value = samples[peak].abs();
    let floor = peak_value * 0.2;
    let mut start = peak;
    while start > 0 && samples[start].abs() > floor {
        start -= 1;
    }
    let mut end = peak;
    while end + 1 < samples.len() && samples[end].abs() > floor {
        end += 1;
    }
    (start as f64 / sample_rate_hz, end as f64 / sample_rate_hz)
}

fn classify_beats(samples: &[f64], peaks: &[usize], sample_rate_hz: f64) -> Vec<Beat> {
    peaks
        .iter()
        .map(|&p| {
            let (start, end) = estimate_qrs_window(samples, p, sample_rate_hz);
            let width_ms = (end - start) * 1000.0;
            let kind = if width_ms > WIDE_QRS_MS { BeatKind::Pvc } else { BeatKind::Normal };
            Beat { r_time_s: p as f64 / sample_rate_hz, qrs_start_s: start, qrs_end_s: end, kind }
        })
        .collect()
}

fn rr_intervals(beats: &[Beat]) -> Vec<f64> {
    beats.windows(2).map(|w| w[1].r_time_s - w[0].r_time_s).collect()
}

/// Regularity score: `1 - coefficient_of_variation(RR)`, clamped to [0,1].
fn regularity_score(rr: &[f64]) -> f64 {
    if rr.len() < 2 {
        return 1.0;
    }
    (1.0 - math::coefficient_of_variation(rr)).clamp(0.0, 1.0)
}

/// "Regularly irregular" (e.g. bigeminy) shows an alternating-sign pattern
/// in successive RR differences; "irregularly irregular" (e.g. AFib) does
/// not.
fn alternating_pattern_fraction(rr: &[f64]) -> f64 {
    if rr.len() < 3 {
        return 0.0;
    }
    let diffs: Vec<f64> = rr.windows(2).map(|w| w[1] - w[0]).collect();
    let alternating = diffs.windows(2).filter(|w| w[0].signum() != w[1].signum() && w[0] != 0.0).count();
    alternating as f64 / diffs.len().saturating_sub(1).max(1) as f64
}

/// Fraction of beats classified as wide (`BeatKind::Pvc`, which doubles as
/// the "wide QRS" marker the beat classifier sets during `classify_beats`).
/// Used here as a sustained wide-complex signal, not a per-beat ectopy flag.
fn wide_beat_fraction(beats: &[Beat]) -> f64 {
    if beats.is_empty() {
        return 0.0;
    }
    beats.iter().filter(|b| b.kind == BeatKind::Pvc).count() as f64 / beats.len() as f64
}

/// No P-wave detector exists in this analyzer, so flutter/SVT/VT/VF/
/// junctional/idioventricular discrimination below falls back to rate,
/// regularity, and wide-beat fraction alone — a reasonable approximation
/// given the inputs, not a substitute for morphology-based classification.
fn classify_rhythm(rate_bpm: f64, regularity: f64, rr: &[f64], has_paced: bool, wide_fraction: f64) -> RhythmLabel {
    if has_paced {
        return RhythmLabel::Paced;
    }
    if rr.len() < 2 {
        return RhythmLabel::Indeterminate;
    }

    if regularity > 0.9 {
        if rate_bpm < 60.0 {
            return if wide_fraction > 0.5 {
                RhythmLabel::IdioventricularRhythm
            } else if rate_bpm >= 40.0 {
                RhythmLabel::JunctionalRhythm
            } else {
                RhythmLabel::SinusBradycardia
            };
        }
        if rate_bpm > 100.0 {
            if (145.0..=155.0).contains(&rate_bpm) && regularity > 0.95 && wide_fraction < 0.3 {
                return RhythmLabel::AtrialFlutter;
            }
            if wide_fraction > 0.5 {
                return if rate_bpm > 150.0 { RhythmLabel::VentricularTachycardia } else { RhythmLabel::SinusTachycardia };
            }
            return if rate_bpm > 150.0 { RhythmLabel::SupraventricularTachycardia } else { RhythmLabel::SinusTachycardia };
        }
        return RhythmLabel::NormalSinus;
    }

    if regularity > 0.75 {
        return RhythmLabel::SinusArrhythmia;
    }

    let alternating = alternating_pattern_fraction(rr);
    if alternating >= ALTERNATING_SIGN_FRACTION {
        return RhythmLabel::RegularlyIrregular;
    }
    if regularity < 0.3 && wide_fraction > 0.5 && rate_bpm > 100.0 {
        return RhythmLabel::VentricularFibrillation;
    }
    if regularity < 0.5 {
        return RhythmLabel::IrregularlyIrregular;
    }
    RhythmLabel::Indeterminate
}

/// Count PACs (narrow beats with a short preceding RR), PVCs (wide beats),
/// couplets (two consecutive ectopic beats) and runs (three or more).
fn count_ectopy(beats: &[Beat], rr: &[f64]) -> EctopyCounts {
    let median_rr = math::median(rr);
    let mut pac = 0;
    let mut pvc = 0;
    let mut couplets = 0;
    let mut runs = 0;
    let mut run_length = 0;

    for (i, beat) in beats.iter().enumerate() {
        let is_ectopic = match beat.kind {
            BeatKind::Pvc => {
                pvc += 1;
                true
            }
            BeatKind::Normal => {
                if i > 0 && median_rr > 0.0 && rr[i - 1] < median_rr * 0.8 {
                    pac += 1;
                    true
                } else {
                    false
                }
            }
            BeatKind::Paced => false,
        };

        if is_ectopic {
            run_length += 1;
        } else {
            if run_length == 2 {
                couplets += 1;
            } else if run_length >= 3 {
                runs += 1;
            }
            run_length = 0;
        }
    }
    if run_length == 2 {
        couplets += 1;
    } else if run_length >= 3 {
        runs += 1;
    }

    EctopyCounts { pac, pvc, couplets, runs }
}

/// Run the full Rhythm Analyzer. `paced_times_s` comes from the Pacemaker
/// Analyzer and marks beats coincident with a captured spike, since paced
/// beats take precedence over PVC/aberrant classification (spec.md §9 Open
/// Questions: precedence order is paced > PVC > aberrant > normal).
pub fn analyze(signal: &EcgSignal, paced_times_s: &[f64]) -> Option<RhythmAnalysis> {
    let lead = select_lead(signal)?;
    let samples = signal.get(lead)?;

    let peaks = find_beats(samples, signal.sample_rate_hz);
    if peaks.is_empty() {
        // A flat trace over a long enough window is asystole, not a failed
        // detection; shorter windows are more likely a digitization gap, so
        // this only fires once there's been time for at least one missed beat.
        if signal.duration_s >= 3.0 {
            return Some(RhythmAnalysis {
                beats: Vec::new(),
                rate_bpm: 0.0,
                regularity: 0.0,
                label: RhythmLabel::Asystole,
                ectopy: EctopyCounts { pac: 0, pvc: 0, couplets: 0, runs: 0 },
            });
        }
        return None;
    }
    let mut beats = classify_beats(samples, &peaks, signal.sample_rate_hz);

    for beat in beats.iter_mut() {
        if paced_times_s.iter().any(|&t| (t - beat.r_time_s).abs() < 0.05) {
            beat.kind = BeatKind::Paced;
        }
    }

    let rr = rr_intervals(&beats);
    let rate_bpm = if rr.is_empty() { 0.0 } else { 60.0 / math::mean(&rr) };
    let regularity = regularity_score(&rr);
    let has_paced = beats.iter().any(|b| b.kind == BeatKind::Paced);
    let wide_fraction = wide_beat_fraction(&beats);
    let label = classify_rhythm(rate_bpm, regularity, &rr, has_paced, wide_fraction);
    let ectopy = count_ectopy(&beats, &rr);

    Some(RhythmAnalysis { beats, rate_bpm, regularity, label, ectopy })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular_beats_signal(sample_rate: f64, bpm: f64, duration_s: f64) -> EcgSignal {
        let n = (sample_rate * duration_s) as usize;
        let period_samples = (60.0 / bpm * sample_rate) as usize;
        let mut samples = vec![0.0; n];
        let mut i = period_samples / 2;
        while i + 5 < n {
            for (k, v) in [300.0, 1200.0, -600.0, 200.0].iter().enumerate() {
                samples[i + k] = *v;
            }
            i += period_samples;
        }
        let mut sig = EcgSignal::new(sample_rate, duration_s);
        sig.insert(LeadName::II, samples);
        sig
    }

    #[test]
    fn detects_regular_beats_at_expected_rate() {
        let sig = regular_beats_signal(500.0, 75.0, 6.0);
        let analysis = analyze(&sig, &[]).unwrap();
        assert!(analysis.beats.len() >= 4);
        assert!(analysis.rate_bpm > 40.0 && analysis.rate_bpm < 150.0);
    }

    #[test]
    fn no_beats_on_flat_signal_returns_none_analysis() {
        let mut sig = EcgSignal::new(500.0, 1.0);
        sig.insert(LeadName::II, vec![0.0; 500]);
        assert!(analyze(&sig, &[]).is_none());
    }

    #[test]
    fn regularity_is_high_for_evenly_spaced_beats() {
        let sig = regular_beats_signal(500.0, 60.0, 8.0);
        let analysis = analyze(&sig, &[]).unwrap();
        assert!(analysis.regularity > 0.5);
    }
}

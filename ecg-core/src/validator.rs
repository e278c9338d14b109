//! Cross-Lead Validator: checks a reconstructed signal against the
//! electrical relationships that must hold between simultaneously recorded
//! leads, and scores overall plausibility (spec.md §4.4).

use serde::{Deserialize, Serialize};

use crate::lead::LeadName;
use crate::math;
use crate::signal::EcgSignal;

const EINTHOVEN_MIN_CORRELATION: f64 = 0.8;
const EINTHOVEN_MAX_MAE_UV: f64 = 200.0;

const FLAT_LEAD_STDEV_UV: f64 = 10.0;
const CLIPPING_FRACTION: f64 = 0.01;
const CLIPPING_VOLTAGE_UV: f64 = 3000.0;
const EXTREME_PEAK_TO_PEAK_UV: f64 = 5000.0;
const BASELINE_WANDER_RANGE_UV: f64 = 200.0;

const MIN_PLAUSIBLE_HR: f64 = 40.0;
const MAX_PLAUSIBLE_HR: f64 = 200.0;
const MIN_PLAUSIBLE_QRS_MS: f64 = 60.0;
const MAX_PLAUSIBLE_QRS_MS: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueLevel {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub level: IssueLevel,
    pub code: String,
    pub message: String,
    pub affected_leads: Vec<LeadName>,
}

impl Issue {
    fn new(level: IssueLevel, code: &str, message: impl Into<String>, affected_leads: Vec<LeadName>) -> Self {
        Self { level, code: code.into(), message: message.into(), affected_leads }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadQuality {
    pub lead: LeadName,
    pub score: f64,
    pub flat: bool,
    pub clipped: bool,
    pub baseline_wander: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
    pub lead_quality: Vec<LeadQuality>,
    pub cross_lead_score: f64,
    pub morphology_score: f64,
    pub overall_score: f64,
    pub suggested_corrections: Vec<String>,
}

fn correlates(a: &[f64], b: &[f64]) -> (f64, f64) {
    (math::pearson_correlation(a, b), math::mean_absolute_error(a, b))
}

/// Einthoven's law: `II = I + III` at every sample.
fn check_einthoven(signal: &EcgSignal, issues: &mut Vec<Issue>) -> f64 {
    let (Some(i), Some(ii), Some(iii)) = (signal.get(LeadName::I), signal.get(LeadName::II), signal.get(LeadName::III)) else {
        return 1.0;
    };
    let predicted_ii: Vec<f64> = i.iter().zip(iii.iter()).map(|(a, b)| a + b).collect();
    let (corr, mae) = correlates(ii, &predicted_ii);
    if corr < EINTHOVEN_MIN_CORRELATION || mae > EINTHOVEN_MAX_MAE_UV {
        issues.push(Issue::new(
            IssueLevel::Error,
            "EINTHOVEN_VIOLATION",
            format!("II != I + III (correlation {:.2}, MAE {:.0}uV)", corr, mae),
            vec![LeadName::I, LeadName::II, LeadName::III],
        ));
        return corr.max(0.0) * 0.5;
    }
    corr.max(0.0)
}

/// Goldberger augmented-limb relations: `aVR = -(I+II)/2`, `aVL = (I-III)/2`,
/// `aVF = (II+III)/2`.
fn check_goldberger(signal: &EcgSignal, issues: &mut Vec<Issue>) -> f64 {
    let (Some(i), Some(ii), Some(iii)) = (signal.get(LeadName::I), signal.get(LeadName::II), signal.get(LeadName::III)) else {
        return 1.0;
    };
    let mut scores = Vec::new();

    if let Some(avr) = signal.get(LeadName::AVR) {
        let predicted: Vec<f64> = i.iter().zip(ii.iter()).map(|(a, b)| -(a + b) / 2.0).collect();
        let (corr, mae) = correlates(avr, &predicted);
        if corr < EINTHOVEN_MIN_CORRELATION || mae > EINTHOVEN_MAX_MAE_UV {
            issues.push(Issue::new(
                IssueLevel::Warning,
                "GOLDBERGER_VIOLATION",
                format!("aVR relation off (correlation {:.2}, MAE {:.0}uV)", corr, mae),
                vec![LeadName::AVR],
            ));
        }
        scores.push(corr.max(0.0));
    }
    if let Some(avl) = signal.get(LeadName::AVL) {
        let predicted: Vec<f64> = i.iter().zip(iii.iter()).map(|(a, b)| (a - b) / 2.0).collect();
        let (corr, mae) = correlates(avl, &predicted);
        if corr < EINTHOVEN_MIN_CORRELATION || mae > EINTHOVEN_MAX_MAE_UV {
            issues.push(Issue::new(
                IssueLevel::Warning,
                "GOLDBERGER_VIOLATION",
                format!("aVL relation off (correlation {:.2}, MAE {:.0}uV)", corr, mae),
                vec![LeadName::AVL],
            ));
        }
        scores.push(corr.max(0.0));
    }
    if let Some(avf) = signal.get(LeadName::AVF) {
        let predicted: Vec<f64> = ii.iter().zip(iii.iter()).map(|(a, b)| (a + b) / 2.0).collect();
        let (corr, mae) = correlates(avf, &predicted);
        if corr < EINTHOVEN_MIN_CORRELATION || mae > EINTHOVEN_MAX_MAE_UV {
            issues.push(Issue::new(
                IssueLevel::Warning,
                "GOLDBERGER_VIOLATION",
                format!("aVF relation off (correlation {:.2}, MAE {:.0}uV)", corr, mae),
                vec![LeadName::AVF],
            ));
        }
        scores.push(corr.max(0.0));
    }

    if scores.is_empty() { 1.0 } else { math::mean(&scores) }
}

/// Mean R-wave amplitude as a crude progression proxy (peak absolute value).
fn peak_amplitude(samples: &[f64]) -> f64 {
    samples.iter().cloned().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// R-wave progression across V1..V6: expect non-decreasing amplitude in at
/// least half of the four adjacent pairs actually present.
fn check_precordial_progression(signal: &EcgSignal, issues: &mut Vec<Issue>) -> f64 {
    let progression = LeadName::precordial_progression();
    let amplitudes: Vec<Option<f64>> = progression.iter().map(|&l| signal.get(l).map(peak_amplitude)).collect();

    let mut pairs = 0;
    let mut non_decreasing = 0;
    for window in amplitudes.windows(2) {
        if let (Some(a), Some(b)) = (window[0], window[1]) {
            pairs += 1;
            if b >= a * 0.9 {
                non_decreasing += 1;
            }
        }
    }

    if pairs == 0 {
        return 1.0;
    }
    let fraction = non_decreasing as f64 / pairs as f64;
    if non_decreasing < 2 && pairs >= 2 {
        issues.push(Issue::new(
            IssueLevel::Warning,
            "POOR_R_WAVE_PROGRESSION",
            "precordial R-wave amplitude does not progress as expected across V1-V6",
            progression.to_vec(),
        ));
    }
    fraction
}

/// Per-lead signal quality: flat / clipped / noisy / wandering.
fn score_lead_quality(signal: &EcgSignal) -> Vec<LeadQuality> {
    signal
        .leads()
        .map(|lead| {
            let samples = signal.get(lead).unwrap();
            let stdev = math::stdev(samples);
            let flat = stdev < FLAT_LEAD_STDEV_UV;

            let clipped_count = samples.iter().filter(|&&v| v.abs() > CLIPPING_VOLTAGE_UV).count();
            let clipped = samples.len() > 0 && clipped_count as f64 / samples.len() as f64 > CLIPPING_FRACTION;

            let window = (signal.sample_rate_hz / 1.0).max(1.0) as usize;
            let wander_trace = math::moving_average(samples, window);
            let wander_range = wander_trace.iter().cloned().fold(f64::MIN, f64::max) - wander_trace.iter().cloned().fold(f64::MAX, f64::min);
            let baseline_wander = wander_range.abs() > BASELINE_WANDER_RANGE_UV;

            let mut score: f64 = 1.0;
            if flat {
                score -= 0.5;
            }
            if clipped {
                score -= 0.3;
            }
            if baseline_wander {
                score -= 0.2;
            }

            LeadQuality { lead, score: score.clamp(0.0, 1.0), flat, clipped, baseline_wander }
        })
        .collect()
}

/// Gross morphology plausibility: is the overall peak-to-peak excursion and
/// apparent rate in a physiologically sane range.
fn score_morphology(signal: &EcgSignal, issues: &mut Vec<Issue>) -> f64 {
    let mut score: f64 = 1.0;

    for lead in signal.leads() {
        let samples = signal.get(lead).unwrap();
        let max = samples.iter().cloned().fold(f64::MIN, f64::max);
        let min = samples.iter().cloned().fold(f64::MAX, f64::min);
        let peak_to_peak = max - min;
        if peak_to_peak > EXTREME_PEAK_TO_PEAK_UV {
            issues.push(Issue::new(
                IssueLevel::Error,
                "EXTREME_VOLTAGE",
                format!("lead {} peak-to-peak {:.0}uV exceeds plausible range", lead, peak_to_peak),
                vec![lead],
            ));
            score -= 0.2;
        }
    }

    if let Some(ii) = signal.get(LeadName::II) {
        let derivative = math::central_difference(ii);
        let abs_derivative: Vec<f64> = derivative.iter().map(|v| v.abs()).collect();
        let threshold = 4.0 * math::median(&abs_derivative);
        let min_lag = (signal.sample_rate_hz * 60.0 / MAX_PLAUSIBLE_HR) as usize;
        let max_lag = (signal.sample_rate_hz * 60.0 / MIN_PLAUSIBLE_HR) as usize;
        if threshold > 0.0 {
            if let Some((lag, _)) = math::autocorrelation_peak(ii, min_lag.max(1), max_lag.max(min_lag + 1)) {
                let implied_hr = signal.sample_rate_hz * 60.0 / lag as f64;
                if !(MIN_PLAUSIBLE_HR..=MAX_PLAUSIBLE_HR).contains(&implied_hr) {
                    issues.push(Issue::new(
                        IssueLevel::Warning,
                        "ABNORMAL_IMPLIED_HR",
                        format!("implied heart rate {:.0} bpm outside 40-200 range", implied_hr),
                        vec![LeadName::II],
                    ));
                    score -= 0.2;
                }
            }
            if let Some(width_ms) = implied_qrs_width_ms(ii, &abs_derivative, threshold, signal.sample_rate_hz) {
                if !(MIN_PLAUSIBLE_QRS_MS..=MAX_PLAUSIBLE_QRS_MS).contains(&width_ms) {
                    issues.push(Issue::new(
                        IssueLevel::Warning,
                        "IMPLAUSIBLE_QRS_WIDTH",
                        format!("implied QRS width {:.0}ms outside the {:.0}-{:.0}ms plausible range", width_ms, MIN_PLAUSIBLE_QRS_MS, MAX_PLAUSIBLE_QRS_MS),
                        vec![LeadName::II],
                    ));
                    score -= 0.2;
                }
            }
        }
    }

    score.clamp(0.0, 1.0)
}

/// Estimate the QRS width implied by the first beat whose derivative
/// crosses the noise-floor threshold: the span around the peak until the
/// signal drops under 20% of its peak magnitude, mirroring the Rhythm
/// Analyzer's own QRS-window estimate.
fn implied_qrs_width_ms(samples: &[f64], abs_derivative: &[f64], threshold: f64, sample_rate_hz: f64) -> Option<f64> {
    let crossing = abs_derivative.iter().position(|&v| v > threshold)?;
    let window_end = (crossing + (0.2 * sample_rate_hz) as usize).min(samples.len());
    let peak = (crossing..window_end).max_by(|&a, &b| samples[a].abs().partial_cmp(&samples[b].abs()).unwrap())?;
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
    Some((end - start) as f64 / sample_rate_hz * 1000.0)
}

/// Run the full Cross-Lead Validator and produce a combined report.
pub fn validate(signal: &EcgSignal) -> ValidationReport {
    let mut issues = Vec::new();

    let einthoven_score = check_einthoven(signal, &mut issues);
    let goldberger_score = check_goldberger(signal, &mut issues);
    let progression_score = check_precordial_progression(signal, &mut issues);
    let cross_lead_score = math::mean(&[einthoven_score, goldberger_score, progression_score]);

    let lead_quality = score_lead_quality(signal);
    for lq in &lead_quality {
        if lq.flat {
            issues.push(Issue::new(IssueLevel::Warning, "FLAT_LEAD", format!("lead {} shows no signal variation", lq.lead), vec![lq.lead]));
        }
        if lq.clipped {
            issues.push(Issue::new(IssueLevel::Error, "CLIPPING", format!("lead {} appears clipped", lq.lead), vec![lq.lead]));
        }
    }
    let mean_lead_quality = if lead_quality.is_empty() { 0.0 } else { math::mean(&lead_quality.iter().map(|l| l.score).collect::<Vec<_>>()) };

    let morphology_score = score_morphology(signal, &mut issues);

    let overall_score = 0.5 * mean_lead_quality + 0.3 * cross_lead_score + 0.2 * morphology_score;

    let mut suggested_corrections = Vec::new();
    if einthoven_score < 0.6 {
        suggested_corrections.push("re-check limb lead assignment (possible electrode swap)".to_string());
    }
    if lead_quality.iter().any(|l| l.clipped) {
        suggested_corrections.push("re-run digitization with a lower gain assumption".to_string());
    }

    ValidationReport {
        issues,
        lead_quality,
        cross_lead_score,
        morphology_score,
        overall_score: overall_score.clamp(0.0, 1.0),
        suggested_corrections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_signal() -> EcgSignal {
        let n = 500;
        let mut sig = EcgSignal::new(500.0, 1.0);
        let lead_i: Vec<f64> = (0..n).map(|i| (i as f64 * 0.05).sin() * 500.0).collect();
        let lead_iii: Vec<f64> = (0..n).map(|i| (i as f64 * 0.05 + 0.3).sin() * 400.0).collect();
        let lead_ii: Vec<f64> = lead_i.iter().zip(lead_iii.iter()).map(|(a, b)| a + b).collect();
        sig.insert(LeadName::I, lead_i);
        sig.insert(LeadName::II, lead_ii);
        sig.insert(LeadName::III, lead_iii);
        sig
    }

    #[test]
    fn consistent_limb_leads_pass_einthoven() {
        let sig = build_signal();
        let report = validate(&sig);
        assert!(!report.issues.iter().any(|i| i.code == "EINTHOVEN_VIOLATION"));
    }

    #[test]
    fn swapped_leads_trip_einthoven() {
        let mut sig = build_signal();
        let i = sig.get(LeadName::I).unwrap().to_vec();
        let ii = sig.get(LeadName::II).unwrap().to_vec();
        sig.insert(LeadName::I, ii);
        sig.insert(LeadName::II, i);
        let report = validate(&sig);
        assert!(report.issues.iter().any(|i| i.code == "EINTHOVEN_VIOLATION"));
    }

    #[test]
    fn flat_lead_is_flagged() {
        let mut sig = build_signal();
        sig.insert(LeadName::V1, vec![0.0; 500]);
        let report = validate(&sig);
        assert!(report.lead_quality.iter().find(|l| l.lead == LeadName::V1).unwrap().flat);
    }

    #[test]
    fn overall_score_in_unit_range() {
        let sig = build_signal();
        let report = validate(&sig);
        assert!(report.overall_score >= 0.0 && report.overall_score <= 1.0);
    }
}

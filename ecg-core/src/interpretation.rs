//! Age-aware clinical interpretation: turns measurements and rhythm output
//! into `Finding`s, then aggregates them into a `Summary` (spec.md §4.9).

use crate::age_table::{band_for_age, BandVerdict};
use crate::finding::{Category, Finding, Interpretation, RhythmDescription, Severity, Summary, Urgency, HIGH_URGENCY_CODES, REVIEW_CODES};
use crate::measurements::{Measurements, MorphologyInputs, StMorphology};
use crate::rhythm::{RhythmAnalysis, RhythmLabel};

const MIN_CONFIDENCE_TO_REPORT: f64 = 0.3;

/// Deviation from the age band's median heart rate beyond which an
/// out-of-band rate is `abnormal` rather than merely `borderline`
/// (spec.md §4.9 Rate).
const RATE_ABNORMAL_DEVIATION_FRACTION: f64 = 0.2;

fn rate_severity(measurements: &Measurements, band: &crate::age_table::AgeBand) -> Severity {
    if band.heart_rate.p50 <= 0.0 {
        return Severity::Abnormal;
    }
    let deviation = (measurements.heart_rate_bpm - band.heart_rate.p50).abs() / band.heart_rate.p50;
    if deviation > RATE_ABNORMAL_DEVIATION_FRACTION {
        Severity::Abnormal
    } else {
        Severity::Borderline
    }
}

fn rate_findings(measurements: &Measurements, age_days: i64) -> Vec<Finding> {
    let band = band_for_age(age_days);
    let severity = rate_severity(measurements, band);
    match band.heart_rate.classify(measurements.heart_rate_bpm) {
        BandVerdict::BelowRange => vec![Finding::new(
            "BRADYCARDIA",
            format!("heart rate {:.0} bpm below the {} reference range", measurements.heart_rate_bpm, band.label),
            severity,
            Category::Rate,
        )
        .age_adjusted()
        .with_evidence("heart_rate_bpm", format!("{:.1}", measurements.heart_rate_bpm))],
        BandVerdict::AboveRange => vec![Finding::new(
            "TACHYCARDIA",
            format!("heart rate {:.0} bpm above the {} reference range", measurements.heart_rate_bpm, band.label),
            severity,
            Category::Rate,
        )
        .age_adjusted()
        .with_evidence("heart_rate_bpm", format!("{:.1}", measurements.heart_rate_bpm))],
        BandVerdict::WithinRange => Vec::new(),
    }
}

/// QTc severity tiers, age-independent (spec.md §4.9/§8): >500ms critical,
/// >470ms abnormal, >450ms borderline; <320ms abnormal-short, <340ms
/// borderline-short. These are exact boundaries, not the tightened p2/p98
/// band classifier used for rate/PR/QRS.
fn qtc_finding(qtc_ms: f64) -> Option<Finding> {
    if qtc_ms > 500.0 {
        Some(
            Finding::new("QTC_PROLONGED", format!("QTc {:.0}ms critically prolonged", qtc_ms), Severity::Critical, Category::Intervals)
                .with_note("prolonged QTc carries arrhythmia risk and warrants clinical correlation"),
        )
    } else if qtc_ms > 470.0 {
        Some(Finding::new("QTC_PROLONGED", format!("QTc {:.0}ms prolonged", qtc_ms), Severity::Abnormal, Category::Intervals))
    } else if qtc_ms > 450.0 {
        Some(Finding::new("QTC_PROLONGED", format!("QTc {:.0}ms borderline prolonged", qtc_ms), Severity::Borderline, Category::Intervals))
    } else if qtc_ms < 320.0 {
        Some(Finding::new("QTC_SHORT", format!("QTc {:.0}ms critically short", qtc_ms), Severity::Abnormal, Category::Intervals))
    } else if qtc_ms < 340.0 {
        Some(Finding::new("QTC_SHORT", format!("QTc {:.0}ms short", qtc_ms), Severity::Borderline, Category::Intervals))
    } else {
        None
    }
}

fn interval_findings(measurements: &Measurements, age_days: i64) -> Vec<Finding> {
    let band = band_for_age(age_days);
    let mut findings = Vec::new();

    if band.pr_ms.classify(measurements.pr_ms) == BandVerdict::AboveRange {
        let severity = if measurements.pr_ms > 200.0 { Severity::Abnormal } else { Severity::Borderline };
        findings.push(
            Finding::new(
                "FIRST_DEGREE_AV_BLOCK",
                format!("PR interval {:.0}ms prolonged for {}", measurements.pr_ms, band.label),
                severity,
                Category::Conduction,
            )
            .age_adjusted(),
        );
    }

    if band.qrs_ms.classify(measurements.qrs_ms) == BandVerdict::AboveRange {
        findings.push(
            Finding::new(
                "WIDE_QRS",
                format!("QRS duration {:.0}ms wider than expected for {}", measurements.qrs_ms, band.label),
                Severity::Abnormal,
                Category::Conduction,
            )
            .age_adjusted(),
        );
    }

    if let Some(finding) = qtc_finding(measurements.qtc_ms) {
        findings.push(finding);
    }

    findings
}

/// Frontal-plane axis deviation against the age band's p2/p98 QRS-axis
/// bounds (spec.md §4.9 Axis). The northwest quadrant (-180, -90) is always
/// `EXTREME_AXIS` regardless of age; otherwise deviation beyond the band's
/// p2/p98 is `abnormal` past 30 degrees, `borderline` within it, with
/// right-axis deviation downgraded to borderline for neonates (age < 30
/// days) since rightward axes are expected at that age.
fn axis_findings(measurements: &Measurements, age_days: i64) -> Vec<Finding> {
    let band = band_for_age(age_days);
    let mut findings = Vec::new();
    let axis = measurements.qrs_axis_deg;

    if axis < -90.0 {
        findings.push(
            Finding::new("EXTREME_AXIS", format!("QRS axis {:.0} degrees falls in the northwest quadrant", axis), Severity::Abnormal, Category::Axis)
                .with_note("extreme axis deviation warrants correlation for ventricular tachycardia or severe conduction disease"),
        );
        return findings;
    }

    if axis < band.qrs_axis.p2 {
        let deviation = band.qrs_axis.p2 - axis;
        let severity = if deviation > 30.0 { Severity::Abnormal } else { Severity::Borderline };
        findings.push(
            Finding::new("LEFT_AXIS_DEVIATION", format!("QRS axis {:.0} degrees indicates left axis deviation for {}", axis, band.label), severity, Category::Axis)
                .age_adjusted(),
        );
    } else if axis > band.qrs_axis.p98 {
        let deviation = axis - band.qrs_axis.p98;
        let mut severity = if deviation > 30.0 { Severity::Abnormal } else { Severity::Borderline };
        if age_days < 30 && axis < 180.0 {
            severity = Severity::Borderline;
        }
        findings.push(
            Finding::new("RIGHT_AXIS_DEVIATION", format!("QRS axis {:.0} degrees indicates right axis deviation for {}", axis, band.label), severity, Category::Axis)
                .age_adjusted(),
        );
    }
    findings
}

/// Hypertrophy scoring (spec.md §4.9): RVH and LVH criteria each score
/// against age p98 voltage/ratio thresholds plus axis deviation; a score of
/// 2 is borderline, 3 abnormal, and both at or above 2 adds a BVH finding.
fn hypertrophy_findings(measurements: &Measurements, morphology: &MorphologyInputs, age_days: i64) -> Vec<Finding> {
    let band = band_for_age(age_days);
    let mut findings = Vec::new();

    let rs_ratio_v1 = if morphology.s_v1_uv > 0.0 { morphology.r_v1_uv / morphology.s_v1_uv } else { morphology.r_v1_uv };
    let mut rvh_score = 0u8;
    if morphology.r_v1_uv > band.rvh_r_v1_uv.p98 {
        rvh_score += 1;
    }
    if rs_ratio_v1 > band.rvh_rs_ratio_v1.p98 {
        rvh_score += 1;
    }
    if measurements.qrs_axis_deg > band.qrs_axis.p98 {
        rvh_score += 1;
    }

    let lvh_sum = morphology.s_v1_uv + morphology.r_v6_uv;
    let mut lvh_score = 0u8;
    if lvh_sum > band.lvh_sum_uv.p98 {
        lvh_score += 1;
    }
    if measurements.qrs_axis_deg < band.qrs_axis.p2 {
        lvh_score += 1;
    }

    if let Some(severity) = hypertrophy_severity(rvh_score) {
        findings.push(
            Finding::new("RVH", format!("right ventricular hypertrophy criteria met (score {})", rvh_score), severity, Category::Hypertrophy)
                .age_adjusted()
                .with_evidence("rvh_score", rvh_score.to_string()),
        );
    }
    if let Some(severity) = hypertrophy_severity(lvh_score) {
        findings.push(
            Finding::new("LVH", format!("left ventricular hypertrophy criteria met (score {})", lvh_score), severity, Category::Hypertrophy)
                .age_adjusted()
                .with_evidence("lvh_score", lvh_score.to_string()),
        );
    }
    if rvh_score >= 2 && lvh_score >= 2 {
        findings.push(Finding::new("BVH", "combined RVH and LVH criteria, consistent with biventricular hypertrophy", Severity::Abnormal, Category::Hypertrophy).age_adjusted());
    }
    findings
}

fn hypertrophy_severity(score: u8) -> Option<Severity> {
    match score {
        0 | 1 => None,
        2 => Some(Severity::Borderline),
        _ => Some(Severity::Abnormal),
    }
}

/// Repolarization analysis (spec.md §4.9): T-wave polarity in V1 relative
/// to age, and the QRS-T angle.
fn repolarization_findings(measurements: &Measurements, morphology: &MorphologyInputs, age_days: i64) -> Vec<Finding> {
    let mut findings = Vec::new();
    let juvenile_t_pattern = (3 * 365..=16 * 365).contains(&age_days);

    if morphology.t_wave_v1_upright {
        if age_days > 7 {
            findings.push(
                Finding::new("T_WAVE_RV_STRAIN", "upright T wave in V1 beyond the first week of life, suggestive of right-ventricular strain", Severity::Abnormal, Category::Ischemia)
                    .age_adjusted(),
            );
        }
    } else if age_days <= 1 {
        findings.push(
            Finding::new("T_WAVE_INVERSION_V1", "inverted T wave in V1 within the first day of life", Severity::Borderline, Category::Ischemia)
                .age_adjusted()
                .pediatric(true),
        );
    } else if juvenile_t_pattern {
        // Juvenile T-wave pattern: inverted T in V1 between ages 3 and 16
        // years is a normal finding, so no abnormality is raised here.
    }

    let raw_angle = (measurements.qrs_axis_deg - measurements.t_axis_deg).abs();
    let qrs_t_angle = if raw_angle > 180.0 { 360.0 - raw_angle } else { raw_angle };
    if qrs_t_angle > 135.0 {
        findings.push(Finding::new("QRS_T_ANGLE_WIDE", format!("QRS-T angle {:.0} degrees is widely discordant", qrs_t_angle), Severity::Abnormal, Category::Ischemia));
    } else if qrs_t_angle >= 100.0 {
        findings.push(Finding::new("QRS_T_ANGLE_WIDE", format!("QRS-T angle {:.0} degrees is borderline discordant", qrs_t_angle), Severity::Borderline, Category::Ischemia));
    }

    findings
}

/// Pre-excitation (WPW) and related short-PR patterns (spec.md §4.9).
fn pre_excitation_findings(measurements: &Measurements, morphology: &MorphologyInputs, age_days: i64) -> Vec<Finding> {
    let band = band_for_age(age_days);
    let mut findings = Vec::new();

    let short_pr = band.pr_ms.classify(measurements.pr_ms) == BandVerdict::BelowRange;
    let wide_qrs = band.qrs_ms.classify(measurements.qrs_ms) == BandVerdict::AboveRange;
    let neonatal_window = age_days <= 30;

    if short_pr && wide_qrs {
        let severity = if morphology.delta_wave_present { Severity::Abnormal } else { Severity::Borderline };
        let note = if morphology.delta_wave_present {
            "classic pre-excitation pattern: short PR, wide QRS, and a delta wave"
        } else {
            "short PR and wide QRS without clear delta-wave evidence"
        };
        findings.push(Finding::new("WPW", "pre-excitation pattern consistent with Wolff-Parkinson-White", severity, Category::Conduction).age_adjusted().with_note(note));
    } else if measurements.pr_ms < 80.0 && !neonatal_window && !wide_qrs {
        findings.push(
            Finding::new("PR_SHORT", format!("PR interval {:.0}ms is very short with normal QRS, consistent with a Lown-Ganong-Levine pattern", measurements.pr_ms), Severity::Borderline, Category::Conduction)
                .age_adjusted(),
        );
    }

    if morphology.delta_wave_present && !short_pr {
        findings.push(Finding::new("MAHAIM_FIBER_PATTERN", "delta wave present with a normal PR interval, suggestive of a Mahaim-fiber pathway", Severity::Borderline, Category::Conduction).age_adjusted());
    }

    findings
}

/// Brugada pattern (spec.md §4.9): age-independent ST-elevation/morphology/
/// T-wave criteria in V1/V2.
fn brugada_findings(morphology: &MorphologyInputs) -> Vec<Finding> {
    const BRUGADA_ST_ELEVATION_UV: f64 = 200.0; // 2mm at standard 10mm/mV gain.
    let mut findings = Vec::new();
    let elevated = morphology.st_elevation_v1_uv >= BRUGADA_ST_ELEVATION_UV || morphology.st_elevation_v2_uv >= BRUGADA_ST_ELEVATION_UV;
    if !elevated {
        return findings;
    }

    match morphology.st_morphology_v1 {
        StMorphology::Coved if !morphology.t_wave_v1_upright => {
            findings.push(
                Finding::new("BRUGADA_PATTERN", "type 1 Brugada pattern: coved ST elevation with a negative T wave in V1/V2", Severity::Abnormal, Category::Ischemia)
                    .with_note("age-independent criterion; correlate clinically and consider provocative testing"),
            );
        }
        StMorphology::Saddleback if morphology.t_wave_v1_upright => {
            findings.push(Finding::new(
                "BRUGADA_PATTERN",
                "type 2 Brugada pattern: saddleback ST elevation with a positive or biphasic T wave in V1/V2",
                Severity::Borderline,
                Category::Ischemia,
            ));
        }
        StMorphology::Unknown => {
            findings.push(
                Finding::new("ST_ELEVATION", "ST elevation in V1/V2 of uncertain morphology", Severity::Borderline, Category::Ischemia)
                    .with_note("pattern could not be classified as coved or saddleback; correlate with QRS morphology for RBBB"),
            );
        }
        _ => {}
    }
    findings
}

fn rhythm_description(rhythm: &RhythmAnalysis) -> RhythmDescription {
    let label = match rhythm.label {
        RhythmLabel::NormalSinus => "normal sinus rhythm",
        RhythmLabel::SinusBradycardia => "sinus bradycardia",
        RhythmLabel::SinusTachycardia => "sinus tachycardia",
        RhythmLabel::SinusArrhythmia => "sinus arrhythmia",
        RhythmLabel::AtrialFibrillation => "atrial fibrillation",
        RhythmLabel::AtrialFlutter => "atrial flutter",
        RhythmLabel::SupraventricularTachycardia => "supraventricular tachycardia",
        RhythmLabel::VentricularTachycardia => "ventricular tachycardia",
        RhythmLabel::VentricularFibrillation => "ventricular fibrillation",
        RhythmLabel::JunctionalRhythm => "junctional rhythm",
        RhythmLabel::IdioventricularRhythm => "idioventricular rhythm",
        RhythmLabel::Asystole => "asystole",
        RhythmLabel::RegularlyIrregular => "regularly irregular rhythm",
        RhythmLabel::IrregularlyIrregular => "irregularly irregular rhythm",
        RhythmLabel::Paced => "paced rhythm",
        RhythmLabel::Indeterminate => "rhythm indeterminate from available leads",
    };
    RhythmDescription {
        label: label.to_string(),
        regular: rhythm.regularity > 0.75,
        rate_bpm: rhythm.rate_bpm,
    }
}

fn rhythm_findings(rhythm: &RhythmAnalysis) -> Vec<Finding> {
    let mut findings = Vec::new();
    match rhythm.label {
        RhythmLabel::IrregularlyIrregular => findings.push(Finding::new(
            "IRREGULARLY_IRREGULAR_RHYTHM",
            "rhythm is irregularly irregular, consistent with atrial fibrillation",
            Severity::Abnormal,
            Category::Rhythm,
        )),
        RhythmLabel::RegularlyIrregular => findings.push(Finding::new(
            "REGULARLY_IRREGULAR_RHYTHM",
            "rhythm shows a regularly irregular pattern (e.g. bigeminy)",
            Severity::Borderline,
            Category::Rhythm,
        )),
        RhythmLabel::AtrialFibrillation => findings.push(Finding::new(
            "ATRIAL_FIBRILLATION",
            "atrial fibrillation",
            Severity::Abnormal,
            Category::Rhythm,
        )),
        RhythmLabel::AtrialFlutter => findings.push(Finding::new(
            "ATRIAL_FLUTTER",
            "atrial flutter",
            Severity::Abnormal,
            Category::Rhythm,
        )),
        RhythmLabel::SupraventricularTachycardia => findings.push(Finding::new(
            "SUPRAVENTRICULAR_TACHYCARDIA",
            format!("supraventricular tachycardia at {:.0} bpm", rhythm.rate_bpm),
            Severity::Abnormal,
            Category::Rhythm,
        )),
        RhythmLabel::VentricularTachycardia => findings.push(
            Finding::new(
                "VENTRICULAR_TACHYCARDIA",
                format!("wide-complex tachycardia at {:.0} bpm, consistent with ventricular tachycardia", rhythm.rate_bpm),
                Severity::Critical,
                Category::Rhythm,
            )
            .with_note("wide-complex tachycardia should be treated as ventricular in origin until proven otherwise"),
        ),
        RhythmLabel::VentricularFibrillation => findings.push(
            Finding::new("VENTRICULAR_FIBRILLATION", "chaotic wide-complex activity consistent with ventricular fibrillation", Severity::Critical, Category::Rhythm)
                .with_note("life-threatening rhythm, immediate correlation required"),
        ),
        RhythmLabel::JunctionalRhythm => findings.push(Finding::new(
            "JUNCTIONAL_RHYTHM",
            format!("junctional rhythm at {:.0} bpm", rhythm.rate_bpm),
            Severity::Borderline,
            Category::Rhythm,
        )),
        RhythmLabel::IdioventricularRhythm => findings.push(Finding::new(
            "IDIOVENTRICULAR_RHYTHM",
            format!("idioventricular escape rhythm at {:.0} bpm", rhythm.rate_bpm),
            Severity::Abnormal,
            Category::Rhythm,
        )),
        RhythmLabel::Asystole => findings.push(
            Finding::new("ASYSTOLE", "no beats detected over a sustained window, consistent with asystole", Severity::Critical, Category::Rhythm)
                .with_note("confirm lead contact before treating as a clinical finding"),
        ),
        _ => {}
    }
    if rhythm.ectopy.pvc > 0 {
        findings.push(
            Finding::new(
                "PVC_PRESENT",
                format!("{} premature ventricular complex(es) detected", rhythm.ectopy.pvc),
                Severity::Borderline,
                Category::Rhythm,
            )
            .with_evidence("pvc_count", rhythm.ectopy.pvc.to_string()),
        );
    }
    if rhythm.ectopy.runs > 0 {
        findings.push(Finding::new(
            "VENTRICULAR_RUN",
            format!("{} run(s) of 3 or more consecutive ectopic beats", rhythm.ectopy.runs),
            Severity::Critical,
            Category::Rhythm,
        ));
    }
    findings
}

/// Compose the one-liner summary from the top 3 abnormal-or-worse findings,
/// ordered by severity then category (spec.md §4.9).
fn one_liner(findings: &[Finding]) -> String {
    let mut abnormal: Vec<&Finding> = findings.iter().filter(|f| f.severity != Severity::Normal).collect();
    abnormal.sort_by(|a, b| a.severity.cmp(&b.severity).then(a.category.cmp(&b.category)));
    if abnormal.is_empty() {
        return "no significant abnormalities detected".to_string();
    }
    abnormal.iter().take(3).map(|f| f.code.as_str()).collect::<Vec<_>>().join(", ")
}

fn determine_urgency(findings: &[Finding]) -> Urgency {
    if findings.iter().any(|f| f.severity == Severity::Critical) {
        return Urgency::Critical;
    }
    if findings.iter().any(|f| HIGH_URGENCY_CODES.contains(&f.code.as_str())) {
        return Urgency::Urgent;
    }
    if findings.iter().any(|f| f.severity == Severity::Abnormal) {
        return Urgency::Attention;
    }
    Urgency::Routine
}

fn recommend_review(findings: &[Finding]) -> bool {
    findings.iter().any(|f| REVIEW_CODES.contains(&f.code.as_str()) || f.severity == Severity::Critical)
}

/// Run the full Interpretation Engine: rule functions, confidence filter,
/// sort, and summary composition.
pub fn interpret(
    measurements: &Measurements,
    rhythm: &RhythmAnalysis,
    age_days: i64,
    overall_confidence: f64,
    timestamp: impl Into<String>,
    morphology: Option<&MorphologyInputs>,
) -> Interpretation {
    let mut findings = Vec::new();
    findings.extend(rate_findings(measurements, age_days));
    findings.extend(interval_findings(measurements, age_days));
    findings.extend(axis_findings(measurements, age_days));
    findings.extend(rhythm_findings(rhythm));
    if let Some(morphology) = morphology {
        findings.extend(hypertrophy_findings(measurements, morphology, age_days));
        findings.extend(repolarization_findings(measurements, morphology, age_days));
        findings.extend(pre_excitation_findings(measurements, morphology, age_days));
        findings.extend(brugada_findings(morphology));
    }

    findings.retain(|f| f.confidence >= MIN_CONFIDENCE_TO_REPORT);
    findings.sort_by(|a, b| a.severity.cmp(&b.severity).then(a.category.cmp(&b.category)));

    let summary = Summary {
        conclusion: if findings.is_empty() {
            "ECG within normal limits for age".to_string()
        } else {
            format!("{} finding(s) requiring review", findings.len())
        },
        one_liner: one_liner(&findings),
        urgency: determine_urgency(&findings),
        recommend_review: recommend_review(&findings),
    };

    Interpretation {
        findings,
        rhythm: rhythm_description(rhythm),
        summary,
        overall_confidence,
        age_days,
        method: "rule-based".to_string(),
        timestamp: timestamp.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::{Beat, BeatKind, EctopyCounts};

    fn normal_measurements() -> Measurements {
        Measurements {
            heart_rate_bpm: 72.0,
            rr_ms: 833.0,
            pr_ms: 160.0,
            qrs_ms: 90.0,
            qt_ms: 380.0,
            qtc_ms: 410.0,
            p_axis_deg: 45.0,
            qrs_axis_deg: 30.0,
            t_axis_deg: 40.0,
        }
    }

    fn normal_rhythm() -> RhythmAnalysis {
        RhythmAnalysis {
            beats: vec![Beat { r_time_s: 0.8, qrs_start_s: 0.78, qrs_end_s: 0.82, kind: BeatKind::Normal }],
            rate_bpm: 72.0,
            regularity: 0.95,
            label: RhythmLabel::NormalSinus,
            ectopy: EctopyCounts { pac: 0, pvc: 0, couplets: 0, runs: 0 },
        }
    }

    #[test]
    fn normal_adult_ecg_has_no_findings() {
        let interpretation = interpret(&normal_measurements(), &normal_rhythm(), 30 * 365, 0.9, "2026-01-01T00:00:00Z", None);
        assert!(interpretation.findings.is_empty());
        assert_eq!(interpretation.summary.urgency, Urgency::Routine);
        assert!(!interpretation.summary.recommend_review);
    }

    #[test]
    fn prolonged_qtc_is_critical_and_forces_review() {
        let mut measurements = normal_measurements();
        measurements.qtc_ms = 520.0;
        let interpretation = interpret(&measurements, &normal_rhythm(), 30 * 365, 0.9, "2026-01-01T00:00:00Z", None);
        assert!(interpretation.findings.iter().any(|f| f.code == "QTC_PROLONGED"));
        assert!(interpretation.summary.recommend_review);
        assert_eq!(interpretation.summary.urgency, Urgency::Critical);
    }

    #[test]
    fn qtc_boundary_thresholds_match_spec() {
        assert!(qtc_finding(450.0).is_none());
        assert_eq!(qtc_finding(451.0).unwrap().severity, Severity::Borderline);
        assert_eq!(qtc_finding(470.0).unwrap().severity, Severity::Borderline);
        assert_eq!(qtc_finding(471.0).unwrap().severity, Severity::Abnormal);
        assert_eq!(qtc_finding(500.0).unwrap().severity, Severity::Abnormal);
        assert_eq!(qtc_finding(501.0).unwrap().severity, Severity::Critical);
    }

    #[test]
    fn findings_sorted_severity_first() {
        let mut measurements = normal_measurements();
        measurements.qtc_ms = 520.0;
        measurements.pr_ms = 260.0;
        let interpretation = interpret(&measurements, &normal_rhythm(), 30 * 365, 0.9, "2026-01-01T00:00:00Z", None);
        assert_eq!(interpretation.findings[0].code, "QTC_PROLONGED");
    }

    #[test]
    fn extreme_axis_detected_in_northwest_quadrant() {
        let mut measurements = normal_measurements();
        measurements.qrs_axis_deg = -120.0;
        let findings = axis_findings(&measurements, 30 * 365);
        assert!(findings.iter().any(|f| f.code == "EXTREME_AXIS"));
    }

    #[test]
    fn rate_deviation_beyond_20_percent_is_abnormal() {
        let mut measurements = normal_measurements();
        measurements.heart_rate_bpm = 200.0;
        let findings = rate_findings(&measurements, 30 * 365);
        assert_eq!(findings[0].severity, Severity::Abnormal);
    }
}

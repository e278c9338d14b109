//! Age-banded normative ranges for the clinical parameters the
//! Interpretation Engine checks (spec.md §4.9).
//!
//! Bands are closed on the low end, open on the high end (`[low, high)` in
//! days), so every age maps to exactly one band and the table is
//! monotonically non-overlapping by construction.

#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub p2: f64,
    pub p50: f64,
    pub p98: f64,
}

impl Range {
    /// Classification uses inner thresholds slightly tighter than the raw
    /// percentile bounds (p2*1.02 / p98*0.98), so a value sitting exactly on
    /// the population edge isn't flagged on noise alone.
    pub fn classify(&self, value: f64) -> BandVerdict {
        let low = self.p2 * 1.02;
        let high = self.p98 * 0.98;
        if value < low {
            BandVerdict::BelowRange
        } else if value > high {
            BandVerdict::AboveRange
        } else {
            BandVerdict::WithinRange
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandVerdict {
    BelowRange,
    WithinRange,
    AboveRange,
}

#[derive(Debug, Clone, Copy)]
pub struct AgeBand {
    pub low_days: i64,
    /// Exclusive upper bound; `i64::MAX` for the open-ended adult band.
    pub high_days: i64,
    pub label: &'static str,
    pub heart_rate: Range,
    pub pr_ms: Range,
    pub qrs_ms: Range,
    /// Normal QRS-axis range in degrees. QTc has no age-banded table: its
    /// thresholds are age-independent (spec.md §4.9/§8), applied directly
    /// in `interpretation::interval_findings`.
    pub qrs_axis: Range,
    /// p98 used as the RVH R-wave-in-V1 threshold.
    pub rvh_r_v1_uv: Range,
    /// p98 used as the RVH R/S-ratio-in-V1 threshold.
    pub rvh_rs_ratio_v1: Range,
    /// p98 used as the Sokolow-Lyon-style `S(V1) + R(V6)` LVH threshold.
    pub lvh_sum_uv: Range,
}

/// Canonical bands, ascending, non-overlapping, covering `[0, i64::MAX)`.
/// Values are representative pediatric-cardiology reference ranges; exact
/// figures are an Open Question left to a maintainer with access to a
/// validated normative dataset (spec.md §9), so these are deliberately
/// conservative, wide bands rather than a precision clinical table. The
/// axis and hypertrophy ranges reflect the expected rightward shift and
/// right-ventricular dominance of early infancy, narrowing toward the
/// classic adult Sokolow-Lyon figures by adolescence.
pub const BANDS: &[AgeBand] = &[
    AgeBand {
        low_days: 0,
        high_days: 30,
        label: "neonate",
        heart_rate: Range { p2: 95.0, p50: 140.0, p98: 180.0 },
        pr_ms: Range { p2: 80.0, p50: 100.0, p98: 120.0 },
        qrs_ms: Range { p2: 30.0, p50: 55.0, p98: 75.0 },
        qrs_axis: Range { p2: 30.0, p50: 125.0, p98: 180.0 },
        rvh_r_v1_uv: Range { p2: 400.0, p50: 1200.0, p98: 2500.0 },
        rvh_rs_ratio_v1: Range { p2: 0.5, p50: 1.5, p98: 3.0 },
        lvh_sum_uv: Range { p2: 500.0, p50: 1800.0, p98: 3000.0 },
    },
    AgeBand {
        low_days: 30,
        high_days: 365,
        label: "infant",
        heart_rate: Range { p2: 100.0, p50: 130.0, p98: 170.0 },
        pr_ms: Range { p2: 85.0, p50: 105.0, p98: 130.0 },
        qrs_ms: Range { p2: 35.0, p50: 60.0, p98: 80.0 },
        qrs_axis: Range { p2: 10.0, p50: 90.0, p98: 160.0 },
        rvh_r_v1_uv: Range { p2: 300.0, p50: 1000.0, p98: 2000.0 },
        rvh_rs_ratio_v1: Range { p2: 0.4, p50: 1.2, p98: 2.0 },
        lvh_sum_uv: Range { p2: 500.0, p50: 1800.0, p98: 3000.0 },
    },
    AgeBand {
        low_days: 365,
        high_days: 3 * 365,
        label: "toddler",
        heart_rate: Range { p2: 80.0, p50: 115.0, p98: 150.0 },
        pr_ms: Range { p2: 90.0, p50: 115.0, p98: 140.0 },
        qrs_ms: Range { p2: 40.0, p50: 65.0, p98: 85.0 },
        qrs_axis: Range { p2: 0.0, p50: 60.0, p98: 120.0 },
        rvh_r_v1_uv: Range { p2: 250.0, p50: 800.0, p98: 1500.0 },
        rvh_rs_ratio_v1: Range { p2: 0.3, p50: 0.9, p98: 1.5 },
        lvh_sum_uv: Range { p2: 600.0, p50: 2000.0, p98: 3500.0 },
    },
    AgeBand {
        low_days: 3 * 365,
        high_days: 12 * 365,
        label: "child",
        heart_rate: Range { p2: 65.0, p50: 95.0, p98: 130.0 },
        pr_ms: Range { p2: 100.0, p50: 130.0, p98: 160.0 },
        qrs_ms: Range { p2: 45.0, p50: 70.0, p98: 90.0 },
        qrs_axis: Range { p2: -10.0, p50: 50.0, p98: 100.0 },
        rvh_r_v1_uv: Range { p2: 200.0, p50: 600.0, p98: 1200.0 },
        rvh_rs_ratio_v1: Range { p2: 0.2, p50: 0.6, p98: 1.0 },
        lvh_sum_uv: Range { p2: 700.0, p50: 2200.0, p98: 4000.0 },
    },
    AgeBand {
        low_days: 12 * 365,
        high_days: 18 * 365,
        label: "adolescent",
        heart_rate: Range { p2: 50.0, p50: 80.0, p98: 110.0 },
        pr_ms: Range { p2: 110.0, p50: 140.0, p98: 180.0 },
        qrs_ms: Range { p2: 55.0, p50: 80.0, p98: 100.0 },
        qrs_axis: Range { p2: -15.0, p50: 45.0, p98: 100.0 },
        rvh_r_v1_uv: Range { p2: 150.0, p50: 500.0, p98: 1000.0 },
        rvh_rs_ratio_v1: Range { p2: 0.2, p50: 0.5, p98: 0.8 },
        lvh_sum_uv: Range { p2: 800.0, p50: 2500.0, p98: 4500.0 },
    },
    AgeBand {
        low_days: 18 * 365,
        high_days: i64::MAX,
        label: "adult",
        heart_rate: Range { p2: 50.0, p50: 72.0, p98: 100.0 },
        pr_ms: Range { p2: 120.0, p50: 160.0, p98: 200.0 },
        qrs_ms: Range { p2: 60.0, p50: 90.0, p98: 110.0 },
        qrs_axis: Range { p2: -30.0, p50: 50.0, p98: 90.0 },
        rvh_r_v1_uv: Range { p2: 100.0, p50: 300.0, p98: 700.0 },
        rvh_rs_ratio_v1: Range { p2: 0.2, p50: 0.5, p98: 1.0 },
        lvh_sum_uv: Range { p2: 800.0, p50: 2000.0, p98: 3500.0 },
    },
];

/// Look up the band covering a given age in days. Ages below zero clamp to
/// the neonate band, ages beyond any table entry fall into the adult band
/// via the open-ended upper bound.
pub fn band_for_age(age_days: i64) -> &'static AgeBand {
    let age_days = age_days.max(0);
    BANDS
        .iter()
        .find(|b| age_days >= b.low_days && age_days < b.high_days)
        .unwrap_or(BANDS.last().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_every_age_without_gaps() {
        for age in [0, 1, 29, 30, 31, 364, 365, 366, 1094, 1095, 4379, 4380, 4381, 6569, 6570, 6571, 100_000] {
            let band = band_for_age(age);
            assert!(age >= band.low_days && age < band.high_days);
        }
    }

    #[test]
    fn classify_within_range() {
        let band = band_for_age(30 * 365);
        assert_eq!(band.heart_rate.classify(72.0), BandVerdict::WithinRange);
    }

    #[test]
    fn classify_flags_outside_tightened_bounds() {
        let band = band_for_age(30 * 365);
        assert_eq!(band.heart_rate.classify(300.0), BandVerdict::AboveRange);
        assert_eq!(band.heart_rate.classify(1.0), BandVerdict::BelowRange);
    }
}

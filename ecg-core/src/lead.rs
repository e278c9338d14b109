//! Lead identity: a closed tag universe, modeled as a discriminated variant
//! rather than through inheritance (see DESIGN NOTES in SPEC_FULL.md).

use serde::{Deserialize, Serialize};

/// One electrode placement on a 12- or 15-lead printed ECG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeadName {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V3R,
    V4R,
    V7,
}

impl LeadName {
    /// The standard adult 12-lead set, in conventional reading order.
    pub const STANDARD_12: [LeadName; 12] = [
        LeadName::I,
        LeadName::II,
        LeadName::III,
        LeadName::AVR,
        LeadName::AVL,
        LeadName::AVF,
        LeadName::V1,
        LeadName::V2,
        LeadName::V3,
        LeadName::V4,
        LeadName::V5,
        LeadName::V6,
    ];

    /// The three pediatric-extension leads.
    pub const PEDIATRIC_EXTRA: [LeadName; 3] = [LeadName::V3R, LeadName::V4R, LeadName::V7];

    pub fn is_limb(&self) -> bool {
        matches!(
            self,
            LeadName::I | LeadName::II | LeadName::III | LeadName::AVR | LeadName::AVL | LeadName::AVF
        )
    }

    pub fn is_precordial(&self) -> bool {
        !self.is_limb()
    }

    /// Precordial leads in their anatomic left-to-right progression order,
    /// used by the R-wave progression check in the Cross-Lead Validator.
    pub fn precordial_progression() -> [LeadName; 6] {
        [
            LeadName::V1,
            LeadName::V2,
            LeadName::V3,
            LeadName::V4,
            LeadName::V5,
            LeadName::V6,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeadName::I => "I",
            LeadName::II => "II",
            LeadName::III => "III",
            LeadName::AVR => "aVR",
            LeadName::AVL => "aVL",
            LeadName::AVF => "aVF",
            LeadName::V1 => "V1",
            LeadName::V2 => "V2",
            LeadName::V3 => "V3",
            LeadName::V4 => "V4",
            LeadName::V5 => "V5",
            LeadName::V6 => "V6",
            LeadName::V3R => "V3R",
            LeadName::V4R => "V4R",
            LeadName::V7 => "V7",
        }
    }

    pub fn from_label(s: &str) -> Option<LeadName> {
        Some(match s.trim() {
            "I" => LeadName::I,
            "II" => LeadName::II,
            "III" => LeadName::III,
            "aVR" | "AVR" => LeadName::AVR,
            "aVL" | "AVL" => LeadName::AVL,
            "aVF" | "AVF" => LeadName::AVF,
            "V1" => LeadName::V1,
            "V2" => LeadName::V2,
            "V3" => LeadName::V3,
            "V4" => LeadName::V4,
            "V5" => LeadName::V5,
            "V6" => LeadName::V6,
            "V3R" => LeadName::V3R,
            "V4R" => LeadName::V4R,
            "V7" => LeadName::V7,
            _ => return None,
        })
    }
}

impl std::fmt::Display for LeadName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_roundtrip() {
        for lead in LeadName::STANDARD_12.iter().chain(LeadName::PEDIATRIC_EXTRA.iter()) {
            let label = lead.label();
            assert_eq!(LeadName::from_label(label), Some(*lead));
        }
    }

    #[test]
    fn limb_vs_precordial() {
        assert!(LeadName::II.is_limb());
        assert!(LeadName::V1.is_precordial());
        assert!(!LeadName::AVR.is_precordial());
    }
}

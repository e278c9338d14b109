//! Clinical findings and the interpretation record they roll up into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    // Ordering matches spec.md §4.9: critical < abnormal < borderline < normal
    Critical,
    Abnormal,
    Borderline,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Rhythm,
    Rate,
    Intervals,
    Axis,
    Hypertrophy,
    Conduction,
    Morphology,
    Ischemia,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub code: String,
    pub statement: String,
    pub severity: Severity,
    pub category: Category,
    pub evidence: BTreeMap<String, String>,
    pub age_adjusted: bool,
    pub pediatric_specific: Option<bool>,
    pub confidence: f64,
    pub clinical_note: Option<String>,
    pub related_codes: Vec<String>,
}

impl Finding {
    pub fn new(code: impl Into<String>, statement: impl Into<String>, severity: Severity, category: Category) -> Self {
        Self {
            code: code.into(),
            statement: statement.into(),
            severity,
            category,
            evidence: BTreeMap::new(),
            age_adjusted: false,
            pediatric_specific: None,
            confidence: 1.0,
            clinical_note: None,
            related_codes: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    pub fn age_adjusted(mut self) -> Self {
        self.age_adjusted = true;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.clinical_note = Some(note.into());
        self
    }

    pub fn pediatric(mut self, is_pediatric: bool) -> Self {
        self.pediatric_specific = Some(is_pediatric);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Critical,
    Urgent,
    Attention,
    Routine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub conclusion: String,
    pub one_liner: String,
    pub urgency: Urgency,
    pub recommend_review: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhythmDescription {
    pub label: String,
    pub regular: bool,
    pub rate_bpm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    pub findings: Vec<Finding>,
    pub rhythm: RhythmDescription,
    pub summary: Summary,
    pub overall_confidence: f64,
    pub age_days: i64,
    pub method: String,
    pub timestamp: String,
}

/// The high-urgency code set that promotes a finding's urgency contribution
/// from "attention" to "urgent" (spec.md §4.9 Aggregation).
pub const HIGH_URGENCY_CODES: &[&str] = &[
    "QTC_PROLONGED",
    "THIRD_DEGREE_AV_BLOCK",
    "SECOND_DEGREE_AV_BLOCK_TYPE_2",
    "WPW",
    "BRUGADA_PATTERN",
    "ST_ELEVATION",
];

/// Codes that alone force `recommend_review = true` regardless of count.
pub const REVIEW_CODES: &[&str] = HIGH_URGENCY_CODES;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_first() {
        let mut v = vec![Severity::Normal, Severity::Critical, Severity::Borderline, Severity::Abnormal];
        v.sort();
        assert_eq!(v, vec![Severity::Critical, Severity::Abnormal, Severity::Borderline, Severity::Normal]);
    }
}

//! The digitized multi-lead output of the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lead::LeadName;

/// A sparse mapping from lead to its sampled voltage array, all in
/// microvolts. Leads whose source trace failed are omitted entirely, never
/// zero-filled (spec.md §4.3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgSignal {
    pub sample_rate_hz: f64,
    pub duration_s: f64,
    leads: BTreeMap<LeadName, Vec<f64>>,
}

impl EcgSignal {
    pub fn new(sample_rate_hz: f64, duration_s: f64) -> Self {
        Self {
            sample_rate_hz,
            duration_s,
            leads: BTreeMap::new(),
        }
    }

    pub fn expected_len(&self) -> usize {
        (self.duration_s * self.sample_rate_hz).round() as usize
    }

    /// Insert a lead's samples. Panics in debug builds if the length does
    /// not match `expected_len` — callers (Reconstructor, synthesizers in
    /// tests) are expected to resample before inserting.
    pub fn insert(&mut self, lead: LeadName, samples: Vec<f64>) {
        debug_assert_eq!(
            samples.len(),
            self.expected_len(),
            "lead {} has {} samples, expected {}",
            lead,
            samples.len(),
            self.expected_len()
        );
        self.leads.insert(lead, samples);
    }

    pub fn get(&self, lead: LeadName) -> Option<&[f64]> {
        self.leads.get(&lead).map(|v| v.as_slice())
    }

    pub fn has(&self, lead: LeadName) -> bool {
        self.leads.contains_key(&lead)
    }

    pub fn leads(&self) -> impl Iterator<Item = LeadName> + '_ {
        self.leads.keys().copied()
    }

    pub fn lead_count(&self) -> usize {
        self.leads.len()
    }

    /// All present leads share the same length, so any one of them (or
    /// `expected_len`) answers "how long is this signal".
    pub fn all_lengths_consistent(&self) -> bool {
        let expected = self.expected_len();
        self.leads.values().all(|v| v.len() == expected)
    }

    pub fn remove(&mut self, lead: LeadName) {
        self.leads.remove(&lead);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_fetch() {
        let mut sig = EcgSignal::new(500.0, 2.0);
        sig.insert(LeadName::II, vec![0.0; 1000]);
        assert!(sig.has(LeadName::II));
        assert!(!sig.has(LeadName::I));
        assert_eq!(sig.get(LeadName::II).unwrap().len(), 1000);
        assert!(sig.all_lengths_consistent());
    }

    #[test]
    fn expected_len_rounds() {
        let sig = EcgSignal::new(500.0, 2.5);
        assert_eq!(sig.expected_len(), 1250);
    }
}

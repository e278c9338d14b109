//! Server configuration.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for images dropped in for batch digitization.
    pub inbox_dir: PathBuf,
    /// Cache directory for VLM response bodies.
    pub cache_dir: PathBuf,
    /// TCP bind address (host:port) for the CLI-facing JSON-RPC service.
    pub bind_addr: String,
    /// Maximum concurrent digitization jobs in flight at once.
    pub max_concurrent: usize,
    /// VLM provider configuration, if AI-guided analysis is enabled.
    pub vlm: Option<VlmConfig>,
    pub tiers: TierThresholds,
}

/// HTTP VLM provider configuration. Transport details (retries, backoff,
/// auth schemes beyond a bearer token) are deliberately out of scope here —
/// see SPEC_FULL.md §12 on why `reqwest` is kept thin.
#[derive(Debug, Clone)]
pub struct VlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model_tag: String,
    pub prompt_revision: String,
    pub timeout_ms: u64,
}

/// Confidence thresholds that decide whether the pipeline escalates from a
/// cheap tier-1 single-provider call up through tier-4 multi-pass
/// refinement (spec.md §5).
#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    pub tier1_accept: f64,
    pub tier2_accept: f64,
    pub tier3_accept: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            tier1_accept: 0.85,
            tier2_accept: 0.75,
            tier3_accept: 0.6,
        }
    }
}

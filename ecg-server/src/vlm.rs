//! VLM provider transport: calls an external vision-language model and
//! parses its response into the `ecg_core::analyzer::VlmAnalysisResult`
//! contract.
//!
//! This module is deliberately thin (spec.md §1/§6 Non-goals: VLM
//! transport, auth, retry plumbing are an external collaborator's
//! concern) — one request, one timeout, no retry loop.

use std::time::Duration;

use ecg_core::analyzer::VlmAnalysisResult;

use crate::config::VlmConfig;

#[async_trait::async_trait]
pub trait VlmProvider: Send + Sync {
    fn tag(&self) -> &str;
    async fn analyze(&self, image_bytes: &[u8]) -> anyhow::Result<VlmAnalysisResult>;
}

/// A single HTTP-backed provider.
pub struct HttpVlmProvider {
    tag: String,
    client: reqwest::Client,
    config: VlmConfig,
}

impl HttpVlmProvider {
    pub fn new(tag: impl Into<String>, config: VlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms)).build()?;
        Ok(Self { tag: tag.into(), client, config })
    }
}

#[async_trait::async_trait]
impl VlmProvider for HttpVlmProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn analyze(&self, image_bytes: &[u8]) -> anyhow::Result<VlmAnalysisResult> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let body = serde_json::json!({
            "model": self.config.model_tag,
            "prompt_revision": self.config.prompt_revision,
            "image_base64": encoded,
        });

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let raw: serde_json::Value = response.json().await?;
        let analysis = serde_json::from_value(raw.get("analysis").cloned().unwrap_or(serde_json::Value::Null))
            .unwrap_or_default();
        let confidence = raw.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5);

        Ok(VlmAnalysisResult {
            confidence,
            raw_response: raw,
            analysis,
            provider_tag: self.tag.clone(),
            model_tag: self.config.model_tag.clone(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Runs several providers concurrently and returns the highest-confidence
/// result, used by tier-2/3 fan-out (spec.md §5).
pub async fn best_of(providers: &[Box<dyn VlmProvider>], image_bytes: &[u8]) -> Option<VlmAnalysisResult> {
    let futures = providers.iter().map(|p| p.analyze(image_bytes));
    let results = futures::future::join_all(futures).await;
    results
        .into_iter()
        .filter_map(|r| r.ok())
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
}

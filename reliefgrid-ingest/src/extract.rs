// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Language-model extraction of structured reports from transcripts

use crate::config::ExtractionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::transcribe::transport_error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Description used when the model produced none
pub const FALLBACK_DESCRIPTION: &str = "Açıklama bulunamadı";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Casualty condition reported in a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "iyi")]
    Good,
    #[serde(alias = "orta")]
    Moderate,
    #[serde(alias = "kötü", alias = "kotu")]
    Bad,
    #[serde(alias = "acil")]
    Critical,
}

/// Prompt sent with every transcript. Rescue teams read the result.
pub fn extraction_prompt(transcript: &str) -> String {
    format!(
        r#"Analyze the following text transcribed from a voice recording made after an earthquake and produce a relief summary:
"{transcript}"

Rescue teams will read this data, so keep it accurate and actionable.

Reply with only a JSON object of this shape:
{{
    "description": string,           // overall situation
    "severity": "good" | "moderate" | "bad" | "critical",
    "location_description": string,  // where the caller is
    "floor": integer | null
}}"#
    )
}

/// Parsed model output. Whatever the model returned is kept; text that is
/// not a JSON object is wrapped as `{"raw": text}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionOutput(Map<String, Value>);

impl ExtractionOutput {
    pub fn parse(text: &str) -> Self {
        let body = strip_code_fence(text);
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => ExtractionOutput(map),
            _ => {
                warn!(chars = text.len(), "extraction output is not a JSON object, keeping raw text");
                Self::raw(text)
            }
        }
    }

    /// Unstructured fallback holding `text` under `raw`
    pub fn raw(text: &str) -> Self {
        let mut map = Map::new();
        map.insert("raw".to_string(), Value::String(text.to_string()));
        ExtractionOutput(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        ExtractionOutput(map)
    }

    pub fn is_raw(&self) -> bool {
        self.0.len() == 1 && self.0.contains_key("raw")
    }

    /// Non-blank description (`aciklama` accepted for older prompts)
    pub fn description(&self) -> Option<&str> {
        ["description", "aciklama"]
            .iter()
            .filter_map(|field| self.0.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|text| !text.is_empty())
    }

    pub fn severity(&self) -> Option<Severity> {
        ["severity", "saglik_durum"]
            .iter()
            .filter_map(|field| self.0.get(*field))
            .find_map(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn floor(&self) -> Option<i64> {
        ["floor", "kat"]
            .iter()
            .find_map(|field| self.0.get(*field).and_then(Value::as_i64))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```json)
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Raw model text for `transcript`
    async fn extract(&self, transcript: &str) -> PipelineResult<String>;

    fn name(&self) -> &str;
}

/// Extractor using the Anthropic Messages API
pub struct AnthropicExtractor {
    client: reqwest::Client,
    config: ExtractionConfig,
    api_key: String,
    timeout: Duration,
}

impl AnthropicExtractor {
    pub fn new(config: ExtractionConfig, timeout: Duration) -> PipelineResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("extraction api_key is not set".to_string())
            })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            api_key,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Extractor for AnthropicExtractor {
    async fn extract(&self, transcript: &str) -> PipelineResult<String> {
        let start = Instant::now();
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{"role": "user", "content": extraction_prompt(transcript)}],
        });

        let on_error = transport_error("extraction", self.timeout);
        let response = self
            .client
            .post(self.url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(&on_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::external(
                "extraction",
                format!("{}: {}", status, text),
            ));
        }

        let json: Value = response.json().await.map_err(&on_error)?;
        let content = json["content"][0]["text"]
            .as_str()
            .ok_or_else(|| PipelineError::external("extraction", "response has no text content"))?
            .to_string();

        debug!(
            model = %self.config.model,
            input_tokens = json["usage"]["input_tokens"].as_u64(),
            output_tokens = json["usage"]["output_tokens"].as_u64(),
            duration_ms = start.elapsed().as_millis() as u64,
            "extraction completed"
        );
        Ok(content)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Extractor that refuses every call, for deployments without a model key.
/// Transcripts then fail extraction and are not retried.
pub struct UnconfiguredExtractor {
    reason: String,
}

impl UnconfiguredExtractor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Extractor for UnconfiguredExtractor {
    async fn extract(&self, _transcript: &str) -> PipelineResult<String> {
        Err(PipelineError::Configuration(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

//! Configuration for retrieval and the chat pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default character budget for the grounding context.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 3000;

/// How a match's score is compared against the minimum score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBound {
    /// Keep matches with `score > min_score`.
    #[default]
    Exclusive,
    /// Keep matches with `score >= min_score`.
    Inclusive,
}

impl ScoreBound {
    /// Whether `score` qualifies against `min_score` under this bound.
    pub fn admits(self, score: f32, min_score: f32) -> bool {
        match self {
            Self::Exclusive => score > min_score,
            Self::Inclusive => score >= min_score,
        }
    }
}

/// Parameters for one retrieval pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Maximum number of matches requested from the index.
    pub top_k: usize,
    /// Minimum similarity score for a match to qualify.
    pub min_score: f32,
    /// Whether `min_score` itself qualifies.
    pub score_bound: ScoreBound,
    /// Index namespace; `None` queries the default (empty) namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::context()
    }
}

impl RetrievalConfig {
    /// Create a new builder for constructing a [`RetrievalConfig`].
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Settings for building the grounding context: 3 matches, score > 0.7.
    pub fn context() -> Self {
        Self { top_k: 3, min_score: 0.7, score_bound: ScoreBound::Exclusive, namespace: None }
    }

    /// Settings for picking the source URL that accompanies a buffered answer:
    /// 3 matches, score > 0.8.
    pub fn source() -> Self {
        Self { top_k: 3, min_score: 0.8, score_bound: ScoreBound::Exclusive, namespace: None }
    }

    /// Settings for the source-URL listing: 2 matches, score >= 0.8.
    pub fn urls() -> Self {
        Self { top_k: 2, min_score: 0.8, score_bound: ScoreBound::Inclusive, namespace: None }
    }

    /// Whether a score qualifies under this configuration. A missing score never does.
    pub fn qualifies(&self, score: Option<f32>) -> bool {
        score.is_some_and(|score| self.score_bound.admits(score, self.min_score))
    }

    /// Check the limits an index query relies on.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `top_k == 0`
    /// - `min_score` is NaN
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.min_score.is_nan() {
            return Err(RagError::Config("min_score must be a number".to_string()));
        }
        Ok(())
    }

    /// The namespace to query, defaulting to the global one.
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

/// Builder for constructing a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the number of matches requested from the index.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score.
    pub fn min_score(mut self, min_score: f32) -> Self {
        self.config.min_score = min_score;
        self
    }

    /// Set whether the minimum score itself qualifies.
    pub fn score_bound(mut self, bound: ScoreBound) -> Self {
        self.config.score_bound = bound;
        self
    }

    /// Query a specific namespace instead of the default one.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = Some(namespace.into());
        self
    }

    /// Build the [`RetrievalConfig`].
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`RetrievalConfig::validate`].
    pub fn build(self) -> Result<RetrievalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Whether the chat route buffers the answer or relays it as it arrives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Collect the whole answer and return it with a source URL.
    #[default]
    Buffered,
    /// Forward each fragment to the client as it arrives.
    Relay,
}

impl std::str::FromStr for ChatMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(Self::Buffered),
            "relay" | "stream" => Ok(Self::Relay),
            other => Err(RagError::Config(format!(
                "unknown chat mode '{other}' (expected 'buffered' or 'relay')"
            ))),
        }
    }
}

/// Retrieval settings for every pass the pipeline makes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Retrieval used to build the grounding context.
    pub context: RetrievalConfig,
    /// Retrieval used to pick a buffered answer's source URL; `None` disables it.
    pub source: Option<RetrievalConfig>,
    /// Retrieval used by the source-URL listing.
    pub urls: RetrievalConfig,
    /// Character budget for the grounding context.
    pub max_context_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context: RetrievalConfig::context(),
            source: Some(RetrievalConfig::source()),
            urls: RetrievalConfig::urls(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_differ_only_at_threshold() {
        assert!(!ScoreBound::Exclusive.admits(0.8, 0.8));
        assert!(ScoreBound::Inclusive.admits(0.8, 0.8));
        assert!(ScoreBound::Exclusive.admits(0.81, 0.8));
        assert!(!ScoreBound::Inclusive.admits(0.79, 0.8));
    }

    #[test]
    fn builder_rejects_zero_top_k() {
        let err = RetrievalConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn builder_keeps_namespace() {
        let config = RetrievalConfig::builder()
            .top_k(5)
            .min_score(0.5)
            .score_bound(ScoreBound::Inclusive)
            .namespace("forms")
            .build()
            .unwrap();
        assert_eq!(config.namespace(), "forms");
        assert!(config.qualifies(Some(0.5)));
    }

    #[test]
    fn missing_scores_never_qualify() {
        let lenient = RetrievalConfig::builder()
            .min_score(0.0)
            .score_bound(ScoreBound::Inclusive)
            .build()
            .unwrap();
        assert!(lenient.qualifies(Some(0.0)));
        assert!(!lenient.qualifies(None));
    }

    #[test]
    fn validate_rejects_hand_built_configs() {
        let zero_k = RetrievalConfig { top_k: 0, ..RetrievalConfig::context() };
        assert!(matches!(zero_k.validate(), Err(RagError::Config(_))));

        let nan = RetrievalConfig { min_score: f32::NAN, ..RetrievalConfig::urls() };
        assert!(matches!(nan.validate(), Err(RagError::Config(_))));

        assert!(RetrievalConfig::source().validate().is_ok());
    }

    #[test]
    fn namespace_defaults_to_global() {
        assert_eq!(RetrievalConfig::context().namespace(), "");
    }

    #[test]
    fn chat_mode_parses() {
        assert_eq!("Relay".parse::<ChatMode>().unwrap(), ChatMode::Relay);
        assert_eq!("buffered".parse::<ChatMode>().unwrap(), ChatMode::Buffered);
        assert!("both".parse::<ChatMode>().is_err());
    }
}

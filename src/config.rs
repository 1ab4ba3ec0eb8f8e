//! Configuration types for document correction.
//!
//! All correction behaviour is controlled through [`CorrectionConfig`], built
//! via its [`CorrectionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across documents, log them, and diff two runs
//! to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::DocxProofError;
use crate::oracle::CorrectionOracle;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Configuration for a document correction run.
///
/// Built via [`CorrectionConfig::builder()`] or using
/// [`CorrectionConfig::default()`].
///
/// # Example
/// ```rust
/// use docx_proof::CorrectionConfig;
///
/// let config = CorrectionConfig::builder()
///     .model("gpt-4.1-nano")
///     .temperature(0.3)
///     .annotate_images(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CorrectionConfig {
    /// Pre-constructed oracle. Takes precedence over `provider_name`/`model`.
    ///
    /// The oracle is caller-owned: constructing it yourself lets you share one
    /// correction cache across several documents in a session, or inject a
    /// stub in tests. When `None`, an [`crate::oracle::LlmOracle`] is built
    /// from the resolution chain (explicit names, then environment).
    pub oracle: Option<Arc<dyn CorrectionOracle>>,

    /// LLM provider name (e.g. "openai", "azure", "ollama").
    /// If None along with `oracle`, resolution falls back to the environment.
    pub provider_name: Option<String>,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "gpt-4o".
    /// If None, uses the provider default. The model must accept images when
    /// image annotation is enabled.
    pub model: Option<String>,

    /// Custom correction system prompt. If None, uses the built-in
    /// Portuguese corrector prompt.
    ///
    /// The override replaces the prompt wholesale; the user-message format
    /// ("Corrija este texto: …") stays fixed so stub oracles and caches keyed
    /// on paragraph text remain valid.
    pub system_prompt: Option<String>,

    /// Sampling temperature for oracle completions. Default: 0.3.
    ///
    /// Low but not zero: correction should be conservative, yet rewording a
    /// redundant sentence needs a little freedom. Values near 1.0 make the
    /// oracle paraphrase instead of correct.
    pub temperature: f32,

    /// Maximum tokens the oracle may generate per paragraph. Default: 4000.
    ///
    /// A corrected paragraph is roughly the size of its input. 4000 covers
    /// pathological page-long paragraphs; setting this too low truncates the
    /// correction mid-sentence, which the media-token check then usually
    /// rejects, wasting the call.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient oracle failure. Default: 3.
    ///
    /// Most 5xx and timeout errors are transient. Permanent errors (bad API
    /// key, 400) still consume the retries but ultimately degrade to a
    /// per-paragraph fallback rather than aborting the document.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 1000.
    ///
    /// Doubles after each attempt: 1 s, 2 s, 4 s. Paragraph calls are
    /// sequential, so backing off never stalls other in-flight work.
    pub retry_backoff_ms: u64,

    /// Insert an italic description paragraph after each inline image. Default: true.
    pub annotate_images: bool,

    /// Parse bold/italic markers in oracle output into styled runs. Default: true.
    ///
    /// When disabled, marker text (asterisks, callout delimiters) is kept
    /// literally in the corrected paragraph.
    pub apply_markup: bool,

    /// Per-segment character budget for the image context window. Default: 120.
    ///
    /// The previous, own, and next paragraph texts are each truncated to this
    /// many characters before being handed to the vision oracle. Range 20–400:
    /// below 20 the context is useless, above 400 it crowds out the image.
    pub context_chars: usize,

    /// Cache corrections by content hash within the oracle session. Default: true.
    ///
    /// Documents repeat boilerplate (headers, table labels). The cache lives
    /// in the oracle object, so reusing one oracle across documents extends
    /// the cache across the whole session.
    pub use_cache: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Progress callback invoked per paragraph and image. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            oracle: None,
            provider_name: None,
            model: None,
            system_prompt: None,
            temperature: 0.3,
            max_tokens: 4000,
            max_retries: 3,
            retry_backoff_ms: 1000,
            annotate_images: true,
            apply_markup: true,
            context_chars: 120,
            use_cache: true,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CorrectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionConfig")
            .field("oracle", &self.oracle.as_ref().map(|_| "<dyn CorrectionOracle>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("annotate_images", &self.annotate_images)
            .field("apply_markup", &self.apply_markup)
            .field("context_chars", &self.context_chars)
            .field("use_cache", &self.use_cache)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CorrectionProgressCallback>"),
            )
            .finish()
    }
}

impl CorrectionConfig {
    /// Create a new builder for `CorrectionConfig`.
    pub fn builder() -> CorrectionConfigBuilder {
        CorrectionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CorrectionConfig`].
#[derive(Debug)]
pub struct CorrectionConfigBuilder {
    config: CorrectionConfig,
}

impl CorrectionConfigBuilder {
    pub fn oracle(mut self, oracle: Arc<dyn CorrectionOracle>) -> Self {
        self.config.oracle = Some(oracle);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn annotate_images(mut self, v: bool) -> Self {
        self.config.annotate_images = v;
        self
    }

    pub fn apply_markup(mut self, v: bool) -> Self {
        self.config.apply_markup = v;
        self
    }

    pub fn context_chars(mut self, n: usize) -> Self {
        self.config.context_chars = n.clamp(20, 400);
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.config.use_cache = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CorrectionConfig, DocxProofError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(DocxProofError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.context_chars < 20 || c.context_chars > 400 {
            return Err(DocxProofError::InvalidConfig(format!(
                "context_chars must be 20–400, got {}",
                c.context_chars
            )));
        }
        Ok(self.config)
    }
}

//! Oracle abstraction: the external text-correction and image-description
//! services behind one object-safe trait.
//!
//! The pipeline never talks to a provider directly; it talks to a
//! [`CorrectionOracle`] owned by the caller. That keeps the walk/rewrite logic
//! testable with scripted stubs and lets one oracle (and its correction
//! cache) serve a whole batch of documents.
//!
//! [`LlmOracle`] is the production implementation over
//! [`edgequake_llm::LLMProvider`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) keeps a recovering endpoint from being
//! hammered: with a 1 s base and 3 retries the wait sequence is
//! 1 s, 2 s, 4 s per call.
//!
//! ## Session cache
//!
//! Documents repeat boilerplate (headers, footers, table labels). The oracle
//! keeps a content-hash → correction map, scoped to its own lifetime, so the
//! second occurrence of a paragraph text never reaches the network. The cache
//! key is a SHA-256 of the paragraph text; the system prompt is fixed per
//! oracle instance, so text alone identifies the request.

use crate::error::DocxProofError;
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// One oracle answer plus usage accounting.
#[derive(Debug, Clone)]
pub struct OracleReply {
    /// The corrected text or image description, as returned by the service.
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    /// Retries consumed before success (0 = first attempt succeeded).
    pub retries: u32,
    /// True when the answer came from the session cache.
    pub cached: bool,
}

impl OracleReply {
    /// A reply that never touched the network (stubs, cache hits).
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
            retries: 0,
            cached: false,
        }
    }
}

/// Image payload handed to the vision oracle.
///
/// Built by [`crate::pipeline::encode`] from a media part; always a format
/// vision APIs accept (PNG or JPEG).
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Base64-encoded image bytes.
    pub base64: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

/// The external text-transform and vision services, as one object.
///
/// Both methods are fallible; the pipeline downgrades any error to a
/// per-node recovery (original text kept, placeholder description inserted),
/// so implementations should return an error rather than panic.
#[async_trait::async_trait]
pub trait CorrectionOracle: Send + Sync {
    /// Correct one paragraph's text. The input is non-empty and trimmed.
    async fn correct_text(&self, text: &str) -> Result<OracleReply, DocxProofError>;

    /// Describe one embedded image given its surrounding text context.
    async fn describe_image(
        &self,
        image: &ImagePayload,
        context: &str,
    ) -> Result<OracleReply, DocxProofError>;
}

/// Production oracle backed by an [`LLMProvider`].
///
/// Construct with [`LlmOracle::new`] and adjust with the `with_*` methods:
///
/// ```rust,no_run
/// use docx_proof::LlmOracle;
/// use edgequake_llm::ProviderFactory;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = ProviderFactory::create_llm_provider("openai", "gpt-4.1-nano")?;
/// let oracle = Arc::new(
///     LlmOracle::new(provider)
///         .with_temperature(0.2)
///         .with_retries(5, 500),
/// );
/// # Ok(())
/// # }
/// ```
pub struct LlmOracle {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    use_cache: bool,
    cache: Mutex<HashMap<String, String>>,
}

impl LlmOracle {
    /// Wrap a provider with the default corrector prompt and retry policy.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            system_prompt: prompts::DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.3,
            max_tokens: 4000,
            max_retries: 3,
            retry_backoff_ms: 1000,
            use_cache: true,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the correction system prompt wholesale.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n.max(1);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Drop every cached correction (e.g. between unrelated batches).
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Number of cached corrections currently held.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Send a chat request with bounded retries and exponential backoff.
    async fn chat_with_retries(
        &self,
        messages: &[ChatMessage],
        what: &str,
    ) -> Result<(String, usize, usize, u32), DocxProofError> {
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    what, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens",
                        what, response.prompt_tokens, response.completion_tokens
                    );
                    return Ok((
                        response.content,
                        response.prompt_tokens as usize,
                        response.completion_tokens as usize,
                        attempt,
                    ));
                }
                Err(e) => {
                    let err_msg = format!("{e}");
                    warn!("{}: attempt {} failed: {}", what, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(DocxProofError::OracleFailed {
            message: last_err.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

#[async_trait::async_trait]
impl CorrectionOracle for LlmOracle {
    async fn correct_text(&self, text: &str) -> Result<OracleReply, DocxProofError> {
        if self.use_cache {
            let key = cache_key(text);
            let hit = self
                .cache
                .lock()
                .ok()
                .and_then(|cache| cache.get(&key).cloned());
            if let Some(corrected) = hit {
                debug!("correction cache hit ({} chars)", text.len());
                return Ok(OracleReply {
                    text: corrected,
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    retries: 0,
                    cached: true,
                });
            }
        }

        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(prompts::correction_request(text)),
        ];

        let (content, prompt_tokens, completion_tokens, retries) =
            self.chat_with_retries(&messages, "correction").await?;

        if self.use_cache {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(cache_key(text), content.clone());
            }
        }

        Ok(OracleReply {
            text: content,
            prompt_tokens,
            completion_tokens,
            retries,
            cached: false,
        })
    }

    async fn describe_image(
        &self,
        image: &ImagePayload,
        context: &str,
    ) -> Result<OracleReply, DocxProofError> {
        let image_data =
            ImageData::new(image.base64.clone(), image.mime_type.clone()).with_detail("high");

        let messages = vec![
            ChatMessage::system(prompts::IMAGE_SYSTEM_PROMPT),
            ChatMessage::user_with_images(prompts::description_request(context), vec![image_data]),
        ];

        let (content, prompt_tokens, completion_tokens, retries) =
            self.chat_with_retries(&messages, "description").await?;

        Ok(OracleReply {
            text: content,
            prompt_tokens,
            completion_tokens,
            retries,
            cached: false,
        })
    }
}

/// Stable cache key for a paragraph text.
fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_and_distinct() {
        let a1 = cache_key("Este é um teste.");
        let a2 = cache_key("Este é um teste.");
        let b = cache_key("Este é outro teste.");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), 64);
    }

    #[test]
    fn local_reply_has_no_usage() {
        let reply = OracleReply::local("texto");
        assert_eq!(reply.text, "texto");
        assert_eq!(reply.prompt_tokens, 0);
        assert_eq!(reply.retries, 0);
        assert!(!reply.cached);
    }
}

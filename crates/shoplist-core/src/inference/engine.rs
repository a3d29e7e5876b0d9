use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Lazily produced text fragments of one generation. Finite and not restartable.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Parameters used to load the model weights.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineParams {
    pub model_path: PathBuf,
    pub context_size: u32,
    pub gpu_layer_count: u32,
}

/// Sampling settings passed to every generation.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingConfig {
    /// Token cap; `-1` means generate until the model stops.
    pub max_tokens: i32,
    pub anti_prompts: Vec<String>,
    pub repeat_penalty: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub penalty_count: u32,
    pub penalize_newline: bool,
    pub prevent_eos: bool,
    pub temperature: f32,
    pub top_k: u32,
    pub typical_p: f32,
    pub top_p: f32,
    pub min_p: f32,
    pub min_keep: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            anti_prompts: Vec::new(),
            repeat_penalty: 1.0,
            frequency_penalty: 1.0,
            presence_penalty: 1.0,
            penalty_count: 64,
            penalize_newline: false,
            prevent_eos: false,
            temperature: 0.75,
            top_k: 40,
            typical_p: 1.0,
            top_p: 0.9,
            min_p: 0.1,
            min_keep: 1,
        }
    }
}

/// A loaded language model.
///
/// Generation takes `&mut self`: an engine is stateless across calls but must
/// never run two generations at once. [`crate::inference::InferenceGate`] is
/// the only owner in the running bot.
#[async_trait]
pub trait InferenceEngine: Send {
    /// Start generating a completion for `prompt`.
    ///
    /// The returned stream ends when the model is done. Triggering `cancel`
    /// stops generation; the stream then yields [`crate::Error::Cancelled`]
    /// or simply ends.
    async fn generate(
        &mut self,
        prompt: &str,
        sampling: &SamplingConfig,
        cancel: CancellationToken,
    ) -> Result<TokenStream>;

    /// Release the model. Later `generate` calls fail.
    async fn dispose(&mut self) -> Result<()>;
}

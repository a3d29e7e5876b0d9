//! Text-to-list extraction on top of a single local language model.
//!
//! The engine itself lives behind [`engine::InferenceEngine`] (implemented in
//! `shoplist-llama`); [`gate::InferenceGate`] owns the one engine instance and
//! admits callers one at a time.

pub mod engine;
pub mod gate;
pub mod prompt;

pub use engine::{EngineParams, InferenceEngine, SamplingConfig, TokenStream};
pub use gate::{GatePhase, InferenceGate};
pub use prompt::PromptTemplate;

use std::{
    collections::BTreeSet,
    sync::{Mutex as StdMutex, PoisonError},
};

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    errors::Error,
    inference::{InferenceEngine, PromptTemplate, SamplingConfig},
    Result,
};

/// Where the single admitted flow currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Admitted,
    Streaming,
    Draining,
    Failed,
}

/// Single-flight admission gate around the process-wide inference engine.
///
/// The engine lives inside a fair (FIFO) async mutex: holding the guard is
/// being admitted, and dropping it on any exit path (success, error, or a
/// cancelled future) frees the slot for the next waiter.
pub struct InferenceGate {
    engine: Mutex<Box<dyn InferenceEngine>>,
    template: PromptTemplate,
    sampling: SamplingConfig,
    phase: StdMutex<GatePhase>,
}

impl InferenceGate {
    pub fn new(
        engine: Box<dyn InferenceEngine>,
        template: PromptTemplate,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            engine: Mutex::new(engine),
            template,
            sampling,
            phase: StdMutex::new(GatePhase::Idle),
        }
    }

    pub fn phase(&self) -> GatePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: GatePhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Turn free-form text into a sorted list of distinct items.
    ///
    /// Waits for the engine if another request holds it. Returns
    /// [`Error::Cancelled`] when `cancel` fires (while queued or while
    /// streaming) and [`Error::ParseFailed`] for every other failure.
    pub async fn parse(&self, input: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let prompt = self.template.render(&input.to_lowercase());

        let mut engine = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("inference request cancelled while queued");
                return Err(Error::Cancelled);
            }
            guard = self.engine.lock() => guard,
        };
        let _phase = PhaseReset(self);
        self.set_phase(GatePhase::Admitted);
        debug!(prompt_len = prompt.len(), "inference admitted");

        match self.run(&mut **engine, &prompt, cancel).await {
            Ok(items) => {
                info!(items = items.len(), "shopping list extracted");
                Ok(items)
            }
            Err(_) if cancel.is_cancelled() => {
                debug!("inference cancelled");
                Err(Error::Cancelled)
            }
            Err(e) => {
                self.set_phase(GatePhase::Failed);
                warn!(error = %e, "inference failed");
                Err(Error::ParseFailed(Box::new(e)))
            }
        }
    }

    async fn run(
        &self,
        engine: &mut dyn InferenceEngine,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            stream = engine.generate(prompt, &self.sampling, cancel.clone()) => stream?,
        };
        self.set_phase(GatePhase::Streaming);

        let mut buf = String::new();
        let mut fragments = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(fragment) => {
                    buf.push_str(&fragment?);
                    fragments += 1;
                }
                None => break,
            }
        }
        drop(stream);

        self.set_phase(GatePhase::Draining);
        debug!(fragments, output_len = buf.len(), "generation finished");
        decode_items(&buf)
    }

    /// Wait for the in-flight request (if any) and release the engine.
    pub async fn shutdown(&self) -> Result<()> {
        let mut engine = self.engine.lock().await;
        engine.dispose().await?;
        info!("inference engine disposed");
        Ok(())
    }
}

struct PhaseReset<'a>(&'a InferenceGate);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.0.set_phase(GatePhase::Idle);
    }
}

/// Decode the model output as a JSON array of strings, then dedup and sort.
///
/// A bare `null` is an empty list. Models sometimes wrap the array in prose
/// (and `llama-cli` appends ` [end of text]`), so when the whole text is not
/// valid JSON the first `[` that opens a decodable array wins and anything
/// after that array is ignored.
fn decode_items(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    let items = match serde_json::from_str::<Option<Vec<String>>>(trimmed) {
        Ok(items) => items.unwrap_or_default(),
        Err(err) => trimmed
            .match_indices('[')
            .find_map(|(start, _)| leading_array(&trimmed[start..]))
            .ok_or(err)?,
    };
    Ok(items
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}

/// First JSON value of `text` if it is an array of strings; trailing text is not read.
fn leading_array(text: &str) -> Option<Vec<String>> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Vec<String>>()
        .next()?
        .ok()
}

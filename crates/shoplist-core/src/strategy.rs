//! Named-command routing.
//!
//! The mediator hands every [`NamedCommand`] to a [`StrategyChain`], which
//! offers it to its strategies in registration order and runs the first one
//! whose predicate accepts it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    command::NamedCommand,
    mediator::{Handler, Outcome},
    Result,
};

#[async_trait]
pub trait CommandStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must be cheap and side-effect free; it may be called for every command.
    fn can_handle(&self, command: &NamedCommand) -> bool;

    async fn handle(&self, command: &NamedCommand, cancel: &CancellationToken) -> Result<Outcome>;
}

/// Ordered, immutable list of strategies. First match wins.
#[derive(Default)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn CommandStrategy>>,
}

impl StrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: Arc<dyn CommandStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    fn select(&self, command: &NamedCommand) -> Option<&Arc<dyn CommandStrategy>> {
        self.strategies.iter().find(|s| s.can_handle(command))
    }
}

#[async_trait]
impl Handler<NamedCommand> for StrategyChain {
    async fn handle(&self, command: NamedCommand, cancel: &CancellationToken) -> Result<Outcome> {
        let Some(strategy) = self.select(&command) else {
            warn!(
                command = %command.name,
                chat_id = command.context.chat_id.0,
                "no strategy accepts command"
            );
            return Ok(Outcome::RoutingMiss);
        };
        debug!(command = %command.name, strategy = strategy.name(), "strategy selected");
        strategy.handle(&command, cancel).await
    }
}

/// Command tokens that belong to dedicated strategies.
///
/// Matching is ASCII case-insensitive and expects the leading `/`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservedCommands(Vec<String>);

impl ReservedCommands {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            tokens
                .into_iter()
                .map(|t| {
                    let t: String = t.into();
                    t.trim().to_string()
                })
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

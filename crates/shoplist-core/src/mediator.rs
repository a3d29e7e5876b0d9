//! Variant-keyed command dispatch.
//!
//! Handlers are registered per command variant at startup. The [`Mediator`]
//! looks at the runtime tag of each [`Command`], resolves the single handler
//! registered for it (memoized per tag) and awaits it.

use std::{collections::HashMap, marker::PhantomData, sync::Arc, sync::OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    command::{Command, CommandKind, CommandVariant, KIND_COUNT},
    errors::Error,
    Result,
};

/// What a handler did with a command. Errors are reported through `Result`;
/// these are the non-error endings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was sent or a message was edited.
    Handled,
    /// No strategy accepted a named command; dropped after a diagnostic.
    RoutingMiss,
    /// A button press referenced a button the message does not have.
    TargetNotFound,
    /// The command was recognised as something the bot ignores.
    Ignored,
}

/// Behaviour registered for one command variant.
#[async_trait]
pub trait Handler<C: CommandVariant>: Send + Sync {
    async fn handle(&self, command: C, cancel: &CancellationToken) -> Result<Outcome>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, command: Command, cancel: &CancellationToken) -> Result<Outcome>;
}

struct Typed<C, H> {
    handler: Arc<H>,
    _command: PhantomData<fn() -> C>,
}

#[async_trait]
impl<C, H> ErasedHandler for Typed<C, H>
where
    C: CommandVariant,
    H: Handler<C> + 'static,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<H>()
    }

    async fn call(&self, command: Command, cancel: &CancellationToken) -> Result<Outcome> {
        let command = C::from_command(command).map_err(|other| {
            Error::Config(format!(
                "handler for {} commands was given a {} command",
                C::KIND,
                other.kind()
            ))
        })?;
        self.handler.handle(command, cancel).await
    }
}

/// Startup-time table from command variant to its handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandKind, Arc<dyn ErasedHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for variant `C`. A second registration for the
    /// same variant is a wiring defect.
    pub fn register<C, H>(&mut self, handler: Arc<H>) -> Result<()>
    where
        C: CommandVariant,
        H: Handler<C> + 'static,
    {
        if self.handlers.contains_key(&C::KIND) {
            return Err(Error::Config(format!(
                "a handler for {} commands is already registered",
                C::KIND
            )));
        }
        let erased: Arc<dyn ErasedHandler> = Arc::new(Typed::<C, H> {
            handler,
            _command: PhantomData,
        });
        self.handlers.insert(C::KIND, erased);
        Ok(())
    }

    pub fn with<C, H>(mut self, handler: Arc<H>) -> Result<Self>
    where
        C: CommandVariant,
        H: Handler<C> + 'static,
    {
        self.register::<C, H>(handler)?;
        Ok(self)
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Fail unless every command variant has a handler.
    pub fn ensure_complete(&self) -> Result<()> {
        let missing: Vec<&str> = CommandKind::ALL
            .iter()
            .filter(|k| !self.contains(**k))
            .map(|k| k.as_str())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::Config(format!(
            "no handler registered for: {}",
            missing.join(", ")
        )))
    }

    fn resolve(&self, kind: CommandKind) -> Option<Arc<dyn ErasedHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

type Binding = Option<Arc<dyn ErasedHandler>>;

pub struct Mediator {
    registry: HandlerRegistry,
    bindings: [OnceLock<Binding>; KIND_COUNT],
}

impl Mediator {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            bindings: Default::default(),
        }
    }

    /// Dispatch `command` to the handler registered for its variant.
    ///
    /// An unregistered variant fails with [`Error::Config`] before anything runs.
    /// Handler errors (including cancellation) are returned as-is.
    pub async fn send(&self, command: Command, cancel: &CancellationToken) -> Result<Outcome> {
        let kind = command.kind();
        let handler = self.binding(kind).ok_or_else(|| {
            Error::Config(format!("no handler registered for {kind} commands"))
        })?;

        debug!(
            kind = kind.as_str(),
            handler = handler.name(),
            chat_id = command.context().chat_id.0,
            "dispatching command"
        );
        handler.call(command, cancel).await
    }

    /// Whether the binding for `kind` has been resolved and cached already.
    pub fn is_resolved(&self, kind: CommandKind) -> bool {
        self.bindings[kind.index()].get().is_some()
    }

    fn binding(&self, kind: CommandKind) -> Option<Arc<dyn ErasedHandler>> {
        self.bindings[kind.index()]
            .get_or_init(|| self.registry.resolve(kind))
            .clone()
    }
}

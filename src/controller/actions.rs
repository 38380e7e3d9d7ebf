//! Typed action registry.
//!
//! The binary exposes a closed set of actions. Each one is bound once, at
//! startup, to a handler with the same signature; dispatching is a map
//! lookup.

use clap::ValueEnum;
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error_handling::types::{ActionError, ControllerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Action {
    /// Watch the subnets and record NAT throughput until interrupted
    Record,
    /// Summarize the snapshot file of a previous run
    Analyze,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Record => "record",
            Action::Analyze => "analyze",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), ControllerError>> + Send>>;
pub type ActionHandler = Box<dyn Fn() -> ActionFuture + Send + Sync>;

#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<Action, ActionHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `action`. Each action can be bound only once.
    pub fn register<F, Fut>(&mut self, action: Action, handler: F) -> Result<(), ActionError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        if self.handlers.contains_key(&action) {
            return Err(ActionError::AlreadyRegistered(action.to_string()));
        }
        self.handlers
            .insert(action, Box::new(move || Box::pin(handler()) as ActionFuture));
        Ok(())
    }

    pub async fn run(&self, action: Action) -> Result<(), ActionError> {
        let handler = self
            .handlers
            .get(&action)
            .ok_or_else(|| ActionError::NotRegistered(action.to_string()))?;
        info!("Running action {}", action);
        handler().await.map_err(ActionError::Failed)
    }
}

// attest-core/src/ports/component.rs

// This file defines what the orchestrator needs from data-source and analyser
// components, without knowing how any of them work. Concrete adapters plug in
// behind these traits; the executor only ever sees the contract.

use crate::domain::message::Message;
use crate::domain::schema::{InputRequirement, Schema};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runtime handle passed into every component invocation. Cancellation is
/// cooperative: a component that ignores the token simply runs to completion
/// and has its result discarded.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// A detached context that can never be cancelled. Handy for tests and
    /// ad-hoc component invocations.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Invalid component configuration: {0}")]
    Configuration(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Unreadable message content: {0}")]
    Unreadable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The component observed the cancellation token and stopped early.
    #[error("Cancelled")]
    Cancelled,
}

/// Builds source instances from runbook properties. One factory per `type`
/// name; registered once at bootstrap.
pub trait SourceFactory: Send + Sync {
    fn type_name(&self) -> &str;

    /// Schema of the messages this source produces by default.
    fn default_output_schema(&self) -> Schema;

    /// Every schema this source can be asked to produce (the `output_schema`
    /// override must pick from this set).
    fn supported_output_schemas(&self) -> Vec<Schema> {
        vec![self.default_output_schema()]
    }

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Source>, ComponentError>;
}

#[async_trait]
pub trait Source: Send + Sync {
    fn output_schema(&self) -> Schema;

    async fn extract(&self, context: &ExecutionContext) -> Result<Message, ComponentError>;
}

/// Builds processor instances from runbook properties and declares their
/// schema contract so the planner can validate wiring before anything runs.
pub trait ProcessorFactory: Send + Sync {
    fn type_name(&self) -> &str;

    /// Alternative input combinations; each inner list is one valid set of
    /// required schemas. The planner matches the unique set of upstream
    /// schemas against these by exact set equality, first match wins.
    fn input_requirements(&self) -> Vec<Vec<InputRequirement>>;

    fn default_output_schema(&self) -> Schema;

    fn supported_output_schemas(&self) -> Vec<Schema> {
        vec![self.default_output_schema()]
    }

    /// Reader capable of turning messages of `schema` into the typed shape
    /// this processor consumes. Must resolve for every schema named in the
    /// input requirements.
    fn resolve_reader(&self, schema: &Schema) -> Option<Arc<dyn Reader>>;

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Processor>, ComponentError>;
}

#[async_trait]
pub trait Processor: Send + Sync {
    /// Applies the analysis to `inputs` (upstream order preserved) and
    /// produces a message conforming to `output_schema`.
    async fn process(
        &self,
        inputs: &[Arc<Message>],
        output_schema: &Schema,
        context: &ExecutionContext,
    ) -> Result<Message, ComponentError>;
}

/// Per-schema decoding of message content into the structure a processor
/// expects.
pub trait Reader: Send + Sync {
    fn read(&self, message: &Message) -> Result<Value, ComponentError>;
}

// attest-core/src/domain/message.rs

use crate::domain::error::DomainError;
use crate::domain::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Skipped,
}

/// Provenance stamped onto a message when its artifact completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub status: ExecutionStatus,

    /// Namespaced audit path: `runbook/child_runbook/artifact`.
    pub origin: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub produced_at: String,
}

/// Non-semantic metadata travelling with a message. Nothing in here may
/// influence schema matching or content validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageExtensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionInfo>,

    /// Cost reported by the producing component. Absent means zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// The unit of data on a graph edge. Immutable once produced: consumers share
/// references, nobody rewrites content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: Value,
    pub schema: Schema,

    #[serde(default)]
    pub extensions: MessageExtensions,
}

impl Message {
    pub fn new(id: impl Into<String>, content: Value, schema: Schema) -> Self {
        Self {
            id: id.into(),
            content,
            schema,
            extensions: MessageExtensions::default(),
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.extensions.cost = Some(cost);
        self
    }

    pub fn reported_cost(&self) -> f64 {
        self.extensions.cost.unwrap_or(0.0)
    }

    /// Production-time contract check: the message must carry exactly the
    /// schema the plan resolved for its artifact, and content must not be
    /// null. Deeper structural validation belongs to readers and components.
    pub fn validate_content(&self, artifact: &str, expected: &Schema) -> Result<(), DomainError> {
        if &self.schema != expected {
            return Err(DomainError::Validation {
                artifact: artifact.to_string(),
                reason: format!("declared schema '{}', expected '{}'", self.schema, expected),
            });
        }
        if self.content.is_null() {
            return Err(DomainError::Validation {
                artifact: artifact.to_string(),
                reason: "content is null".to_string(),
            });
        }
        Ok(())
    }
}

/// Derives the audit origin for an artifact id within a runbook.
///
/// Flattened ids look like `billing__<uuid>__emails`; the uuid segments only
/// disambiguate repeated inclusions and carry no audit meaning, so they are
/// stripped: `runbook/billing/emails`.
pub fn derive_origin(runbook: &str, artifact_id: &str) -> String {
    let mut segments = vec![runbook];
    segments.extend(
        artifact_id
            .split("__")
            .filter(|segment| Uuid::parse_str(segment).is_err()),
    );
    segments.join("/")
}

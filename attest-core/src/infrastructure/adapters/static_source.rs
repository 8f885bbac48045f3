// attest-core/src/infrastructure/adapters/static_source.rs

use crate::domain::message::Message;
use crate::domain::schema::Schema;
use crate::infrastructure::adapters::standard_input_schema;
use crate::ports::component::{ComponentError, ExecutionContext, Source, SourceFactory};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Source that emits its `content` property verbatim. Mostly useful for
/// demos and wiring tests, where a runbook should run without touching the
/// outside world.
pub struct StaticSourceFactory;

impl SourceFactory for StaticSourceFactory {
    fn type_name(&self) -> &str {
        "static"
    }

    fn default_output_schema(&self) -> Schema {
        standard_input_schema()
    }

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Source>, ComponentError> {
        let content = properties
            .get("content")
            .cloned()
            .ok_or_else(|| ComponentError::Configuration("missing `content` property".into()))?;
        let cost = properties.get("cost").and_then(Value::as_f64);
        Ok(Box::new(StaticSource { content, cost }))
    }
}

struct StaticSource {
    content: Value,
    cost: Option<f64>,
}

#[async_trait]
impl Source for StaticSource {
    fn output_schema(&self) -> Schema {
        standard_input_schema()
    }

    async fn extract(&self, context: &ExecutionContext) -> Result<Message, ComponentError> {
        if context.is_cancelled() {
            return Err(ComponentError::Cancelled);
        }
        let content = match &self.content {
            Value::String(text) => json!({ "text": text }),
            other => other.clone(),
        };
        let mut message = Message::new(
            Uuid::new_v4().to_string(),
            content,
            standard_input_schema(),
        );
        if let Some(cost) = self.cost {
            message = message.with_cost(cost);
        }
        Ok(message)
    }
}

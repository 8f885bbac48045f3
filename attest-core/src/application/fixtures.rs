// attest-core/src/application/fixtures.rs

//! Scriptable components for orchestration tests. Behaviour is driven by the
//! artifact properties, so test runbooks stay plain YAML.

use crate::domain::message::Message;
use crate::domain::schema::{InputRequirement, Schema, Version};
use crate::ports::component::{
    ComponentError, ExecutionContext, Processor, ProcessorFactory, Reader, Source, SourceFactory,
};
use crate::ports::registry::ComponentRegistry;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub(crate) fn std_schema() -> Schema {
    Schema::new("std", Version::new(1, 0, 0))
}

pub(crate) fn pd_schema() -> Schema {
    Schema::new("pd", Version::new(1, 0, 0))
}

/// Registry with one scripted source (`test_source`, emits `std/1.0.0`) and
/// one scripted processor (`test_process`, `{std}` -> `pd/1.0.0`).
pub(crate) fn test_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register_source(Arc::new(TestSourceFactory::new("test_source", std_schema())));
    registry.register_processor(Arc::new(TestProcessorFactory::new(
        "test_process",
        vec![vec![InputRequirement::of(&std_schema())]],
        pd_schema(),
    )));
    registry
}

/// Tracks how many scripted components run at once.
#[derive(Default)]
pub(crate) struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard {
            gauge: Arc::clone(self),
        }
    }
}

struct GaugeGuard {
    gauge: Arc<ConcurrencyGauge>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted behaviour, decoded from artifact properties:
/// - `fail`: string message, component errors out;
/// - `block_until_cancelled`: true, waits for the token then reports
///   cancellation;
/// - `delay_ms`: sleeps (observing the token) before finishing;
/// - `cost`: reported cost;
/// - `content` / `tag`: payload to emit.
async fn scripted_wait(
    properties: &BTreeMap<String, Value>,
    context: &ExecutionContext,
) -> Result<(), ComponentError> {
    if properties
        .get("block_until_cancelled")
        .is_some_and(|v| v.as_bool() == Some(true))
    {
        context.cancelled().await;
        return Err(ComponentError::Cancelled);
    }
    if let Some(delay) = properties.get("delay_ms").and_then(Value::as_u64) {
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(delay)) => {}
            () = context.cancelled() => return Err(ComponentError::Cancelled),
        }
    }
    Ok(())
}

pub(crate) struct TestSourceFactory {
    type_name: String,
    schema: Schema,
    supported: Vec<Schema>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl TestSourceFactory {
    pub(crate) fn new(type_name: &str, schema: Schema) -> Self {
        Self {
            type_name: type_name.to_string(),
            supported: vec![schema.clone()],
            schema,
            gauge: None,
        }
    }

    pub(crate) fn with_supported(mut self, supported: Vec<Schema>) -> Self {
        self.supported = supported;
        self
    }

    pub(crate) fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }
}

impl SourceFactory for TestSourceFactory {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn default_output_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn supported_output_schemas(&self) -> Vec<Schema> {
        self.supported.clone()
    }

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Source>, ComponentError> {
        Ok(Box::new(TestSource {
            schema: self.schema.clone(),
            properties: properties.clone(),
            gauge: self.gauge.clone(),
        }))
    }
}

struct TestSource {
    schema: Schema,
    properties: BTreeMap<String, Value>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

#[async_trait]
impl Source for TestSource {
    fn output_schema(&self) -> Schema {
        self.schema.clone()
    }

    async fn extract(&self, context: &ExecutionContext) -> Result<Message, ComponentError> {
        let _guard = self.gauge.as_ref().map(ConcurrencyGauge::enter);
        scripted_wait(&self.properties, context).await?;
        if let Some(message) = self.properties.get("fail").and_then(Value::as_str) {
            return Err(ComponentError::Extraction(message.to_string()));
        }

        let content = match self.properties.get("tag") {
            Some(tag) => json!({ "tag": tag }),
            None => self
                .properties
                .get("content")
                .cloned()
                .unwrap_or_else(|| json!({ "text": "" })),
        };
        let mut message = Message::new(Uuid::new_v4().to_string(), content, self.schema.clone());
        if let Some(cost) = self.properties.get("cost").and_then(Value::as_f64) {
            message = message.with_cost(cost);
        }
        Ok(message)
    }
}

pub(crate) struct TestProcessorFactory {
    type_name: String,
    requirements: Vec<Vec<InputRequirement>>,
    output: Schema,
    readers: bool,
}

impl TestProcessorFactory {
    pub(crate) fn new(
        type_name: &str,
        requirements: Vec<Vec<InputRequirement>>,
        output: Schema,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            requirements,
            output,
            readers: true,
        }
    }

    pub(crate) fn without_readers(mut self) -> Self {
        self.readers = false;
        self
    }
}

impl ProcessorFactory for TestProcessorFactory {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn input_requirements(&self) -> Vec<Vec<InputRequirement>> {
        self.requirements.clone()
    }

    fn default_output_schema(&self) -> Schema {
        self.output.clone()
    }

    fn resolve_reader(&self, _schema: &Schema) -> Option<Arc<dyn Reader>> {
        self.readers
            .then(|| Arc::new(PassthroughReader) as Arc<dyn Reader>)
    }

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Processor>, ComponentError> {
        Ok(Box::new(TestProcessor {
            properties: properties.clone(),
        }))
    }
}

struct TestProcessor {
    properties: BTreeMap<String, Value>,
}

#[async_trait]
impl Processor for TestProcessor {
    async fn process(
        &self,
        inputs: &[Arc<Message>],
        output_schema: &Schema,
        context: &ExecutionContext,
    ) -> Result<Message, ComponentError> {
        scripted_wait(&self.properties, context).await?;
        if let Some(message) = self.properties.get("fail").and_then(Value::as_str) {
            return Err(ComponentError::Processing(message.to_string()));
        }

        let tags: Vec<Value> = inputs
            .iter()
            .map(|input| input.content.get("tag").cloned().unwrap_or(Value::Null))
            .collect();
        let content = json!({
            "input_count": inputs.len(),
            "tags": tags,
        });

        // `wrong_schema: true` makes the produced message disagree with the
        // resolved schema, for validation failure tests.
        let schema = if self
            .properties
            .get("wrong_schema")
            .is_some_and(|v| v.as_bool() == Some(true))
        {
            Schema::new("unexpected", Version::new(0, 0, 1))
        } else {
            output_schema.clone()
        };

        let mut message = Message::new(Uuid::new_v4().to_string(), content, schema);
        if let Some(cost) = self.properties.get("cost").and_then(Value::as_f64) {
            message = message.with_cost(cost);
        }
        Ok(message)
    }
}

struct PassthroughReader;

impl Reader for PassthroughReader {
    fn read(&self, message: &Message) -> Result<Value, ComponentError> {
        Ok(message.content.clone())
    }
}

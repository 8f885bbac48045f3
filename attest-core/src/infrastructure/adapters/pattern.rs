// attest-core/src/infrastructure/adapters/pattern.rs

use crate::domain::message::Message;
use crate::domain::schema::{InputRequirement, Schema};
use crate::infrastructure::adapters::{finding_schema, standard_input_schema};
use crate::ports::component::{
    ComponentError, ExecutionContext, Processor, ProcessorFactory, Reader,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FindingSeverity {
    fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One detection rule, as configured in runbook properties.
#[derive(Debug, Clone, Deserialize)]
struct PatternRule {
    name: String,
    regex: String,

    #[serde(default)]
    severity: FindingSeverity,
}

struct CompiledRule {
    name: String,
    regex: Regex,
    severity: FindingSeverity,
}

/// Regex-based personal data detector. Scans the text payload of every input
/// message and emits one finding per match.
///
/// Properties: `patterns` (list of `{name, regex, severity?}`), defaulting to
/// a small email/phone ruleset.
pub struct PatternMatchFactory;

impl ProcessorFactory for PatternMatchFactory {
    fn type_name(&self) -> &str {
        "pattern_match"
    }

    fn input_requirements(&self) -> Vec<Vec<InputRequirement>> {
        vec![vec![InputRequirement::of(&standard_input_schema())]]
    }

    fn default_output_schema(&self) -> Schema {
        finding_schema()
    }

    fn resolve_reader(&self, schema: &Schema) -> Option<Arc<dyn Reader>> {
        (schema == &standard_input_schema()).then(|| Arc::new(StandardInputReader) as Arc<dyn Reader>)
    }

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Processor>, ComponentError> {
        let rules: Vec<PatternRule> = match properties.get("patterns") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ComponentError::Configuration(format!("invalid `patterns` property: {e}"))
            })?,
            None => default_rules(),
        };
        if rules.is_empty() {
            return Err(ComponentError::Configuration(
                "`patterns` must not be empty".into(),
            ));
        }

        let compiled = rules
            .into_iter()
            .map(|rule| {
                Regex::new(&rule.regex)
                    .map(|regex| CompiledRule {
                        name: rule.name.clone(),
                        regex,
                        severity: rule.severity,
                    })
                    .map_err(|e| {
                        ComponentError::Configuration(format!(
                            "pattern '{}' does not compile: {e}",
                            rule.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(PatternMatchProcessor {
            rules: compiled,
            reader: Arc::new(StandardInputReader),
        }))
    }
}

fn default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule {
            name: "email".into(),
            regex: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}".into(),
            severity: FindingSeverity::High,
        },
        PatternRule {
            name: "phone".into(),
            regex: r"\+?\d[\d\s().-]{7,}\d".into(),
            severity: FindingSeverity::Medium,
        },
    ]
}

struct PatternMatchProcessor {
    rules: Vec<CompiledRule>,
    reader: Arc<dyn Reader>,
}

#[async_trait]
impl Processor for PatternMatchProcessor {
    async fn process(
        &self,
        inputs: &[Arc<Message>],
        output_schema: &Schema,
        context: &ExecutionContext,
    ) -> Result<Message, ComponentError> {
        let mut findings = Vec::new();

        for message in inputs {
            if context.is_cancelled() {
                return Err(ComponentError::Cancelled);
            }
            let payload = self.reader.read(message)?;
            let text = payload
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();

            for rule in &self.rules {
                for matched in rule.regex.find_iter(text) {
                    findings.push(json!({
                        "pattern": rule.name,
                        "severity": rule.severity.as_str(),
                        "matched": matched.as_str(),
                        "offset": matched.start(),
                        "source_message": message.id,
                    }));
                }
            }
        }

        let content = json!({
            "findings": findings,
            "summary": { "total": findings.len() },
        });
        Ok(Message::new(
            Uuid::new_v4().to_string(),
            content,
            output_schema.clone(),
        ))
    }
}

/// Decodes `standard_input` content into the `{text, ...}` object the
/// analyser expects. Plain string content is wrapped on the fly.
pub struct StandardInputReader;

impl Reader for StandardInputReader {
    fn read(&self, message: &Message) -> Result<Value, ComponentError> {
        match &message.content {
            Value::String(text) => Ok(json!({ "text": text })),
            Value::Object(fields) if fields.get("text").is_some_and(Value::is_string) => {
                Ok(message.content.clone())
            }
            other => Err(ComponentError::Unreadable(format!(
                "expected a text payload, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn input(text: &str) -> Arc<Message> {
        Arc::new(Message::new(
            "m1",
            json!({ "text": text }),
            standard_input_schema(),
        ))
    }

    #[tokio::test]
    async fn test_finds_emails_with_default_rules() -> Result<()> {
        let processor = PatternMatchFactory.create(&BTreeMap::new())?;
        let message = processor
            .process(
                &[input("contact alice@example.com please")],
                &finding_schema(),
                &ExecutionContext::detached(),
            )
            .await?;

        let findings = message.content["findings"].as_array().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0]["pattern"], "email");
        assert_eq!(findings[0]["matched"], "alice@example.com");
        assert_eq!(message.content["summary"]["total"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fan_in_preserves_input_order() -> Result<()> {
        let processor = PatternMatchFactory.create(&BTreeMap::new())?;
        let first = Arc::new(Message::new(
            "first",
            json!({"text": "a@x.io"}),
            standard_input_schema(),
        ));
        let second = Arc::new(Message::new(
            "second",
            json!({"text": "b@y.io"}),
            standard_input_schema(),
        ));

        let message = processor
            .process(
                &[first, second],
                &finding_schema(),
                &ExecutionContext::detached(),
            )
            .await?;
        let findings = message.content["findings"].as_array().unwrap();
        assert_eq!(findings[0]["source_message"], "first");
        assert_eq!(findings[1]["source_message"], "second");
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_patterns_override_defaults() -> Result<()> {
        let mut properties = BTreeMap::new();
        properties.insert(
            "patterns".to_string(),
            json!([{ "name": "badge", "regex": "B-\\d{4}", "severity": "critical" }]),
        );
        let processor = PatternMatchFactory.create(&properties)?;

        let message = processor
            .process(
                &[input("badge B-1234, email a@b.io ignored")],
                &finding_schema(),
                &ExecutionContext::detached(),
            )
            .await?;
        let findings = message.content["findings"].as_array().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0]["pattern"], "badge");
        assert_eq!(findings[0]["severity"], "critical");
        Ok(())
    }

    #[test]
    fn test_invalid_regex_is_a_configuration_error() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "patterns".to_string(),
            json!([{ "name": "broken", "regex": "(" }]),
        );
        assert!(PatternMatchFactory.create(&properties).is_err());
    }

    #[test]
    fn test_reader_wraps_plain_strings() -> Result<()> {
        let message = Message::new("m1", json!("raw text"), standard_input_schema());
        let payload = StandardInputReader.read(&message)?;
        assert_eq!(payload["text"], "raw text");
        Ok(())
    }

    #[test]
    fn test_reader_rejects_unusable_content() {
        let message = Message::new("m1", json!(42), standard_input_schema());
        assert!(StandardInputReader.read(&message).is_err());
    }

    #[test]
    fn test_reader_resolution_is_schema_exact() {
        let factory = PatternMatchFactory;
        assert!(factory.resolve_reader(&standard_input_schema()).is_some());
        assert!(factory.resolve_reader(&finding_schema()).is_none());
    }
}

// attest-core/src/infrastructure/adapters/file_source.rs

use crate::domain::message::Message;
use crate::domain::schema::Schema;
use crate::infrastructure::adapters::standard_input_schema;
use crate::ports::component::{ComponentError, ExecutionContext, Source, SourceFactory};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Source reading a UTF-8 text file from disk. The payload carries the text
/// together with the path it came from, so findings stay traceable to the
/// scanned file.
pub struct FileSourceFactory;

impl SourceFactory for FileSourceFactory {
    fn type_name(&self) -> &str {
        "file"
    }

    fn default_output_schema(&self) -> Schema {
        standard_input_schema()
    }

    fn create(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Source>, ComponentError> {
        let path = properties
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::Configuration("missing or non-string `path` property".into())
            })?;
        Ok(Box::new(FileSource {
            path: PathBuf::from(path),
        }))
    }
}

struct FileSource {
    path: PathBuf,
}

#[async_trait]
impl Source for FileSource {
    fn output_schema(&self) -> Schema {
        standard_input_schema()
    }

    async fn extract(&self, context: &ExecutionContext) -> Result<Message, ComponentError> {
        if context.is_cancelled() {
            return Err(ComponentError::Cancelled);
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        let content = json!({
            "path": self.path.display().to_string(),
            "text": text,
        });
        Ok(Message::new(
            Uuid::new_v4().to_string(),
            content,
            standard_input_schema(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_file_into_payload() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("customers.txt");
        fs::write(&file, "alice@example.com\n")?;

        let factory = FileSourceFactory;
        let mut properties = BTreeMap::new();
        properties.insert("path".to_string(), json!(file.display().to_string()));
        let source = factory.create(&properties)?;

        let message = source.extract(&ExecutionContext::detached()).await?;
        assert_eq!(message.content["text"], "alice@example.com\n");
        assert!(
            message.content["path"]
                .as_str()
                .unwrap()
                .ends_with("customers.txt")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_surfaces_io_error() -> Result<()> {
        let factory = FileSourceFactory;
        let mut properties = BTreeMap::new();
        properties.insert("path".to_string(), json!("/nonexistent/customers.txt"));
        let source = factory.create(&properties)?;

        let err = source.extract(&ExecutionContext::detached()).await;
        assert!(matches!(err, Err(ComponentError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_path_property_is_required() {
        let factory = FileSourceFactory;
        assert!(factory.create(&BTreeMap::new()).is_err());
    }
}

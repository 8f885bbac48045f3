// attest-core/src/infrastructure/adapters/mod.rs

pub mod file_source;
pub mod pattern;
pub mod static_source;

use crate::domain::schema::{Schema, Version};
use crate::ports::ComponentRegistry;
use std::sync::Arc;

/// Contract produced by the built-in sources: a plain text payload plus
/// provenance fields.
pub fn standard_input_schema() -> Schema {
    Schema::new("standard_input", Version::new(1, 0, 0))
}

/// Contract produced by the built-in pattern analyser.
pub fn finding_schema() -> Schema {
    Schema::new("personal_data_finding", Version::new(1, 0, 0))
}

/// Registry with every built-in component registered. Hosts embedding the
/// orchestrator start from this and add their own adapters.
pub fn bootstrap_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register_source(Arc::new(static_source::StaticSourceFactory));
    registry.register_source(Arc::new(file_source::FileSourceFactory));
    registry.register_processor(Arc::new(pattern::PatternMatchFactory));
    registry
}

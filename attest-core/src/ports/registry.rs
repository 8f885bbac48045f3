// attest-core/src/ports/registry.rs

use crate::ports::component::{ProcessorFactory, SourceFactory};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Directory of registered component factories, keyed by `type` name.
///
/// Populated explicitly at bootstrap (no import-time side effects, no global
/// state) and read-only afterwards: planner and executor only ever look
/// factories up.
#[derive(Default)]
pub struct ComponentRegistry {
    sources: BTreeMap<String, Arc<dyn SourceFactory>>,
    processors: BTreeMap<String, Arc<dyn ProcessorFactory>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source factory. Re-registering a type name replaces the
    /// previous factory; bootstrap owns that trade-off.
    pub fn register_source(&mut self, factory: Arc<dyn SourceFactory>) {
        self.sources.insert(factory.type_name().to_string(), factory);
    }

    pub fn register_processor(&mut self, factory: Arc<dyn ProcessorFactory>) {
        self.processors
            .insert(factory.type_name().to_string(), factory);
    }

    pub fn get_source_factory(&self, type_name: &str) -> Option<&Arc<dyn SourceFactory>> {
        self.sources.get(type_name)
    }

    pub fn get_processor_factory(&self, type_name: &str) -> Option<&Arc<dyn ProcessorFactory>> {
        self.processors.get(type_name)
    }

    pub fn list_source_types(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn list_processor_types(&self) -> Vec<String> {
        self.processors.keys().cloned().collect()
    }
}

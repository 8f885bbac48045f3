// attest-core/src/ports/mod.rs

pub mod component;
pub mod registry;

pub use component::{
    ComponentError, ExecutionContext, Processor, ProcessorFactory, Reader, Source, SourceFactory,
};
pub use registry::ComponentRegistry;

// attest-core/src/domain/graph/mod.rs

pub mod dag;

pub use dag::{ExecutionDag, TopoSorter};

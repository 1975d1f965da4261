//! Core types shared by ingestion, storage and queries.

mod error;
mod model;
pub mod progress;

pub use error::{Error, Result};
pub use model::{
    Commit, Edge, EdgeInsert, LineCoverage, Method, MethodHistoryEdge, MethodKey, MethodVersion,
    NewLineCoverage, NewMethodVersion, Project, StoreStats, TestHistoryEdge, TestKey, TestMethod,
};
pub use progress::ProgressTracker;

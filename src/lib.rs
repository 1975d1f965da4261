//! Morpheus - test-to-method coverage history for JVM projects.
//!
//! Morpheus ingests, per commit, the output of a method-extraction tool
//! (`methods.json`) and of a per-test coverage tool (`coverage.json`), and
//! stores which test covered which production method, and whether that test
//! passed, in a SQLite database that can be queried across commits.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use morpheus::payload::CommitInfo;
//! use morpheus::pipeline::{CommitInput, CommitPipeline};
//! use morpheus::storage::{SqliteStore, StorageAdapter};
//!
//! let mut store = SqliteStore::open(Path::new("morpheus.db")).unwrap();
//! let input = CommitInput::load(
//!     "commons-io",
//!     CommitInfo {
//!         sha: "4f2a".to_string(),
//!         author: String::new(),
//!         datetime: String::new(),
//!     },
//!     Path::new("methods.json"),
//!     Path::new("coverage.json"),
//! )
//! .unwrap();
//! let report = CommitPipeline::new().run(&mut store, &input).unwrap();
//! println!("{} coverage edges", report.coverage.edges_inserted);
//! println!("{:?}", store.conn().stats().unwrap());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod identifier;
pub mod index;
pub mod ingest;
pub mod output;
pub mod payload;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod storage;

pub use core::{Error, Result};

//! Lustre metrics collector.
//!
//! Reads the Lustre pseudo-files under `/proc/fs/lustre`, `/proc/sys/lnet`
//! and `/sys/fs/lustre`, parses them into [`MetricRecord`]s and coalesces
//! concurrent scrapes into a bounded number of collection rounds.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ScrapeCoordinator                       │
//! │   freshness window · max concurrent rounds · attach oldest   │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ one thread per source
//!          ┌─────────────────────┼─────────────────────┐
//!   ┌──────▼──────┐       ┌──────▼──────┐       ┌──────▼──────┐
//!   │   procfs    │       │   procsys   │       │    sysfs    │
//!   │ LustreSource│       │ LustreSource│       │ LustreSource│
//!   └──────┬──────┘       └──────┬──────┘       └──────┬──────┘
//!          └─────────────────────┼─────────────────────┘
//!                                │
//!   ┌────────────┐        ┌──────▼──────┐        ┌────────────┐
//!   │  Catalog   │───────▶│  Assembler  │◀───────│  Parsers   │
//!   │ (defs)     │        └──────┬──────┘        │ scalar/... │
//!   └────────────┘               │               └────────────┘
//!                         ┌──────▼──────┐
//!                         │  PathCache  │ glob memo + reader pool
//!                         └──────┬──────┘
//!                         ┌──────▼──────┐
//!                         │  FileSystem │ (trait)
//!                         └──────┬──────┘
//!                      ┌─────────┴─────────┐
//!               ┌──────▼──────┐     ┌──────▼──────┐
//!               │   RealFs    │     │   MockFs    │
//!               └─────────────┘     └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use lustre_core::collector::{MockFs, ScrapeCoordinator, build_sources};
//! use lustre_core::config::{CollectorConfig, SchedulerConfig};
//!
//! let fs = Arc::new(MockFs::lustre_server());
//! let sources = build_sources(fs, &CollectorConfig::default(), 4);
//! let coordinator = ScrapeCoordinator::new(sources, SchedulerConfig::default());
//! let report = coordinator.collect();
//! assert!(!report.records.is_empty());
//! ```
//!
//! [`MetricRecord`]: crate::metric::MetricRecord

pub mod assembler;
pub mod cache;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod mock;
pub mod parser;
pub mod source;
pub mod traits;

#[allow(unused_imports)]
pub use cache::PathCache;
#[allow(unused_imports)]
pub use catalog::{Component, FormatKind, MetricDefinition, SourceKind, catalog, enabled_definitions};
#[allow(unused_imports)]
pub use coordinator::{Outcome, RoundReport, ScrapeCoordinator, SourceOutcome};
#[allow(unused_imports)]
pub use error::CollectError;
#[allow(unused_imports)]
pub use mock::MockFs;
#[allow(unused_imports)]
pub use source::{LustreSource, Source, build_sources};
#[allow(unused_imports)]
pub use traits::{FileSystem, RealFs};

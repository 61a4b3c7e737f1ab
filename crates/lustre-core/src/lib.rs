//! lustre-core — collection engine of the Lustre exporter.
//!
//! Provides:
//! - `collector` — pseudo-file catalog, parsers, path cache, sources and the
//!   scrape coordinator
//! - `config` — per-component detail levels and scheduler tuning
//! - `metric` — the uniform metric record
//! - `exposition` — Prometheus text encoding of round reports

pub mod collector;
pub mod config;
pub mod exposition;
pub mod metric;

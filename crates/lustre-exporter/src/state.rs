//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use axum::extract::State;

use lustre_core::collector::ScrapeCoordinator;
use lustre_core::config::CollectorConfig;
use lustre_core::exposition::Exposition;

pub(crate) struct WebAppInner {
    pub(crate) coordinator: ScrapeCoordinator,
    pub(crate) exposition: Exposition,
    pub(crate) collectors: CollectorConfig,
    // Path the metrics endpoint is served on, linked from the landing page.
    pub(crate) telemetry_path: String,
}

pub(crate) type SharedState = Arc<WebAppInner>;

pub(crate) type AppState = State<SharedState>;

//! # HTTP Server Module
//!
//! The ledger's boundary operations over HTTP, built on axum.
//!
//! ## Endpoints
//!
//! All routes live under `/v1`:
//!
//! - `/v1/health` - Liveness and stored episode count
//! - `/v1/episodes` - Ingest (POST) and list (GET)
//! - `/v1/episodes/diff` - Positional diff of two episodes
//! - `/v1/episodes/export` - NDJSON export stream
//! - `/v1/episodes/:id` - Fetch one episode
//! - `/v1/episodes/:id/replay` - Replay view

mod config;
mod episode_routes;
mod errors;
mod health_routes;
mod server;

pub use config::HttpServerConfig;
pub use episode_routes::{episode_routes, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use health_routes::{health_routes, HealthResponse};
pub use server::HttpServer;

//! # Polpo - Resilient Octopus Energy Italy API Client
//!
//! An async Rust client for the Kraken GraphQL API behind Octopus Energy
//! Italy, with automatic token lifecycle management, rate-limit backoff and
//! normalization of Relay-paginated tariff data into flat product entries.
//!
//! ## Features
//!
//! - **Token Lifecycle**: JWT expiry tracking, single-flight login and a
//!   background auto-refresh task
//! - **Resilience**: Exponential backoff on rate limits and one bounded
//!   transparent re-login when the provider reports an expired token
//! - **Normalization**: Relay connections flattened into de-duplicated,
//!   typed product entries per supply point
//! - **Tariff Resolution**: Italian F1/F2/F3 time-of-use bands with tiered
//!   fallbacks and forecast-based dynamic pricing
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `error`: Error types shared across the crate
//! - `token`: Token lifecycle manager with background refresh
//! - `transport`: Pluggable GraphQL transport over HTTP
//! - `queries`: GraphQL documents and provider error codes
//! - `client`: High-level API client with retry orchestration
//! - `model`: Typed views of the provider's responses
//! - `normalize`: Relay flattening and product extraction
//! - `rates`: Time-of-use band and unit-price resolution

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod queries;
pub mod rates;
pub mod token;
pub mod transport;

// Re-export commonly used types
pub use client::ApiClient;
pub use config::Config;
pub use error::{PolpoError, Result};
pub use token::TokenManager;

// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Fetch
//!
//! The request stack every platform call goes through.
//!
//! ## Layers
//!
//! - [`transport::Transport`] - performs one request ([`HttpTransport`] on the
//!   privileged side, [`MessageTransport`] on the UI side)
//! - [`rate_limit::RateLimiter`] - sliding-window QPS gate per base URL, with
//!   cooldown after a 429
//! - [`retry::with_retry`] - exponential backoff for 5xx and 429
//! - [`client::ApiClient`] - retry(rate-limit(transport)) for one tenant
//! - [`context::FetchContext`] - owns the transport and limiter registry
//!
//! ## Example
//!
//! ```ignore
//! use tallybar_fetch::{FetchContext, FetchSettings};
//!
//! let ctx = FetchContext::http(FetchSettings::default())?;
//! let client = ctx.client("https://api.example.com").with_bearer("sk-...");
//! let body: serde_json::Value = client.get_json("/api/user/self", &[]).await?;
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod message;
pub mod rate_limit;
pub mod retry;
pub mod transport;

// Errors
pub use error::FetchError;

// Transport
pub use message::{FETCH_MESSAGE, FetchEnvelope, Message, MessageChannel};
pub use transport::{FetchRequest, HttpTransport, MessageTransport, Method, Payload, Transport};

// Stack
pub use client::ApiClient;
pub use context::{FetchContext, FetchSettings};
pub use rate_limit::{RateLimiter, RateLimiterRegistry};
pub use retry::{RetryPolicy, default_retry_on, with_retry};

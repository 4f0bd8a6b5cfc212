pub mod client;
pub mod config;
pub mod error;
pub mod http_pool;
pub mod metrics;
pub mod proxy;
pub mod routes;
pub mod server;

#[cfg(test)]
mod testutil;

pub use client::HttpCatalogSource;
pub use config::*;
pub use proxy::{Endpoint, Proxy, ProxyReply};

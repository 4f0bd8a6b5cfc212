use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use prometheus::Registry;
use tracing::info;

use crate::{
    config::GatewayConfig,
    http_pool::UpstreamPool,
    metrics::ProxyMetrics,
    proxy::Proxy,
    routes,
};

pub fn build_proxy(cfg: &GatewayConfig, registry: &Registry) -> Result<Proxy> {
    let pool = UpstreamPool::new(&cfg.upstream, registry).context("create upstream pool")?;
    Ok(Proxy::new(pool, ProxyMetrics::new(registry)))
}

/// Runs the proxy until `shutdown` resolves.
pub async fn serve<S>(cfg: GatewayConfig, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let registry = Arc::new(Registry::new());
    let proxy = Arc::new(build_proxy(&cfg, &registry)?);
    info!(target: "proxy", upstream = %cfg.upstream.base_url, "proxy initialised");

    let address = format!("{}:{}", cfg.server.host, cfg.server.port);
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("parse listen address {address}"))?;

    let filter = routes::all(proxy, registry, cfg.metrics.enabled);
    let (bound, server) = warp::serve(filter)
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .with_context(|| format!("bind {address}"))?;
    info!(target: "proxy", "Server running on {bound}");
    server.await;
    info!(target: "proxy", "Server shut down");
    Ok(())
}

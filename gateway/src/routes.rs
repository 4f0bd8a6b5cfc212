use std::{borrow::Cow, sync::Arc};

use market_core::load::ACTIVE_STATUS;
use prometheus::Registry;
use serde::Deserialize;
use warp::{http::StatusCode, reply::Response, Filter, Rejection, Reply};

use crate::{
    metrics,
    proxy::{Proxy, ProxyReply},
};

#[derive(Debug, Deserialize)]
struct MarketplaceQuery {
    status: Option<String>,
}

fn with_proxy(
    proxy: Arc<Proxy>,
) -> impl Filter<Extract = (Arc<Proxy>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || Arc::clone(&proxy))
}

fn reply(out: ProxyReply) -> Response {
    let status = StatusCode::from_u16(out.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let json = warp::reply::with_status(warp::reply::json(&out.body), status);
    warp::reply::with_header(json, "cache-control", "no-store").into_response()
}

/// The four read-only passthrough routes.
pub fn api(proxy: Arc<Proxy>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let marketplace = warp::path!("api" / "marketplace")
        .and(warp::get())
        .and(warp::query::<MarketplaceQuery>())
        .and(with_proxy(Arc::clone(&proxy)))
        .then(|q: MarketplaceQuery, proxy: Arc<Proxy>| async move {
            let status = q
                .status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| ACTIVE_STATUS.to_string());
            reply(proxy.marketplace(&status).await)
        });

    let trending = warp::path!("api" / "badges" / "trending")
        .and(warp::get())
        .and(with_proxy(Arc::clone(&proxy)))
        .then(|proxy: Arc<Proxy>| async move { reply(proxy.trending().await) });

    let badges = warp::path!("api" / "badges")
        .and(warp::get())
        .and(with_proxy(Arc::clone(&proxy)))
        .then(|proxy: Arc<Proxy>| async move { reply(proxy.badges().await) });

    let history = warp::path!("api" / "history" / String)
        .and(warp::get())
        .and(with_proxy(proxy))
        .then(|raw: String, proxy: Arc<Proxy>| async move {
            let username = urlencoding::decode(&raw).unwrap_or(Cow::Borrowed(raw.as_str()));
            reply(proxy.history(&username).await)
        });

    marketplace
        .or(trending)
        .unify()
        .or(badges)
        .unify()
        .or(history)
        .unify()
}

pub fn ops(
    registry: Arc<Registry>,
    metrics_enabled: bool,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let health = warp::path!("healthz")
        .and(warp::get())
        .map(|| warp::reply::with_status("ok", StatusCode::OK).into_response());

    let metrics_route = warp::path!("metrics").and(warp::get()).map(move || {
        if !metrics_enabled {
            return StatusCode::NOT_FOUND.into_response();
        }
        match metrics::render(&registry) {
            Ok(text) => warp::reply::with_header(text, "content-type", "text/plain; version=0.0.4")
                .into_response(),
            Err(err) => {
                tracing::warn!(target: "proxy", ?err, "metrics render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    });

    health.or(metrics_route).unify()
}

pub fn all(
    proxy: Arc<Proxy>,
    registry: Arc<Registry>,
    metrics_enabled: bool,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    api(proxy)
        .or(ops(registry, metrics_enabled))
        .unify()
        .with(warp::log("proxy"))
}

//! Stand-in for the backend, served on an ephemeral port.

use std::collections::HashMap;

use serde_json::json;
use warp::{http::StatusCode, Filter, Reply};

pub(crate) fn listings_body(status: &str) -> serde_json::Value {
    json!({
        "success": true,
        "status": status,
        "listings": [
            {"id": 1, "username": "neo", "price": 500, "status": "active",
             "created_at": "2024-01-01T00:00:00",
             "seller": {"id": 10, "username": "morpheus", "name": "Morpheus", "is_verified": true}},
            {"id": 2, "username": "ab", "price": 100, "status": "active",
             "created_at": "2024-06-01T00:00:00",
             "seller": {"id": 11, "username": "trinity", "name": "Trinity"}}
        ]
    })
}

pub(crate) async fn spawn_upstream() -> String {
    let marketplace = warp::path!("api" / "username" / "marketplace")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .map(|q: HashMap<String, String>| {
            let status = q.get("status").cloned().unwrap_or_default();
            warp::reply::json(&listings_body(&status)).into_response()
        });
    let badges = warp::path!("api" / "badges").and(warp::get()).map(|| {
        warp::reply::with_status(
            warp::reply::json(&json!({"message": "maintenance"})),
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .into_response()
    });
    let trending = warp::path!("api" / "badges" / "trending")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "badges": [{"id": 3, "name": "Founder", "price": 250, "copies_sold": 4, "max_copies": 10,
                            "creator": {"id": 10, "username": "morpheus", "name": "Morpheus"}}]
            }))
            .into_response()
        });
    let history = warp::path!("api" / "username" / "history" / String)
        .and(warp::get())
        .map(|name: String| {
            if name == "html" {
                return warp::reply::html("<html>maintenance</html>").into_response();
            }
            warp::reply::json(&json!({
                "username": name,
                "current_owner": {"id": 11, "username": "trinity", "name": "Trinity"},
                "ownership_history": [
                    {"timestamp": "2024-01-01T00:00:00", "price": 0, "buyer_id": 10,
                     "buyer_username": "morpheus", "seller_id": null, "seller_username": null}
                ],
                "users": {}
            }))
            .into_response()
        });

    let routes = marketplace.or(trending).or(badges).or(history);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

//! Location handshake: asks the local lookup API where the device is and
//! shapes the answer into a `location` update for the server.

use serde_json::{json, Map, Value};

/// Fetches the device's location and composes the update to publish. Never
/// fails; an unreachable or unavailable lookup service yields the synthetic
/// `{"unavailable": 1}` payload instead.
pub async fn report(url: &str) -> Value {
    let location = match lookup(url).await {
        Ok(location) => location,
        Err(e) => {
            log::warn!("websocket - Location lookup failed: {}", e);
            json!({ "unavailable": 1 })
        }
    };
    compose_update(location)
}

async fn lookup(url: &str) -> reqwest::Result<Value> {
    reqwest::get(url).await?.json().await
}

/// Merges the `location` marker into the lookup result. A body reporting a
/// 503 status means the lookup service could not resolve a location and is
/// replaced by the unavailable payload.
fn compose_update(location: Value) -> Value {
    let mut location = match location {
        Value::Object(map) if map.get("status").and_then(Value::as_i64) != Some(503) => map,
        _ => {
            let mut map = Map::new();
            map.insert("unavailable".to_string(), json!(1));
            map
        }
    };
    location.insert("location".to_string(), json!(1));
    Value::Object(location)
}

//! Publishes device events to the server as HTTP POSTs.
//!
//! The server exposes one endpoint per event kind under a per-device base
//! URL. Events carry no type tag; the endpoint is chosen by which marker key
//! is present, tested in a fixed priority order so routing stays
//! deterministic even if an event carries several markers.

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

/// Event kinds the server accepts, in routing priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRoute {
    Ear,
    Button,
    Location,
}

impl UpdateRoute {
    /// Classifies an event by marker key: `moved`, then `button`, then
    /// `location`. Events with none of the markers have nowhere to go.
    pub fn classify(update: &Value) -> Option<UpdateRoute> {
        if update.get("moved").is_some() {
            Some(UpdateRoute::Ear)
        } else if update.get("button").is_some() {
            Some(UpdateRoute::Button)
        } else if update.get("location").is_some() {
            Some(UpdateRoute::Location)
        } else {
            None
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            UpdateRoute::Ear => "ear",
            UpdateRoute::Button => "button",
            UpdateRoute::Location => "location",
        }
    }
}

/// The POST URL for an event, or `None` for unroutable events, which are
/// dropped without complaint.
pub fn destination(update: &Value, base_url: &str) -> Option<String> {
    UpdateRoute::classify(update).map(|route| format!("{}{}", base_url, route.suffix()))
}

/// Drains the update queue and POSTs each event to its endpoint.
pub struct UpdatePublisher {
    base_url: String,
    updates: UnboundedReceiver<Value>,
    client: reqwest::Client,
}

impl UpdatePublisher {
    pub fn new(base_url: String, updates: UnboundedReceiver<Value>) -> Self {
        UpdatePublisher {
            base_url,
            updates,
            client: reqwest::Client::new(),
        }
    }

    pub async fn run(mut self) {
        while let Some(update) = self.updates.recv().await {
            let url = match destination(&update, &self.base_url) {
                Some(url) => url,
                None => continue,
            };
            self.publish(&url, &update).await;
        }

        log::info!("postupdate - Update queue closed, publisher stopping");
    }

    /// Delivery is at-most-once: failures of any kind are logged and the
    /// event is forgotten.
    async fn publish(&self, url: &str, update: &Value) {
        let response = match self.client.post(url).json(update).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("postupdate - Failed to POST update: {}", e);
                return;
            }
        };

        log::info!("postupdate - POSTed {} to {}", update, url);

        let status = response.status();
        if !status.is_success() {
            log::error!("postupdate - Server returned {}", status);
        }

        match response.text().await {
            Ok(body) => log::info!("postupdate - Response: {}", body),
            Err(e) => log::error!("postupdate - Failed to read response: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE_URL: &str = "http://localhost:80/nabaztag/update/00:0f:54:18:10:35/";

    #[test]
    fn ear_update_routes_to_ear() {
        let update = json!({"ear": "L", "moved": 1});
        assert_eq!(
            destination(&update, BASE_URL).unwrap(),
            format!("{}ear", BASE_URL)
        );
    }

    #[test]
    fn button_update_routes_to_button() {
        let update = json!({"button": 1});
        assert_eq!(
            destination(&update, BASE_URL).unwrap(),
            format!("{}button", BASE_URL)
        );
    }

    #[test]
    fn location_update_routes_to_location() {
        let update = json!({"lat": 50.9367229, "lon": -1.3972372, "location": 1});
        assert_eq!(
            destination(&update, BASE_URL).unwrap(),
            format!("{}location", BASE_URL)
        );
    }

    #[test]
    fn unmarked_update_has_no_destination() {
        let update = json!({"invalid": 1});
        assert!(destination(&update, BASE_URL).is_none());
    }

    #[test]
    fn moved_marker_wins_over_other_markers() {
        // An event carrying several markers must route the same way every
        // time: moved, then button, then location.
        let update = json!({"moved": 1, "button": 1, "location": 1});
        assert_eq!(UpdateRoute::classify(&update), Some(UpdateRoute::Ear));

        let update = json!({"button": 1, "location": 1});
        assert_eq!(UpdateRoute::classify(&update), Some(UpdateRoute::Button));
    }
}

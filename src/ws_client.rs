//! Websocket client receiving commands from the server and feeding them to
//! the serial writer.
//!
//! The connection lives once per process: connect, run the on-open
//! initialisation and location handshake, then relay inbound commands until
//! the peer closes or a stop signal arrives. There is no reconnect here; a
//! process supervisor is expected to restart the client if the link drops.

use anyhow::Result;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::codec::{encode_ear, encode_led, Command, EarSide, LedZone, SerialFrame};
use crate::location;

/// How long the ear motors take to wind back to zero during initialisation.
const EAR_SETTLE_DURATION: Duration = Duration::from_millis(5200);

type CommandSender = UnboundedSender<SerialFrame>;
type UpdateSender = UnboundedSender<Value>;

/// Describes ws client for the relay
pub struct WsClient {
    url: String,
    location_url: String,
    commands: CommandSender,
    updates: UpdateSender,
}

impl WsClient {
    pub fn new(
        url: String,
        location_url: String,
        commands: CommandSender,
        updates: UpdateSender,
    ) -> Self {
        WsClient {
            url,
            location_url,
            commands,
            updates,
        }
    }

    /// Runs the connection to completion: until the peer closes it or the
    /// stop signal fires.
    pub async fn run(&self, mut stop: watch::Receiver<&'static str>) -> Result<()> {
        log::info!("websocket - Connecting to: {}", self.url);

        let url = url::Url::parse(&self.url)?;

        let ws_stream = tokio::select! {
            res = connect_async(&url) => {
                let (ws_stream, _) = res?;
                ws_stream
            }

            _ = stop.changed() => return Ok(()),
        };

        log::info!("websocket - Connection opened: {}", self.url);

        self.opened();

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                message = read.next() => {
                    match message {
                        Some(message) => {
                            if let Err(e) = self.process_message(message).await {
                                log::error!("websocket - Error: {}", e);
                            }
                        }
                        None => {
                            log::info!("websocket - Connection closed");
                            break;
                        }
                    }
                }

                _ = stop.changed() => return Ok(()),
            }
        }

        Ok(())
    }

    /// On-open work. Both sequences run as their own tasks so the settle
    /// wait never holds up receipt of inbound commands.
    fn opened(&self) {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            if initialise(&commands).await.is_err() {
                log::warn!("websocket - Command queue closed during initialisation");
            }
        });

        let updates = self.updates.clone();
        let location_url = self.location_url.clone();
        tokio::spawn(async move {
            let update = location::report(&location_url).await;
            if updates.send(update).is_err() {
                log::warn!("websocket - Update queue closed before location report");
            }
        });
    }

    async fn process_message<E>(&self, message: std::result::Result<Message, E>) -> Result<()>
    where
        E: std::error::Error + Sync + Send + 'static,
    {
        let message = message?;

        if let Message::Close(frame) = message {
            match frame {
                Some(frame) => log::info!(
                    "websocket - Connection closed with code: {}",
                    frame.code
                ),
                None => log::info!("websocket - Connection closed without a code"),
            }
            return Ok(());
        }

        if !message.is_text() {
            return Ok(());
        }

        let text = message.into_text()?;

        log::info!("websocket - Message received: {}", text);

        if text.is_empty() {
            return Ok(());
        }

        let message: Value = serde_json::from_str(&text)?;

        // Unrecognised command shapes deliberately propagate out of the
        // translation step as InvalidCommand; the run loop logs them and the
        // connection stays up. Everything else is logged where it happens.
        match Command::from_json(&message)? {
            Command::Speak { text } => self.speak(&text),
            Command::MoveEar { side, position } => {
                self.commands.send(encode_ear(side, position))?;
            }
            Command::SetLed {
                zone,
                red,
                green,
                blue,
            } => {
                self.commands.send(encode_led(zone, red, green, blue))?;
            }
        }

        Ok(())
    }

    /// Hands the text to festival and moves on; completion is never awaited.
    fn speak(&self, text: &str) {
        let result = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(format!("echo '{}' | festival --tts", text))
            .spawn();

        match result {
            Ok(_) => log::info!("websocket - Speaking: {}", text),
            Err(e) => log::error!("websocket - Text-to-speech failed: {}", e),
        }
    }
}

/// Winds both ears back to zero, holding the indicator LEDs green while the
/// motors settle, then turns them off again.
async fn initialise(commands: &CommandSender) -> Result<(), SendError<SerialFrame>> {
    commands.send(encode_ear(EarSide::Left, 0))?;
    commands.send(encode_ear(EarSide::Right, 0))?;

    commands.send(encode_led(LedZone::Top, 0, 255, 0))?;
    commands.send(encode_led(LedZone::Bottom, 0, 255, 0))?;

    sleep(EAR_SETTLE_DURATION).await;

    commands.send(encode_led(LedZone::Top, 0, 0, 0))?;
    commands.send(encode_led(LedZone::Bottom, 0, 0, 0))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite;

    fn client() -> (
        WsClient,
        mpsc::UnboundedReceiver<SerialFrame>,
        mpsc::UnboundedReceiver<Value>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let client = WsClient::new(
            "ws://localhost:8000/ws/nabaztag/00:0f:54:18:10:35".to_string(),
            "http://localhost/nabaztag/api/location".to_string(),
            command_tx,
            update_tx,
        );
        (client, command_rx, update_rx)
    }

    fn text_message(text: &str) -> std::result::Result<Message, tungstenite::Error> {
        Ok(Message::Text(text.to_string()))
    }

    #[tokio::test]
    async fn ear_command_reaches_the_command_queue() {
        let (client, mut commands, _updates) = client();

        client
            .process_message(text_message(r#"{"ear": "L", "pos": 10}"#))
            .await
            .unwrap();

        assert_eq!(commands.recv().await.unwrap().as_str(), "EARMOV L 10\r\n");
    }

    #[tokio::test]
    async fn led_command_reaches_the_command_queue() {
        let (client, mut commands, _updates) = client();

        client
            .process_message(text_message(
                r#"{"led": "B", "red": 10, "green": 20, "blue": 30}"#,
            ))
            .await
            .unwrap();

        assert_eq!(commands.recv().await.unwrap().as_str(), "LED B 10 20 30\r\n");
    }

    #[tokio::test]
    async fn malformed_json_enqueues_nothing() {
        let (client, mut commands, _updates) = client();

        let result = client
            .process_message(text_message(r#"{"ear": "L" "pos": 10}"#))
            .await;

        assert!(result.is_err());
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn unrecognised_shape_surfaces_invalid_command() {
        let (client, mut commands, _updates) = client();

        let result = client
            .process_message(text_message(r#"{"invalid": 1}"#))
            .await;

        let error = result.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<CodecError>(),
            Some(CodecError::InvalidCommand)
        ));
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_text_frames_are_ignored() {
        let (client, mut commands, _updates) = client();

        client
            .process_message(Ok::<_, tungstenite::Error>(Message::Ping(vec![])))
            .await
            .unwrap();

        assert!(commands.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn initialise_zeroes_ears_and_flashes_green() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            initialise(&tx).await.unwrap();
        });

        let mut lines = Vec::new();
        while let Some(frame) = rx.recv().await {
            lines.push(frame.as_str().to_string());
        }

        assert_eq!(
            lines,
            vec![
                "EARMOV L 0\r\n",
                "EARMOV R 0\r\n",
                "LED T 0 255 0\r\n",
                "LED B 0 255 0\r\n",
                "LED T 0 0 0\r\n",
                "LED B 0 0 0\r\n",
            ]
        );
    }
}

//! The two workers owning the serial link to the AVR: one drains the command
//! queue onto the wire, the other turns inbound JSON lines into update-queue
//! events.
//!
//! The duplex port is split once at startup; the writer owns the write half
//! and the reader the read half, so neither ever contends with the other.
//! Both loops treat every failure as local: a bad write loses that one frame,
//! a bad line is dropped, and the loop carries on. Only process shutdown
//! (closing the queues) stops them.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::codec::SerialFrame;

/// Opens the configured serial port for async use.
pub fn open(port: &str, rate: u32) -> tokio_serial::Result<SerialStream> {
    tokio_serial::new(port, rate).open_native_async()
}

/// Writes queued command frames to the device, in queue order.
pub struct SerialWriter<W> {
    port: W,
    commands: UnboundedReceiver<SerialFrame>,
}

impl<W: AsyncWrite + Unpin> SerialWriter<W> {
    pub fn new(port: W, commands: UnboundedReceiver<SerialFrame>) -> Self {
        SerialWriter { port, commands }
    }

    pub async fn run(mut self) {
        while let Some(frame) = self.commands.recv().await {
            log::info!("serialwrite - Message written: {}", frame.display_line());
            if let Err(e) = self.port.write_all(frame.as_bytes()).await {
                // The frame is lost; delivery to the device is at-most-once.
                log::error!("serialwrite - Write to serial port failed: {}", e);
            }
        }

        log::info!("serialwrite - Command queue closed, writer stopping");
    }
}

/// Reads newline-terminated JSON events from the device and feeds the update
/// queue. Malformed lines are logged and never forwarded.
pub struct SerialReader<R> {
    lines: FramedRead<R, LinesCodec>,
    updates: UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin> SerialReader<R> {
    pub fn new(port: R, updates: UnboundedSender<Value>) -> Self {
        SerialReader {
            lines: FramedRead::new(port, LinesCodec::new()),
            updates,
        }
    }

    pub async fn run(mut self) {
        while let Some(line) = self.lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::error!("serialread - Read from serial port failed: {}", e);
                    continue;
                }
            };

            match serde_json::from_str::<Value>(&line) {
                Ok(event) => {
                    log::info!("serialread - Message read: {}", event);
                    if self.updates.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("serialread - Message received was not valid JSON: {}", e);
                }
            }
        }

        log::info!("serialread - Serial stream ended, reader stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_ear, encode_led, EarSide, LedZone};
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn writer_sends_frames_verbatim_in_queue_order() {
        let (port, mut device) = tokio::io::duplex(256);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(encode_ear(EarSide::Left, 10)).unwrap();
        tx.send(encode_led(LedZone::Top, 0, 255, 0)).unwrap();
        tx.send(encode_ear(EarSide::Right, 3)).unwrap();
        drop(tx);

        SerialWriter::new(port, rx).run().await;

        let mut written = String::new();
        device.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "EARMOV L 10\r\nLED T 0 255 0\r\nEARMOV R 3\r\n");
    }

    #[tokio::test]
    async fn reader_forwards_valid_json_and_drops_the_rest() {
        let (mut device, port) = tokio::io::duplex(256);
        let (tx, mut rx) = mpsc::unbounded_channel();

        device
            .write_all(b"{\"button\": 1}\nnot json at all\n{\"ear\": \"L\", \"moved\": 1}\n")
            .await
            .unwrap();
        drop(device);

        SerialReader::new(port, tx).run().await;

        assert_eq!(rx.recv().await.unwrap(), serde_json::json!({"button": 1}));
        assert_eq!(
            rx.recv().await.unwrap(),
            serde_json::json!({"ear": "L", "moved": 1})
        );
        assert!(rx.recv().await.is_none());
    }
}

//! Relay between the animatronic rabbit's AVR (over a serial link) and its
//! control server (over a websocket, with HTTP POSTs for updates).
//!
//! Four workers share two unbounded queues. Commands flow
//! websocket → command queue → serial writer → device; events flow
//! device → serial reader → update queue → HTTP publisher → server. The
//! queues decouple the two directions: a stall on one side never backs up
//! the other.

#[macro_use]
extern crate lazy_static;

use anyhow::Result;
use tokio::sync::mpsc;

mod app;
pub mod codec;
pub mod config;
pub mod location;
pub mod serial;
pub mod update;
pub mod ws_client;

use config::Config;

/// Runs the relay until the process is terminated
pub async fn run(config: Config) {
    let res = run_internal(config).await;
    if let Err(e) = res {
        log::error!("{}", e);
    }
}

async fn run_internal(config: Config) -> Result<()> {
    log::info!("Nabaztag client started");

    let a = app::App::instance();

    let mut stop = a.signals_register().await?;

    log::info!("Registered to Linux signals");

    let identifier = config::device_identifier(&config.interface)?;

    let ws_url = config::expand_url(
        &config.urls.wsurl,
        &config.server.hostname,
        config.server.port,
        &identifier,
    );
    let post_url = config::expand_url(
        &config.urls.posturl,
        &config.server.hostname,
        config.server.port,
        &identifier,
    );

    let port = serial::open(&config.serial.port, config.serial.rate)?;
    let (read_half, write_half) = tokio::io::split(port);

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    tokio::spawn(serial::SerialWriter::new(write_half, command_rx).run());
    tokio::spawn(serial::SerialReader::new(read_half, update_tx.clone()).run());
    tokio::spawn(update::UpdatePublisher::new(post_url, update_rx).run());

    log::info!("Starting ws client");

    let client = ws_client::WsClient::new(
        ws_url,
        config.urls.locationurl.clone(),
        command_tx,
        update_tx,
    );
    client.run(stop.clone()).await?;

    log::info!("WS client is stopped");

    // The device→server path keeps running after the websocket closes on its
    // own; only a termination signal ends the process.
    if *stop.borrow() != "close" {
        let _ = stop.changed().await;
    }

    a.signals_unregister().await?;

    log::info!("Unregistered from Linux signals");

    Ok(())
}

//! Audio Receiver Application
//!
//! Headless control surface: listens for a UDP microphone stream and plays it
//! on an output device. Commands are read from stdin.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_mic_receiver::{
    audio::list_output_devices,
    config::AppConfig,
    controller::parse_port,
    status::channel_listener,
    Status, StreamController,
};

const HELP: &str = "commands: start [port] | stop | volume <0-100> | status | devices | quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting UDP Mic Receiver");

    let mut json = false;
    let mut port_arg = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            other => port_arg = Some(parse_port(other).context("invalid port argument")?),
        }
    }

    let (mut app_config, config_path) = AppConfig::load_for_session(AppConfig::default_path());
    if let Some(port) = port_arg {
        app_config.port = port;
    }

    print_devices();

    let (status_tx, status_rx) = crossbeam_channel::bounded::<Status>(256);
    let controller = Arc::new(StreamController::with_config(
        app_config.stream_config(),
        channel_listener(status_tx),
    ));
    controller.set_volume(app_config.volume);

    // Print status changes; per-packet repeats of the same sender are collapsed
    thread::Builder::new()
        .name("status-printer".into())
        .spawn(move || {
            let mut last: Option<Status> = None;
            for status in status_rx.iter() {
                if last.as_ref() == Some(&status) {
                    continue;
                }
                print_status(&status, json);
                last = Some(status);
            }
        })
        .context("failed to spawn status printer")?;

    start(&controller, app_config.port).await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut words = line.split_whitespace();
                match (words.next(), words.next()) {
                    (Some("start"), port) => {
                        let port = match port.map(parse_port).transpose() {
                            Ok(port) => port.unwrap_or(app_config.port),
                            Err(e) => {
                                println!("{}", e);
                                continue;
                            }
                        };
                        if start(&controller, port).await {
                            app_config.port = port;
                        }
                    }
                    (Some("stop"), _) => stop(&controller).await,
                    (Some("volume"), Some(value)) => match value.parse::<u8>() {
                        Ok(percent) if percent <= 100 => {
                            controller.set_volume(percent);
                            app_config.volume = percent;
                        }
                        _ => println!("volume must be 0-100"),
                    },
                    (Some("status"), _) => {
                        print_status(&controller.status(), json);
                        let stats = controller.stats();
                        if json {
                            println!("{}", serde_json::to_string(&stats)?);
                        } else {
                            println!(
                                "  volume {}%, {} played, {} dropped, {} overflows, {} underruns",
                                controller.volume(),
                                stats.packets_played,
                                stats.packets_dropped,
                                stats.ring_overflows,
                                stats.ring_underruns
                            );
                        }
                    }
                    (Some("devices"), _) => print_devices(),
                    (Some("quit" | "exit"), _) => break,
                    (None, _) => {}
                    _ => println!("{}", HELP),
                }
            }
        }
    }

    stop(&controller).await;

    if let Some(path) = config_path {
        if let Err(e) = app_config.save_to(&path) {
            tracing::warn!("Failed to save config to {}: {}", path.display(), e);
        }
    }
    Ok(())
}

async fn start(controller: &Arc<StreamController>, port: u16) -> bool {
    let controller = controller.clone();
    match tokio::task::spawn_blocking(move || controller.start(port)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            println!("Could not start on port {}: {}", port, e);
            false
        }
        Err(e) => {
            tracing::error!("Start task failed: {}", e);
            false
        }
    }
}

async fn stop(controller: &Arc<StreamController>) {
    let controller = controller.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || controller.stop()).await {
        tracing::error!("Stop task failed: {}", e);
    }
}

fn print_status(status: &Status, json: bool) {
    if json {
        match serde_json::to_string(status) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to encode status: {}", e),
        }
        return;
    }
    match status {
        Status::Stopped => println!("Status: stopped"),
        Status::Listening { connection: None } => println!("Status: waiting for sender..."),
        Status::Listening {
            connection: Some(info),
        } => println!(
            "Status: receiving from {} via {}",
            info.peer_address, info.transport_guess
        ),
        Status::Error { message } => println!("Status: error: {}", message),
    }
}

fn print_devices() {
    println!("\n=== Available Output Devices ===");
    for device in list_output_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}

//! MQTT bridge binary: subscribes to cover requests, drives the blinds and
//! republishes every committed state snapshot.
//!
//! Topic layout:
//!   rfblinds/<id>/set           OPEN | CLOSE | STOP | OPEN_TILT | CLOSE_TILT | STOP_TILT
//!   rfblinds/<id>/position/set  0..=100
//!   rfblinds/<id>/tilt/set      0..=100
//!   rfblinds/<id>/state         retained JSON snapshot, published by us
//!   rfblinds/<id>/cmd           raw command codes for the RF gateway

use anyhow::{Context, Result};
use clap::Parser;
use clap_derive::Parser;
use rumqttc::{AsyncClient, Event, EventLoop, Packet, Publish, QoS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use rfblinds_hub_rs::hub::BlindHub;
use rfblinds_hub_rs::logging::{
    LogConfig, LogGuard, RotationPeriod, setup_console_logging, setup_file_logging,
};
use rfblinds_hub_rs::settings::Settings;
use rfblinds_hub_rs::transport::{self, MqttBridgeOptions};

#[derive(Parser, Debug)]
pub struct Params {
    /// Settings file path (JSON). If not set, default settings are used.
    #[clap(long)]
    settings: Option<String>,
    /// MQTT broker hostname (overrides the settings file)
    #[clap(long)]
    host: Option<String>,
    /// MQTT broker port (overrides the settings file)
    #[clap(long)]
    port: Option<u16>,
    /// Log directory (if not set, logs to stdout)
    #[clap(long)]
    log_dir: Option<String>,
    /// Log rotation period: minutely, hourly, daily or never
    #[clap(long, default_value = "daily")]
    log_rotation: String,
    /// Number of rotated log files to keep (0 = unlimited)
    #[clap(long, default_value = "7")]
    max_log_files: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    let _log_guard = setup_logging(&params)?;

    let mut settings: Settings = if let Some(path) = &params.settings {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {path}"))?;
        serde_json::from_str(&raw).context("cannot parse settings file")?
    } else {
        warn!("No settings file given, using default settings");
        Settings::default()
    };
    if let Some(host) = params.host {
        settings.mqtt.host = host;
    }
    if let Some(port) = params.port {
        settings.mqtt.port = port;
    }
    settings.validate()?;

    let options = MqttBridgeOptions::builder()
        .host(settings.mqtt.host.clone())
        .port(settings.mqtt.port)
        .username(settings.mqtt.username.clone())
        .password(settings.mqtt.password.clone())
        .build()?;
    let (client, eventloop) = transport::connect(&options);

    let hub = Arc::new(BlindHub::from_settings(&settings, client.clone()).await?);
    info!(
        "Mounted {} blinds against {}:{}",
        hub.len(),
        settings.mqtt.host,
        settings.mqtt.port
    );

    spawn_state_publishers(&hub, &client);
    run_event_loop(hub, client, eventloop).await
}

fn setup_logging(params: &Params) -> Result<LogGuard> {
    match &params.log_dir {
        Some(dir) => {
            let rotation = params
                .log_rotation
                .parse::<RotationPeriod>()
                .map_err(anyhow::Error::msg)?;
            let guard = setup_file_logging(LogConfig {
                log_dir: dir.clone(),
                rotation,
                max_log_files: params.max_log_files,
                ..LogConfig::default()
            })?;
            Ok(guard)
        }
        None => Ok(setup_console_logging()),
    }
}

const REQUEST_TOPICS: [&str; 3] = [
    "rfblinds/+/set",
    "rfblinds/+/position/set",
    "rfblinds/+/tilt/set",
];

async fn subscribe_requests(client: &AsyncClient) -> Result<()> {
    for topic in REQUEST_TOPICS {
        client.subscribe(topic, QoS::AtLeastOnce).await?;
    }
    Ok(())
}

/// One task per blind: republish every snapshot as retained JSON so late
/// subscribers always see the current state.
fn spawn_state_publishers(hub: &Arc<BlindHub>, client: &AsyncClient) {
    for id in hub.device_ids() {
        let Some(cover) = hub.get(&id) else { continue };
        let client = client.clone();
        tokio::spawn(async move {
            let mut changes = cover.changes();
            let topic = format!("rfblinds/{}/state", cover.device_id());
            loop {
                let snapshot = *changes.borrow_and_update();
                match serde_json::to_vec(&snapshot) {
                    Ok(payload) => {
                        if let Err(e) = client
                            .publish(topic.clone(), QoS::AtLeastOnce, true, payload)
                            .await
                        {
                            error!(device = %cover.device_id(), "Failed to publish state: {e}");
                        }
                    }
                    Err(e) => {
                        error!(device = %cover.device_id(), "Failed to serialize state: {e}");
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });
    }
}

async fn run_event_loop(
    hub: Arc<BlindHub>,
    client: AsyncClient,
    mut eventloop: EventLoop,
) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                // Subscriptions do not survive a reconnect.
                subscribe_requests(&client).await?;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&hub, &publish);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {e}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoverAction {
    Open,
    Close,
    Stop,
    OpenTilt,
    CloseTilt,
    StopTilt,
    SetPosition(u8),
    SetTilt(u8),
}

fn parse_request(topic: &str, payload: &str) -> Option<(String, CoverAction)> {
    let mut parts = topic.split('/');
    if parts.next()? != "rfblinds" {
        return None;
    }
    let device_id = parts.next()?.to_string();
    if device_id.is_empty() {
        return None;
    }
    let action = match (parts.next()?, parts.next(), parts.next()) {
        ("set", None, _) => match payload.trim().to_ascii_uppercase().as_str() {
            "OPEN" => CoverAction::Open,
            "CLOSE" => CoverAction::Close,
            "STOP" => CoverAction::Stop,
            "OPEN_TILT" => CoverAction::OpenTilt,
            "CLOSE_TILT" => CoverAction::CloseTilt,
            "STOP_TILT" => CoverAction::StopTilt,
            _ => return None,
        },
        ("position", Some("set"), None) => CoverAction::SetPosition(payload.trim().parse().ok()?),
        ("tilt", Some("set"), None) => CoverAction::SetTilt(payload.trim().parse().ok()?),
        _ => return None,
    };
    Some((device_id, action))
}

/// Long operations block for the blind's whole travel time, so every
/// request runs on its own task; the state machine itself arbitrates
/// overlapping requests.
fn handle_publish(hub: &Arc<BlindHub>, publish: &Publish) {
    let payload = String::from_utf8_lossy(&publish.payload);
    let Some((device_id, action)) = parse_request(&publish.topic, &payload) else {
        debug!("Ignoring message on topic {}", publish.topic);
        return;
    };
    let Some(cover) = hub.get(&device_id) else {
        warn!("Request for unknown device '{device_id}'");
        return;
    };

    info!(device = %device_id, "Handling request {action:?}");
    tokio::spawn(async move {
        match action {
            CoverAction::Open => cover.open().await,
            CoverAction::Close => cover.close().await,
            CoverAction::Stop => cover.stop().await,
            CoverAction::OpenTilt => cover.open_tilt().await,
            CoverAction::CloseTilt => cover.close_tilt().await,
            CoverAction::StopTilt => cover.stop_tilt().await,
            CoverAction::SetPosition(p) => cover.set_position(p).await,
            CoverAction::SetTilt(p) => cover.set_tilt_position(p).await,
        }
    });
}

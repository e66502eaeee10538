//! Fire-and-forget command transport.
//!
//! The hub never learns whether a pulse physically moved the blind; the
//! transport only reports whether the command left the building. Production
//! deployments publish command codes over MQTT to an RF gateway that owns
//! the actual transmitter.

use async_trait::async_trait;
use derive_builder::Builder;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Publishing failed: {0}")]
    Publish(String),
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Sends a single low-level command code to one physical device.
///
/// Success means transmission only; there is no feedback on physical effect.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send(&self, code: u8) -> Result<(), TransportError>;
}

#[derive(Builder, Debug, Clone)]
pub struct MqttBridgeOptions {
    pub host: String,
    pub port: u16,
    #[builder(default)]
    pub username: Option<String>,
    #[builder(default)]
    pub password: Option<String>,
}

impl MqttBridgeOptions {
    pub fn builder() -> MqttBridgeOptionsBuilder {
        MqttBridgeOptionsBuilder::default()
    }
}

const CLIENT_ID_PREFIX: &str = "RFBlinds";

fn generate_client_id() -> String {
    let uuid = Uuid::new_v4();
    format!("{CLIENT_ID_PREFIX}_{}", uuid.to_string().to_uppercase())
}

/// Opens the shared MQTT connection used by every device transport and by
/// the inbound command loop. The caller owns the event loop.
pub fn connect(options: &MqttBridgeOptions) -> (AsyncClient, EventLoop) {
    let mut mqttoptions =
        MqttOptions::new(generate_client_id(), options.host.clone(), options.port);
    mqttoptions.set_keep_alive(Duration::from_secs(5));
    if let (Some(user), Some(password)) = (&options.username, &options.password) {
        mqttoptions.set_credentials(user.clone(), password.clone());
    }
    AsyncClient::new(mqttoptions, 10)
}

/// Per-device transport publishing raw command codes to
/// `rfblinds/<device_id>/cmd`. The RF gateway subscribed there is the only
/// component that ever touches the radio.
pub struct MqttTransport {
    client: AsyncClient,
    topic: String,
}

impl MqttTransport {
    pub fn new(client: AsyncClient, device_id: &str) -> Self {
        Self {
            client,
            topic: format!("rfblinds/{device_id}/cmd"),
        }
    }
}

#[async_trait]
impl CommandTransport for MqttTransport {
    async fn send(&self, code: u8) -> Result<(), TransportError> {
        debug!("Publishing command {code:#04x} to {}", self.topic);
        self.client
            .publish(self.topic.clone(), QoS::AtLeastOnce, false, vec![code])
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records every command code; optionally fails every send.
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        pub sent: Arc<Mutex<Vec<u8>>>,
        pub should_fail: Arc<AtomicBool>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                should_fail: Arc::new(AtomicBool::new(true)),
                ..Default::default()
            }
        }

        pub fn codes(&self) -> Vec<u8> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandTransport for RecordingTransport {
        async fn send(&self, code: u8) -> Result<(), TransportError> {
            if self.should_fail.load(Ordering::Relaxed) {
                return Err(TransportError::Publish("fake failure".to_string()));
            }
            self.sent.lock().unwrap().push(code);
            Ok(())
        }
    }
}

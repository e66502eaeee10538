//! The device registry: one [`BlindCover`] per configured device, indexed
//! by id for the MQTT request dispatcher.

use dashmap::DashMap;
use rumqttc::AsyncClient;
use std::sync::Arc;
use tracing::info;

use crate::cover::BlindCover;
use crate::errors::BlindError;
use crate::settings::{DeviceSettings, Settings};
use crate::store::{JsonFileStore, StateStore};
use crate::transport::{CommandTransport, MqttTransport};

#[derive(Default)]
pub struct BlindHub {
    covers: DashMap<String, BlindCover>,
}

impl BlindHub {
    pub fn new() -> BlindHub {
        BlindHub {
            covers: DashMap::new(),
        }
    }

    /// Builds the full hub: a shared snapshot store plus one MQTT-backed
    /// cover per configured device.
    pub async fn from_settings(
        settings: &Settings,
        client: AsyncClient,
    ) -> Result<BlindHub, BlindError> {
        settings.validate()?;
        let store: Arc<dyn StateStore> =
            Arc::new(JsonFileStore::new(&settings.state_dir).await?);

        let hub = BlindHub::new();
        for device in &settings.devices {
            let transport: Arc<dyn CommandTransport> =
                Arc::new(MqttTransport::new(client.clone(), &device.device_id));
            hub.attach(device, transport, store.clone()).await?;
        }
        Ok(hub)
    }

    pub async fn attach(
        &self,
        device: &DeviceSettings,
        transport: Arc<dyn CommandTransport>,
        store: Arc<dyn StateStore>,
    ) -> Result<(), BlindError> {
        let cover = BlindCover::attach(device, transport, store).await?;
        info!("Mounted blind {} ({})", cover.name(), cover.device_id());
        self.covers.insert(device.device_id.clone(), cover);
        Ok(())
    }

    /// Covers are cheap handles over shared state, so lookups hand out
    /// clones instead of guards.
    pub fn get(&self, device_id: &str) -> Option<BlindCover> {
        self.covers.get(device_id).map(|entry| entry.value().clone())
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.covers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.covers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use crate::variant::DeviceKind;
    use tempfile::TempDir;

    fn device(id: &str) -> DeviceSettings {
        DeviceSettings {
            device_id: id.to_string(),
            kind: DeviceKind::SomfyVenetian,
            open_secs: 1,
            close_secs: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_attach_and_lookup() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn StateStore> =
            Arc::new(JsonFileStore::new(dir.path()).await.unwrap());
        let hub = BlindHub::new();

        hub.attach(&device("kitchen"), Arc::new(RecordingTransport::new()), store.clone())
            .await
            .unwrap();
        hub.attach(&device("bedroom"), Arc::new(RecordingTransport::new()), store)
            .await
            .unwrap();

        assert_eq!(hub.len(), 2);
        assert!(hub.get("kitchen").is_some());
        assert!(hub.get("hallway").is_none());

        let mut ids = hub.device_ids();
        ids.sort();
        assert_eq!(ids, vec!["bedroom", "kitchen"]);
    }

    #[tokio::test]
    async fn test_attach_rejects_invalid_device() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn StateStore> =
            Arc::new(JsonFileStore::new(dir.path()).await.unwrap());
        let hub = BlindHub::new();

        let mut bad = device("kitchen");
        bad.mid_steps = 0;
        let result = hub
            .attach(&bad, Arc::new(RecordingTransport::new()), store)
            .await;
        assert!(matches!(result, Err(BlindError::InvalidConfig(_))));
        assert!(hub.is_empty());
    }
}

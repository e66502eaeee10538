//! Per-device facade: builds the variant strategy, seeds the state machine
//! from the snapshot store and keeps the store updated as the blind moves.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::errors::BlindError;
use crate::machine::{CoverSnapshot, CoverState, SlattedBlind};
use crate::position::{BLIND_POS_CLOSED, BLIND_POS_OPEN, BLIND_POS_TILTED_MAX, steps_from_percent};
use crate::settings::DeviceSettings;
use crate::store::StateStore;
use crate::transport::CommandTransport;
use crate::variant::create_variant;

#[derive(Clone)]
pub struct BlindCover {
    name: String,
    blind: SlattedBlind,
}

impl BlindCover {
    /// Builds the cover for one configured device and spawns its persist
    /// task. A recovered snapshot seeds the state machine; without one the
    /// machine keeps its conservative defaults.
    pub async fn attach(
        device: &DeviceSettings,
        transport: Arc<dyn CommandTransport>,
        store: Arc<dyn StateStore>,
    ) -> Result<BlindCover, BlindError> {
        let (config, variant) = create_variant(device, transport)?;
        let blind = SlattedBlind::new(&device.device_id, config.clone(), variant);

        match store.load(&device.device_id).await? {
            Some(snapshot) => {
                let tilt_step =
                    steps_from_percent(snapshot.tilt_position, config.mid_steps, config.max_steps());
                // A lift position inside the window means the blind was down;
                // anything else can only be trusted as "raised, slats spilled".
                if !config.has_lift || snapshot.position <= BLIND_POS_TILTED_MAX {
                    blind
                        .restore(CoverState::Closed, BLIND_POS_CLOSED, tilt_step)
                        .await;
                } else {
                    blind
                        .restore(CoverState::Open, BLIND_POS_OPEN, config.mid_steps)
                        .await;
                }
            }
            None => {
                info!(device = %device.device_id, "No snapshot found - using attach defaults");
            }
        }

        let changes = blind.changes();
        tokio::spawn(persist_changes(
            device.device_id.clone(),
            changes,
            store,
        ));

        Ok(BlindCover {
            name: device.display_name().to_string(),
            blind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_id(&self) -> &str {
        self.blind.device_id()
    }

    pub fn state(&self) -> CoverSnapshot {
        self.blind.current()
    }

    pub fn current_position(&self) -> u8 {
        let position = self.blind.current().position;
        debug!(device = %self.device_id(), "Reporting position {position}");
        position
    }

    pub fn current_tilt_position(&self) -> u8 {
        let tilt = self.blind.current().tilt_position;
        debug!(device = %self.device_id(), "Reporting tilt position {tilt}");
        tilt
    }

    pub fn is_opening(&self) -> bool {
        self.blind.current().state == CoverState::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.blind.current().state == CoverState::Closing
    }

    pub fn is_closed(&self) -> bool {
        self.blind.current().state == CoverState::Closed
    }

    pub fn changes(&self) -> watch::Receiver<CoverSnapshot> {
        self.blind.changes()
    }

    pub async fn open(&self) {
        self.blind.open().await;
    }

    pub async fn close(&self) {
        self.blind.close().await;
    }

    pub async fn stop(&self) {
        self.blind.stop().await;
    }

    pub async fn set_position(&self, percent: u8) {
        self.blind.set_position(percent).await;
    }

    pub async fn set_tilt_position(&self, percent: u8) {
        self.blind.set_tilt_position(percent).await;
    }

    pub async fn set_mid_position(&self) {
        self.blind.set_mid_position().await;
    }

    pub async fn open_tilt(&self) {
        self.blind.open_tilt().await;
    }

    pub async fn close_tilt(&self) {
        self.blind.close_tilt().await;
    }

    pub async fn stop_tilt(&self) {
        self.blind.stop_tilt().await;
    }
}

async fn persist_changes(
    device_id: String,
    mut changes: watch::Receiver<CoverSnapshot>,
    store: Arc<dyn StateStore>,
) {
    while changes.changed().await.is_ok() {
        let snapshot = *changes.borrow_and_update();
        // Interim travelling snapshots are noise to the store; only a
        // settled position is worth surviving a restart.
        if matches!(snapshot.state, CoverState::Open | CoverState::Closed) {
            if let Err(e) = store.save(&device_id, &snapshot).await {
                error!(device = %device_id, "Failed to persist snapshot: {e}");
            }
        }
    }
}

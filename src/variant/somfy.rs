//! Somfy RFY venetian blinds: full lift plus slat tilt, with a dedicated
//! "my" command that recalls the programmed mid position.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{BlindVariant, VariantConfig, send_repeated};
use crate::transport::{CommandTransport, TransportError};

pub const CMD_STOP: u8 = 0x00; // doubles as "my" when the motor is idle
pub const CMD_UP: u8 = 0x01;
pub const CMD_DOWN: u8 = 0x03;
pub const CMD_UP_05SEC: u8 = 0x0F;
pub const CMD_DOWN_05SEC: u8 = 0x10;
pub const CMD_UP_2SEC: u8 = 0x11;
pub const CMD_DOWN_2SEC: u8 = 0x12;

pub struct SomfyVenetianBlind {
    transport: Arc<dyn CommandTransport>,
    repetitions: u8,
    step_up: u8,
    step_down: u8,
}

impl SomfyVenetianBlind {
    pub fn new(config: &VariantConfig, transport: Arc<dyn CommandTransport>) -> Self {
        // EU motors take the 0.5s pulse pair for a single slat step; the
        // US/venetian-mode firmware wants the 2s pair.
        let (step_up, step_down) = if config.eu_mode {
            (CMD_UP_05SEC, CMD_DOWN_05SEC)
        } else {
            (CMD_UP_2SEC, CMD_DOWN_2SEC)
        };
        Self {
            transport,
            repetitions: config.signal_repetitions,
            step_up,
            step_down,
        }
    }
}

#[async_trait]
impl BlindVariant for SomfyVenetianBlind {
    async fn tilt_to_step(&self, steps: i32, target: u16) -> Result<u16, TransportError> {
        debug!("Somfy venetian tilting {steps} steps towards {target}");
        let code = if steps > 0 { self.step_up } else { self.step_down };
        for _ in 0..steps.unsigned_abs() {
            send_repeated(&self.transport, code, self.repetitions).await?;
        }
        Ok(target)
    }

    async fn open_blind(&self) -> Result<(), TransportError> {
        info!("Somfy venetian opening blind");
        send_repeated(&self.transport, CMD_UP, self.repetitions).await
    }

    async fn close_blind(&self) -> Result<(), TransportError> {
        info!("Somfy venetian closing blind");
        send_repeated(&self.transport, CMD_DOWN, self.repetitions).await
    }

    async fn stop_blind(&self) -> Result<(), TransportError> {
        info!("Somfy venetian stopping blind");
        send_repeated(&self.transport, CMD_STOP, self.repetitions).await
    }

    async fn tilt_to_mid(&self) -> Result<(), TransportError> {
        info!("Somfy venetian recalling my position");
        send_repeated(&self.transport, CMD_STOP, self.repetitions).await
    }
}

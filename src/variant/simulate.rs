//! Generic venetian motor that only understands up/down/stop. Slat tilt is
//! simulated with short pulses and the mid position is substituted with a
//! close pulse, since there is no recall command to lean on.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{BlindVariant, VariantConfig, send_repeated};
use crate::transport::{CommandTransport, TransportError};

pub const CMD_STOP: u8 = 0x00;
pub const CMD_UP: u8 = 0x01;
pub const CMD_DOWN: u8 = 0x03;
pub const CMD_UP_05SEC: u8 = 0x0F;
pub const CMD_DOWN_05SEC: u8 = 0x10;

pub struct SimulatedVenetianBlind {
    transport: Arc<dyn CommandTransport>,
    repetitions: u8,
}

impl SimulatedVenetianBlind {
    pub fn new(config: &VariantConfig, transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            repetitions: config.signal_repetitions,
        }
    }
}

#[async_trait]
impl BlindVariant for SimulatedVenetianBlind {
    async fn tilt_to_step(&self, steps: i32, target: u16) -> Result<u16, TransportError> {
        debug!("Simulated venetian tilting {steps} steps towards {target}");
        let code = if steps > 0 { CMD_UP_05SEC } else { CMD_DOWN_05SEC };
        for _ in 0..steps.unsigned_abs() {
            send_repeated(&self.transport, code, self.repetitions).await?;
        }
        Ok(target)
    }

    async fn open_blind(&self) -> Result<(), TransportError> {
        info!("Simulated venetian opening blind");
        send_repeated(&self.transport, CMD_UP, self.repetitions).await
    }

    async fn close_blind(&self) -> Result<(), TransportError> {
        info!("Simulated venetian closing blind");
        send_repeated(&self.transport, CMD_DOWN, self.repetitions).await
    }

    async fn stop_blind(&self) -> Result<(), TransportError> {
        info!("Simulated venetian stopping blind");
        send_repeated(&self.transport, CMD_STOP, self.repetitions).await
    }

    /// No mid recall exists; a close pulse is the nearest deterministic
    /// anchor. The slats re-home on the next explicit tilt move.
    async fn tilt_to_mid(&self) -> Result<(), TransportError> {
        info!("Simulated venetian substituting close pulse for mid");
        send_repeated(&self.transport, CMD_DOWN, self.repetitions).await
    }
}

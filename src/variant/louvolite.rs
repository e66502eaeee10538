//! Louvolite Vogue vertical blinds: no lift, five preset slat angles
//! addressed directly by command code rather than by incremental pulses.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{BlindVariant, VariantConfig, send_repeated};
use crate::transport::{CommandTransport, TransportError};

pub const CMD_CLOSE_CW: u8 = 0x00;
pub const CMD_CLOSE_CCW: u8 = 0x01;
pub const CMD_45_DEGREES: u8 = 0x02;
pub const CMD_90_DEGREES: u8 = 0x03;
pub const CMD_135_DEGREES: u8 = 0x04;

pub struct LouvoliteVogueBlind {
    transport: Arc<dyn CommandTransport>,
    repetitions: u8,
}

impl LouvoliteVogueBlind {
    pub fn new(config: &VariantConfig, transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            repetitions: config.signal_repetitions,
        }
    }
}

#[async_trait]
impl BlindVariant for LouvoliteVogueBlind {
    /// Step indexes 0..=4 map one-to-one onto the preset angle commands,
    /// so a move is always a single command regardless of distance.
    async fn tilt_to_step(&self, steps: i32, target: u16) -> Result<u16, TransportError> {
        debug!("Vogue vertical tilting {steps} steps towards {target}");
        let code = match target {
            0 => CMD_CLOSE_CCW,
            1 => CMD_45_DEGREES,
            2 => CMD_90_DEGREES,
            3 => CMD_135_DEGREES,
            4 => CMD_CLOSE_CW,
            other => {
                warn!("Vogue vertical has no preset for step {other}");
                return Ok(target.min(4));
            }
        };
        send_repeated(&self.transport, code, self.repetitions).await?;
        Ok(target)
    }

    async fn open_blind(&self) -> Result<(), TransportError> {
        info!("Vogue vertical opening to 90 degrees");
        send_repeated(&self.transport, CMD_90_DEGREES, self.repetitions).await
    }

    async fn close_blind(&self) -> Result<(), TransportError> {
        info!("Vogue vertical closing");
        send_repeated(&self.transport, CMD_CLOSE_CCW, self.repetitions).await
    }

    async fn stop_blind(&self) -> Result<(), TransportError> {
        // Static-tilt motor: there is nothing in flight to stop.
        debug!("Vogue vertical ignoring stop, motor has no lift");
        Ok(())
    }

    async fn tilt_to_mid(&self) -> Result<(), TransportError> {
        info!("Vogue vertical recalling 90 degrees");
        send_repeated(&self.transport, CMD_90_DEGREES, self.repetitions).await
    }
}

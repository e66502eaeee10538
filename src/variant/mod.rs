//! Device-specific command strategies.
//!
//! Every supported blind family shares the same state machine; what differs
//! is how a logical action maps to low-level command codes. Each variant
//! implements [`BlindVariant`] and is constructed once, at discovery time,
//! from its [`crate::settings::DeviceSettings`] entry.

mod louvolite;
mod simulate;
mod somfy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::errors::BlindError;
use crate::settings::DeviceSettings;
use crate::transport::{CommandTransport, TransportError};

pub use louvolite::LouvoliteVogueBlind;
pub use simulate::SimulatedVenetianBlind;
pub use somfy::SomfyVenetianBlind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    SomfyVenetian,
    LouvoliteVogue,
    SimulatedVenetian,
}

/// Immutable per-device tuning, fixed at construction.
#[derive(Debug, Clone)]
pub struct VariantConfig {
    /// Steps from fully tilted to the mid/home angle.
    pub mid_steps: u16,
    /// Device has a direct "go to mid" command (Somfy "my").
    pub has_mid_command: bool,
    /// Device can be stopped and held at an intermediate lift height.
    pub has_lift: bool,
    /// Re-sync on the mid command whenever a tilt move crosses the mid point.
    pub sync_mid_position: bool,
    pub open_secs: u64,
    pub close_secs: u64,
    /// Wall time one discrete tilt step takes.
    pub step_millis: u64,
    pub signal_repetitions: u8,
    /// Somfy regulatory region; selects the pulse-duration command codes.
    pub eu_mode: bool,
}

impl VariantConfig {
    pub fn max_steps(&self) -> u16 {
        self.mid_steps * 2
    }

    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_secs)
    }

    pub fn close_duration(&self) -> Duration {
        Duration::from_secs(self.close_secs)
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_millis(self.step_millis)
    }

    pub fn validate(&self) -> Result<(), BlindError> {
        if self.mid_steps == 0 {
            return Err(BlindError::InvalidConfig(
                "mid_steps must be at least 1".to_string(),
            ));
        }
        // max_steps is 2 * mid_steps and must stay within u16.
        if self.mid_steps > u16::MAX / 2 {
            return Err(BlindError::InvalidConfig(format!(
                "mid_steps must be at most {}",
                u16::MAX / 2
            )));
        }
        if self.open_secs == 0 || self.close_secs == 0 {
            return Err(BlindError::InvalidConfig(
                "open_secs and close_secs must be at least 1".to_string(),
            ));
        }
        if self.step_millis == 0 {
            return Err(BlindError::InvalidConfig(
                "step_millis must be at least 1".to_string(),
            ));
        }
        if self.signal_repetitions == 0 {
            return Err(BlindError::InvalidConfig(
                "signal_repetitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Device-specific sequencing behind the generic state machine.
///
/// Implementations send commands and report transmission failures; they
/// never touch the shared position state.
#[async_trait]
pub trait BlindVariant: Send + Sync {
    /// Moves the slats by `steps` towards step index `target` and returns
    /// the step index actually applied. Not necessarily linear: some
    /// devices map a small target set straight onto preset commands.
    async fn tilt_to_step(&self, steps: i32, target: u16) -> Result<u16, TransportError>;

    async fn open_blind(&self) -> Result<(), TransportError>;

    async fn close_blind(&self) -> Result<(), TransportError>;

    async fn stop_blind(&self) -> Result<(), TransportError>;

    /// Recalls the mid/home tilt angle. Variants without a dedicated mid
    /// command substitute an open/close pulse.
    async fn tilt_to_mid(&self) -> Result<(), TransportError>;
}

/// Builds the validated config and strategy for one configured device.
///
/// Capability flags are a property of the device family, not user input;
/// only the tunables come from settings.
pub fn create_variant(
    device: &DeviceSettings,
    transport: Arc<dyn CommandTransport>,
) -> Result<(VariantConfig, Arc<dyn BlindVariant>), BlindError> {
    let config = match device.kind {
        DeviceKind::SomfyVenetian => VariantConfig {
            mid_steps: device.mid_steps,
            has_mid_command: true,
            has_lift: true,
            sync_mid_position: device.sync_mid,
            open_secs: device.open_secs,
            close_secs: device.close_secs,
            step_millis: device.step_millis,
            signal_repetitions: device.signal_repetitions,
            eu_mode: device.eu_mode,
        },
        DeviceKind::LouvoliteVogue => VariantConfig {
            // The Vogue motor only understands five preset angles:
            // closed-ccw, 45, 90 (home), 135, closed-cw.
            mid_steps: 2,
            has_mid_command: true,
            has_lift: false,
            sync_mid_position: device.sync_mid,
            open_secs: 1,
            close_secs: 1,
            step_millis: device.step_millis,
            signal_repetitions: device.signal_repetitions,
            eu_mode: false,
        },
        DeviceKind::SimulatedVenetian => VariantConfig {
            mid_steps: device.mid_steps,
            has_mid_command: false,
            has_lift: true,
            sync_mid_position: device.sync_mid,
            open_secs: device.open_secs,
            close_secs: device.close_secs,
            step_millis: device.step_millis,
            signal_repetitions: device.signal_repetitions,
            eu_mode: device.eu_mode,
        },
    };
    config.validate()?;

    info!(
        "New blind variant {:?}: midSteps={} maxSteps={} openSecs={} closeSecs={} stepMs={} \
         hasLift={} hasMidCommand={} syncMidPos={} repetitions={} euMode={}",
        device.kind,
        config.mid_steps,
        config.max_steps(),
        config.open_secs,
        config.close_secs,
        config.step_millis,
        config.has_lift,
        config.has_mid_command,
        config.sync_mid_position,
        config.signal_repetitions,
        config.eu_mode,
    );

    let variant: Arc<dyn BlindVariant> = match device.kind {
        DeviceKind::SomfyVenetian => Arc::new(SomfyVenetianBlind::new(&config, transport)),
        DeviceKind::LouvoliteVogue => Arc::new(LouvoliteVogueBlind::new(&config, transport)),
        DeviceKind::SimulatedVenetian => {
            Arc::new(SimulatedVenetianBlind::new(&config, transport))
        }
    };
    Ok((config, variant))
}

/// Sends one code `repetitions` times; RF remotes repeat frames to punch
/// through interference.
pub(crate) async fn send_repeated(
    transport: &Arc<dyn CommandTransport>,
    code: u8,
    repetitions: u8,
) -> Result<(), TransportError> {
    for _ in 0..repetitions {
        transport.send(code).await?;
    }
    Ok(())
}

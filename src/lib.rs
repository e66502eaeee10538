pub mod cover;
pub mod errors;
pub mod hub;
pub mod logging;
pub mod machine;
pub mod position;
pub mod settings;
pub mod store;
pub mod transport;
pub mod variant;

pub use cover::BlindCover;
pub use errors::BlindError;
pub use hub::BlindHub;
pub use machine::{CoverSnapshot, CoverState, SlattedBlind};
pub use settings::{DeviceSettings, Settings};
pub use store::{JsonFileStore, StateStore};
pub use transport::{CommandTransport, MqttTransport, TransportError};
pub use variant::{BlindVariant, DeviceKind, VariantConfig, create_variant};

//! Connection mapping and reading assembly for the Advantech USB-4704 data
//! acquisition module: channel definitions are parsed from the plugin
//! configuration into a connection table, and every poll reads the configured
//! analogue and digital inputs into one named, timestamped reading.

pub mod axumstate;
pub mod channel;
pub mod config;
pub mod connection;
pub mod hardware;
pub mod http;
pub mod poll_task;
pub mod reading;
pub mod session;

pub use channel::{AnalogueChannel, ChannelDefinition, DigitalChannel, SignalType};
pub use config::{ConfigCategory, ConfigError, PluginInfo, plugin_info};
pub use connection::{ConnectionTable, ValidationError};
pub use hardware::{HardwarePort, PortError};
pub use reading::{DatapointValue, HardwareReadError, Reading};
pub use session::{AssetIdentity, ReconfigurationRejected, Session};

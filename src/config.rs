//! Plugin configuration category handed over by the hosting process.
//!
//! Items are either bare values or category item descriptors carrying a `value`
//! and/or `default`, e.g.
//!
//! ```json
//! {
//!     "asset": { "type": "string", "default": "usb4704", "value": "pump" },
//!     "connections": { "flow": { "type": "analogue", "pin": "AI0", "scale": 0.1 } }
//! }
//! ```
//!
//! Without a `connections` item, every item other than `plugin` and `asset` is a
//! channel definition:
//!
//! ```json
//! { "asset": "pump", "flow": { "type": "analogue", "pin": "AI0", "scale": 0.1 } }
//! ```

use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::connection::parse::RawEntries;
use crate::connection::{self, ConnectionTable, ValidationError};
use crate::hardware::PortError;

pub const PLUGIN_NAME: &str = "usb4704";
pub const DEFAULT_ASSET: &str = "usb4704";
const INTERFACE_VERSION: &str = "1.0.0";

/// Items with a meaning of their own, anything else at the top level is a channel
const CATEGORY_ITEMS: [&str; 3] = ["plugin", "asset", "connections"];

/// Connections used when the category does not provide any
pub const DEFAULT_CONNECTIONS: &str = r#"{
    "analogue_example": {
        "type": "analogue",
        "pin": "AI0",
        "scale": 0.1
    },
    "digital_example": {
        "type": "digital",
        "pins": ["DI0", "DI1", "DI2", "DI3"]
    }
}"#;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("configuration category is not valid JSON: {0}")]
    Malformed(String),

    #[error("configuration category must be a JSON object")]
    NotAnObject,

    #[error("configuration item '{item}' is invalid: {reason}")]
    InvalidItem { item: &'static str, reason: String },

    #[error("configuration item '{item}' is given more than once")]
    DuplicateItem { item: String },

    #[error("unknown configuration item '{item}' next to the 'connections' item")]
    UnknownItem { item: String },

    #[error("invalid connections: {0}")]
    Connections(#[from] ValidationError),

    #[error("channel '{channel}' cannot be mapped onto the device: {source}")]
    UnsupportedPin {
        channel: String,
        #[source]
        source: PortError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigCategory {
    items: Map<String, Value>,
    /// Items as written, in document order, when the category came from JSON text
    raw_items: Vec<(String, Box<RawValue>)>,
}

impl ConfigCategory {
    pub fn from_value(category: &Value) -> Result<Self, ConfigError> {
        let items = category.as_object().ok_or(ConfigError::NotAnObject)?;
        Ok(Self {
            items: items.clone(),
            raw_items: Vec::new(),
        })
    }

    /// Decode a category from JSON text. Unlike a decoded `Value`, the text still
    /// shows channel names that are given twice, so those are rejected.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        let mut category = Self::from_value(&value)?;

        let RawEntries::<Box<RawValue>>(raw_items) =
            serde_json::from_str(text).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        for (i, (name, _)) in raw_items.iter().enumerate() {
            let repeated = raw_items[..i].iter().any(|(seen, _)| seen == name);
            if repeated && is_category_item(name) {
                return Err(ConfigError::DuplicateItem { item: name.clone() });
            }
        }
        category.raw_items = raw_items;
        Ok(category)
    }

    /// Value of a category item, looking through item descriptors
    pub fn item(&self, name: &str) -> Option<&Value> {
        let item = self.items.get(name)?;
        if is_descriptor(item) {
            item.get("value").or_else(|| item.get("default"))
        } else {
            Some(item)
        }
    }

    fn raw_item(&self, name: &str) -> Option<&RawValue> {
        self.raw_items
            .iter()
            .find(|(item, _)| item == name)
            .map(|(_, raw)| raw.as_ref())
    }

    pub fn asset(&self) -> Result<Option<String>, ConfigError> {
        self.item("asset")
            .map(|asset| {
                asset
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::InvalidItem {
                        item: "asset",
                        reason: format!("expected a string, got {asset}"),
                    })
            })
            .transpose()
    }

    /// Connections come from the `connections` item, as an object or as JSON text,
    /// or else from the channel items at the top level of the category
    pub fn connections(&self) -> Result<Option<ConnectionTable>, ConfigError> {
        let Some(connections) = self.item("connections") else {
            return self.top_level_channels();
        };
        if let Some(item) = self.items.keys().find(|name| !is_category_item(name)) {
            return Err(ConfigError::UnknownItem { item: item.clone() });
        }

        let written_out = self
            .raw_item("connections")
            .filter(|_| !self.items.get("connections").is_some_and(is_descriptor));
        let table = match (connections, written_out) {
            (Value::String(text), _) => connection::parse_str(text)?,
            (_, Some(raw)) => connection::parse_str(raw.get())?,
            (doc, None) => connection::parse(doc)?,
        };
        Ok(Some(table))
    }

    fn top_level_channels(&self) -> Result<Option<ConnectionTable>, ConfigError> {
        let entries = if self.raw_items.is_empty() {
            self.items
                .iter()
                .filter(|(name, _)| !is_category_item(name))
                .map(|(name, definition)| (name.clone(), definition.clone()))
                .collect::<Vec<_>>()
        } else {
            self.raw_items
                .iter()
                .filter(|(name, _)| !is_category_item(name))
                .map(|(name, raw)| {
                    serde_json::from_str::<Value>(raw.get()).map(|definition| (name.clone(), definition))
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ConfigError::Malformed(err.to_string()))?
        };

        if entries.is_empty() {
            return Ok(None);
        }
        let table = connection::parse_entries(
            entries
                .iter()
                .map(|(name, definition)| (name.as_str(), definition)),
        )?;
        Ok(Some(table))
    }
}

fn is_category_item(name: &str) -> bool {
    CATEGORY_ITEMS.contains(&name)
}

/// A descriptor is an object with a string `type` next to a `value` or `default`.
/// Channel mappings never have a string `type` at their top level.
fn is_descriptor(item: &Value) -> bool {
    item.get("type").is_some_and(Value::is_string)
        && (item.get("value").is_some() || item.get("default").is_some())
}

/// Category the plugin advertises to the host
pub fn default_category() -> Value {
    json!({
        "plugin": {
            "description": "Advantech USB-4704 Data Acquisition Module",
            "type": "string",
            "default": PLUGIN_NAME,
            "readonly": "true"
        },
        "asset": {
            "description": "Asset name to use for readings",
            "type": "string",
            "default": DEFAULT_ASSET,
            "order": "1",
            "displayName": "Asset Name"
        },
        "connections": {
            "description": "Utilisation of connections on USB-4704",
            "type": "JSON",
            "default": DEFAULT_CONNECTIONS,
            "order": "2",
            "displayName": "Connections"
        }
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub flags: u32,
    #[serde(rename = "type")]
    pub plugin_type: &'static str,
    pub interface: &'static str,
    pub config: Value,
}

pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: PLUGIN_NAME,
        version: env!("CARGO_PKG_VERSION"),
        flags: 0,
        plugin_type: "south",
        interface: INTERFACE_VERSION,
        config: default_category(),
    }
}

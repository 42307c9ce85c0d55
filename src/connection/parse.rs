use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::channel::{AnalogueChannel, ChannelDefinition, DigitalChannel, PinId};

use super::ConnectionTable;

/// Digital channels are combined into a u64
pub const MAX_DIGITAL_PINS: usize = 64;

const DEFAULT_SCALE: f64 = 1.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("connections document is not valid JSON: {0}")]
    Malformed(String),

    #[error("connections document must be an object of channel name to channel definition")]
    DocumentNotAnObject,

    #[error("channel '{channel}' must be an object")]
    ChannelNotAnObject { channel: String },

    #[error("channel '{channel}' is missing the '{field}' field")]
    MissingField {
        channel: String,
        field: &'static str,
    },

    #[error("channel '{channel}' has an invalid '{field}' field: {reason}")]
    InvalidField {
        channel: String,
        field: &'static str,
        reason: String,
    },

    #[error("channel '{channel}' has type '{found}', expected 'analogue' or 'digital'")]
    UnknownType { channel: String, found: String },

    #[error("digital channel '{channel}' lists no pins")]
    EmptyPins { channel: String },

    #[error("digital channel '{channel}' lists {count} pins, at most {} are supported", MAX_DIGITAL_PINS)]
    TooManyPins { channel: String, count: usize },

    #[error("channel '{channel}' is defined more than once")]
    DuplicateChannel { channel: String },
}

/// Parse a decoded connections document into a connection table.
/// Every entry is validated before the table is built, any failure discards the whole result.
pub fn parse(doc: &Value) -> Result<ConnectionTable, ValidationError> {
    let entries = doc.as_object().ok_or(ValidationError::DocumentNotAnObject)?;
    parse_entries(entries.iter().map(|(name, definition)| (name.as_str(), definition)))
}

/// Parse raw JSON text, keeping document order and catching channel names given twice
pub fn parse_str(text: &str) -> Result<ConnectionTable, ValidationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| ValidationError::Malformed(err.to_string()))?;
    if !value.is_object() {
        return Err(ValidationError::DocumentNotAnObject);
    }

    let RawEntries::<Value>(entries) = serde_json::from_str(text)
        .map_err(|err| ValidationError::Malformed(err.to_string()))?;
    parse_entries(entries.iter().map(|(name, definition)| (name.as_str(), definition)))
}

/// Parse `(channel name, definition)` pairs in the order given.
/// A name given twice is a `DuplicateChannel` error.
pub fn parse_entries<'a, I>(entries: I) -> Result<ConnectionTable, ValidationError>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let channels = entries
        .into_iter()
        .map(|(name, definition)| parse_channel(name, definition))
        .collect::<Result<Vec<_>, _>>()?;

    ConnectionTable::from_definitions(channels)
}

fn parse_channel(name: &str, definition: &Value) -> Result<ChannelDefinition, ValidationError> {
    let fields = definition
        .as_object()
        .ok_or_else(|| ValidationError::ChannelNotAnObject {
            channel: name.to_string(),
        })?;

    match required_str(name, fields, "type")? {
        "analogue" => parse_analogue(name, fields).map(ChannelDefinition::Analogue),
        "digital" => parse_digital(name, fields).map(ChannelDefinition::Digital),
        other => Err(ValidationError::UnknownType {
            channel: name.to_string(),
            found: other.to_string(),
        }),
    }
}

fn parse_analogue(name: &str, fields: &Map<String, Value>) -> Result<AnalogueChannel, ValidationError> {
    let pin = required_str(name, fields, "pin")?.to_string();

    let scale = match fields.get("scale") {
        None => DEFAULT_SCALE,
        Some(scale) => scale
            .as_f64()
            .filter(|s| s.is_finite())
            .ok_or_else(|| invalid(name, "scale", format!("expected a number, got {scale}")))?,
    };

    Ok(AnalogueChannel {
        name: name.to_string(),
        pin,
        scale,
    })
}

fn parse_digital(name: &str, fields: &Map<String, Value>) -> Result<DigitalChannel, ValidationError> {
    let pins = fields
        .get("pins")
        .ok_or_else(|| missing(name, "pins"))?
        .as_array()
        .ok_or_else(|| invalid(name, "pins", "expected an array of pin names".to_string()))?;

    if pins.is_empty() {
        return Err(ValidationError::EmptyPins {
            channel: name.to_string(),
        });
    }
    if pins.len() > MAX_DIGITAL_PINS {
        return Err(ValidationError::TooManyPins {
            channel: name.to_string(),
            count: pins.len(),
        });
    }

    let pins = pins
        .iter()
        .enumerate()
        .map(|(i, pin)| {
            pin.as_str()
                .map(PinId::from)
                .ok_or_else(|| invalid(name, "pins", format!("entry {i} is not a string: {pin}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DigitalChannel {
        name: name.to_string(),
        pins,
    })
}

fn required_str<'a>(
    channel: &str,
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    let value = fields.get(field).ok_or_else(|| missing(channel, field))?;
    value
        .as_str()
        .ok_or_else(|| invalid(channel, field, format!("expected a string, got {value}")))
}

fn missing(channel: &str, field: &'static str) -> ValidationError {
    ValidationError::MissingField {
        channel: channel.to_string(),
        field,
    }
}

fn invalid(channel: &str, field: &'static str, reason: String) -> ValidationError {
    ValidationError::InvalidField {
        channel: channel.to_string(),
        field,
        reason,
    }
}

/// Top level entries exactly as they appear in the text, duplicates included
pub(crate) struct RawEntries<V>(pub(crate) Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for RawEntries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = RawEntries<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries<V>, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

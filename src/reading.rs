use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::SerializeMap};
use thiserror::Error;
use uom::si::electric_potential::volt;

use crate::channel::{ChannelDefinition, PinId, combine_bits};
use crate::connection::ConnectionTable;
use crate::hardware::{HardwarePort, PortError};
use crate::session::AssetIdentity;

/// A read failed part way through a poll, no reading is produced for that cycle
#[derive(Error, Debug, Clone, PartialEq)]
#[error("reading channel '{channel}' failed")]
pub struct HardwareReadError {
    pub channel: String,
    pub pin: PinId,
    #[source]
    pub source: PortError,
}

/// Value of a single channel within a reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatapointValue {
    /// Scaled analogue input
    Float(f64),
    /// Combined digital inputs
    Integer(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint {
    pub name: String,
    pub value: DatapointValue,
}

/// One timestamped snapshot of every configured channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub asset: String,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "datapoints_as_map")]
    pub values: Vec<Datapoint>,
}

impl Reading {
    pub fn get(&self, name: &str) -> Option<DatapointValue> {
        self.values
            .iter()
            .find(|point| point.name == name)
            .map(|point| point.value)
    }
}

fn datapoints_as_map<S: Serializer>(values: &[Datapoint], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(values.len()))?;
    for Datapoint { name, value } in values {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

/// Read every channel of `table` from the hardware, in table order.
/// The first failing read aborts the whole reading.
pub fn assemble<P: HardwarePort + ?Sized>(
    table: &ConnectionTable,
    asset: &AssetIdentity,
    port: &mut P,
) -> Result<Reading, HardwareReadError> {
    let values = table
        .iter()
        .map(|(name, definition)| {
            read_channel(definition, port).map(|value| Datapoint {
                name: name.to_string(),
                value,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Reading {
        asset: asset.asset_name.clone(),
        timestamp: Utc::now(),
        values,
    })
}

fn read_channel<P: HardwarePort + ?Sized>(
    definition: &ChannelDefinition,
    port: &mut P,
) -> Result<DatapointValue, HardwareReadError> {
    let failed = |pin: &PinId, source| HardwareReadError {
        channel: definition.name().to_string(),
        pin: pin.clone(),
        source,
    };

    match definition {
        ChannelDefinition::Analogue(channel) => {
            let voltage = port
                .read_analogue(&channel.pin)
                .map_err(|err| failed(&channel.pin, err))?;
            Ok(DatapointValue::Float(voltage.get::<volt>() * channel.scale))
        }
        ChannelDefinition::Digital(channel) => {
            let bits = channel
                .pins
                .iter()
                .map(|pin| port.read_digital(pin).map_err(|err| failed(pin, err)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DatapointValue::Integer(combine_bits(bits)))
        }
    }
}

pub mod parse;

use serde::Serialize;

use crate::channel::ChannelDefinition;

pub use parse::{ValidationError, parse, parse_entries, parse_str};

/// Named channel mappings of one device session, in configuration order.
/// Channel names are unique within a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConnectionTable {
    channels: Vec<ChannelDefinition>,
}

impl ConnectionTable {
    /// Build a table from already validated definitions, rejecting duplicate names
    pub fn from_definitions(
        channels: Vec<ChannelDefinition>,
    ) -> Result<Self, ValidationError> {
        let mut table = ConnectionTable {
            channels: Vec::with_capacity(channels.len()),
        };
        for channel in channels {
            if table.get(channel.name()).is_some() {
                return Err(ValidationError::DuplicateChannel {
                    channel: channel.name().to_string(),
                });
            }
            table.channels.push(channel);
        }
        Ok(table)
    }

    /// Swap in a whole new table, handing back the previous one
    pub fn replace(&mut self, new_table: ConnectionTable) -> ConnectionTable {
        let old = std::mem::take(self);
        self.channels = new_table.channels;
        old
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Channels in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChannelDefinition)> {
        self.channels.iter().map(|c| (c.name(), c))
    }

    pub fn get(&self, name: &str) -> Option<&ChannelDefinition> {
        self.channels.iter().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

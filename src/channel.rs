use serde::Serialize;

pub type ChannelName = String;

/// Physical pin identifier in the device's own namespace, e.g. `AI0` or `DI3`
pub type PinId = String;

#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Analogue,
    Digital,
}

/// Single pin voltage input, multiplied by `scale` on every read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalogueChannel {
    pub name: ChannelName,
    pub pin: PinId,
    pub scale: f64,
}

/// Set of digital input pins combined into one integer
/// NOTE: the first pin in `pins` is bit 0 (least significant) of the combined value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitalChannel {
    pub name: ChannelName,
    pub pins: Vec<PinId>,
}

/// One configured connection on the device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelDefinition {
    Analogue(AnalogueChannel),
    Digital(DigitalChannel),
}

impl ChannelDefinition {
    pub fn name(&self) -> &str {
        match self {
            ChannelDefinition::Analogue(c) => &c.name,
            ChannelDefinition::Digital(c) => &c.name,
        }
    }

    pub fn signal_type(&self) -> SignalType {
        match self {
            ChannelDefinition::Analogue(_) => SignalType::Analogue,
            ChannelDefinition::Digital(_) => SignalType::Digital,
        }
    }

    /// All physical pins this channel reads, in read order
    pub fn pins(&self) -> impl Iterator<Item = &PinId> {
        let pins: &[PinId] = match self {
            ChannelDefinition::Analogue(c) => std::slice::from_ref(&c.pin),
            ChannelDefinition::Digital(c) => &c.pins,
        };
        pins.iter()
    }
}

/// Combine digital bits into one value, first bit is the least significant
/// Callers guarantee at most 64 bits.
pub fn combine_bits(bits: impl IntoIterator<Item = bool>) -> u64 {
    bits.into_iter()
        .enumerate()
        .fold(0, |acc, (i, bit)| if bit { acc | (1 << i) } else { acc })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pin_is_least_significant_bit() {
        assert_eq!(combine_bits([true, false, true, true]), 0b1101);
        assert_eq!(combine_bits([true, false]), 1);
        assert_eq!(combine_bits([false, true]), 2);
        assert_eq!(combine_bits([]), 0);
    }

    #[test]
    fn combines_full_width() {
        assert_eq!(combine_bits(std::iter::repeat_n(true, 64)), u64::MAX);
    }

    #[test]
    fn pins_lists_every_physical_pin() {
        let analogue = ChannelDefinition::Analogue(AnalogueChannel {
            name: "a".into(),
            pin: "AI3".into(),
            scale: 1.0,
        });
        let digital = ChannelDefinition::Digital(DigitalChannel {
            name: "d".into(),
            pins: vec!["DI0".into(), "DI4".into()],
        });

        assert_eq!(analogue.pins().collect::<Vec<_>>(), vec!["AI3"]);
        assert_eq!(digital.pins().collect::<Vec<_>>(), vec!["DI0", "DI4"]);
        assert_eq!(digital.signal_type(), SignalType::Digital);
    }
}

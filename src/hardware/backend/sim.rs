use std::collections::{HashMap, HashSet};

use rand::{random_bool, random_range};
use tracing::debug;
use uom::si::{electric_potential::volt, f64::ElectricPotential};

use crate::channel::{PinId, SignalType};
use crate::hardware::{HardwarePort, PortError};

/// The USB-4704 has eight single ended analogue inputs
const ANALOGUE_INPUTS: u8 = 8;
/// and eight digital input lines
const DIGITAL_INPUTS: u8 = 8;
/// Input range of the simulated A/D
const MAX_VOLTAGE: f64 = 10.0;

/// Simulated USB-4704, pins that have no fixed value read random data
#[derive(Debug, Default)]
pub struct Usb4704Sim {
    analogue: HashMap<u8, f64>,
    digital: HashMap<u8, bool>,
    faulty: HashSet<PinId>,
}

impl Usb4704Sim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the voltage returned by an analogue pin
    pub fn with_analogue(mut self, pin: &str, volts: f64) -> Result<Self, PortError> {
        let channel = channel_number(pin, SignalType::Analogue)?;
        self.analogue.insert(channel, volts);
        Ok(self)
    }

    /// Fix the state returned by a digital pin
    pub fn with_digital(mut self, pin: &str, state: bool) -> Result<Self, PortError> {
        let channel = channel_number(pin, SignalType::Digital)?;
        self.digital.insert(channel, state);
        Ok(self)
    }

    /// Make every read of `pin` fail
    pub fn with_fault(mut self, pin: &str) -> Self {
        self.faulty.insert(pin.to_string());
        self
    }

    fn check_fault(&self, pin: &PinId) -> Result<(), PortError> {
        if self.faulty.contains(pin) {
            return Err(PortError::ReadFailed {
                pin: pin.clone(),
                message: "simulated device fault".to_string(),
            });
        }
        Ok(())
    }
}

impl HardwarePort for Usb4704Sim {
    fn read_analogue(&mut self, pin: &PinId) -> Result<ElectricPotential, PortError> {
        let channel = channel_number(pin, SignalType::Analogue)?;
        self.check_fault(pin)?;

        let volts = self
            .analogue
            .get(&channel)
            .copied()
            .unwrap_or_else(|| random_range(-MAX_VOLTAGE..=MAX_VOLTAGE));
        debug!("sim read {pin}: {volts} V");
        Ok(ElectricPotential::new::<volt>(volts))
    }

    fn read_digital(&mut self, pin: &PinId) -> Result<bool, PortError> {
        let channel = channel_number(pin, SignalType::Digital)?;
        self.check_fault(pin)?;

        let state = self
            .digital
            .get(&channel)
            .copied()
            .unwrap_or_else(|| random_bool(0.5));
        debug!("sim read {pin}: {state}");
        Ok(state)
    }

    fn check_pin(&self, pin: &PinId, signal: SignalType) -> Result<(), PortError> {
        channel_number(pin, signal).map(|_| ())
    }
}

/// Map a pin name such as `AI3` or `DI7` to its channel number on the device
fn channel_number(pin: &str, signal: SignalType) -> Result<u8, PortError> {
    let (prefix, count) = match signal {
        SignalType::Analogue => ("AI", ANALOGUE_INPUTS),
        SignalType::Digital => ("DI", DIGITAL_INPUTS),
    };

    // Plain decimal channel numbers only, `AI+1` and `AI01` are not device pins
    pin.strip_prefix(prefix)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .filter(|n| n.len() == 1 || !n.starts_with('0'))
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| *n < count)
        .ok_or_else(|| PortError::InvalidPin {
            pin: pin.to_string(),
            expected: signal,
        })
}

use std::fmt::Debug;

use thiserror::Error;
use uom::si::f64::ElectricPotential;

use crate::channel::{PinId, SignalType};

pub mod backend;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortError {
    #[error("pin '{pin}' is not a valid {expected:?} input on this device")]
    InvalidPin { pin: PinId, expected: SignalType },

    #[error("failed to read pin '{pin}': {message}")]
    ReadFailed { pin: PinId, message: String },
}

/// Capability boundary to the device driver.
/// Reads are synchronous and may block for as long as the driver needs.
pub trait HardwarePort: Debug {
    /// Sample one analogue input
    fn read_analogue(&mut self, pin: &PinId) -> Result<ElectricPotential, PortError>;

    /// Sample one digital input line
    fn read_digital(&mut self, pin: &PinId) -> Result<bool, PortError>;

    /// Check that `pin` exists on the device for the given signal type, before it is read
    fn check_pin(&self, _pin: &PinId, _signal: SignalType) -> Result<(), PortError> {
        Ok(())
    }
}

impl<P: HardwarePort + ?Sized> HardwarePort for Box<P> {
    fn read_analogue(&mut self, pin: &PinId) -> Result<ElectricPotential, PortError> {
        (**self).read_analogue(pin)
    }

    fn read_digital(&mut self, pin: &PinId) -> Result<bool, PortError> {
        (**self).read_digital(pin)
    }

    fn check_pin(&self, pin: &PinId, signal: SignalType) -> Result<(), PortError> {
        (**self).check_pin(pin, signal)
    }
}

use std::sync::{Arc, Mutex};

use crate::{hardware::HardwarePort, reading::Reading, session::Session};

/// Session driving a runtime selected hardware backend
pub type DeviceSession = Session<Box<dyn HardwarePort + Send>>;

/// All shared state between the poll task and http handlers
#[derive(Debug, Clone)]
pub struct AxumState {
    /// The device session, reconfigured through http
    pub session: Arc<DeviceSession>,

    /// Latest successful reading to expose to http
    pub reading: Arc<Mutex<Option<Reading>>>,
}

impl AxumState {
    pub fn new(session: DeviceSession) -> Self {
        Self {
            session: Arc::new(session),
            reading: Arc::new(Mutex::new(None)),
        }
    }
}

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigCategory, ConfigError, DEFAULT_ASSET, DEFAULT_CONNECTIONS};
use crate::connection::{self, ConnectionTable};
use crate::hardware::HardwarePort;
use crate::reading::{HardwareReadError, Reading, assemble};

/// Asset name readings are reported under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetIdentity {
    pub asset_name: String,
}

impl Default for AssetIdentity {
    fn default() -> Self {
        Self {
            asset_name: DEFAULT_ASSET.to_string(),
        }
    }
}

/// A rejected reconfiguration leaves the previous configuration in force
#[derive(Error, Debug, Clone, PartialEq)]
#[error("reconfiguration rejected, previous configuration stays active: {0}")]
pub struct ReconfigurationRejected(#[source] pub ConfigError);

/// Configuration served to polls, only ever replaced as a whole
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveConfig {
    pub asset: AssetIdentity,
    pub connections: ConnectionTable,
}

/// One device session, the handle the hosting process drives:
/// * `init` validates the category and maps the connections onto the device
/// * `poll` reads every channel into one reading
/// * `reconfigure` validates an update in full, then swaps it in atomically
/// * `shutdown` releases the device
#[derive(Debug)]
pub struct Session<P: HardwarePort> {
    active: RwLock<Arc<ActiveConfig>>,
    port: Mutex<P>,
}

impl<P: HardwarePort> Session<P> {
    pub fn init(category: &Value, port: P) -> Result<Self, ConfigError> {
        Self::init_category(ConfigCategory::from_value(category)?, port)
    }

    /// Initialise from a category already decoded, e.g. with [`ConfigCategory::from_json`]
    pub fn init_category(category: ConfigCategory, port: P) -> Result<Self, ConfigError> {
        let asset = AssetIdentity {
            asset_name: category.asset()?.unwrap_or_else(|| DEFAULT_ASSET.to_string()),
        };
        let connections = match category.connections()? {
            Some(table) => table,
            None => {
                info!("no connections configured, using the default connections");
                connection::parse_str(DEFAULT_CONNECTIONS)?
            }
        };
        check_pins(&connections, &port)?;

        info!(
            "session initialised for asset '{}' with {} connections",
            asset.asset_name,
            connections.len()
        );

        Ok(Self {
            active: RwLock::new(Arc::new(ActiveConfig { asset, connections })),
            port: Mutex::new(port),
        })
    }

    /// Take one reading of every configured channel.
    /// The configuration is captured once up front, a concurrent reconfiguration never
    /// changes the channels of a poll already in progress.
    pub fn poll(&self) -> Result<Reading, HardwareReadError> {
        let active = self.snapshot();
        let mut port = self.port.lock().unwrap_or_else(PoisonError::into_inner);

        let reading = assemble(&active.connections, &active.asset, &mut *port)?;
        debug!("poll produced {} values", reading.values.len());
        Ok(reading)
    }

    /// Apply a configuration update, items missing from `update` keep their current value
    pub fn reconfigure(&self, update: &Value) -> Result<(), ReconfigurationRejected> {
        let update = ConfigCategory::from_value(update).map_err(|err| {
            warn!("reconfiguration rejected: {err}");
            ReconfigurationRejected(err)
        })?;
        self.reconfigure_category(update)
    }

    pub fn reconfigure_category(
        &self,
        update: ConfigCategory,
    ) -> Result<(), ReconfigurationRejected> {
        // Hold the write side while validating so concurrent updates cannot interleave,
        // polls that already took their snapshot run to completion against the old config
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);

        info!("validating reconfiguration");
        let next = self.validate_update(&update, &active).map_err(|err| {
            warn!("reconfiguration rejected: {err}");
            ReconfigurationRejected(err)
        })?;

        if **active == next {
            info!("reconfiguration leaves the configuration unchanged");
            return Ok(());
        }

        info!(
            "reconfigured asset '{}' with {} connections",
            next.asset.asset_name,
            next.connections.len()
        );
        *active = Arc::new(next);
        Ok(())
    }

    fn validate_update(
        &self,
        category: &ConfigCategory,
        current: &ActiveConfig,
    ) -> Result<ActiveConfig, ConfigError> {
        let mut next = current.clone();

        if let Some(asset_name) = category.asset()? {
            next.asset = AssetIdentity { asset_name };
        }
        if let Some(table) = category.connections()? {
            let port = self.port.lock().unwrap_or_else(PoisonError::into_inner);
            check_pins(&table, &*port)?;
            next.connections.replace(table);
        }

        Ok(next)
    }

    /// Currently active configuration
    pub fn snapshot(&self) -> Arc<ActiveConfig> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn asset(&self) -> AssetIdentity {
        self.snapshot().asset.clone()
    }

    pub fn connections(&self) -> ConnectionTable {
        self.snapshot().connections.clone()
    }

    /// End the session, handing the hardware port back to the caller
    pub fn shutdown(self) -> P {
        info!("shutting down session for asset '{}'", self.asset().asset_name);
        self.port.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Every pin must exist on the device before a table can go live
fn check_pins<P: HardwarePort + ?Sized>(table: &ConnectionTable, port: &P) -> Result<(), ConfigError> {
    for (name, definition) in table.iter() {
        for pin in definition.pins() {
            port.check_pin(pin, definition.signal_type())
                .map_err(|source| ConfigError::UnsupportedPin {
                    channel: name.to_string(),
                    source,
                })?;
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use serde_json::json;
    use uom::si::{electric_potential::volt, f64::ElectricPotential};

    use super::*;
    use crate::channel::PinId;
    use crate::connection::ValidationError;
    use crate::hardware::PortError;
    use crate::hardware::backend::sim::Usb4704Sim;
    use crate::reading::DatapointValue;

    fn sim() -> Usb4704Sim {
        Usb4704Sim::new()
            .with_analogue("AI0", 50.0)
            .unwrap()
            .with_analogue("AI1", 2.5)
            .unwrap()
            .with_digital("DI0", true)
            .unwrap()
            .with_digital("DI1", false)
            .unwrap()
    }

    #[test]
    fn init_uses_defaults_for_missing_items() {
        let session = Session::init(&json!({}), sim()).unwrap();

        assert_eq!(session.asset(), AssetIdentity::default());
        let names: Vec<_> = session
            .connections()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(names, vec!["analogue_example", "digital_example"]);
    }

    #[test]
    fn init_rejects_pins_outside_device_namespace() {
        let err = Session::init(
            &json!({"connections": {"a": {"type": "analogue", "pin": "AI9"}}}),
            sim(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::UnsupportedPin {
                channel: "a".into(),
                source: PortError::InvalidPin {
                    pin: "AI9".into(),
                    expected: crate::channel::SignalType::Analogue
                }
            }
        );
    }

    #[test]
    fn poll_reports_asset_and_values() {
        let session = Session::init(
            &json!({
                "asset": "pump",
                "connections": {
                    "flow": {"type": "analogue", "pin": "AI0", "scale": 0.1},
                    "valves": {"type": "digital", "pins": ["DI0", "DI1"]}
                }
            }),
            sim(),
        )
        .unwrap();

        let reading = session.poll().unwrap();

        assert_eq!(reading.asset, "pump");
        assert_eq!(reading.get("flow"), Some(DatapointValue::Float(50.0 * 0.1)));
        assert_eq!(reading.get("valves"), Some(DatapointValue::Integer(1)));
    }

    #[test]
    fn repeated_polls_differ_only_in_timestamp() {
        let session = Session::init(
            &json!({"connections": {"flow": {"type": "analogue", "pin": "AI1"}}}),
            sim(),
        )
        .unwrap();

        let first = session.poll().unwrap();
        let second = session.poll().unwrap();

        assert_eq!(first.asset, second.asset);
        assert_eq!(first.values, second.values);
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn reconfigure_replaces_table_and_asset() {
        let session = Session::init(&json!({}), sim()).unwrap();

        session
            .reconfigure(&json!({
                "asset": "tank",
                "connections": {"level": {"type": "analogue", "pin": "AI1", "scale": 2.0}}
            }))
            .unwrap();

        let reading = session.poll().unwrap();
        assert_eq!(reading.asset, "tank");
        assert_eq!(reading.values.len(), 1);
        assert_eq!(reading.get("level"), Some(DatapointValue::Float(5.0)));
    }

    #[test]
    fn reconfigure_keeps_items_not_in_update() {
        let session = Session::init(&json!({"asset": "pump"}), sim()).unwrap();
        let before = session.connections();

        session.reconfigure(&json!({"asset": "tank"})).unwrap();

        assert_eq!(session.asset().asset_name, "tank");
        assert_eq!(session.connections(), before);
    }

    #[test]
    fn rejected_reconfiguration_changes_nothing() {
        let session = Session::init(&json!({"asset": "pump"}), sim()).unwrap();
        let before = session.snapshot();

        let err = session
            .reconfigure(&json!({
                "asset": "tank",
                "connections": {
                    "ok": {"type": "analogue", "pin": "AI0"},
                    "bad": {"type": "thermocouple", "pin": "AI1"}
                }
            }))
            .unwrap_err();

        assert!(matches!(err.0, ConfigError::Connections(_)));
        assert_eq!(*session.snapshot(), *before);
        assert_eq!(session.poll().unwrap().asset, "pump");
    }

    #[test]
    fn reconfiguration_with_unknown_pin_is_rejected() {
        let session = Session::init(&json!({}), sim()).unwrap();
        let before = session.connections();

        let err = session
            .reconfigure(&json!({"connections": {"d": {"type": "digital", "pins": ["DI0", "AI0"]}}}))
            .unwrap_err();

        assert!(matches!(err.0, ConfigError::UnsupportedPin { .. }));
        assert_eq!(session.connections(), before);
    }

    /// Blocks inside the first analogue read until the test lets it go
    #[derive(Debug)]
    struct GatedPort {
        gate: Arc<Barrier>,
        blocking: bool,
    }

    impl HardwarePort for GatedPort {
        fn read_analogue(&mut self, _pin: &PinId) -> Result<ElectricPotential, PortError> {
            if std::mem::take(&mut self.blocking) {
                // read started
                self.gate.wait();
                // released
                self.gate.wait();
            }
            Ok(ElectricPotential::new::<volt>(1.0))
        }

        fn read_digital(&mut self, _pin: &PinId) -> Result<bool, PortError> {
            Ok(true)
        }
    }

    #[test]
    fn poll_in_flight_finishes_against_its_snapshot() {
        let gate = Arc::new(Barrier::new(2));
        let session = Session::init(
            &json!({"asset": "pump", "flow": {"type": "analogue", "pin": "AI0"}}),
            GatedPort {
                gate: gate.clone(),
                blocking: true,
            },
        )
        .unwrap();

        thread::scope(|s| {
            let poll = s.spawn(|| session.poll());
            gate.wait();

            // Swaps while the poll is blocked on the hardware
            session.reconfigure(&json!({"asset": "tank"})).unwrap();
            assert_eq!(session.asset().asset_name, "tank");

            // Needs the port to check pins, so waits for the poll
            let swap = s.spawn(|| {
                session.reconfigure(&json!({"level": {"type": "digital", "pins": ["DI0"]}}))
            });

            gate.wait();
            let reading = poll.join().unwrap().unwrap();
            assert_eq!(reading.asset, "pump");
            let names: Vec<_> = reading.values.iter().map(|point| point.name.as_str()).collect();
            assert_eq!(names, vec!["flow"]);

            swap.join().unwrap().unwrap();
        });

        let reading = session.poll().unwrap();
        assert_eq!(reading.asset, "tank");
        assert_eq!(reading.get("flow"), None);
        assert_eq!(reading.get("level"), Some(DatapointValue::Integer(1)));
    }

    #[test]
    fn init_reads_top_level_channels() {
        let session = Session::init(
            &json!({"asset": "pump", "flow": {"type": "analogue", "pin": "AI0", "scale": 0.1}}),
            sim(),
        )
        .unwrap();

        let reading = session.poll().unwrap();
        assert_eq!(reading.asset, "pump");
        assert_eq!(reading.values.len(), 1);
        assert_eq!(reading.get("flow"), Some(DatapointValue::Float(5.0)));
    }

    #[test]
    fn reconfigure_with_invalid_top_level_channel_is_rejected() {
        let session = Session::init(&json!({}), sim()).unwrap();
        let before = session.snapshot();

        let err = session
            .reconfigure(&json!({"x": {"type": "counter", "pin": "AI0"}}))
            .unwrap_err();

        assert!(matches!(
            err.0,
            ConfigError::Connections(ValidationError::UnknownType { .. })
        ));
        assert_eq!(*session.snapshot(), *before);
    }

    #[test]
    fn init_from_json_text_rejects_repeated_channel() {
        let category = ConfigCategory::from_json(
            r#"{"connections": {
                "a": {"type": "analogue", "pin": "AI0"},
                "a": {"type": "digital", "pins": ["DI0"]}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            Session::init_category(category, sim()).unwrap_err(),
            ConfigError::Connections(ValidationError::DuplicateChannel { channel: "a".into() })
        );
    }

    #[test]
    fn active_config_serializes_asset_as_name() {
        let session = Session::init(
            &json!({"asset": "pump", "connections": {"flow": {"type": "analogue", "pin": "AI0"}}}),
            sim(),
        )
        .unwrap();

        let json = serde_json::to_value(session.snapshot().as_ref()).unwrap();
        assert_eq!(json["asset"], "pump");
    }

    #[test]
    fn failed_poll_leaves_table_intact() {
        let session = Session::init(
            &json!({"connections": {"flow": {"type": "analogue", "pin": "AI2"}}}),
            sim().with_fault("AI2"),
        )
        .unwrap();
        let before = session.connections();

        let err = session.poll().unwrap_err();

        assert_eq!(err.channel, "flow");
        assert_eq!(session.connections(), before);
    }

    #[test]
    fn shutdown_returns_port() {
        let session = Session::init(&json!({}), sim()).unwrap();
        let mut port = session.shutdown();
        assert!(port.read_digital(&"DI0".to_string()).unwrap());
    }
}

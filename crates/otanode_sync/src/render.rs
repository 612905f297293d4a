//! Rendering of the per-device configuration file.
//!
//! The output is deterministic: sensors are ordered by name and the JSON is
//! pretty-printed with a trailing newline, so the same registry entry always
//! produces the same content hash.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The supported sensor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// DHT22 temperature/humidity sensor.
    Dht,
    /// BME280 environmental sensor.
    Bme,
    /// MH-Z19 CO2 sensor.
    Mhz,
    /// SDS011 particulate sensor.
    Sds,
    /// Interrupt-driven pulse counter.
    Counter,
}

impl SensorKind {
    /// The kind of port this sensor is attached to.
    pub fn port_type(self) -> PortType {
        match self {
            SensorKind::Dht | SensorKind::Counter => PortType::Pin,
            SensorKind::Bme => PortType::I2c,
            SensorKind::Mhz | SensorKind::Sds => PortType::Uart,
        }
    }
}

/// A hardware port family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortType {
    /// A GPIO pin.
    Pin,
    /// An I2C bus.
    #[serde(rename = "I2C")]
    I2c,
    /// A UART.
    #[serde(rename = "UART")]
    Uart,
}

impl PortType {
    /// Name as written in port specifications.
    pub fn as_str(self) -> &'static str {
        match self {
            PortType::Pin => "Pin",
            PortType::I2c => "I2C",
            PortType::Uart => "UART",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete port, e.g. `Pin(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Port {
    /// Port family.
    pub kind: PortType,
    /// Index within the family.
    pub index: u32,
}

impl Port {
    /// Parses `<Type>(<index>)`, requiring the given port type.
    pub fn parse(spec: &str, expected: PortType) -> Option<Self> {
        let inner = spec
            .trim()
            .strip_prefix(expected.as_str())?
            .strip_prefix('(')?
            .strip_suffix(')')?;
        if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index = inner.parse().ok()?;
        Some(Self {
            kind: expected,
            index,
        })
    }
}

/// A sensor as declared in the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Sensor family.
    #[serde(rename = "type")]
    pub kind: SensorKind,
    /// Port specification, e.g. `Pin(4)`.
    pub port: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
struct RenderedSensor<'a> {
    #[serde(rename = "type")]
    kind: SensorKind,
    port: Port,
    description: &'a str,
}

#[derive(Serialize)]
struct RenderedConfig<'a> {
    hostname: &'a str,
    sensors: BTreeMap<&'a str, RenderedSensor<'a>>,
}

/// Renders the configuration file content for a device.
///
/// # Errors
///
/// Fails naming the first sensor whose port does not match its kind.
pub fn render_config(
    hostname: &str,
    sensors: &BTreeMap<String, SensorSpec>,
) -> SyncResult<Vec<u8>> {
    let mut rendered = BTreeMap::new();
    for (name, spec) in sensors {
        let expected = spec.kind.port_type();
        let port = Port::parse(&spec.port, expected).ok_or_else(|| SyncError::Sensor {
            sensor: name.clone(),
            reason: format!(
                "invalid port specification '{}' (sensor type {:?} needs port type {expected})",
                spec.port, spec.kind
            ),
        })?;
        rendered.insert(
            name.as_str(),
            RenderedSensor {
                kind: spec.kind,
                port,
                description: &spec.description,
            },
        );
    }

    let config = RenderedConfig {
        hostname,
        sensors: rendered,
    };
    let mut bytes = serde_json::to_vec_pretty(&config)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(kind: SensorKind, port: &str) -> SensorSpec {
        SensorSpec {
            kind,
            port: port.into(),
            description: "test".into(),
        }
    }

    #[test]
    fn port_types_by_kind() {
        assert_eq!(SensorKind::Dht.port_type(), PortType::Pin);
        assert_eq!(SensorKind::Bme.port_type(), PortType::I2c);
        assert_eq!(SensorKind::Mhz.port_type(), PortType::Uart);
        assert_eq!(SensorKind::Sds.port_type(), PortType::Uart);
        assert_eq!(SensorKind::Counter.port_type(), PortType::Pin);
    }

    #[test]
    fn port_parsing() {
        assert_eq!(
            Port::parse("Pin(4)", PortType::Pin),
            Some(Port {
                kind: PortType::Pin,
                index: 4
            })
        );
        assert_eq!(Port::parse("UART(2)", PortType::Uart).map(|p| p.index), Some(2));
        assert_eq!(Port::parse("Pin(4)", PortType::I2c), None);
        assert_eq!(Port::parse("Pin()", PortType::Pin), None);
        assert_eq!(Port::parse("Pin(-1)", PortType::Pin), None);
        assert_eq!(Port::parse("Pin(4) extra", PortType::Pin), None);
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut sensors = BTreeMap::new();
        sensors.insert("outdoor".to_string(), sensor(SensorKind::Bme, "I2C(0)"));
        sensors.insert("door".to_string(), sensor(SensorKind::Counter, "Pin(12)"));

        let first = render_config("node1", &sensors).unwrap();
        let second = render_config("node1", &sensors.clone()).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with(b"}\n"));

        let value: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(value["hostname"], "node1");
        assert_eq!(value["sensors"]["outdoor"]["type"], "bme");
        assert_eq!(value["sensors"]["outdoor"]["port"]["kind"], "I2C");
        assert_eq!(value["sensors"]["door"]["port"]["index"], 12);

        let text = String::from_utf8(first).unwrap();
        assert!(text.find("\"door\"").unwrap() < text.find("\"outdoor\"").unwrap());
    }

    #[test]
    fn wrong_port_names_the_sensor() {
        let mut sensors = BTreeMap::new();
        sensors.insert("co2".to_string(), sensor(SensorKind::Mhz, "Pin(3)"));
        let err = render_config("node1", &sensors).unwrap_err();
        assert!(matches!(err, SyncError::Sensor { ref sensor, .. } if sensor == "co2"));
        assert!(err.to_string().contains("needs port type UART"));
    }

    #[test]
    fn sensor_kind_from_json() {
        let spec: SensorSpec =
            serde_json::from_str(r#"{"type": "sds", "port": "UART(1)"}"#).unwrap();
        assert_eq!(spec.kind, SensorKind::Sds);
        assert_eq!(spec.description, "");
        let unknown = r#"{"type": "lidar", "port": "Pin(1)"}"#;
        assert!(serde_json::from_str::<SensorSpec>(unknown).is_err());
    }
}

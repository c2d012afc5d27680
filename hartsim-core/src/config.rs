use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Simulator configuration: the serial port to listen on and the device
/// spec files to instantiate.  An empty device list selects the built-in
/// demo pair.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
	pub port: String,
	#[serde(default)]
	pub devices: Vec<PathBuf>,
}

impl Configuration {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Configuration, Error> {
		let file = File::open(path)?;
		let configuration = serde_json::from_reader(BufReader::new(file))?;
		Ok(configuration)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_port_reading() {
		let configuration: Configuration =
			serde_json::from_str(r#"{"port": "Qwerty123"}"#).unwrap();
		assert_eq!(configuration.port, "Qwerty123");
		assert!(configuration.devices.is_empty());
	}

	#[test]
	fn test_device_list_reading() {
		let configuration: Configuration = serde_json::from_str(
			r#"{"port": "/dev/ttyUSB0", "devices": ["specs/a.json", "specs/b.json"]}"#,
		)
		.unwrap();
		assert_eq!(configuration.devices.len(), 2);
	}

	#[test]
	fn test_missing_port_fails() {
		let result: Result<Configuration, _> = serde_json::from_str(r#"{"devices": []}"#);
		assert!(result.is_err());
	}
}

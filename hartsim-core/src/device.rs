use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::error::Error;
use crate::payload::{Ascii, PackedAscii, Value, F32, U16, U24, U32, U8};

const UNIQUE_ADDRESS_MASK: u64 = 0x3F_FFFF_FFFF;
const DEFAULT_STRING_SIZE: usize = 32;

/// One measurement slot on the device, indexed by its variable code.
#[derive(Debug, Clone)]
pub struct DeviceVariable {
	pub units: U8,
	pub alternate_units: U8,
	pub value: F32,
	pub min_seen: F32,
	pub max_seen: F32,
	pub urv: F32,
	pub lrv: F32,
	pub classification: U8,
	pub status: U8,
}

impl Default for DeviceVariable {
	fn default() -> DeviceVariable {
		DeviceVariable {
			units: U8::default(),
			alternate_units: U8::default(),
			value: F32::default(),
			min_seen: F32::new(f32::MAX),
			max_seen: F32::new(f32::MIN),
			urv: F32::default(),
			lrv: F32::default(),
			classification: U8::default(),
			status: U8::default(),
		}
	}
}

impl DeviceVariable {
	pub fn new(units: i64, value: f32, alternate_units: i64, status: i64) -> DeviceVariable {
		DeviceVariable {
			units: U8::new(units),
			alternate_units: U8::new(alternate_units),
			value: F32::new(value),
			status: U8::new(status),
			..DeviceVariable::default()
		}
	}
}

/// A device-specific command declared in a spec file: ordered variable names
/// decoded from the request and encoded into the reply.
#[derive(Debug, Clone)]
pub struct DeviceCommand {
	pub request: Vec<String>,
	pub reply: Vec<String>,
}

/// All mutable state of one simulated HART device.
///
/// The device is pure data: only command handlers read or mutate it, and the
/// data-link loop owns it exclusively.
#[derive(Debug, Clone)]
pub struct HartDevice {
	pub device_variables: HashMap<u8, DeviceVariable>,
	pub dynamic_variables: [u8; 4],
	// HART identification
	pub polling_address: U8,
	pub expanded_device_type: U16,
	pub device_id: U24,
	pub is_burst_mode: bool,
	pub hart_tag: PackedAscii,
	pub hart_descriptor: PackedAscii,
	pub hart_date: U24,
	pub hart_message: PackedAscii,
	pub hart_long_tag: Ascii,
	pub universal_revision: U8,
	// HART status
	pub device_status: U8,
	pub extended_device_status: U8,
	// HART parameters
	pub config_change_counter: U16,
	// Analog output
	pub loop_current_mode: U8,
	pub loop_current: F32,
	pub percent_of_range: F32,
	pub is_fixed_current_mode: bool,
	pub pv_damping: F32,
	pub device_specific_status_0: U8,
	pub alternate_device_specific_status_0: U8,
	pub display_parameters: U16,
	pub alarm_saturation_setting: U8,
	pub high_alarm_level: F32,
	pub low_alarm_level: F32,
	pub high_saturation_level: F32,
	pub low_saturation_level: F32,
	/// Variable codes whose simulated reading is diverted here instead of
	/// overwriting the stored value.
	pub simulated_variables: HashMap<u8, f32>,
	// Spec-driven state
	pub data: HashMap<String, Value>,
	pub commands: HashMap<u16, DeviceCommand>,
}

fn default_device_variables() -> HashMap<u8, DeviceVariable> {
	let mut variables = HashMap::new();
	variables.insert(0, DeviceVariable::new(12, 1.2345, 65, 192)); // pressure
	variables.insert(1, DeviceVariable::new(32, 23.456, 0, 192)); // temperature
	variables.insert(2, DeviceVariable::new(241, 345.67, 0, 192)); // flow
	variables.insert(3, DeviceVariable::new(241, 4567.8, 0, 192)); // totalizer
	variables.insert(4, DeviceVariable::new(45, 5.6789, 0, 192)); // level
	variables.insert(5, DeviceVariable::new(41, 67.890, 0, 192)); // volume
	variables
}

impl Default for HartDevice {
	fn default() -> HartDevice {
		HartDevice {
			device_variables: default_device_variables(),
			dynamic_variables: [0, 1, 2, 3],
			polling_address: U8::new(0),
			expanded_device_type: U16::new(0x2606),
			device_id: U24::new(0x123456),
			is_burst_mode: false,
			hart_tag: PackedAscii::with_value(8, "????????"),
			hart_descriptor: PackedAscii::with_value(16, "????????????????"),
			hart_date: U24::new(0x010100),
			hart_message: PackedAscii::with_value(32, &"?".repeat(32)),
			hart_long_tag: Ascii::with_value(32, ""),
			universal_revision: U8::new(7),
			device_status: U8::default(),
			extended_device_status: U8::default(),
			config_change_counter: U16::new(0),
			loop_current_mode: U8::new(1),
			loop_current: F32::new(4.321),
			percent_of_range: F32::new(0.0200625),
			is_fixed_current_mode: false,
			pv_damping: F32::new(1.23),
			device_specific_status_0: U8::new(0x02),
			alternate_device_specific_status_0: U8::default(),
			display_parameters: U16::new(0xAAAA),
			alarm_saturation_setting: U8::new(1),
			high_alarm_level: F32::new(23.0),
			low_alarm_level: F32::new(3.4),
			high_saturation_level: F32::new(22.8),
			low_saturation_level: F32::new(3.9),
			simulated_variables: HashMap::new(),
			data: HashMap::new(),
			commands: HashMap::new(),
		}
	}
}

fn clock_seconds() -> f64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_secs_f64())
		.unwrap_or(0.0)
}

impl HartDevice {
	/// The 38-bit unique address: expanded device type over device id, with
	/// the two reserved top bits cleared.
	pub fn unique_address(&self) -> u64 {
		((u64::from(self.expanded_device_type.get_value()) << 24)
			| u64::from(self.device_id.get_value()))
			& UNIQUE_ADDRESS_MASK
	}

	pub fn variable(&self, code: u8) -> Result<&DeviceVariable, Error> {
		self.device_variables
			.get(&code)
			.ok_or(Error::UnknownDeviceVariable(code))
	}

	pub fn variable_mut(&mut self, code: u8) -> Result<&mut DeviceVariable, Error> {
		self.device_variables
			.get_mut(&code)
			.ok_or(Error::UnknownDeviceVariable(code))
	}

	pub fn record_config_change(&mut self) {
		let count = i64::from(self.config_change_counter.get_value());
		self.config_change_counter.set_value(count + 1);
	}

	/// Recomputes the loop current and every device variable from the
	/// process clock.
	///
	/// Variables registered in `simulated_variables` keep their stored value;
	/// the fresh reading lands in the side table instead.  `min_seen` and
	/// `max_seen` track the readings monotonically either way.
	pub fn update_variables(&mut self) {
		let now = clock_seconds();
		if !self.is_fixed_current_mode {
			let current = 3.5 + (1.0 + (now / 36.0).sin()) / 2.0 * 17.0;
			self.loop_current.set_value(current as f32);
		}

		let min_value = -5.0f64;
		let max_value = 255.0f64;
		let values_range = max_value - min_value;
		let count = self.device_variables.len();
		if count == 0 {
			return;
		}

		// ascending code order keeps the per-index phase offsets stable
		let mut codes: Vec<u8> = self.device_variables.keys().copied().collect();
		codes.sort_unstable();
		for (index, code) in codes.into_iter().enumerate() {
			let phase = 2.0 * std::f64::consts::PI * index as f64 / count as f64;
			let new_value = min_value + (1.0 + ((now - phase) / 32.0).sin()) / 2.0 * values_range;
			if let Some(variable) = self.device_variables.get_mut(&code) {
				if self.simulated_variables.contains_key(&code) {
					self.simulated_variables.insert(code, new_value as f32);
				} else {
					variable.value.set_value(new_value as f32);
				}
				if f64::from(variable.min_seen.get_value()) > new_value {
					variable.min_seen.set_value(new_value as f32);
				}
				if f64::from(variable.max_seen.get_value()) < new_value {
					variable.max_seen.set_value(new_value as f32);
				}
			}
		}
	}

	/// Builds a device from a declarative spec.
	///
	/// `polling_address`, `response_code`, `expanded_device_type`, and
	/// `device_id` must be declared with their exact types; every command
	/// field must refer to a declared variable.  Recognized well-known
	/// variable names are adopted into the typed device state.
	pub fn from_spec(spec: &DeviceSpec) -> Result<HartDevice, Error> {
		let mut data = HashMap::new();
		for variable in &spec.variables {
			data.insert(variable.name.clone(), variable.build()?);
		}

		let polling_address = match data.get("polling_address") {
			Some(Value::U8(field)) => *field,
			_ => {
				return Err(Error::InvalidDeviceSpec(
					"polling_address must be U8".to_string(),
				))
			}
		};
		match data.get("response_code") {
			Some(Value::U8(_)) => {}
			_ => {
				return Err(Error::InvalidDeviceSpec(
					"response_code must be U8".to_string(),
				))
			}
		}
		let expanded_device_type = match data.get("expanded_device_type") {
			Some(Value::U16(field)) => *field,
			_ => {
				return Err(Error::InvalidDeviceSpec(
					"expanded_device_type must be U16".to_string(),
				))
			}
		};
		let device_id = match data.get("device_id") {
			Some(Value::U24(field)) => *field,
			_ => {
				return Err(Error::InvalidDeviceSpec(
					"device_id must be U24".to_string(),
				))
			}
		};

		let mut commands = HashMap::new();
		for command in &spec.commands {
			for field in command.request.iter().chain(command.reply.iter()) {
				if !data.contains_key(&field.name) {
					return Err(Error::InvalidDeviceSpec(format!(
						"command {} refers to undeclared variable `{}`",
						command.number, field.name
					)));
				}
			}
			commands.insert(
				command.number,
				DeviceCommand {
					request: command.request.iter().map(|field| field.name.clone()).collect(),
					reply: command.reply.iter().map(|field| field.name.clone()).collect(),
				},
			);
		}

		let mut device = HartDevice {
			polling_address,
			expanded_device_type,
			device_id,
			data,
			commands,
			..HartDevice::default()
		};
		device.adopt_well_known_variables();
		Ok(device)
	}

	fn adopt_well_known_variables(&mut self) {
		for (name, value) in &self.data {
			match (name.as_str(), value) {
				("device_status", Value::U8(field)) => self.device_status = *field,
				("extended_device_status", Value::U8(field)) => {
					self.extended_device_status = *field
				}
				("universal_revision", Value::U8(field)) => self.universal_revision = *field,
				("config_change_counter", Value::U16(field)) => {
					self.config_change_counter = *field
				}
				("loop_current_mode", Value::U8(field)) => self.loop_current_mode = *field,
				("loop_current", Value::F32(field)) => self.loop_current = *field,
				("percent_of_range", Value::F32(field)) => self.percent_of_range = *field,
				("pv_damping", Value::F32(field)) => self.pv_damping = *field,
				("hart_date", Value::U24(field)) => self.hart_date = *field,
				("hart_tag", Value::PackedAscii(field)) => {
					self.hart_tag.set_value(&field.get_value())
				}
				("hart_descriptor", Value::PackedAscii(field)) => {
					self.hart_descriptor.set_value(&field.get_value())
				}
				("hart_message", Value::PackedAscii(field)) => {
					self.hart_message.set_value(&field.get_value())
				}
				("hart_long_tag", Value::Ascii(field)) => {
					self.hart_long_tag.set_value(field.get_value())
				}
				_ => {}
			}
		}
	}
}

/// Declarative per-device spec, loaded from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSpec {
	pub variables: Vec<VariableSpec>,
	pub commands: Vec<CommandSpec>,
}

impl DeviceSpec {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<DeviceSpec, Error> {
		let file = File::open(path)?;
		let spec = serde_json::from_reader(BufReader::new(file))?;
		Ok(spec)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum VariableKind {
	U8,
	U16,
	U24,
	U32,
	F32,
	Ascii,
	PackedAscii,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableSpec {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: VariableKind,
	#[serde(default)]
	pub value: Option<serde_json::Value>,
	/// Unpacked character count for Ascii/PackedAscii variables.
	#[serde(default)]
	pub size: Option<usize>,
}

impl VariableSpec {
	fn integer_value(&self) -> Result<i64, Error> {
		match &self.value {
			None => Ok(0),
			Some(value) => value.as_i64().ok_or_else(|| {
				Error::InvalidDeviceSpec(format!(
					"variable `{}` needs an integer value",
					self.name
				))
			}),
		}
	}

	fn float_value(&self) -> Result<f64, Error> {
		match &self.value {
			None => Ok(0.0),
			Some(value) => value.as_f64().ok_or_else(|| {
				Error::InvalidDeviceSpec(format!("variable `{}` needs a number value", self.name))
			}),
		}
	}

	fn string_value(&self) -> Result<&str, Error> {
		match &self.value {
			None => Ok(""),
			Some(value) => value.as_str().ok_or_else(|| {
				Error::InvalidDeviceSpec(format!("variable `{}` needs a string value", self.name))
			}),
		}
	}

	pub fn build(&self) -> Result<Value, Error> {
		let size = self.size.unwrap_or(DEFAULT_STRING_SIZE);
		let value = match self.kind {
			VariableKind::U8 => Value::U8(U8::new(self.integer_value()?)),
			VariableKind::U16 => Value::U16(U16::new(self.integer_value()?)),
			VariableKind::U24 => Value::U24(U24::new(self.integer_value()?)),
			VariableKind::U32 => Value::U32(U32::new(self.integer_value()?)),
			VariableKind::F32 => Value::F32(F32::new(self.float_value()? as f32)),
			VariableKind::Ascii => Value::Ascii(Ascii::with_value(size, self.string_value()?)),
			VariableKind::PackedAscii => {
				Value::PackedAscii(PackedAscii::with_value(size, self.string_value()?))
			}
		};
		Ok(value)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
	pub number: u16,
	pub request: Vec<FieldRef>,
	pub reply: Vec<FieldRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldRef {
	pub name: String,
}

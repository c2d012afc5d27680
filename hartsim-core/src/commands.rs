use std::io::Cursor;

use crate::device::HartDevice;
use crate::error::Error;
use crate::framing::{FrameType, HartFrame};
use crate::payload::{
	payload_sequence, Ascii, GreedyU8Array, PackedAscii, Payload, PayloadSequence, F32, U16,
	U24, U32, U8,
};

/// Command 31 wraps a 16-bit extended command number around its payload.
pub const EXTENDED_COMMAND: u16 = 31;
/// Response code 2: the request selected something the device does not have.
pub const INVALID_SELECTION: u8 = 2;
/// Response code 64, also used for undecodable requests.
pub const COMMAND_NOT_IMPLEMENTED: u8 = 64;

/// True when `frame` is a request this device must answer: an STX frame
/// addressed to the device's unique address, or the short-address
/// identification poll (command 0) at its polling address.
pub fn should_dispatch(device: &HartDevice, frame: &HartFrame) -> bool {
	if frame.frame_type != FrameType::Stx {
		return false;
	}
	if frame.is_long_address {
		frame.long_address == device.unique_address()
	} else {
		frame.command_number == 0
			&& u32::from(frame.short_address) == device.polling_address.get_value()
	}
}

/// Translates a received request into the reply payload bytes (response
/// code and device status included).  The data-link layer wraps the result
/// in an ACK frame.
pub fn handle_request(
	device: &mut HartDevice,
	command_number: u16,
	data: &[u8],
) -> Result<Vec<u8>, Error> {
	if command_number == EXTENDED_COMMAND {
		let mut request = Cmd31Request::default();
		if request.decode(data).is_err() {
			return ErrorReply::build(device, COMMAND_NOT_IMPLEMENTED).encode();
		}
		let extended_number = request.extended_command_number.get_value() as u16;
		let inner = dispatch(device, extended_number, request.request_data.get_value())?;

		let mut reply = Cmd31Reply::default();
		// the outer response code comes from the inner reply, not re-derived
		reply
			.response_code
			.set_value(i64::from(inner.first().copied().unwrap_or(0)));
		reply.device_status = device.device_status;
		reply
			.extended_command_number
			.set_value(i64::from(extended_number));
		reply
			.response_data
			.set_value(inner.get(2..).unwrap_or(&[]).to_vec());
		return reply.encode();
	}
	dispatch(device, command_number, data)
}

fn dispatch(device: &mut HartDevice, command_number: u16, data: &[u8]) -> Result<Vec<u8>, Error> {
	// commands declared in the device spec shadow the canned handlers
	if device.commands.contains_key(&command_number) {
		return dispatch_custom(device, command_number, data);
	}
	let revision = device.universal_revision.get_value();
	match route(device, command_number, data, revision) {
		Ok(payload) => Ok(payload),
		Err(Error::UnexpectedEndOfData) => {
			ErrorReply::build(device, COMMAND_NOT_IMPLEMENTED).encode()
		}
		Err(Error::UnknownDeviceVariable(_)) => {
			ErrorReply::build(device, INVALID_SELECTION).encode()
		}
		Err(error) => Err(error),
	}
}

fn route(
	device: &mut HartDevice,
	command_number: u16,
	data: &[u8],
	revision: u32,
) -> Result<Vec<u8>, Error> {
	match command_number {
		0 if revision == 5 => Cmd0Hart5Reply::build(device).encode(),
		0 => Cmd0Hart7Reply::build(device).encode(),
		1 => {
			device.update_variables();
			Cmd1Reply::build(device)?.encode()
		}
		2 => {
			device.update_variables();
			Cmd2Reply::build(device).encode()
		}
		3 => {
			device.update_variables();
			Cmd3Reply::build(device)?.encode()
		}
		7 if revision >= 6 => Cmd7Reply::build(device).encode(),
		8 if revision >= 6 => Cmd8Reply::build(device)?.encode(),
		9 if revision >= 6 => {
			device.update_variables();
			let mut request = Cmd9Request::default();
			request.decode(data)?;
			Cmd9Reply::build(device, &request)?.encode()
		}
		12 => Cmd12Reply::build(device).encode(),
		13 => Cmd13Reply::build(device).encode(),
		15 => Cmd15Reply::build(device).encode(),
		20 if revision >= 6 => Cmd20Reply::build(device).encode(),
		34 => {
			let mut request = Cmd34Request::default();
			request.decode(data)?;
			device.pv_damping.set_value(request.damping.get_value());
			device.record_config_change();
			Cmd34Reply::build(device).encode()
		}
		36 => {
			let code = device.dynamic_variables[0];
			let value = device.variable(code)?.value.get_value();
			device.variable_mut(code)?.urv.set_value(value);
			device.record_config_change();
			Cmd36Reply::build(device).encode()
		}
		37 => {
			let code = device.dynamic_variables[0];
			let value = device.variable(code)?.value.get_value();
			device.variable_mut(code)?.lrv.set_value(value);
			device.record_config_change();
			Cmd37Reply::build(device).encode()
		}
		40 => {
			let mut request = Cmd40Request::default();
			request.decode(data)?;
			let level = request.loop_current_level.get_value();
			device.is_fixed_current_mode = level != 0.0;
			if device.is_fixed_current_mode {
				device.loop_current.set_value(level);
			}
			Cmd40Reply::build(device, level).encode()
		}
		45 => {
			let mut request = Cmd45Request::default();
			request.decode(data)?;
			device.record_config_change();
			Cmd45Reply::build(device, request.loop_current_level.get_value()).encode()
		}
		46 => {
			let mut request = Cmd46Request::default();
			request.decode(data)?;
			device.record_config_change();
			Cmd46Reply::build(device, request.loop_current_level.get_value()).encode()
		}
		48 => Cmd48Reply::build(device).encode(),
		53 => {
			let mut request = Cmd53Request::default();
			request.decode(data)?;
			let code = request.device_variable_code.get_value() as u8;
			let units = i64::from(request.units_code.get_value());
			device.variable_mut(code)?.units.set_value(units);
			device.record_config_change();
			Cmd53Reply::build(device, &request).encode()
		}
		54 => {
			let mut request = Cmd54Request::default();
			request.decode(data)?;
			let code = request.device_variable_code.get_value() as u8;
			Cmd54Reply::build(device, code)?.encode()
		}
		72 => {
			let mut request = Cmd72Request::default();
			request.decode(data)?;
			Cmd72Reply::build(device, &request).encode()
		}
		76 => Cmd76Reply::build(device).encode(),
		90 => Cmd90Reply::build(device).encode(),
		105 => Cmd105Reply::build(device).encode(),
		128 => Cmd128Reply::build(device).encode(),
		133 => Cmd133Reply::build(device).encode(),
		136 => Cmd136Reply::build(device).encode(),
		137 => Cmd137Reply::build(device).encode(),
		140 => Cmd140Reply::build(device).encode(),
		142 => Cmd142Reply::build(device).encode(),
		148 => Cmd148Reply::build(device).encode(),
		160 => Cmd160Reply::build(device).encode(),
		161 => Cmd161Reply::build(device).encode(),
		162 => Cmd162Reply::build(device).encode(),
		177 => Cmd177Reply::build(device).encode(),
		196 => Cmd196Reply::build(device).encode(),
		200 => Cmd200Reply::build(device).encode(),
		202 => Cmd202Reply::build(device).encode(),
		203 => Cmd203Reply::build(device).encode(),
		216 => Cmd216Reply::build(device).encode(),
		217 => Cmd217Reply::build(device).encode(),
		218 => Cmd218Reply::build(device).encode(),
		220 => Cmd220Reply::build(device).encode(),
		222 => Cmd222Reply::build(device).encode(),
		_ => ErrorReply::build(device, COMMAND_NOT_IMPLEMENTED).encode(),
	}
}

fn dispatch_custom(
	device: &mut HartDevice,
	command_number: u16,
	data: &[u8],
) -> Result<Vec<u8>, Error> {
	let command = match device.commands.get(&command_number) {
		Some(command) => command.clone(),
		None => return ErrorReply::build(device, COMMAND_NOT_IMPLEMENTED).encode(),
	};

	let mut cursor = Cursor::new(data);
	for name in &command.request {
		if let Some(value) = device.data.get_mut(name) {
			if value.as_payload_mut().decode(&mut cursor).is_err() {
				return ErrorReply::build(device, COMMAND_NOT_IMPLEMENTED).encode();
			}
		}
	}

	let mut out = Vec::new();
	for name in &command.reply {
		if let Some(value) = device.data.get(name) {
			value.as_payload().encode(&mut out)?;
		}
	}
	Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct ErrorReply {
	pub response_code: U8,
	pub device_status: U8,
}

payload_sequence!(ErrorReply { response_code, device_status });

impl ErrorReply {
	pub fn build(device: &HartDevice, response_code: u8) -> ErrorReply {
		ErrorReply {
			response_code: U8::new(i64::from(response_code)),
			device_status: device.device_status,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd31Request {
	pub extended_command_number: U16,
	pub request_data: GreedyU8Array,
}

payload_sequence!(Cmd31Request {
	extended_command_number,
	request_data,
});

#[derive(Debug, Clone, Default)]
pub struct Cmd31Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub extended_command_number: U16,
	pub response_data: GreedyU8Array,
}

payload_sequence!(Cmd31Reply {
	response_code,
	device_status,
	extended_command_number,
	response_data,
});

#[derive(Debug, Clone)]
pub struct Cmd0Hart5Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub expansion_code: U8,
	pub expanded_device_type: U16,
	pub request_preambles: U8,
	pub universal_revision: U8,
	pub device_revision: U8,
	pub software_revision: U8,
	pub hardware_revision_signaling_code: U8,
	pub flags: U8,
	pub device_id: U24,
}

payload_sequence!(Cmd0Hart5Reply {
	response_code,
	device_status,
	expansion_code,
	expanded_device_type,
	request_preambles,
	universal_revision,
	device_revision,
	software_revision,
	hardware_revision_signaling_code,
	flags,
	device_id,
});

impl Default for Cmd0Hart5Reply {
	fn default() -> Cmd0Hart5Reply {
		Cmd0Hart5Reply {
			response_code: U8::default(),
			device_status: U8::default(),
			expansion_code: U8::new(254),
			expanded_device_type: U16::default(),
			request_preambles: U8::new(5),
			universal_revision: U8::new(5),
			device_revision: U8::new(11),
			software_revision: U8::new(3),
			hardware_revision_signaling_code: U8::new(0x64),
			flags: U8::default(),
			device_id: U24::default(),
		}
	}
}

impl Cmd0Hart5Reply {
	pub fn build(device: &HartDevice) -> Cmd0Hart5Reply {
		Cmd0Hart5Reply {
			device_status: device.device_status,
			expanded_device_type: device.expanded_device_type,
			device_id: device.device_id,
			..Cmd0Hart5Reply::default()
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd0Hart7Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub expansion_code: U8,
	pub expanded_device_type: U16,
	pub request_preambles: U8,
	pub universal_revision: U8,
	pub device_revision: U8,
	pub software_revision: U8,
	pub hardware_revision_signaling_code: U8,
	pub flags: U8,
	pub device_id: U24,
	pub response_preambles: U8,
	pub max_device_variables: U8,
	pub config_change_counter: U16,
	pub extended_device_status: U8,
	pub manufacturer_code: U16,
	pub private_label_distributor: U16,
	pub device_profile: U8,
}

payload_sequence!(Cmd0Hart7Reply {
	response_code,
	device_status,
	expansion_code,
	expanded_device_type,
	request_preambles,
	universal_revision,
	device_revision,
	software_revision,
	hardware_revision_signaling_code,
	flags,
	device_id,
	response_preambles,
	max_device_variables,
	config_change_counter,
	extended_device_status,
	manufacturer_code,
	private_label_distributor,
	device_profile,
});

impl Default for Cmd0Hart7Reply {
	fn default() -> Cmd0Hart7Reply {
		Cmd0Hart7Reply {
			response_code: U8::default(),
			device_status: U8::default(),
			expansion_code: U8::new(254),
			expanded_device_type: U16::default(),
			request_preambles: U8::new(5),
			universal_revision: U8::new(7),
			device_revision: U8::new(7),
			software_revision: U8::new(3),
			hardware_revision_signaling_code: U8::new(0x64),
			flags: U8::default(),
			device_id: U24::default(),
			response_preambles: U8::new(5),
			max_device_variables: U8::new(1),
			config_change_counter: U16::default(),
			extended_device_status: U8::default(),
			manufacturer_code: U16::new(0x0099),
			private_label_distributor: U16::new(0x0099),
			device_profile: U8::default(),
		}
	}
}

impl Cmd0Hart7Reply {
	pub fn build(device: &HartDevice) -> Cmd0Hart7Reply {
		Cmd0Hart7Reply {
			device_status: device.device_status,
			expanded_device_type: device.expanded_device_type,
			device_id: device.device_id,
			config_change_counter: device.config_change_counter,
			extended_device_status: device.extended_device_status,
			..Cmd0Hart7Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd1Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub pv_units: U8,
	pub pv_value: F32,
}

payload_sequence!(Cmd1Reply {
	response_code,
	device_status,
	pv_units,
	pv_value,
});

impl Cmd1Reply {
	pub fn build(device: &HartDevice) -> Result<Cmd1Reply, Error> {
		let primary = device.variable(device.dynamic_variables[0])?;
		Ok(Cmd1Reply {
			device_status: device.device_status,
			pv_units: primary.units,
			pv_value: primary.value,
			..Cmd1Reply::default()
		})
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd2Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub loop_current: F32,
	pub percent_of_range: F32,
}

payload_sequence!(Cmd2Reply {
	response_code,
	device_status,
	loop_current,
	percent_of_range,
});

impl Cmd2Reply {
	pub fn build(device: &HartDevice) -> Cmd2Reply {
		Cmd2Reply {
			device_status: device.device_status,
			loop_current: device.loop_current,
			percent_of_range: device.percent_of_range,
			..Cmd2Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd3Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub loop_current: F32,
	pub pv_units: U8,
	pub pv_value: F32,
	pub sv_units: U8,
	pub sv_value: F32,
	pub tv_units: U8,
	pub tv_value: F32,
	pub qv_units: U8,
	pub qv_value: F32,
}

payload_sequence!(Cmd3Reply {
	response_code,
	device_status,
	loop_current,
	pv_units,
	pv_value,
	sv_units,
	sv_value,
	tv_units,
	tv_value,
	qv_units,
	qv_value,
});

impl Cmd3Reply {
	pub fn build(device: &HartDevice) -> Result<Cmd3Reply, Error> {
		let pv = device.variable(device.dynamic_variables[0])?;
		let sv = device.variable(device.dynamic_variables[1])?;
		let tv = device.variable(device.dynamic_variables[2])?;
		let qv = device.variable(device.dynamic_variables[3])?;
		Ok(Cmd3Reply {
			device_status: device.device_status,
			loop_current: device.loop_current,
			pv_units: pv.units,
			pv_value: pv.value,
			sv_units: sv.units,
			sv_value: sv.value,
			tv_units: tv.units,
			tv_value: tv.value,
			qv_units: qv.units,
			qv_value: qv.value,
			..Cmd3Reply::default()
		})
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd7Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub polling_address: U8,
	pub loop_current_mode: U8,
}

payload_sequence!(Cmd7Reply {
	response_code,
	device_status,
	polling_address,
	loop_current_mode,
});

impl Cmd7Reply {
	pub fn build(device: &HartDevice) -> Cmd7Reply {
		Cmd7Reply {
			device_status: device.device_status,
			polling_address: device.polling_address,
			loop_current_mode: device.loop_current_mode,
			..Cmd7Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd8Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub pv_classification: U8,
	pub sv_classification: U8,
	pub tv_classification: U8,
	pub qv_classification: U8,
}

payload_sequence!(Cmd8Reply {
	response_code,
	device_status,
	pv_classification,
	sv_classification,
	tv_classification,
	qv_classification,
});

impl Cmd8Reply {
	pub fn build(device: &HartDevice) -> Result<Cmd8Reply, Error> {
		Ok(Cmd8Reply {
			device_status: device.device_status,
			pv_classification: device.variable(device.dynamic_variables[0])?.classification,
			sv_classification: device.variable(device.dynamic_variables[1])?.classification,
			tv_classification: device.variable(device.dynamic_variables[2])?.classification,
			qv_classification: device.variable(device.dynamic_variables[3])?.classification,
			..Cmd8Reply::default()
		})
	}
}

/// Command 9 reads up to eight device variables; only the first request
/// slot is mandatory.
#[derive(Debug, Clone)]
pub struct Cmd9Request {
	pub device_variable_codes: [U8; 8],
}

impl Default for Cmd9Request {
	fn default() -> Cmd9Request {
		let mut codes = [U8::optional(); 8];
		codes[0] = U8::default();
		Cmd9Request {
			device_variable_codes: codes,
		}
	}
}

impl PayloadSequence for Cmd9Request {
	fn fields(&self) -> Vec<&dyn Payload> {
		self.device_variable_codes
			.iter()
			.map(|code| code as &dyn Payload)
			.collect()
	}

	fn fields_mut(&mut self) -> Vec<&mut dyn Payload> {
		self.device_variable_codes
			.iter_mut()
			.map(|code| code as &mut dyn Payload)
			.collect()
	}
}

/// One (code, classification, units, value, status) group of a command 9
/// reply.
#[derive(Debug, Clone, Copy)]
pub struct Cmd9Slot {
	pub code: U8,
	pub classification: U8,
	pub units: U8,
	pub value: F32,
	pub status: U8,
}

impl Cmd9Slot {
	fn mandatory() -> Cmd9Slot {
		Cmd9Slot {
			code: U8::default(),
			classification: U8::default(),
			units: U8::default(),
			value: F32::default(),
			status: U8::default(),
		}
	}

	fn optional() -> Cmd9Slot {
		Cmd9Slot {
			code: U8::optional(),
			classification: U8::optional(),
			units: U8::optional(),
			value: F32::optional(),
			status: U8::optional(),
		}
	}

	fn skip(&mut self) {
		self.code.skip();
		self.classification.skip();
		self.units.skip();
		self.value.skip();
		self.status.skip();
	}

	fn include(&mut self) {
		self.code.include();
		self.classification.include();
		self.units.include();
		self.value.include();
		self.status.include();
	}
}

#[derive(Debug, Clone)]
pub struct Cmd9Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub extended_device_status: U8,
	pub slots: [Cmd9Slot; 8],
	pub timestamp: U32,
}

impl Default for Cmd9Reply {
	fn default() -> Cmd9Reply {
		let mut slots = [Cmd9Slot::optional(); 8];
		slots[0] = Cmd9Slot::mandatory();
		Cmd9Reply {
			response_code: U8::default(),
			device_status: U8::default(),
			extended_device_status: U8::default(),
			slots,
			timestamp: U32::default(),
		}
	}
}

impl PayloadSequence for Cmd9Reply {
	fn fields(&self) -> Vec<&dyn Payload> {
		let mut fields: Vec<&dyn Payload> = vec![
			&self.response_code,
			&self.device_status,
			&self.extended_device_status,
		];
		for slot in &self.slots {
			fields.push(&slot.code);
			fields.push(&slot.classification);
			fields.push(&slot.units);
			fields.push(&slot.value);
			fields.push(&slot.status);
		}
		fields.push(&self.timestamp);
		fields
	}

	fn fields_mut(&mut self) -> Vec<&mut dyn Payload> {
		let mut fields: Vec<&mut dyn Payload> = vec![
			&mut self.response_code,
			&mut self.device_status,
			&mut self.extended_device_status,
		];
		for slot in &mut self.slots {
			fields.push(&mut slot.code);
			fields.push(&mut slot.classification);
			fields.push(&mut slot.units);
			fields.push(&mut slot.value);
			fields.push(&mut slot.status);
		}
		fields.push(&mut self.timestamp);
		fields
	}
}

impl Cmd9Reply {
	/// Fills one reply slot per requested code.  After each slot is filled
	/// the variable's units and alternate units are exchanged, simulating a
	/// unit-conversion oscillation the host must tolerate.
	pub fn build(device: &mut HartDevice, request: &Cmd9Request) -> Result<Cmd9Reply, Error> {
		let mut reply = Cmd9Reply {
			device_status: device.device_status,
			extended_device_status: device.extended_device_status,
			..Cmd9Reply::default()
		};
		for (index, requested) in request.device_variable_codes.iter().enumerate() {
			let slot = &mut reply.slots[index];
			if requested.is_skipped() {
				slot.skip();
				continue;
			}
			let code = requested.get_value() as u8;
			let variable = device.variable_mut(code)?;
			slot.include();
			slot.code.set_value(i64::from(code));
			slot.classification
				.set_value(i64::from(variable.classification.get_value()));
			slot.units.set_value(i64::from(variable.units.get_value()));
			slot.value.set_value(variable.value.get_value());
			slot.status.set_value(i64::from(variable.status.get_value()));
			std::mem::swap(&mut variable.units, &mut variable.alternate_units);
		}
		Ok(reply)
	}
}

#[derive(Debug, Clone)]
pub struct Cmd12Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub hart_message: PackedAscii,
}

payload_sequence!(Cmd12Reply {
	response_code,
	device_status,
	hart_message,
});

impl Cmd12Reply {
	pub fn build(device: &HartDevice) -> Cmd12Reply {
		Cmd12Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			hart_message: device.hart_message.clone(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd13Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub hart_tag: PackedAscii,
	pub hart_descriptor: PackedAscii,
	pub hart_date: U24,
}

payload_sequence!(Cmd13Reply {
	response_code,
	device_status,
	hart_tag,
	hart_descriptor,
	hart_date,
});

impl Cmd13Reply {
	pub fn build(device: &HartDevice) -> Cmd13Reply {
		Cmd13Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			hart_tag: device.hart_tag.clone(),
			hart_descriptor: device.hart_descriptor.clone(),
			hart_date: device.hart_date,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd20Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub long_tag: Ascii,
}

payload_sequence!(Cmd20Reply {
	response_code,
	device_status,
	long_tag,
});

impl Cmd20Reply {
	pub fn build(device: &HartDevice) -> Cmd20Reply {
		Cmd20Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			long_tag: device.hart_long_tag.clone(),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd34Request {
	pub damping: F32,
}

payload_sequence!(Cmd34Request { damping });

#[derive(Debug, Clone, Default)]
pub struct Cmd34Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub damping: F32,
}

payload_sequence!(Cmd34Reply {
	response_code,
	device_status,
	damping,
});

impl Cmd34Reply {
	pub fn build(device: &HartDevice) -> Cmd34Reply {
		Cmd34Reply {
			device_status: device.device_status,
			damping: device.pv_damping,
			..Cmd34Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd40Request {
	pub loop_current_level: F32,
}

payload_sequence!(Cmd40Request { loop_current_level });

#[derive(Debug, Clone, Default)]
pub struct Cmd40Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub loop_current_level: F32,
}

payload_sequence!(Cmd40Reply {
	response_code,
	device_status,
	loop_current_level,
});

impl Cmd40Reply {
	pub fn build(device: &HartDevice, level: f32) -> Cmd40Reply {
		Cmd40Reply {
			device_status: device.device_status,
			loop_current_level: F32::new(level),
			..Cmd40Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd45Request {
	pub loop_current_level: F32,
}

payload_sequence!(Cmd45Request { loop_current_level });

#[derive(Debug, Clone, Default)]
pub struct Cmd45Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub loop_current_level: F32,
}

payload_sequence!(Cmd45Reply {
	response_code,
	device_status,
	loop_current_level,
});

impl Cmd45Reply {
	pub fn build(device: &HartDevice, level: f32) -> Cmd45Reply {
		Cmd45Reply {
			device_status: device.device_status,
			loop_current_level: F32::new(level),
			..Cmd45Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd46Request {
	pub loop_current_level: F32,
}

payload_sequence!(Cmd46Request { loop_current_level });

#[derive(Debug, Clone, Default)]
pub struct Cmd46Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub loop_current_level: F32,
}

payload_sequence!(Cmd46Reply {
	response_code,
	device_status,
	loop_current_level,
});

impl Cmd46Reply {
	pub fn build(device: &HartDevice, level: f32) -> Cmd46Reply {
		Cmd46Reply {
			device_status: device.device_status,
			loop_current_level: F32::new(level),
			..Cmd46Reply::default()
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd48Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub device_specific_status_0: U8,
	pub device_specific_status_1: U8,
	pub device_specific_status_2: U8,
	pub device_specific_status_3: U8,
	pub device_specific_status_4: U8,
	pub device_specific_status_5: U8,
	pub extended_fld_device_status: U8,
	pub reserved_0: U8,
	pub reserved_1: U8,
	pub reserved_2: U8,
}

payload_sequence!(Cmd48Reply {
	response_code,
	device_status,
	device_specific_status_0,
	device_specific_status_1,
	device_specific_status_2,
	device_specific_status_3,
	device_specific_status_4,
	device_specific_status_5,
	extended_fld_device_status,
	reserved_0,
	reserved_1,
	reserved_2,
});

impl Default for Cmd48Reply {
	fn default() -> Cmd48Reply {
		Cmd48Reply {
			response_code: U8::default(),
			device_status: U8::default(),
			device_specific_status_0: U8::default(),
			device_specific_status_1: U8::default(),
			device_specific_status_2: U8::default(),
			device_specific_status_3: U8::new(0x10),
			device_specific_status_4: U8::default(),
			device_specific_status_5: U8::default(),
			extended_fld_device_status: U8::default(),
			reserved_0: U8::default(),
			reserved_1: U8::default(),
			reserved_2: U8::default(),
		}
	}
}

impl Cmd48Reply {
	/// Reports the device-specific status, then exchanges status byte 0 with
	/// its alternate (the same oscillation pattern as the command 9 units).
	pub fn build(device: &mut HartDevice) -> Cmd48Reply {
		let mut reply = Cmd48Reply {
			device_status: device.device_status,
			..Cmd48Reply::default()
		};
		reply
			.device_specific_status_0
			.set_value(i64::from(device.device_specific_status_0.get_value()));
		std::mem::swap(
			&mut device.device_specific_status_0,
			&mut device.alternate_device_specific_status_0,
		);
		reply
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd53Request {
	pub device_variable_code: U8,
	pub units_code: U8,
}

payload_sequence!(Cmd53Request {
	device_variable_code,
	units_code,
});

#[derive(Debug, Clone, Default)]
pub struct Cmd53Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub device_variable_code: U8,
	pub units_code: U8,
}

payload_sequence!(Cmd53Reply {
	response_code,
	device_status,
	device_variable_code,
	units_code,
});

impl Cmd53Reply {
	pub fn build(device: &HartDevice, request: &Cmd53Request) -> Cmd53Reply {
		Cmd53Reply {
			device_status: device.device_status,
			device_variable_code: request.device_variable_code,
			units_code: request.units_code,
			..Cmd53Reply::default()
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd54Request {
	pub device_variable_code: U8,
}

payload_sequence!(Cmd54Request { device_variable_code });

#[derive(Debug, Clone)]
pub struct Cmd54Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub device_variable_code: U8,
	pub transducer_serial_number: U24,
	pub limits_units: U8,
	pub upper_transducer_limit: F32,
	pub lower_transducer_limit: F32,
	pub damping: F32,
	pub minimum_span: F32,
	pub classification: U8,
	pub device_variable_family: U8,
	pub update_period: U32,
	pub properties: U8,
}

payload_sequence!(Cmd54Reply {
	response_code,
	device_status,
	device_variable_code,
	transducer_serial_number,
	limits_units,
	upper_transducer_limit,
	lower_transducer_limit,
	damping,
	minimum_span,
	classification,
	device_variable_family,
	update_period,
	properties,
});

impl Default for Cmd54Reply {
	fn default() -> Cmd54Reply {
		Cmd54Reply {
			response_code: U8::default(),
			device_status: U8::default(),
			device_variable_code: U8::default(),
			transducer_serial_number: U24::default(),
			limits_units: U8::default(),
			upper_transducer_limit: F32::default(),
			lower_transducer_limit: F32::default(),
			damping: F32::default(),
			minimum_span: F32::default(),
			classification: U8::default(),
			// 250: family not used
			device_variable_family: U8::new(250),
			// one second, in 1/32 millisecond counts
			update_period: U32::new(32000),
			properties: U8::default(),
		}
	}
}

impl Cmd54Reply {
	pub fn build(device: &HartDevice, code: u8) -> Result<Cmd54Reply, Error> {
		let variable = device.variable(code)?;
		Ok(Cmd54Reply {
			device_status: device.device_status,
			device_variable_code: U8::new(i64::from(code)),
			limits_units: variable.units,
			upper_transducer_limit: variable.urv,
			lower_transducer_limit: variable.lrv,
			damping: device.pv_damping,
			classification: variable.classification,
			..Cmd54Reply::default()
		})
	}
}

#[derive(Debug, Clone)]
pub struct Cmd72Request {
	pub squawk_control: U8,
}

payload_sequence!(Cmd72Request { squawk_control });

impl Default for Cmd72Request {
	fn default() -> Cmd72Request {
		Cmd72Request {
			squawk_control: U8::optional(),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Cmd72Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub squawk_control: U8,
}

payload_sequence!(Cmd72Reply {
	response_code,
	device_status,
	squawk_control,
});

impl Cmd72Reply {
	pub fn build(device: &HartDevice, request: &Cmd72Request) -> Cmd72Reply {
		let control = if request.squawk_control.is_skipped() {
			0
		} else {
			i64::from(request.squawk_control.get_value())
		};
		Cmd72Reply {
			device_status: device.device_status,
			squawk_control: U8::new(control),
			..Cmd72Reply::default()
		}
	}
}

macro_rules! status_reply {
	{ $( $name:ident { $($field:ident: $kind:ty),* $(,)? } ),* $(,)? } => {
		$(
			#[derive(Debug, Clone, Default)]
			pub struct $name {
				pub response_code: U8,
				pub device_status: U8,
				$(pub $field: $kind,)*
			}

			payload_sequence!($name { response_code, device_status $(, $field)* });

			impl $name {
				pub fn build(device: &HartDevice) -> $name {
					$name {
						device_status: device.device_status,
						..$name::default()
					}
				}
			}
		)*
	};
}

status_reply! {
	Cmd15Reply {
		reserved_0: U32,
		reserved_1: U32,
		reserved_2: U32,
		reserved_3: U32,
		reserved_4: U24,
	},
	Cmd36Reply {},
	Cmd37Reply {},
	Cmd76Reply {
		lock_status: U8,
	},
	Cmd90Reply {
		year: U8,
		current_time: U32,
		day_clock_last_set: U8,
		month_clock_last_set: U8,
		year_clock_last_set: U8,
		time_clock_last_set: U32,
		rtc_flags: U8,
	},
	Cmd105Reply {
		burst_mode_control_code: U8,
		burst_command_number_expansion_flag: U8,
		device_variable_code_slot_0: U8,
		device_variable_code_slot_1: U8,
		device_variable_code_slot_2: U8,
		device_variable_code_slot_3: U8,
		device_variable_code_slot_4: U8,
		device_variable_code_slot_5: U8,
		device_variable_code_slot_6: U8,
		device_variable_code_slot_7: U8,
		burst_message: U8,
		number_of_burst_messages: U8,
		extended_command_number: U16,
		update_period: U32,
		maximum_update_period: U32,
		burst_trigger_mode: U8,
		classification: U8,
		units_code: U8,
		trigger_level: F32,
	},
	Cmd133Reply {
		reserved_0: U24,
	},
	Cmd136Reply {
		reserved_0: U32,
	},
	Cmd137Reply {
		reserved_0: U32,
	},
	Cmd140Reply {
		reserved_0: U32,
		reserved_1: U32,
	},
	Cmd142Reply {
		reserved_0: U32,
		reserved_1: U8,
	},
	Cmd196Reply {
		reserved_0: U24,
	},
	Cmd200Reply {
		reserved_0: U32,
		reserved_1: U32,
	},
	Cmd202Reply {
		reserved_0: U16,
	},
	Cmd203Reply {
		reserved_0: F32,
		reserved_1: F32,
		reserved_2: F32,
	},
	Cmd216Reply {
		reserved_0: U32,
		reserved_1: U32,
		reserved_2: U32,
		reserved_3: U32,
	},
	Cmd217Reply {
		reserved_0: U32,
	},
	Cmd218Reply {
		reserved_0: U32,
	},
	Cmd220Reply {
		reserved_0: U32,
		reserved_1: U32,
		reserved_2: U8,
	},
	Cmd222Reply {
		reserved_0: U32,
	},
}

#[derive(Debug, Clone)]
pub struct Cmd128Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub reserved_0: Ascii,
}

payload_sequence!(Cmd128Reply {
	response_code,
	device_status,
	reserved_0,
});

impl Cmd128Reply {
	pub fn build(device: &HartDevice) -> Cmd128Reply {
		Cmd128Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			reserved_0: Ascii::new(31),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd148Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub reserved_0: PackedAscii,
}

payload_sequence!(Cmd148Reply {
	response_code,
	device_status,
	reserved_0,
});

impl Cmd148Reply {
	pub fn build(device: &HartDevice) -> Cmd148Reply {
		Cmd148Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			// 42 packed characters: 32 bytes on the wire
			reserved_0: PackedAscii::new(42),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd160Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub reserved_0: PackedAscii,
}

payload_sequence!(Cmd160Reply {
	response_code,
	device_status,
	reserved_0,
});

impl Cmd160Reply {
	pub fn build(device: &HartDevice) -> Cmd160Reply {
		Cmd160Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			reserved_0: PackedAscii::new(32),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd161Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub reserved_0: Ascii,
	pub tank_type: U8,
	pub reserved_1: Ascii,
}

payload_sequence!(Cmd161Reply {
	response_code,
	device_status,
	reserved_0,
	tank_type,
	reserved_1,
});

impl Cmd161Reply {
	pub fn build(device: &HartDevice) -> Cmd161Reply {
		Cmd161Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			reserved_0: Ascii::new(3),
			tank_type: U8::new(5),
			reserved_1: Ascii::new(12),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd162Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub reserved_0: Ascii,
}

payload_sequence!(Cmd162Reply {
	response_code,
	device_status,
	reserved_0,
});

impl Cmd162Reply {
	pub fn build(device: &HartDevice) -> Cmd162Reply {
		Cmd162Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			reserved_0: Ascii::new(83),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Cmd177Reply {
	pub response_code: U8,
	pub device_status: U8,
	pub reserved_0: PackedAscii,
}

payload_sequence!(Cmd177Reply {
	response_code,
	device_status,
	reserved_0,
});

impl Cmd177Reply {
	pub fn build(device: &HartDevice) -> Cmd177Reply {
		Cmd177Reply {
			response_code: U8::default(),
			device_status: device.device_status,
			reserved_0: PackedAscii::new(32),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::{DeviceSpec, HartDevice};
	use crate::payload::{U16, U24, U8};

	fn hart7_device() -> HartDevice {
		HartDevice {
			polling_address: U8::new(0),
			expanded_device_type: U16::new(0x2606),
			device_id: U24::new(0x123456),
			..HartDevice::default()
		}
	}

	fn hart5_device() -> HartDevice {
		HartDevice {
			universal_revision: U8::new(5),
			..hart7_device()
		}
	}

	#[test]
	fn test_cmd0_hart7_reply_bytes() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 0, &[]).unwrap();
		let expected = vec![
			0x00, 0x00, 0xFE, 0x26, 0x06, 0x05, 0x07, 0x07, 0x03, 0x64, 0x00, 0x12, 0x34,
			0x56, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00, 0x99, 0x00, 0x99, 0x00,
		];
		assert_eq!(payload, expected);
		assert_eq!(payload.len(), 24);
	}

	#[test]
	fn test_cmd0_hart5_reply_size() {
		let mut device = hart5_device();
		let payload = handle_request(&mut device, 0, &[]).unwrap();
		assert_eq!(payload[0], 0);
		assert_eq!(payload.len(), 14);
		assert_eq!(&payload[11..], &[0x12, 0x34, 0x56]);
	}

	#[test]
	fn test_unsupported_command_not_implemented() {
		let mut device = hart7_device();
		device.device_status.set_value(0x57);
		let payload = handle_request(&mut device, 999, &[]).unwrap();
		assert_eq!(payload, vec![64, 0x57]);
	}

	#[test]
	fn test_revision_gate_rejects_hart5_command_9() {
		let mut device = hart5_device();
		let payload = handle_request(&mut device, 9, &[0x00]).unwrap();
		assert_eq!(payload, vec![64, 0x00]);
	}

	#[test]
	fn test_cmd1_reports_pinned_primary_variable() {
		let mut device = hart7_device();
		device.variable_mut(0).unwrap().units.set_value(12);
		device.variable_mut(0).unwrap().value.set_value(1.2345);
		device.simulated_variables.insert(0, 0.0);
		let payload = handle_request(&mut device, 1, &[]).unwrap();
		assert_eq!(payload, vec![0x00, 0x00, 0x0C, 0x3F, 0x9E, 0x04, 0x19]);
	}

	#[test]
	fn test_cmd3_reply_shape() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 3, &[]).unwrap();
		// rc + status + loop current + four (units, value) pairs
		assert_eq!(payload.len(), 2 + 4 + 4 * 5);
	}

	#[test]
	fn test_cmd9_swaps_units_per_read() {
		let mut device = hart7_device();
		{
			let variable = device.variable_mut(0).unwrap();
			variable.units.set_value(12);
			variable.alternate_units.set_value(32);
		}
		device.simulated_variables.insert(0, 0.0);

		let payload = handle_request(&mut device, 9, &[0x00]).unwrap();
		// header, then (code, classification, units, ...) for slot 1
		assert_eq!(payload[3], 0x00);
		assert_eq!(payload[5], 12);
		assert_eq!(device.variable(0).unwrap().units.get_value(), 32);
		assert_eq!(device.variable(0).unwrap().alternate_units.get_value(), 12);

		let payload = handle_request(&mut device, 9, &[0x00]).unwrap();
		assert_eq!(payload[5], 32);
		assert_eq!(device.variable(0).unwrap().units.get_value(), 12);
	}

	#[test]
	fn test_cmd9_reply_mirrors_requested_slots() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 9, &[0x00, 0x01]).unwrap();
		// header (3) + two slots (2 * 8) + timestamp (4)
		assert_eq!(payload.len(), 3 + 16 + 4);
		assert_eq!(payload[3], 0x00);
		assert_eq!(payload[11], 0x01);
	}

	#[test]
	fn test_cmd9_unknown_variable_is_invalid_selection() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 9, &[0xEE]).unwrap();
		assert_eq!(payload, vec![INVALID_SELECTION, 0x00]);
	}

	#[test]
	fn test_cmd9_empty_request_not_implemented() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 9, &[]).unwrap();
		assert_eq!(payload, vec![COMMAND_NOT_IMPLEMENTED, 0x00]);
	}

	#[test]
	fn test_cmd31_wraps_inner_reply() {
		let mut device = hart7_device();
		// extended command 148 with arbitrary trailing request data
		let payload = handle_request(&mut device, 31, &[0x00, 0x94, 0xAA]).unwrap();
		assert_eq!(payload.len(), 2 + 2 + 32);
		assert_eq!(payload[0], 0x00);
		assert_eq!(&payload[2..4], &[0x00, 0x94]);
		assert!(payload[4..].iter().all(|byte| *byte == 0));
	}

	#[test]
	fn test_cmd31_unknown_inner_command() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 31, &[0x03, 0xE7]).unwrap();
		// outer response code repeats the inner one; inner data drops its
		// two header bytes
		assert_eq!(payload, vec![64, 0x00, 0x03, 0xE7]);
	}

	#[test]
	fn test_cmd48_swaps_device_specific_status() {
		let mut device = hart7_device();
		device.device_specific_status_0.set_value(0x02);
		device.alternate_device_specific_status_0.set_value(0x00);
		let payload = handle_request(&mut device, 48, &[]).unwrap();
		assert_eq!(payload.len(), 12);
		assert_eq!(payload[2], 0x02);
		assert_eq!(payload[5], 0x10);
		assert_eq!(device.device_specific_status_0.get_value(), 0x00);
		assert_eq!(device.alternate_device_specific_status_0.get_value(), 0x02);

		let payload = handle_request(&mut device, 48, &[]).unwrap();
		assert_eq!(payload[2], 0x00);
		assert_eq!(device.device_specific_status_0.get_value(), 0x02);
	}

	#[test]
	fn test_cmd34_writes_damping() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 34, &[0x40, 0x20, 0x00, 0x00]).unwrap();
		assert_eq!(device.pv_damping.get_value(), 2.5);
		assert_eq!(payload, vec![0x00, 0x00, 0x40, 0x20, 0x00, 0x00]);
		assert_eq!(device.config_change_counter.get_value(), 1);
	}

	#[test]
	fn test_cmd40_pins_loop_current() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 40, &[0x41, 0x18, 0x00, 0x00]).unwrap();
		assert_eq!(payload, vec![0x00, 0x00, 0x41, 0x18, 0x00, 0x00]);
		assert!(device.is_fixed_current_mode);
		device.update_variables();
		assert_eq!(device.loop_current.get_value(), 9.5);

		// level zero exits fixed current mode
		handle_request(&mut device, 40, &[0x00, 0x00, 0x00, 0x00]).unwrap();
		assert!(!device.is_fixed_current_mode);
	}

	#[test]
	fn test_cmd53_writes_variable_units() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 53, &[0x01, 0x21]).unwrap();
		assert_eq!(payload, vec![0x00, 0x00, 0x01, 0x21]);
		assert_eq!(device.variable(1).unwrap().units.get_value(), 0x21);
	}

	#[test]
	fn test_cmd53_unknown_variable_is_invalid_selection() {
		let mut device = hart7_device();
		let payload = handle_request(&mut device, 53, &[0xEE, 0x21]).unwrap();
		assert_eq!(payload, vec![INVALID_SELECTION, 0x00]);
	}

	#[test]
	fn test_cmd36_records_range_and_config_change() {
		let mut device = hart7_device();
		device.variable_mut(0).unwrap().value.set_value(7.5);
		device.simulated_variables.insert(0, 0.0);
		let payload = handle_request(&mut device, 36, &[]).unwrap();
		assert_eq!(payload, vec![0x00, 0x00]);
		assert_eq!(device.variable(0).unwrap().urv.get_value(), 7.5);
		assert_eq!(device.config_change_counter.get_value(), 1);
	}

	#[test]
	fn test_cmd12_reports_message() {
		let mut device = hart7_device();
		device.hart_message.set_value("up and running");
		let payload = handle_request(&mut device, 12, &[]).unwrap();
		assert_eq!(payload.len(), 2 + 24);
	}

	#[test]
	fn test_ack_and_back_frames_are_not_dispatched() {
		let device = hart7_device();
		let mut frame = HartFrame::new(FrameType::Ack, 123);
		frame.is_long_address = true;
		frame.long_address = device.unique_address();
		assert!(!should_dispatch(&device, &frame));
		frame.frame_type = FrameType::Back;
		assert!(!should_dispatch(&device, &frame));
		frame.frame_type = FrameType::Stx;
		assert!(should_dispatch(&device, &frame));
	}

	#[test]
	fn test_short_address_dispatch_requires_command_0() {
		let device = HartDevice {
			polling_address: U8::new(63),
			..HartDevice::default()
		};
		let mut frame = HartFrame::new(FrameType::Stx, 0);
		frame.short_address = 63;
		assert!(should_dispatch(&device, &frame));
		frame.short_address = 61;
		assert!(!should_dispatch(&device, &frame));
		frame.short_address = 63;
		frame.command_number = 1;
		assert!(!should_dispatch(&device, &frame));
	}

	#[test]
	fn test_long_address_dispatch_matches_unique_address() {
		let device = HartDevice {
			expanded_device_type: U16::new(0x9123),
			device_id: U24::new(0x456789),
			..HartDevice::default()
		};
		let mut frame = HartFrame::new(FrameType::Stx, 123);
		frame.is_long_address = true;
		frame.long_address = 0x1123456789;
		assert!(should_dispatch(&device, &frame));
		frame.long_address = 0x1121456789;
		assert!(!should_dispatch(&device, &frame));
		frame.long_address = 0x1123256789;
		assert!(!should_dispatch(&device, &frame));
	}

	const SPEC_WITH_COMMANDS: &str = r#"{
		"variables": [
			{"name": "expanded_device_type", "type": "U16", "value": 37155},
			{"name": "device_id", "type": "U24", "value": 4548489},
			{"name": "polling_address", "type": "U8", "value": 63},
			{"name": "response_code", "type": "U8"},
			{"name": "device_status", "type": "U8", "value": 52},
			{"name": "some_variable", "type": "U8", "value": 18},
			{"name": "another_variable", "type": "F32", "value": 1.234}
		],
		"commands": [
			{"number": 123, "request": [], "reply": [{"name": "some_variable"}]},
			{"number": 4567, "request": [{"name": "some_variable"}],
			 "reply": [{"name": "some_variable"}, {"name": "another_variable"}]}
		]
	}"#;

	fn spec_device() -> HartDevice {
		let spec: DeviceSpec = serde_json::from_str(SPEC_WITH_COMMANDS).unwrap();
		HartDevice::from_spec(&spec).unwrap()
	}

	#[test]
	fn test_custom_command_encodes_listed_variables() {
		let mut device = spec_device();
		let payload = handle_request(&mut device, 123, &[]).unwrap();
		assert_eq!(payload, vec![0x12]);
	}

	#[test]
	fn test_custom_command_not_implemented() {
		let mut device = spec_device();
		let payload = handle_request(&mut device, 121, &[]).unwrap();
		assert_eq!(payload, vec![0x40, 0x34]);
	}

	#[test]
	fn test_custom_command_decodes_request_fields() {
		let mut device = spec_device();
		let payload = handle_request(&mut device, 4567, &[0x7F]).unwrap();
		assert_eq!(payload.len(), 5);
		assert_eq!(payload[0], 0x7F);
	}

	#[test]
	fn test_custom_extended_command_through_cmd31() {
		let mut device = spec_device();
		// 4567 = 0x11D7
		let payload = handle_request(&mut device, 31, &[0x11, 0xD7, 0x55]).unwrap();
		// rc, status, extended number, then the custom reply minus its
		// (absent) header bytes
		assert_eq!(&payload[..4], &[0x55, 0x34, 0x11, 0xD7]);
	}
}

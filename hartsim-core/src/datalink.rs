use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serialport::SerialPort;

use crate::commands;
use crate::device::HartDevice;
use crate::error::Error;
use crate::framing::{FrameType, HartFrame, HartFrameBuilder, PREAMBLE};
use crate::logparser::{strip_preambles, LogResponseProvider};

/// HART runs at 1200 baud, odd parity, 8 data bits, 1 stop bit.
pub const BAUD_RATE: u32 = 1200;

const REPLY_PREAMBLES: usize = 3;
const REPLAY_PREAMBLES: usize = 5;
const IDLE_SLEEP: Duration = Duration::from_millis(10);
/// Inter-byte gap that ends a replayed request.
const FRAME_TIMEOUT: Duration = Duration::from_millis(100);

/// The transceiver as the link layer sees it: an opaque byte source/sink
/// with a DTR line enabling the transmitter.
pub trait HartPort {
	fn bytes_available(&mut self) -> Result<usize, Error>;
	fn read_available(&mut self) -> Result<Vec<u8>, Error>;
	fn write_bytes(&mut self, data: &[u8]) -> Result<(), Error>;
	fn set_transmit_enabled(&mut self, enabled: bool) -> Result<(), Error>;
	fn port_name(&self) -> String;
}

impl HartPort for Box<dyn serialport::SerialPort> {
	fn bytes_available(&mut self) -> Result<usize, Error> {
		Ok(self.bytes_to_read()? as usize)
	}

	fn read_available(&mut self) -> Result<Vec<u8>, Error> {
		let count = self.bytes_to_read()? as usize;
		let mut buffer = vec![0u8; count];
		self.read_exact(&mut buffer)?;
		Ok(buffer)
	}

	fn write_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
		self.write_all(data)?;
		self.flush()?;
		Ok(())
	}

	fn set_transmit_enabled(&mut self, enabled: bool) -> Result<(), Error> {
		self.write_data_terminal_ready(enabled)?;
		Ok(())
	}

	fn port_name(&self) -> String {
		self.name().unwrap_or_else(|| "serial".to_string())
	}
}

/// Opens `path` with the HART line settings.
pub fn open_port(path: &str) -> Result<Box<dyn serialport::SerialPort>, Error> {
	let port = serialport::new(path, BAUD_RATE)
		.data_bits(serialport::DataBits::Eight)
		.parity(serialport::Parity::Odd)
		.stop_bits(serialport::StopBits::One)
		.timeout(Duration::from_millis(100))
		.open()?;
	Ok(port)
}

/// Pumps bytes between the port and the frame parser, and answers requests
/// addressed to one of its devices.
///
/// The link owns the port and the devices exclusively; everything between
/// two reads runs to completion, matching HART's strictly turn-based
/// half-duplex discipline.
pub struct DataLink<P: HartPort> {
	port: P,
	devices: Vec<HartDevice>,
	frame_builder: HartFrameBuilder,
	short_addresses: HashMap<u8, usize>,
	long_addresses: HashMap<u64, usize>,
}

impl<P: HartPort> DataLink<P> {
	pub fn new(port: P, devices: Vec<HartDevice>) -> DataLink<P> {
		let mut short_addresses = HashMap::new();
		let mut long_addresses = HashMap::new();
		for (index, device) in devices.iter().enumerate() {
			short_addresses.insert(device.polling_address.get_value() as u8, index);
			long_addresses.insert(device.unique_address(), index);
		}
		DataLink {
			port,
			devices,
			frame_builder: HartFrameBuilder::new(),
			short_addresses,
			long_addresses,
		}
	}

	/// Runs the listen loop until `running` clears.
	pub fn run(&mut self, running: &AtomicBool) -> Result<(), Error> {
		self.port.set_transmit_enabled(false)?;
		info!("Listening on {}", self.port.port_name());
		for device in &self.devices {
			info!(
				"  Address #{}: Type=0x{:04X}, ID=0x{:06X}",
				device.polling_address.get_value(),
				device.expanded_device_type.get_value(),
				device.device_id.get_value()
			);
		}

		while running.load(Ordering::SeqCst) {
			if !self.poll()? {
				thread::sleep(IDLE_SLEEP);
			}
		}
		Ok(())
	}

	/// One pump iteration.  Returns true when bytes were consumed.
	pub fn poll(&mut self) -> Result<bool, Error> {
		if self.port.bytes_available()? == 0 {
			return Ok(false);
		}
		let data = self.port.read_available()?;
		let mut bytes = data.into_iter();
		loop {
			let frame_available = self.frame_builder.collect(&mut bytes);
			while let Some(request) = self.frame_builder.dequeue() {
				self.handle_frame(&request)?;
			}
			if !frame_available {
				break;
			}
		}
		Ok(true)
	}

	fn handle_frame(&mut self, request: &HartFrame) -> Result<(), Error> {
		let name = self.port.port_name();
		debug!("{}    <= {}", name, request);

		let index = if request.is_long_address {
			self.long_addresses.get(&request.long_address).copied()
		} else {
			self.short_addresses.get(&request.short_address).copied()
		};
		let index = match index {
			Some(index) => index,
			None => {
				debug!("{} => None", name);
				return Ok(());
			}
		};
		if !commands::should_dispatch(&self.devices[index], request) {
			debug!("{} => None", name);
			return Ok(());
		}

		let payload = commands::handle_request(
			&mut self.devices[index],
			u16::from(request.command_number),
			&request.data,
		)?;
		let device = &self.devices[index];
		let mut reply = HartFrame {
			frame_type: FrameType::Ack,
			command_number: request.command_number,
			is_long_address: request.is_long_address,
			short_address: device.polling_address.get_value() as u8,
			long_address: device.unique_address(),
			is_primary_master: request.is_primary_master,
			is_burst: device.is_burst_mode,
			data: payload,
			check_sum: None,
		};

		let mut bytes = vec![PREAMBLE; REPLY_PREAMBLES];
		bytes.extend(reply.serialize());
		self.port.set_transmit_enabled(true)?;
		self.port.write_bytes(&bytes)?;
		self.port.set_transmit_enabled(false)?;
		debug!(
			"{} #{} => {}",
			name,
			self.devices[index].polling_address.get_value(),
			reply
		);
		Ok(())
	}
}

fn hex_string(bytes: &[u8]) -> String {
	bytes.iter().map(|byte| format!("{:02X}", byte)).collect()
}

/// Replays recorded replies keyed by the request bytes.
///
/// Requests are framed by an inter-byte timeout rather than the parser: the
/// recorded log knows nothing about partial frames, so the raw bytes are the
/// lookup key (preambles stripped).
pub struct ReplayLink<P: HartPort> {
	port: P,
	provider: LogResponseProvider,
	buffer: Vec<u8>,
	last_byte: Instant,
}

impl<P: HartPort> ReplayLink<P> {
	pub fn new(port: P, provider: LogResponseProvider) -> ReplayLink<P> {
		ReplayLink {
			port,
			provider,
			buffer: Vec::new(),
			last_byte: Instant::now(),
		}
	}

	pub fn run(&mut self, running: &AtomicBool) -> Result<(), Error> {
		self.port.set_transmit_enabled(false)?;
		info!("Listening on {}", self.port.port_name());

		while running.load(Ordering::SeqCst) {
			if self.port.bytes_available()? > 0 {
				let data = self.port.read_available()?;
				self.buffer.extend_from_slice(&data);
				self.last_byte = Instant::now();
			} else if !self.buffer.is_empty() && self.last_byte.elapsed() > FRAME_TIMEOUT {
				self.flush_request()?;
			} else {
				thread::sleep(IDLE_SLEEP);
			}
		}
		Ok(())
	}

	fn flush_request(&mut self) -> Result<(), Error> {
		let request = strip_preambles(&self.buffer).to_vec();
		if !request.is_empty() {
			let name = self.port.port_name();
			match self.provider.get_response(&request) {
				Some(response) => {
					let mut bytes = vec![PREAMBLE; REPLAY_PREAMBLES];
					bytes.extend_from_slice(&response);
					self.port.set_transmit_enabled(true)?;
					self.port.write_bytes(&bytes)?;
					self.port.set_transmit_enabled(false)?;
					info!("{} <= {}", name, hex_string(&request));
					info!("{} => {}", name, hex_string(&response));
				}
				None => warn!("{} <= {} (no match)", name, hex_string(&request)),
			}
		}
		self.buffer.clear();
		Ok(())
	}
}

use std::collections::VecDeque;
use std::convert::TryFrom;
use std::fmt;

/// Frame type bits in the delimiter byte.
pub const DELIMITER_MASK: u8 = 0x07;
/// Long-address flag in the delimiter byte.
pub const LONG_ADDRESS_MASK: u8 = 0x80;
/// Primary-master flag in the first address byte.
pub const PRIMARY_MASTER_MASK: u8 = 0x80;
/// Burst-mode flag in the first address byte.
pub const BURST_MODE_MASK: u8 = 0x40;
/// Polling address bits: HART short addresses are 6 bits wide.
pub const ADDRESS_MASK: u8 = 0x3F;
/// Synchronization byte; at least two must precede a frame.
pub const PREAMBLE: u8 = 0xFF;

/// HART frame types, as encoded in the low delimiter bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
	/// Burst announcement, slave to masters.
	Back = 1,
	/// Master request.
	Stx = 2,
	/// Slave reply.
	Ack = 6,
}

impl TryFrom<u8> for FrameType {
	type Error = u8;

	fn try_from(value: u8) -> Result<FrameType, u8> {
		match value {
			1 => Ok(FrameType::Back),
			2 => Ok(FrameType::Stx),
			6 => Ok(FrameType::Ack),
			other => Err(other),
		}
	}
}

impl fmt::Display for FrameType {
	fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		match self {
			FrameType::Back => write!(formatter, "BACK"),
			FrameType::Stx => write!(formatter, "STX"),
			FrameType::Ack => write!(formatter, "ACK"),
		}
	}
}

/// One HART data-link frame.
///
/// The checksum is `None` on frames built for sending until
/// [HartFrame::serialize] runs, and always present on parsed frames.
#[derive(Debug, Clone, PartialEq)]
pub struct HartFrame {
	pub frame_type: FrameType,
	pub command_number: u8,
	pub is_long_address: bool,
	pub short_address: u8,
	pub long_address: u64,
	pub is_primary_master: bool,
	pub is_burst: bool,
	pub data: Vec<u8>,
	pub check_sum: Option<u8>,
}

impl HartFrame {
	pub fn new(frame_type: FrameType, command_number: u8) -> HartFrame {
		HartFrame {
			frame_type,
			command_number,
			is_long_address: false,
			short_address: 0,
			long_address: 0,
			is_primary_master: true,
			is_burst: false,
			data: Vec::new(),
			check_sum: None,
		}
	}

	fn to_bytes(&self) -> Vec<u8> {
		let mut encoded = Vec::with_capacity(8 + self.data.len());

		// delimiter
		let mut delimiter = self.frame_type as u8;
		if self.is_long_address {
			delimiter |= LONG_ADDRESS_MASK;
		}
		encoded.push(delimiter);

		// address
		let mut first_byte = if self.is_long_address {
			(self.long_address >> 32) as u8
		} else {
			self.short_address
		};
		if self.is_primary_master {
			first_byte |= PRIMARY_MASTER_MASK;
		}
		if self.is_burst {
			first_byte |= BURST_MODE_MASK;
		}
		encoded.push(first_byte);
		if self.is_long_address {
			encoded.push((self.long_address >> 24) as u8);
			encoded.push((self.long_address >> 16) as u8);
			encoded.push((self.long_address >> 8) as u8);
			encoded.push(self.long_address as u8);
		}

		// command number and byte count
		encoded.push(self.command_number);
		encoded.push(self.data.len() as u8);

		// data
		encoded.extend_from_slice(&self.data);

		encoded
	}

	fn compute_check_sum(bytes: &[u8]) -> u8 {
		bytes.iter().fold(0, |check_sum, byte| check_sum ^ byte)
	}

	/// Serializes the frame, updating the stored checksum to the computed
	/// longitudinal XOR.
	pub fn serialize(&mut self) -> Vec<u8> {
		let mut encoded = self.to_bytes();
		let check_sum = HartFrame::compute_check_sum(&encoded);
		self.check_sum = Some(check_sum);
		encoded.push(check_sum);
		encoded
	}

	/// True when the stored checksum matches the recomputed XOR.  Computes
	/// without mutating the frame.
	pub fn is_valid(&self) -> bool {
		self.check_sum == Some(HartFrame::compute_check_sum(&self.to_bytes()))
	}
}

impl fmt::Display for HartFrame {
	fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		let master = if self.is_primary_master { "PRI" } else { "SEC" };
		let mode = if self.is_burst { "BST" } else { "POL" };
		let address = if self.is_long_address {
			format!("0x{:010X}", self.long_address)
		} else {
			format!("{}", self.short_address)
		};
		let check_sum = match self.check_sum {
			Some(value) if self.is_valid() => format!("0x{:02X} ", value),
			Some(value) => format!("0x{:02X}!", value),
			None => "???".to_string(),
		};
		let data = if self.data.is_empty() {
			"NONE".to_string()
		} else {
			let hex: String = self.data.iter().map(|byte| format!("{:02X}", byte)).collect();
			format!("0x{}", hex)
		};
		write!(
			formatter,
			"TYP({}) MST({}) MOD({}) ADR({}) CMD({:05}) SUM({}) DAT({})",
			self.frame_type, master, mode, address, self.command_number, check_sum, data
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
	Unknown,
	Preambles,
	ShortAddress,
	LongAddress,
	CommandNumber,
	ByteCount,
	Data,
	CheckSum,
}

/// Incremental frame parser.
///
/// Feed received bytes through [HartFrameBuilder::collect]; completed frames
/// are queued in arrival order and drained with [HartFrameBuilder::dequeue].
/// Malformed input never fails: an invalid delimiter sends the parser back
/// to hunting for preambles, and an abandoned partial frame is overwritten
/// by the next preamble sequence.
pub struct HartFrameBuilder {
	state: State,
	frame_type: FrameType,
	command_number: u8,
	is_long_address: bool,
	short_address: u8,
	long_address: u64,
	is_primary_master: bool,
	is_burst: bool,
	byte_count: u8,
	data: Vec<u8>,
	number_of_preambles: usize,
	long_address_length: usize,
	queue: VecDeque<HartFrame>,
}

impl Default for HartFrameBuilder {
	fn default() -> HartFrameBuilder {
		HartFrameBuilder::new()
	}
}

impl HartFrameBuilder {
	pub fn new() -> HartFrameBuilder {
		HartFrameBuilder {
			state: State::Unknown,
			frame_type: FrameType::Stx,
			command_number: 0,
			is_long_address: false,
			short_address: 0,
			long_address: 0,
			is_primary_master: false,
			is_burst: false,
			byte_count: 0,
			data: Vec::new(),
			number_of_preambles: 0,
			long_address_length: 0,
			queue: VecDeque::new(),
		}
	}

	fn reset(&mut self) {
		self.state = State::Unknown;
		self.number_of_preambles = 0;
		self.long_address_length = 0;
		self.data = Vec::new();
	}

	/// Consumes bytes from `bytes` until a frame completes or the input runs
	/// out.  Returns true when a new frame was queued; trailing bytes left
	/// on the iterator are picked up by the next call.
	pub fn collect<I>(&mut self, bytes: I) -> bool
	where
		I: IntoIterator<Item = u8>,
	{
		let mut new_frame_available = false;

		for item in bytes {
			match self.state {
				State::Unknown => {
					if item == PREAMBLE {
						self.number_of_preambles += 1;
					} else {
						self.number_of_preambles = 0;
					}
					if self.number_of_preambles >= 2 {
						self.state = State::Preambles;
					}
				}
				State::Preambles => {
					if item != PREAMBLE {
						match FrameType::try_from(item & DELIMITER_MASK) {
							Ok(frame_type) => {
								self.frame_type = frame_type;
								self.is_long_address =
									item & LONG_ADDRESS_MASK == LONG_ADDRESS_MASK;
								self.state = if self.is_long_address {
									State::LongAddress
								} else {
									State::ShortAddress
								};
								self.long_address = 0;
								self.short_address = 0;
								self.long_address_length = 0;
							}
							// not a delimiter: resynchronize
							Err(_) => self.state = State::Unknown,
						}
					}
				}
				State::ShortAddress => {
					self.short_address = item & ADDRESS_MASK;
					self.is_primary_master =
						item & PRIMARY_MASTER_MASK == PRIMARY_MASTER_MASK;
					self.is_burst = item & BURST_MODE_MASK == BURST_MODE_MASK;
					self.state = State::CommandNumber;
				}
				State::LongAddress => {
					if self.long_address_length == 0 {
						// the top address byte shares its upper bits with the
						// master and burst flags
						self.long_address = u64::from(item & ADDRESS_MASK);
						self.is_primary_master =
							item & PRIMARY_MASTER_MASK == PRIMARY_MASTER_MASK;
						self.is_burst = item & BURST_MODE_MASK == BURST_MODE_MASK;
					} else {
						self.long_address = (self.long_address << 8) | u64::from(item);
					}
					self.long_address_length += 1;
					if self.long_address_length == 5 {
						self.state = State::CommandNumber;
					}
				}
				State::CommandNumber => {
					self.command_number = item;
					self.state = State::ByteCount;
				}
				State::ByteCount => {
					self.byte_count = item;
					self.state = if self.byte_count > 0 {
						State::Data
					} else {
						State::CheckSum
					};
					self.data = Vec::with_capacity(self.byte_count as usize);
				}
				State::Data => {
					self.data.push(item);
					if self.data.len() == self.byte_count as usize {
						self.state = State::CheckSum;
					}
				}
				State::CheckSum => {
					let frame = HartFrame {
						frame_type: self.frame_type,
						command_number: self.command_number,
						is_long_address: self.is_long_address,
						short_address: self.short_address,
						long_address: self.long_address,
						is_primary_master: self.is_primary_master,
						is_burst: self.is_burst,
						data: std::mem::take(&mut self.data),
						check_sum: Some(item),
					};
					self.queue.push_back(frame);
					new_frame_available = true;
					self.reset();
					break;
				}
			}
		}

		new_frame_available
	}

	pub fn dequeue(&mut self) -> Option<HartFrame> {
		self.queue.pop_front()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hart_frame_short_address_to_bytes() {
		let mut target = HartFrame::new(FrameType::Ack, 0);
		target.short_address = 42;
		target.data = vec![0x01, 0x02, 0x03];
		let expected = vec![0x06, 0xAA, 0x00, 0x03, 0x01, 0x02, 0x03, 0xAF];
		assert_eq!(target.serialize(), expected);
		assert_eq!(target.check_sum, Some(0xAF));
		assert!(target.is_valid());
	}

	#[test]
	fn test_hart_frame_short_address_burst_mode_to_bytes() {
		let mut target = HartFrame::new(FrameType::Ack, 0);
		target.short_address = 42;
		target.is_burst = true;
		target.data = vec![0x01, 0x02, 0x03];
		let expected = vec![0x06, 0xEA, 0x00, 0x03, 0x01, 0x02, 0x03, 0xEF];
		assert_eq!(target.serialize(), expected);
	}

	#[test]
	fn test_hart_frame_long_address_to_bytes() {
		let mut target = HartFrame::new(FrameType::Ack, 0);
		target.is_long_address = true;
		target.long_address = 0x123456789A;
		target.data = vec![0x01, 0x02, 0x03];
		let expected = vec![
			0x86, 0x92, 0x34, 0x56, 0x78, 0x9A, 0x00, 0x03, 0x01, 0x02, 0x03, 0x97,
		];
		assert_eq!(target.serialize(), expected);
	}

	#[test]
	fn test_hart_frame_long_address_burst_mode_to_bytes() {
		let mut target = HartFrame::new(FrameType::Ack, 0);
		target.is_long_address = true;
		target.long_address = 0x123456789A;
		target.is_burst = true;
		target.data = vec![0x01, 0x02, 0x03];
		let expected = vec![
			0x86, 0xD2, 0x34, 0x56, 0x78, 0x9A, 0x00, 0x03, 0x01, 0x02, 0x03, 0xD7,
		];
		assert_eq!(target.serialize(), expected);
	}

	#[test]
	fn test_hart_frame_zero_byte_count_round_trip() {
		let mut target = HartFrame::new(FrameType::Stx, 0);
		target.short_address = 0;
		let bytes = target.serialize();
		assert_eq!(bytes, vec![0x02, 0x80, 0x00, 0x00, 0x82]);

		let mut builder = HartFrameBuilder::new();
		let mut stream = vec![PREAMBLE, PREAMBLE];
		stream.extend_from_slice(&bytes);
		assert!(builder.collect(stream));
		let parsed = builder.dequeue().unwrap();
		assert_eq!(parsed, target);
		assert!(parsed.is_valid());
	}

	#[test]
	fn test_hart_frame_short_address_deserialize() {
		let serialized = vec![
			0xFF, 0x10, 0xFF, 0xFF, 0x06, 0xAA, 0x00, 0x03, 0x01, 0x02, 0x03, 0xAF,
		];
		let mut builder = HartFrameBuilder::new();
		assert!(builder.collect(serialized));
		let target = builder.dequeue().unwrap();
		assert_eq!(target.frame_type, FrameType::Ack);
		assert_eq!(target.is_long_address, false);
		assert_eq!(target.short_address, 42);
		assert_eq!(target.is_primary_master, true);
		assert_eq!(target.is_burst, false);
		assert_eq!(target.command_number, 0);
		assert_eq!(target.data, vec![0x01, 0x02, 0x03]);
		assert_eq!(target.check_sum, Some(0xAF));
	}

	#[test]
	fn test_hart_frame_long_address_deserialize() {
		let serialized = vec![
			0xFF, 0xFF, 0x10, 0xFF, 0xFF, 0x86, 0x92, 0x34, 0x56, 0x78, 0x9A, 0x00, 0x03,
			0x01, 0x02, 0x03, 0x97,
		];
		let mut builder = HartFrameBuilder::new();
		assert!(builder.collect(serialized));
		let target = builder.dequeue().unwrap();
		assert_eq!(target.frame_type, FrameType::Ack);
		assert_eq!(target.is_long_address, true);
		assert_eq!(target.long_address, 0x123456789A);
		assert_eq!(target.is_primary_master, true);
		assert_eq!(target.is_burst, false);
		assert_eq!(target.command_number, 0);
		assert_eq!(target.data, vec![0x01, 0x02, 0x03]);
		assert_eq!(target.check_sum, Some(0x97));
	}

	#[test]
	fn test_hart_frame_long_address_no_data_deserialize() {
		let serialized = vec![
			0xFF, 0xFF, 0x86, 0x92, 0x34, 0x56, 0x78, 0x9A, 0x00, 0x00, 0x97,
		];
		let mut builder = HartFrameBuilder::new();
		assert!(builder.collect(serialized));
		let target = builder.dequeue().unwrap();
		assert_eq!(target.long_address, 0x123456789A);
		assert_eq!(target.data, Vec::<u8>::new());
		assert_eq!(target.check_sum, Some(0x97));
	}

	#[test]
	fn test_builder_resynchronizes_after_noise() {
		let serialized = vec![
			0x00, 0x55, 0xFF, 0xFF, 0x06, 0xAA, 0x00, 0x03, 0x01, 0x02, 0x03, 0xAF,
		];
		let mut builder = HartFrameBuilder::new();
		let mut stream = serialized.into_iter();
		let mut frames = Vec::new();
		while builder.collect(&mut stream) {
			while let Some(frame) = builder.dequeue() {
				frames.push(frame);
			}
		}
		assert_eq!(frames.len(), 1);
		assert_eq!(frames[0].frame_type, FrameType::Ack);
		assert_eq!(frames[0].short_address, 42);
		assert_eq!(frames[0].command_number, 0);
		assert_eq!(frames[0].data, vec![0x01, 0x02, 0x03]);
	}

	#[test]
	fn test_builder_parses_two_concatenated_frames_in_order() {
		let mut first = HartFrame::new(FrameType::Stx, 1);
		first.short_address = 7;
		let mut second = HartFrame::new(FrameType::Stx, 2);
		second.short_address = 8;

		let mut stream = vec![PREAMBLE, PREAMBLE];
		stream.extend(first.serialize());
		stream.extend(vec![PREAMBLE, PREAMBLE]);
		stream.extend(second.serialize());

		let mut builder = HartFrameBuilder::new();
		let mut bytes = stream.into_iter();
		assert!(builder.collect(&mut bytes));
		assert!(builder.collect(&mut bytes));
		assert!(!builder.collect(&mut bytes));

		assert_eq!(builder.dequeue().unwrap(), first);
		assert_eq!(builder.dequeue().unwrap(), second);
		assert!(builder.dequeue().is_none());
	}

	#[test]
	fn test_builder_handles_split_input() {
		let mut frame = HartFrame::new(FrameType::Stx, 1);
		frame.is_long_address = true;
		frame.long_address = 0x2606123456;
		frame.data = vec![0xAB];
		let mut stream = vec![PREAMBLE, PREAMBLE, PREAMBLE];
		stream.extend(frame.serialize());

		let mut builder = HartFrameBuilder::new();
		let (head, tail) = stream.split_at(6);
		assert!(!builder.collect(head.iter().copied()));
		assert!(builder.collect(tail.iter().copied()));
		assert_eq!(builder.dequeue().unwrap(), frame);
	}

	#[test]
	fn test_hart_frame_display_format() {
		let mut target = HartFrame::new(FrameType::Stx, 234);
		target.is_long_address = true;
		target.long_address = 0x123456789A;
		target.is_primary_master = false;
		target.is_burst = true;
		target.data = vec![0x01, 0x02, 0x03];
		target.check_sum = Some(0x56);
		assert_eq!(
			format!("{}", target),
			"TYP(STX) MST(SEC) MOD(BST) ADR(0x123456789A) CMD(00234) SUM(0x56!) DAT(0x010203)"
		);
	}

	#[test]
	fn test_hart_frame_display_without_check_sum() {
		let target = HartFrame::new(FrameType::Back, 123);
		assert_eq!(
			format!("{}", target),
			"TYP(BACK) MST(PRI) MOD(POL) ADR(0) CMD(00123) SUM(???) DAT(NONE)"
		);
	}
}

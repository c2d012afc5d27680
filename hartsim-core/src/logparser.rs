use std::collections::HashMap;
use std::fs;
use std::path::Path;

use regex::{Captures, Regex};

use crate::error::Error;
use crate::framing::{FrameType, ADDRESS_MASK, LONG_ADDRESS_MASK, PREAMBLE, PRIMARY_MASTER_MASK};

/// Request frames (preambles stripped) mapped to the replies recorded for
/// them, in log order.
pub type RequestResponses = HashMap<Vec<u8>, Vec<Vec<u8>>>;

/// Strips leading 0xFF preamble bytes from frame data.
pub fn strip_preambles(data: &[u8]) -> &[u8] {
	let start = data
		.iter()
		.position(|byte| *byte != PREAMBLE)
		.unwrap_or(data.len());
	&data[start..]
}

struct LogPatterns {
	raw_request: Regex,
	raw_response: Regex,
	fdi_request: Regex,
	fdi_response: Regex,
	fdi_frame: Regex,
}

impl LogPatterns {
	fn new() -> Result<LogPatterns, Error> {
		Ok(LogPatterns {
			raw_request: Regex::new(
				r#"Master MAC on \("[^"]+"\) Tx: time [\d.]+ data "([0-9A-Fa-f]+)""#,
			)?,
			raw_response: Regex::new(
				r#"RCV_MSG \("[^"]+"\): time [\d.]+ \(ACK\) \d+\+\d+ bytes "([0-9A-Fa-f]+)""#,
			)?,
			fdi_request: Regex::new(r#"Sending "([^"]+)""#)?,
			fdi_response: Regex::new(
				r#"Received "FrameTransmissionResult \{ Status = Success, Response = ([^"]+?) \}""#,
			)?,
			fdi_frame: Regex::new(
				r#"(?:POL\((\d+)\)|TYP\(0x([0-9A-Fa-f]+)\) UID\(0x([0-9A-Fa-f]+)\)) CMD\((\d+)\)(?: DAT\(([0-9A-Fa-f-]+)\))?"#,
			)?,
		})
	}
}

fn decode_hex(text: &str) -> Vec<u8> {
	text.as_bytes()
		.chunks(2)
		.filter_map(|pair| std::str::from_utf8(pair).ok())
		.filter_map(|pair| u8::from_str_radix(pair, 16).ok())
		.collect()
}

fn parse_fdi_hex(text: &str) -> Vec<u8> {
	text.split('-')
		.filter_map(|pair| u8::from_str_radix(pair, 16).ok())
		.collect()
}

/// Rebuilds the wire frame an FDI log line describes.
///
/// Requests become STX frames with the primary-master bit set; responses
/// become ACK frames without it, matching how the recorder printed them.
fn build_frame(captures: &Captures, is_response: bool) -> Vec<u8> {
	let frame_type = if is_response {
		FrameType::Ack
	} else {
		FrameType::Stx
	} as u8;
	let command = captures
		.get(4)
		.and_then(|group| group.as_str().parse::<u32>().ok())
		.unwrap_or(0) as u8;
	let data = captures
		.get(5)
		.map(|group| parse_fdi_hex(group.as_str()))
		.unwrap_or_default();

	let mut frame = Vec::new();
	if let Some(polling) = captures.get(1) {
		let address = polling.as_str().parse::<u8>().unwrap_or(0) & ADDRESS_MASK;
		frame.push(frame_type);
		frame.push(if is_response {
			address
		} else {
			address | PRIMARY_MASTER_MASK
		});
	} else {
		let device_type = captures
			.get(2)
			.and_then(|group| u16::from_str_radix(group.as_str(), 16).ok())
			.unwrap_or(0);
		let device_id = captures
			.get(3)
			.and_then(|group| u32::from_str_radix(group.as_str(), 16).ok())
			.unwrap_or(0);
		frame.push(frame_type | LONG_ADDRESS_MASK);
		let mut first_byte = ((device_type >> 8) as u8) & ADDRESS_MASK;
		if !is_response {
			first_byte |= PRIMARY_MASTER_MASK;
		}
		frame.push(first_byte);
		frame.push(device_type as u8);
		frame.push((device_id >> 16) as u8);
		frame.push((device_id >> 8) as u8);
		frame.push(device_id as u8);
	}
	frame.push(command);
	frame.push(data.len() as u8);
	frame.extend_from_slice(&data);
	let check_sum = frame.iter().fold(0, |check_sum, byte| check_sum ^ byte);
	frame.push(check_sum);
	frame
}

/// Parses a master communication log into request/response pairs.
///
/// Two line formats are recognized: raw hex dumps and FDI frame notation.
/// A request line without a following response is dropped; response lines
/// without a pending request are ignored.
pub fn parse_log_file<P: AsRef<Path>>(path: P) -> Result<RequestResponses, Error> {
	let content = fs::read_to_string(path)?;
	parse_log(&content)
}

pub fn parse_log(content: &str) -> Result<RequestResponses, Error> {
	let patterns = LogPatterns::new()?;
	let mut request_responses: RequestResponses = HashMap::new();
	let mut pending_request: Option<Vec<u8>> = None;

	for line in content.lines() {
		if let Some(captures) = patterns.raw_request.captures(line) {
			let raw = decode_hex(&captures[1]);
			pending_request = Some(strip_preambles(&raw).to_vec());
			continue;
		}
		if let Some(captures) = patterns.raw_response.captures(line) {
			if let Some(request) = pending_request.take() {
				request_responses
					.entry(request)
					.or_default()
					.push(decode_hex(&captures[1]));
			}
			continue;
		}
		if let Some(captures) = patterns.fdi_response.captures(line) {
			if let Some(frame_captures) = patterns.fdi_frame.captures(&captures[1]) {
				if let Some(request) = pending_request.take() {
					request_responses
						.entry(request)
						.or_default()
						.push(build_frame(&frame_captures, true));
				}
			}
			continue;
		}
		if let Some(captures) = patterns.fdi_request.captures(line) {
			if let Some(frame_captures) = patterns.fdi_frame.captures(&captures[1]) {
				pending_request = Some(build_frame(&frame_captures, false));
			}
		}
	}

	Ok(request_responses)
}

/// Serves recorded responses with round-robin selection per request.
pub struct LogResponseProvider {
	request_responses: RequestResponses,
	response_indices: HashMap<Vec<u8>, usize>,
}

impl LogResponseProvider {
	pub fn new(request_responses: RequestResponses) -> LogResponseProvider {
		LogResponseProvider {
			request_responses,
			response_indices: HashMap::new(),
		}
	}

	/// The next recorded response for `request`, or `None` when the log
	/// never saw it.
	pub fn get_response(&mut self, request: &[u8]) -> Option<Vec<u8>> {
		let responses = self.request_responses.get(request)?;
		let index = self.response_indices.get(request).copied().unwrap_or(0);
		let response = responses.get(index)?.clone();
		self.response_indices
			.insert(request.to_vec(), (index + 1) % responses.len());
		Some(response)
	}

	pub fn request_count(&self) -> usize {
		self.request_responses.len()
	}

	pub fn total_response_count(&self) -> usize {
		self.request_responses.values().map(|responses| responses.len()).sum()
	}
}

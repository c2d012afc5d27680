use std::io;
use thiserror::Error;

/// Various framing, payload, and device construction errors
#[derive(Error, Debug)]
pub enum Error {
	/// This error means a payload field ran out of input bytes before it was
	/// fully decoded.
	///
	/// Sequence decoding absorbs this at optional-trailing boundaries; for a
	/// mandatory field it surfaces to the dispatcher, which answers with
	/// response code 64.
	#[error("unexpected end of payload data")]
	UnexpectedEndOfData,
	/// This error means a request selected a device variable code the device
	/// does not define.  The dispatcher answers with response code 2
	/// (Invalid Selection).
	#[error("unknown device variable code: `{0}`")]
	UnknownDeviceVariable(u8),
	/// This error means a device spec file is structurally valid JSON but
	/// fails validation (missing or mistyped required variables, a command
	/// referring to an undeclared variable, ...).
	#[error("invalid device spec: {0}")]
	InvalidDeviceSpec(String),

	#[error("i/o error")]
	Io(#[from] io::Error),

	#[error("serial port error")]
	Serial(#[from] serialport::Error),

	#[error("malformed configuration or spec file")]
	Json(#[from] serde_json::Error),

	#[error("log pattern error")]
	Pattern(#[from] regex::Error),
}

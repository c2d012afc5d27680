//! This crate simulates HART field devices on a serial link.
//!
//! A HART master polls the simulator; the simulator parses frames,
//! dispatches commands against a per-device state model, and returns
//! correctly framed replies indistinguishable from a real transmitter.
//! Protocol revisions 5 and 7 are covered: the universal commands, the
//! common-practice commands, and a spec-file-defined set of device-specific
//! commands.
//!
//! # Layers
//!
//! * [payload] — bit-exact typed field codec (sized unsigned integers,
//!   big-endian IEEE-754 singles, fixed ASCII, 6-bit Packed ASCII, greedy
//!   byte arrays) composed into ordered sequences with optional-trailing
//!   semantics.
//! * [framing] — the byte-oriented parser that recovers frames from a noisy
//!   half-duplex stream (preambles, short/long address, XOR checksum) and
//!   the symmetric serializer.
//! * [device] — per-device mutable state: identity, status, variables,
//!   configuration, and the declarative spec loader.
//! * [commands] — request validation, command routing, and reply assembly.
//! * [datalink] — the synchronous listen loop gluing a serial port to the
//!   dispatcher, and the log-replay variant.
//!
//! # Reserved behavior
//!
//! Real masters tolerate devices that oscillate: every command 9 read swaps
//! the variable's units with its alternate units, and every command 48 read
//! swaps the first device-specific status byte with its alternate.  The
//! simulator reproduces this on purpose.

mod config;
mod error;

pub mod commands;
pub mod datalink;
pub mod device;
pub mod framing;
pub mod logparser;
pub mod payload;

pub use config::Configuration;
pub use datalink::{open_port, DataLink, HartPort, ReplayLink};
pub use device::{DeviceSpec, DeviceVariable, HartDevice};
pub use error::Error;
pub use framing::{FrameType, HartFrame, HartFrameBuilder};
pub use logparser::{parse_log_file, strip_preambles, LogResponseProvider};
pub use payload::{Ascii, GreedyU8Array, PackedAscii, Payload, PayloadSequence, Value, F32, U16, U24, U32, U8};

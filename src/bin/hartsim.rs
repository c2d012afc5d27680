use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::{error, info, LevelFilter};

use hartsim_core::payload::{Ascii, PackedAscii, U16, U24, U8};
use hartsim_core::{open_port, Configuration, DataLink, DeviceSpec, Error, HartDevice};

#[derive(Debug, Parser)]
#[command(name = "hartsim", about = "Simulate HART field devices on a serial link")]
struct Options {
	/// Simulator configuration file
	config: PathBuf,

	/// Log level (off, error, warn, info, debug, trace)
	#[arg(long, default_value = "info")]
	log_level: LevelFilter,
}

fn main() -> ExitCode {
	let options = Options::parse();
	let _ = simplelog::SimpleLogger::init(options.log_level, simplelog::Config::default());

	let configuration = match Configuration::load(&options.config) {
		Ok(configuration) => configuration,
		Err(error) => {
			error!("Cannot load {}: {}", options.config.display(), error);
			return ExitCode::from(1);
		}
	};

	let devices = match load_devices(&configuration) {
		Ok(devices) => devices,
		Err(error) => {
			error!("{}", error);
			return ExitCode::from(1);
		}
	};

	let port = match open_port(&configuration.port) {
		Ok(port) => port,
		Err(error) => {
			error!("Cannot open {}: {}", configuration.port, error);
			return ExitCode::from(2);
		}
	};

	let running = Arc::new(AtomicBool::new(true));
	let interrupt_flag = running.clone();
	if let Err(error) = ctrlc::set_handler(move || interrupt_flag.store(false, Ordering::SeqCst)) {
		error!("Cannot install the interrupt handler: {}", error);
	}

	let mut link = DataLink::new(port, devices);
	match link.run(&running) {
		Ok(()) => ExitCode::SUCCESS,
		Err(error) => {
			error!("Serial link failure: {}", error);
			ExitCode::from(2)
		}
	}
}

fn load_devices(configuration: &Configuration) -> Result<Vec<HartDevice>, Error> {
	if configuration.devices.is_empty() {
		info!("No device specs configured, simulating the built-in pair");
		return Ok(default_devices());
	}
	configuration
		.devices
		.iter()
		.map(|path| {
			let spec = DeviceSpec::load(path)?;
			HartDevice::from_spec(&spec)
		})
		.collect()
}

/// A HART 7 transmitter at polling address 0 and a HART 5 legacy device at
/// address 1.
fn default_devices() -> Vec<HartDevice> {
	let transmitter = HartDevice {
		polling_address: U8::new(0),
		expanded_device_type: U16::new(0x2606),
		device_id: U24::new(0x123456),
		hart_tag: PackedAscii::with_value(8, "3051 r10"),
		hart_long_tag: Ascii::with_value(32, "This is 3051 rev 10"),
		..HartDevice::default()
	};
	let legacy = HartDevice {
		universal_revision: U8::new(5),
		polling_address: U8::new(1),
		expanded_device_type: U16::new(0x9979),
		device_id: U24::new(0x789ABC),
		hart_tag: PackedAscii::with_value(8, "150 r10"),
		hart_long_tag: Ascii::with_value(32, "This is 150 rev 10"),
		..HartDevice::default()
	};
	vec![transmitter, legacy]
}

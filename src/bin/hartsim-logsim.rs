use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn, LevelFilter};

use hartsim_core::{open_port, parse_log_file, Configuration, LogResponseProvider, ReplayLink};

#[derive(Debug, Parser)]
#[command(
	name = "hartsim-logsim",
	about = "Replay recorded HART replies from a master communication log"
)]
struct Options {
	/// Master communication log file
	log_file: PathBuf,

	/// Simulator configuration file (for the serial port path)
	#[arg(long, default_value = "config.json")]
	config: PathBuf,

	/// Log level (off, error, warn, info, debug, trace)
	#[arg(long, default_value = "info")]
	log_level: LevelFilter,
}

fn main() -> ExitCode {
	let options = Options::parse();
	let _ = simplelog::SimpleLogger::init(options.log_level, simplelog::Config::default());

	info!("Loading log file: {}", options.log_file.display());
	let recorded = match parse_log_file(&options.log_file) {
		Ok(recorded) => recorded,
		Err(error) => {
			error!("Cannot parse {}: {}", options.log_file.display(), error);
			return ExitCode::from(1);
		}
	};

	let provider = LogResponseProvider::new(recorded);
	info!(
		"Loaded {} unique requests, {} total responses",
		provider.request_count(),
		provider.total_response_count()
	);
	if provider.request_count() == 0 {
		warn!("No request/response pairs found in the log file");
	}

	let configuration = match Configuration::load(&options.config) {
		Ok(configuration) => configuration,
		Err(error) => {
			error!("Cannot load {}: {}", options.config.display(), error);
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

	let mut link = ReplayLink::new(port, provider);
	match link.run(&running) {
		Ok(()) => ExitCode::SUCCESS,
		Err(error) => {
			error!("Serial link failure: {}", error);
			ExitCode::from(2)
		}
	}
}

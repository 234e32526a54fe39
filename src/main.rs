extern crate kpcn_rust;
#[macro_use]
extern crate log;

use kpcn_rust::logging::{self, LogConfig, LogFormat};
use kpcn_rust::{cli, commands};

fn main() {
	let app_m = cli::build_cli();
	init_logger(&app_m);

	let result = match app_m.subcommand() {
		("train", Some(sub_m)) => commands::train(sub_m),
		("summary", Some(sub_m)) => commands::summary(sub_m),
		("generate-config", Some(sub_m)) => commands::generate_config(sub_m),
		_ => Ok(()),
	};

	if let Err(err) = result {
		error!("Error: {}", err);
		std::process::exit(1);
	}
}

/// Structured tracing output when `train --log_format` is given, plain env_logger otherwise.
fn init_logger(app_m: &clap::ArgMatches) {
	let format = app_m
		.subcommand_matches("train")
		.and_then(|sub_m| sub_m.value_of("LOG_FORMAT"))
		.and_then(|format| format.parse::<LogFormat>().ok());

	match format {
		Some(format) => {
			let config = LogConfig {
				format,
				..LogConfig::default()
			};
			if let Err(err) = logging::init_logging(config) {
				logging::init_simple_logger();
				warn!("Falling back to plain logging: {}", err);
			}
		},
		None => logging::init_simple_logger(),
	}
}

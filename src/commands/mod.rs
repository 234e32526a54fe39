pub mod generate_config;
pub mod summary;
pub mod train;

pub use self::generate_config::generate_config;
pub use self::summary::summary;
pub use self::train::train;

use std::str::FromStr;

use clap::ArgMatches;
use log::info;

use crate::config_file::DenoiserConfigFile;
use crate::error::{DenoiserError, Result};

/// Loads `--config` (or the defaults) and applies the model flags shared by every
/// subcommand on top of it.
pub(crate) fn load_config_file(app_m: &ArgMatches) -> Result<DenoiserConfigFile> {
	let mut file = match app_m.value_of("CONFIG_FILE") {
		Some(path) => {
			let file = DenoiserConfigFile::from_file(path)?;
			info!("Loaded configuration from: {}", path);
			file
		},
		None => DenoiserConfigFile::generate_default(),
	};

	if let Some(patch_size) = parse_arg(app_m, "PATCH_SIZE", "Patch size must be an integer")? {
		file.model.patch_size = patch_size;
	}
	if let Some(channels) = parse_arg(app_m, "INPUT_CHANNELS", "Input channels must be an integer")? {
		file.model.input_channels = channels;
	}
	if let Some(channels) = parse_arg(app_m, "OUTPUT_CHANNELS", "Output channels must be an integer")? {
		file.model.output_channels = channels;
	}
	if let Some(filters) = parse_arg(app_m, "FILTERS", "Filters must be an integer")? {
		file.model.hidden_filters = filters;
	}

	Ok(file)
}

/// Parses an optional flag value, mapping failures to `InvalidParameter(message)`.
pub(crate) fn parse_arg<T: FromStr>(app_m: &ArgMatches, name: &str, message: &str) -> Result<Option<T>> {
	match app_m.value_of(name) {
		Some(value) => value
			.parse()
			.map(Some)
			.map_err(|_| DenoiserError::InvalidParameter(format!("{}, got '{}'", message, value))),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cli::build_app;

	#[test]
	fn test_flags_override_defaults() {
		let matches = build_app().get_matches_from(vec!["kpcn", "summary", "--patch_size", "40", "--filters", "8"]);
		let (_, sub_m) = matches.subcommand();
		let file = load_config_file(sub_m.unwrap()).unwrap();
		assert_eq!(file.model.patch_size, 40);
		assert_eq!(file.model.hidden_filters, 8);
		assert_eq!(file.model.input_channels, 3);
	}

	#[test]
	fn test_bad_number_is_invalid_parameter() {
		let matches = build_app().get_matches_from(vec!["kpcn", "summary", "--patch_size", "big"]);
		let (_, sub_m) = matches.subcommand();
		let err = load_config_file(sub_m.unwrap()).unwrap_err();
		assert!(matches!(err, DenoiserError::InvalidParameter(_)));
	}
}

use clap::ArgMatches;
use log::info;

use super::load_config_file;
use crate::error::Result;
use crate::network::build_denoiser;

pub fn summary(app_m: &ArgMatches) -> Result<()> {
	let config = load_config_file(app_m)?.to_denoiser_config();
	let model = build_denoiser(&config)?;

	info!(
		"Denoiser for {}x{} patches with {} input and {} output channels",
		config.patch_size, config.patch_size, config.input_channels, config.output_channels
	);
	println!("{}", model.summary());
	Ok(())
}

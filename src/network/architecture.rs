use rand::Rng;

use super::init::seeded_rng;
use super::layer::{Activation, LayerSpec};
use super::model::Sequential;
use crate::config::DenoiserConfig;
use crate::constants::network::{CONV_STAGES, KERNEL_SIZE, STRIDE};
use crate::error::Result;

/// The nine convolution stages of the denoiser.
///
/// Every stage is a 5x5, stride 1, valid, biased convolution with Glorot uniform
/// kernels. Stages 1-8 use `hidden_filters` filters and ReLU; the first also pins the
/// input patch shape. The last stage predicts `output_channels` values per pixel with
/// no activation.
pub fn denoiser_layer_specs(config: &DenoiserConfig) -> Vec<LayerSpec> {
	let kernel = (KERNEL_SIZE, KERNEL_SIZE);
	let hidden = || {
		LayerSpec::conv2d(config.hidden_filters, kernel)
			.with_stride((STRIDE, STRIDE))
			.with_activation(Activation::Relu)
	};

	let mut specs = Vec::with_capacity(CONV_STAGES);
	specs.push(hidden().with_input_shape((config.patch_size, config.patch_size, config.input_channels)));
	for _ in 1..CONV_STAGES - 1 {
		specs.push(hidden());
	}
	specs.push(
		LayerSpec::conv2d(config.output_channels, kernel)
			.with_stride((STRIDE, STRIDE))
			.with_activation(Activation::Linear),
	);
	specs
}

pub fn build_denoiser(config: &DenoiserConfig) -> Result<Sequential> {
	build_denoiser_with_rng(config, &mut seeded_rng(config.seed))
}

pub fn build_denoiser_with_rng<R: Rng + ?Sized>(config: &DenoiserConfig, rng: &mut R) -> Result<Sequential> {
	config.validate()?;
	let model = Sequential::from_specs(&denoiser_layer_specs(config), rng)?;
	log::debug!(
		"built denoiser: input {:?}, output {:?}, {} parameters",
		model.input_shape(),
		model.output_shape(),
		model.parameter_count()
	);
	Ok(model)
}

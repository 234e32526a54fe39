use crate::constants::{network, training};
use crate::error::{DenoiserError, Result};
use crate::training::{FitOptions, Loss};

/// Model and optimiser settings shared by the model builder and the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct DenoiserConfig {
	pub patch_size: usize,
	pub input_channels: usize,
	pub output_channels: usize,
	pub hidden_filters: usize,
	pub learning_rate: f32,
	pub num_epochs: usize,
	pub seed: Option<u64>,
}

impl Default for DenoiserConfig {
	fn default() -> Self {
		Self {
			patch_size: network::DEFAULT_PATCH_SIZE,
			input_channels: network::DEFAULT_INPUT_CHANNELS,
			output_channels: network::DEFAULT_OUTPUT_CHANNELS,
			hidden_filters: network::DEFAULT_HIDDEN_FILTERS,
			learning_rate: training::DEFAULT_LEARNING_RATE,
			num_epochs: training::DEFAULT_NUM_EPOCHS,
			seed: None,
		}
	}
}

impl DenoiserConfig {
	pub fn builder() -> DenoiserConfigBuilder {
		DenoiserConfigBuilder::default()
	}

	pub fn validate(&self) -> Result<()> {
		if self.patch_size <= network::RECEPTIVE_SHRINK {
			return Err(DenoiserError::Config(format!(
				"Patch size ({}) must be greater than {}, the extent lost to the {} valid convolutions",
				self.patch_size,
				network::RECEPTIVE_SHRINK,
				network::CONV_STAGES
			)));
		}
		if self.input_channels == 0 {
			return Err(DenoiserError::Config("Input channels must be greater than 0".into()));
		}
		if self.output_channels == 0 {
			return Err(DenoiserError::Config("Output channels must be greater than 0".into()));
		}
		if self.hidden_filters == 0 {
			return Err(DenoiserError::Config("Hidden filters must be greater than 0".into()));
		}
		if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
			return Err(DenoiserError::Config(format!(
				"Learning rate ({}) must be a finite number greater than 0",
				self.learning_rate
			)));
		}
		if self.num_epochs == 0 {
			return Err(DenoiserError::Config("Number of epochs must be greater than 0".into()));
		}
		Ok(())
	}

	/// Spatial extent of the patches the trained network produces.
	pub fn output_patch_size(&self) -> Option<usize> {
		self.patch_size.checked_sub(network::RECEPTIVE_SHRINK)
	}
}

#[derive(Default)]
pub struct DenoiserConfigBuilder {
	patch_size: Option<usize>,
	input_channels: Option<usize>,
	output_channels: Option<usize>,
	hidden_filters: Option<usize>,
	learning_rate: Option<f32>,
	num_epochs: Option<usize>,
	seed: Option<u64>,
}

impl DenoiserConfigBuilder {
	pub fn patch_size(mut self, patch_size: usize) -> Self {
		self.patch_size = Some(patch_size);
		self
	}

	pub fn input_channels(mut self, channels: usize) -> Self {
		self.input_channels = Some(channels);
		self
	}

	pub fn output_channels(mut self, channels: usize) -> Self {
		self.output_channels = Some(channels);
		self
	}

	pub fn hidden_filters(mut self, filters: usize) -> Self {
		self.hidden_filters = Some(filters);
		self
	}

	pub fn learning_rate(mut self, rate: f32) -> Self {
		self.learning_rate = Some(rate);
		self
	}

	pub fn num_epochs(mut self, epochs: usize) -> Self {
		self.num_epochs = Some(epochs);
		self
	}

	pub fn seed(mut self, seed: u64) -> Self {
		self.seed = Some(seed);
		self
	}

	pub fn build(self) -> DenoiserConfig {
		let defaults = DenoiserConfig::default();
		DenoiserConfig {
			patch_size: self.patch_size.unwrap_or(defaults.patch_size),
			input_channels: self.input_channels.unwrap_or(defaults.input_channels),
			output_channels: self.output_channels.unwrap_or(defaults.output_channels),
			hidden_filters: self.hidden_filters.unwrap_or(defaults.hidden_filters),
			learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
			num_epochs: self.num_epochs.unwrap_or(defaults.num_epochs),
			seed: self.seed.or(defaults.seed),
		}
	}
}

/// Settings for a single fit run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
	/// Overrides `DenoiserConfig::num_epochs` when set.
	pub epochs: Option<usize>,
	pub batch_size: usize,
	pub shuffle: bool,
	pub loss: Loss,
	pub track_accuracy: bool,
	pub terminate_on_nan: bool,
	pub evaluate: bool,
	pub verbose: bool,
}

impl Default for TrainingConfig {
	fn default() -> Self {
		Self {
			epochs: None,
			batch_size: training::DEFAULT_BATCH_SIZE,
			shuffle: false,
			loss: Loss::MeanAbsoluteError,
			track_accuracy: false,
			terminate_on_nan: true,
			evaluate: false,
			verbose: true,
		}
	}
}

impl TrainingConfig {
	pub fn builder() -> TrainingConfigBuilder {
		TrainingConfigBuilder::default()
	}

	pub fn validate(&self) -> Result<()> {
		if self.batch_size == 0 {
			return Err(DenoiserError::Config(format!(
				"Batch size ({}) must be greater than 0",
				self.batch_size
			)));
		}
		if self.epochs == Some(0) {
			return Err(DenoiserError::Config("Epochs must be greater than 0".into()));
		}
		Ok(())
	}

	pub fn effective_epochs(&self, config: &DenoiserConfig) -> usize {
		self.epochs.unwrap_or(config.num_epochs)
	}

	pub fn fit_options(&self, config: &DenoiserConfig) -> FitOptions {
		FitOptions {
			epochs: self.effective_epochs(config),
			batch_size: self.batch_size,
			shuffle: self.shuffle,
			seed: config.seed,
			terminate_on_nan: self.terminate_on_nan,
			verbose: self.verbose,
		}
	}
}

#[derive(Default)]
pub struct TrainingConfigBuilder {
	epochs: Option<usize>,
	batch_size: Option<usize>,
	shuffle: Option<bool>,
	loss: Option<Loss>,
	track_accuracy: Option<bool>,
	terminate_on_nan: Option<bool>,
	evaluate: Option<bool>,
	verbose: Option<bool>,
}

impl TrainingConfigBuilder {
	pub fn epochs(mut self, epochs: usize) -> Self {
		self.epochs = Some(epochs);
		self
	}

	pub fn batch_size(mut self, size: usize) -> Self {
		self.batch_size = Some(size);
		self
	}

	pub fn shuffle(mut self, shuffle: bool) -> Self {
		self.shuffle = Some(shuffle);
		self
	}

	pub fn loss(mut self, loss: Loss) -> Self {
		self.loss = Some(loss);
		self
	}

	pub fn track_accuracy(mut self, track: bool) -> Self {
		self.track_accuracy = Some(track);
		self
	}

	pub fn terminate_on_nan(mut self, terminate: bool) -> Self {
		self.terminate_on_nan = Some(terminate);
		self
	}

	pub fn evaluate(mut self, evaluate: bool) -> Self {
		self.evaluate = Some(evaluate);
		self
	}

	pub fn verbose(mut self, verbose: bool) -> Self {
		self.verbose = Some(verbose);
		self
	}

	pub fn build(self) -> TrainingConfig {
		let defaults = TrainingConfig::default();
		TrainingConfig {
			epochs: self.epochs.or(defaults.epochs),
			batch_size: self.batch_size.unwrap_or(defaults.batch_size),
			shuffle: self.shuffle.unwrap_or(defaults.shuffle),
			loss: self.loss.unwrap_or(defaults.loss),
			track_accuracy: self.track_accuracy.unwrap_or(defaults.track_accuracy),
			terminate_on_nan: self.terminate_on_nan.unwrap_or(defaults.terminate_on_nan),
			evaluate: self.evaluate.unwrap_or(defaults.evaluate),
			verbose: self.verbose.unwrap_or(defaults.verbose),
		}
	}
}

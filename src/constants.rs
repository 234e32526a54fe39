pub mod network {
	pub const DEFAULT_PATCH_SIZE: usize = 64;
	pub const DEFAULT_INPUT_CHANNELS: usize = 3;
	pub const DEFAULT_OUTPUT_CHANNELS: usize = 3;
	pub const DEFAULT_HIDDEN_FILTERS: usize = 100;
	pub const CONV_STAGES: usize = 9;
	pub const KERNEL_SIZE: usize = 5;
	pub const STRIDE: usize = 1;

	/// Extent lost along each spatial axis by the whole stack of valid convolutions.
	pub const RECEPTIVE_SHRINK: usize = CONV_STAGES * (KERNEL_SIZE - 1);
}

pub mod training {
	pub const DEFAULT_LEARNING_RATE: f32 = 1e-5;
	pub const DEFAULT_NUM_EPOCHS: usize = 200;
	pub const DEFAULT_BATCH_SIZE: usize = 32;
	pub const ADAM_BETA1: f32 = 0.9;
	pub const ADAM_BETA2: f32 = 0.999;
	pub const ADAM_EPSILON: f32 = 1e-7;
	pub const BINARY_ACCURACY_THRESHOLD: f32 = 0.5;
}

pub mod data {
	pub const TRAIN_SPLIT: &str = "train";
	pub const TEST_SPLIT: &str = "test";
	pub const COLOUR_BUFFER: &str = "colour";
	pub const DEFAULT_SYNTHETIC_SAMPLES: usize = 64;
	pub const DEFAULT_NOISE_LEVEL: f32 = 0.1;
}

pub mod file {
	pub const TOML_EXTENSION: &str = "toml";
	pub const JSON_EXTENSION: &str = "json";
	pub const DEFAULT_CONFIG_FILE: &str = "denoiser_config.toml";
}

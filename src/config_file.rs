use crate::config::{DenoiserConfig, TrainingConfig};
use crate::constants::{data, file, network, training};
use crate::error::{DenoiserError, Result};
use crate::training::{Loss, SyntheticProvider};
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Run configuration that can be loaded from a TOML or JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenoiserConfigFile {
    /// Network architecture
    #[serde(default)]
    pub model: ModelSection,

    /// Optimiser and fit settings
    #[serde(default)]
    pub training: TrainingSection,

    /// Synthetic dataset settings
    #[serde(default)]
    pub data: DataSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Square input patch extent (default: 64)
    pub patch_size: usize,

    /// Channels of the noisy input (default: 3)
    pub input_channels: usize,

    /// Channels of the denoised output (default: 3)
    pub output_channels: usize,

    /// Filters in each of the eight hidden stages (default: 100)
    pub hidden_filters: usize,

    /// Seed for weight initialisation, shuffling and synthetic data (optional)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    /// Learning rate for the Adam optimiser (default: 0.00001)
    pub learning_rate: f32,

    /// Declared epoch count (default: 200)
    pub num_epochs: usize,

    /// Epoch count for this run, overriding num_epochs (optional)
    pub epochs: Option<usize>,

    /// Samples per batch (default: 32)
    pub batch_size: usize,

    /// Loss function: "L1" or "L2" (default: "L1")
    pub loss: String,

    /// Reshuffle samples every epoch (default: false)
    pub shuffle: bool,

    /// Report the accuracy metric (default: false)
    pub track_accuracy: bool,

    /// Abort when the loss stops being finite (default: true)
    pub terminate_on_nan: bool,

    /// Evaluate on the test split after fitting (default: false)
    pub evaluate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Training patch pairs to generate (default: 64)
    pub samples: usize,

    /// Test patch pairs to generate (default: 16)
    pub test_samples: usize,

    /// Half-width of the uniform noise added to the references (default: 0.1)
    pub noise_level: f32,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            patch_size: network::DEFAULT_PATCH_SIZE,
            input_channels: network::DEFAULT_INPUT_CHANNELS,
            output_channels: network::DEFAULT_OUTPUT_CHANNELS,
            hidden_filters: network::DEFAULT_HIDDEN_FILTERS,
            seed: None,
        }
    }
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            learning_rate: training::DEFAULT_LEARNING_RATE,
            num_epochs: training::DEFAULT_NUM_EPOCHS,
            epochs: None,
            batch_size: training::DEFAULT_BATCH_SIZE,
            loss: Loss::MeanAbsoluteError.to_string(),
            shuffle: false,
            track_accuracy: false,
            terminate_on_nan: true,
            evaluate: false,
        }
    }
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            samples: data::DEFAULT_SYNTHETIC_SAMPLES,
            test_samples: data::DEFAULT_SYNTHETIC_SAMPLES / 4,
            noise_level: data::DEFAULT_NOISE_LEVEL,
        }
    }
}

impl Default for DenoiserConfigFile {
    fn default() -> Self {
        Self::generate_default()
    }
}

impl DenoiserConfigFile {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        toml::from_str(&contents)
            .map_err(|e| DenoiserError::Parse(format!("Failed to parse TOML config: {}", e)))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        serde_json::from_str(&contents)
            .map_err(|e| DenoiserError::Parse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Load configuration, picking the format from the file extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(file::JSON_EXTENSION) => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| DenoiserError::Serialization(format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| DenoiserError::Serialization(format!("Failed to serialize to JSON: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    pub fn to_denoiser_config(&self) -> DenoiserConfig {
        DenoiserConfig {
            patch_size: self.model.patch_size,
            input_channels: self.model.input_channels,
            output_channels: self.model.output_channels,
            hidden_filters: self.model.hidden_filters,
            learning_rate: self.training.learning_rate,
            num_epochs: self.training.num_epochs,
            seed: self.model.seed,
        }
    }

    pub fn to_training_config(&self) -> Result<TrainingConfig> {
        let loss = self.training.loss.parse::<Loss>().map_err(|_| {
            DenoiserError::InvalidParameter(format!(
                "Invalid loss type: {}. Must be L1 or L2",
                self.training.loss
            ))
        })?;

        Ok(TrainingConfig {
            epochs: self.training.epochs,
            batch_size: self.training.batch_size,
            shuffle: self.training.shuffle,
            loss,
            track_accuracy: self.training.track_accuracy,
            terminate_on_nan: self.training.terminate_on_nan,
            evaluate: self.training.evaluate,
            ..TrainingConfig::default()
        })
    }

    /// Synthetic provider producing patches that fit the configured model
    pub fn to_synthetic_provider(&self) -> SyntheticProvider {
        SyntheticProvider {
            train_samples: self.data.samples,
            test_samples: self.data.test_samples,
            patch_size: self.model.patch_size,
            input_channels: self.model.input_channels,
            output_channels: self.model.output_channels,
            noise_level: self.data.noise_level,
            seed: self.model.seed,
        }
    }

    /// Generate a default configuration file
    pub fn generate_default() -> Self {
        Self {
            model: ModelSection::default(),
            training: TrainingSection::default(),
            data: DataSection::default(),
        }
    }

    /// Create an example configuration file with comments
    pub fn create_example_toml() -> String {
        r#"# Monte Carlo denoiser training configuration

[model]
# Square patch extent fed to the network. The nine 5x5 valid
# convolutions trim 36 pixels, so 64 yields 28x28 predictions.
# Must be greater than 36.
patch_size = 64

# Channels of the noisy input and of the denoised output
input_channels = 3
output_channels = 3

# Filters in each hidden stage
hidden_filters = 100

# Fix the seed for reproducible weights and data (optional)
# seed = 42

[training]
# Learning rate for the Adam optimiser
learning_rate = 0.00001

# Declared number of passes over the dataset
num_epochs = 200

# Override the epoch count for this run (optional)
# epochs = 5

# Patch pairs per optimiser step
batch_size = 32

# Loss function: "L1" (mean absolute error) or "L2" (mean squared error)
loss = "L1"

# Reshuffle the samples every epoch
shuffle = false

# Also report accuracy (argmax over channels), of limited use for regression
track_accuracy = false

# Stop as soon as the loss is NaN or infinite
terminate_on_nan = true

# Evaluate on the test split once fitting completes
evaluate = false

[data]
# Synthetic patch pairs for the train and test splits
samples = 64
test_samples = 16

# Noise added to the reference patches is drawn from [-noise_level, noise_level]
noise_level = 0.1
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DenoiserConfigFile::generate_default();
        assert_eq!(config.model.patch_size, 64);
        assert_eq!(config.training.learning_rate, 0.00001);
        assert_eq!(config.training.loss, "L1");
        assert_eq!(config.data.samples, 64);
    }

    #[test]
    fn test_example_matches_default() {
        let example: DenoiserConfigFile = toml::from_str(&DenoiserConfigFile::create_example_toml()).unwrap();
        assert_eq!(example, DenoiserConfigFile::generate_default());
    }

    #[test]
    fn test_to_configs() {
        let mut file = DenoiserConfigFile::generate_default();
        file.training.epochs = Some(5);
        file.training.loss = "L2".to_string();

        let config = file.to_denoiser_config();
        assert_eq!(config, DenoiserConfig::default());

        let training = file.to_training_config().unwrap();
        assert_eq!(training.loss, Loss::MeanSquaredError);
        assert_eq!(training.effective_epochs(&config), 5);
    }

    #[test]
    fn test_invalid_loss() {
        let mut file = DenoiserConfigFile::generate_default();
        file.training.loss = "L3".to_string();
        assert!(matches!(file.to_training_config(), Err(DenoiserError::InvalidParameter(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file: DenoiserConfigFile = toml::from_str("[model]\npatch_size = 40\n").unwrap();
        assert_eq!(file.model.patch_size, 40);
        assert_eq!(file.model.hidden_filters, 100);
        assert_eq!(file.training, TrainingSection::default());
    }

    #[test]
    fn test_save_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = DenoiserConfigFile::generate_default();
        config.model.seed = Some(7);
        config.to_toml_file(&path).unwrap();

        let loaded = DenoiserConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = DenoiserConfigFile::generate_default();
        config.to_json_file(&path).unwrap();

        let loaded = DenoiserConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}

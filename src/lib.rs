//! Trains a nine stage convolutional network that maps noisy Monte Carlo render
//! patches to their converged reference.
//!
//! ```no_run
//! use kpcn_rust::config::{DenoiserConfig, TrainingConfig};
//! use kpcn_rust::network::build_denoiser;
//! use kpcn_rust::training::{Adam, DatasetProvider, SyntheticProvider, Trainer};
//!
//! # fn main() -> kpcn_rust::error::Result<()> {
//! let config = DenoiserConfig::default();
//! let training = TrainingConfig::builder().epochs(5).build();
//! let dataset = SyntheticProvider::default().load()?;
//! let train = dataset.pair("train", "colour")?;
//!
//! let model = build_denoiser(&config)?;
//! let mut trainer = Trainer::compile(model, Adam::new(config.learning_rate), training.loss, vec![]);
//! trainer.fit(train.noisy(), train.reference(), &training.fit_options(&config))?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod constants;
pub mod error;
pub mod logging;
pub mod network;
pub mod training;

pub use crate::config::{DenoiserConfig, TrainingConfig};
pub use crate::error::{DenoiserError, Result};
pub use crate::network::{build_denoiser, Sequential};
pub use crate::training::{Adam, FitOptions, History, Loss, Metric, Trainer};

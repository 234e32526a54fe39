use clap::ArgMatches;
use log::info;

use super::{load_config_file, parse_arg};
use crate::config::{DenoiserConfig, TrainingConfig};
use crate::constants::data::{COLOUR_BUFFER, TEST_SPLIT, TRAIN_SPLIT};
use crate::error::{DenoiserError, Result};
use crate::network::build_denoiser;
use crate::training::{Adam, DatasetProvider, Evaluation, History, Loss, Metric, Trainer};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainingReport {
	pub history: History,
	pub evaluation: Option<Evaluation>,
	pub parameters: usize,
}

pub fn train(app_m: &ArgMatches) -> Result<()> {
	let mut file = load_config_file(app_m)?;

	if let Some(rate) = parse_arg(app_m, "LEARNING_RATE", "Learning rate must be a number")? {
		file.training.learning_rate = rate;
	}
	if let Some(epochs) = parse_arg(app_m, "NUM_EPOCHS", "Number of epochs must be an integer")? {
		file.training.num_epochs = epochs;
	}
	if let Some(epochs) = parse_arg(app_m, "EPOCHS", "Epochs must be an integer")? {
		file.training.epochs = Some(epochs);
	}
	if let Some(batch_size) = parse_arg(app_m, "BATCH_SIZE", "Batch size must be an integer")? {
		file.training.batch_size = batch_size;
	}
	if let Some(loss) = app_m.value_of("TRAINING_LOSS") {
		file.training.loss = loss.to_string();
	}
	if let Some(seed) = parse_arg(app_m, "SEED", "Seed must be an unsigned integer")? {
		file.model.seed = Some(seed);
	}
	if let Some(samples) = parse_arg(app_m, "SAMPLES", "Samples must be an integer")? {
		file.data.samples = samples;
	}
	if let Some(noise) = parse_arg(app_m, "NOISE", "Noise level must be a number")? {
		file.data.noise_level = noise;
	}
	file.training.shuffle |= app_m.is_present("SHUFFLE");
	file.training.track_accuracy |= app_m.is_present("ACCURACY");
	file.training.evaluate |= app_m.is_present("EVALUATE");

	let config = file.to_denoiser_config();
	let mut training = file.to_training_config()?;
	training.verbose = !app_m.is_present("QUIET");

	run_training(&config, &training, &file.to_synthetic_provider()).map(|_| ())
}

/// Builds the denoiser, fits it to the provider's training split and optionally evaluates
/// it on the test split.
pub fn run_training(
	config: &DenoiserConfig,
	training: &TrainingConfig,
	provider: &dyn DatasetProvider,
) -> Result<TrainingReport> {
	config.validate()?;
	training.validate()?;
	print_training_info(config, training);

	let dataset = provider.load()?;
	let train = dataset.pair(TRAIN_SPLIT, COLOUR_BUFFER)?;
	info!("Loaded {} training patch pairs", train.len());

	let model = build_denoiser(config)?;
	let parameters = model.parameter_count();
	info!("Built denoiser with {} parameters", parameters);

	let metrics = if training.track_accuracy {
		vec![Metric::Accuracy]
	} else {
		Vec::new()
	};
	let mut trainer = Trainer::compile(model, Adam::new(config.learning_rate), training.loss, metrics);

	info!("Beginning training");
	let history = trainer.fit(train.noisy(), train.reference(), &training.fit_options(config))?;
	if let Some(loss) = history.final_loss() {
		info!("Done. Final loss: {:.6}", loss);
	}

	let evaluation = if training.evaluate {
		let test = dataset.pair(TEST_SPLIT, COLOUR_BUFFER).map_err(|_| {
			DenoiserError::Dataset("Evaluation requested but the dataset has no test split".into())
		})?;
		let evaluation = trainer.evaluate(test.noisy(), test.reference(), training.batch_size)?;
		info!("Evaluation: {}", evaluation);
		Some(evaluation)
	} else {
		None
	};

	Ok(TrainingReport {
		history,
		evaluation,
		parameters,
	})
}

fn print_training_info(config: &DenoiserConfig, training: &TrainingConfig) {
	info!("Training with:");
	info!(
		" patch {}x{} -> {}x{}",
		config.patch_size,
		config.patch_size,
		config.output_patch_size().unwrap_or(0),
		config.output_patch_size().unwrap_or(0)
	);
	info!(" channels {} -> {}", config.input_channels, config.output_channels);
	info!(" hidden filters {}", config.hidden_filters);
	match training.loss {
		Loss::MeanAbsoluteError => info!(" L1 loss"),
		Loss::MeanSquaredError => info!(" L2 loss"),
	}
	info!(" learning rate {}", config.learning_rate);
	info!(
		" {} epochs of batch size {}{}",
		training.effective_epochs(config),
		training.batch_size,
		if training.shuffle { ", shuffled" } else { "" }
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::training::SyntheticProvider;

	#[test]
	fn test_run_training_small() {
		let config = DenoiserConfig::builder()
			.patch_size(38)
			.hidden_filters(2)
			.learning_rate(1e-3)
			.seed(2)
			.build();
		let training = TrainingConfig::builder().epochs(1).batch_size(2).verbose(false).evaluate(true).build();
		let provider = SyntheticProvider {
			train_samples: 3,
			test_samples: 2,
			patch_size: 38,
			seed: Some(2),
			..SyntheticProvider::default()
		};

		let report = run_training(&config, &training, &provider).unwrap();
		assert_eq!(report.history.len(), 1);
		assert_eq!(report.evaluation.map(|e| e.samples), Some(2));
	}

	#[test]
	fn test_evaluate_without_test_split() {
		let config = DenoiserConfig::builder().patch_size(38).hidden_filters(2).seed(2).build();
		let training = TrainingConfig::builder().epochs(1).verbose(false).evaluate(true).build();
		let provider = SyntheticProvider {
			train_samples: 2,
			test_samples: 0,
			patch_size: 38,
			seed: Some(2),
			..SyntheticProvider::default()
		};
		let err = run_training(&config, &training, &provider).unwrap_err();
		assert!(matches!(err, DenoiserError::Dataset(_)));
	}
}

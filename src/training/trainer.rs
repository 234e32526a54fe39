use std::fmt;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{ArrayView4, Axis};

use super::data_loader::{center_crop, Batch, DataLoader};
use super::loss::{Loss, Metric};
use super::optimizer::Optimizer;
use crate::constants::training::DEFAULT_BATCH_SIZE;
use crate::error::{DenoiserError, Result};
use crate::logging::OperationLogger;
use crate::network::{seeded_rng, Sequential};

/// Per-call settings for [`Trainer::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
	pub epochs: usize,
	pub batch_size: usize,
	pub shuffle: bool,
	pub seed: Option<u64>,
	pub terminate_on_nan: bool,
	pub verbose: bool,
}

impl Default for FitOptions {
	fn default() -> Self {
		FitOptions {
			epochs: 1,
			batch_size: DEFAULT_BATCH_SIZE,
			shuffle: false,
			seed: None,
			terminate_on_nan: true,
			verbose: false,
		}
	}
}

impl FitOptions {
	pub fn validate(&self) -> Result<()> {
		if self.epochs == 0 {
			return Err(DenoiserError::InvalidParameter("Epoch count must be greater than 0".into()));
		}
		if self.batch_size == 0 {
			return Err(DenoiserError::InvalidParameter("Batch size must be greater than 0".into()));
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
	pub epoch: usize,
	pub loss: f32,
	pub metrics: Vec<(Metric, f32)>,
	pub elapsed: Duration,
}

impl fmt::Display for EpochSummary {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "epoch {}\tloss: {:.6}", self.epoch, self.loss)?;
		for (metric, value) in &self.metrics {
			write!(f, "\t{}: {:.4}", metric.name(), value)?;
		}
		write!(f, "\t({:.1}s)", self.elapsed.as_secs_f32())
	}
}

/// One summary per completed epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
	pub epochs: Vec<EpochSummary>,
}

impl History {
	pub fn len(&self) -> usize {
		self.epochs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.epochs.is_empty()
	}

	pub fn losses(&self) -> Vec<f32> {
		self.epochs.iter().map(|e| e.loss).collect()
	}

	pub fn final_loss(&self) -> Option<f32> {
		self.epochs.last().map(|e| e.loss)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
	pub loss: f32,
	pub metrics: Vec<(Metric, f32)>,
	pub samples: usize,
}

impl fmt::Display for Evaluation {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "loss: {:.6}", self.loss)?;
		for (metric, value) in &self.metrics {
			write!(f, "\t{}: {:.4}", metric.name(), value)?;
		}
		write!(f, "\t({} samples)", self.samples)
	}
}

/// Running, sample weighted means of the loss and each metric.
struct Accumulator {
	loss: f64,
	metrics: Vec<f64>,
	samples: usize,
}

impl Accumulator {
	fn new(metrics: usize) -> Self {
		Accumulator {
			loss: 0.0,
			metrics: vec![0.0; metrics],
			samples: 0,
		}
	}

	fn add(&mut self, samples: usize, loss: f32, metrics: &[f32]) {
		self.loss += loss as f64 * samples as f64;
		for (total, value) in self.metrics.iter_mut().zip(metrics) {
			*total += *value as f64 * samples as f64;
		}
		self.samples += samples;
	}

	fn loss(&self) -> f32 {
		(self.loss / self.samples.max(1) as f64) as f32
	}

	fn metrics(&self, names: &[Metric]) -> Vec<(Metric, f32)> {
		names
			.iter()
			.zip(&self.metrics)
			.map(|(&metric, total)| (metric, (total / self.samples.max(1) as f64) as f32))
			.collect()
	}
}

/// A model bound to an optimizer, a loss and the metrics to report.
///
/// The trainer owns the model while fitting; every batch updates the weights in place.
pub struct Trainer<O: Optimizer> {
	model: Sequential,
	optimizer: O,
	loss: Loss,
	metrics: Vec<Metric>,
	steps: u64,
}

impl<O: Optimizer> Trainer<O> {
	pub fn compile(model: Sequential, optimizer: O, loss: Loss, metrics: Vec<Metric>) -> Self {
		log::debug!(
			"compiled model: loss {}, learning rate {}, metrics {:?}",
			loss,
			optimizer.learning_rate(),
			metrics
		);
		Trainer {
			model,
			optimizer,
			loss,
			metrics,
			steps: 0,
		}
	}

	pub fn model(&self) -> &Sequential {
		&self.model
	}

	pub fn into_model(self) -> Sequential {
		self.model
	}

	pub fn optimizer(&self) -> &O {
		&self.optimizer
	}

	pub fn loss(&self) -> Loss {
		self.loss
	}

	pub fn metrics(&self) -> &[Metric] {
		&self.metrics
	}

	/// Optimizer updates applied so far.
	pub fn steps(&self) -> u64 {
		self.steps
	}

	/// Fits the model to `noisy -> reference` pairs.
	///
	/// Every shape is checked before the first update, so a mismatch leaves the weights
	/// untouched.
	pub fn fit<'a>(
		&mut self,
		noisy: ArrayView4<'a, f32>,
		reference: ArrayView4<'a, f32>,
		options: &FitOptions,
	) -> Result<History> {
		options.validate()?;
		let reference = self.prepare_reference(noisy, reference)?;
		let samples = noisy.len_of(Axis(0));

		let mut operation = OperationLogger::new("fit");
		operation.add_metadata("samples", samples.to_string());
		operation.add_metadata("epochs", options.epochs.to_string());
		operation.add_metadata("batch_size", options.batch_size.to_string());
		operation.add_metadata("parameters", self.model.parameter_count().to_string());

		let mut rng = seeded_rng(options.seed);
		let mut history = History::default();

		for epoch in 1..=options.epochs {
			let started = Instant::now();
			let mut loader = DataLoader::new(noisy, reference, options.batch_size)?;
			if options.shuffle {
				loader = loader.shuffle(&mut rng);
			}

			let progress = epoch_progress(options.verbose, loader.num_batches() as u64, epoch, options.epochs);
			let mut totals = Accumulator::new(self.metrics.len());
			for batch in loader {
				let (loss, metrics) = match self.train_step(&batch, options.terminate_on_nan) {
					Ok(result) => result,
					Err(err) => {
						progress.abandon();
						operation.log_error(&err);
						return Err(err);
					},
				};
				totals.add(batch.len(), loss, &metrics);
				progress.set_message(format!("loss: {:.6}", totals.loss()));
				progress.inc(1);
			}
			progress.finish_and_clear();

			let summary = EpochSummary {
				epoch,
				loss: totals.loss(),
				metrics: totals.metrics(&self.metrics),
				elapsed: started.elapsed(),
			};
			log::info!("{}/{} {}", epoch, options.epochs, summary);
			operation.log_progress(format!("epoch {} loss {:.6}", epoch, summary.loss));
			history.epochs.push(summary);
		}

		if let Some(loss) = history.final_loss() {
			operation.add_metadata("final_loss", format!("{:.6}", loss));
		}
		operation.complete();
		Ok(history)
	}

	/// Loss and metrics over the given pairs without touching the weights.
	pub fn evaluate<'a>(
		&self,
		noisy: ArrayView4<'a, f32>,
		reference: ArrayView4<'a, f32>,
		batch_size: usize,
	) -> Result<Evaluation> {
		let reference = self.prepare_reference(noisy, reference)?;
		let loader = DataLoader::new(noisy, reference, batch_size)?;

		let mut totals = Accumulator::new(self.metrics.len());
		for batch in loader {
			let prediction = self.model.predict(batch.noisy.view())?;
			let loss = self.loss.value(prediction.view(), batch.reference.view())?;
			let metrics = self.compute_metrics(prediction.view(), batch.reference.view())?;
			totals.add(batch.len(), loss, &metrics);
		}

		Ok(Evaluation {
			loss: totals.loss(),
			metrics: totals.metrics(&self.metrics),
			samples: totals.samples,
		})
	}

	/// Forward, loss, backward and one optimizer step. Metrics are measured on the
	/// prediction made before the update.
	fn train_step(&mut self, batch: &Batch, terminate_on_nan: bool) -> Result<(f32, Vec<f32>)> {
		self.model.zero_grad();
		let tape = self.model.forward_with_tape(batch.noisy.view())?;
		let prediction = tape
			.last()
			.ok_or_else(|| DenoiserError::Training("forward pass recorded no activations".into()))?;
		let (loss, grad) = self.loss.evaluate(prediction.view(), batch.reference.view())?;
		let metrics = self.compute_metrics(prediction.view(), batch.reference.view())?;

		if !loss.is_finite() {
			if terminate_on_nan {
				return Err(DenoiserError::Training(format!(
					"loss became {} after {} steps",
					loss, self.steps
				)));
			}
			log::warn!("non-finite loss {} at step {}", loss, self.steps);
		}

		self.model.backward(&tape, grad)?;
		let mut parameters = self.model.parameters_mut();
		self.optimizer.step(&mut parameters)?;
		self.steps += 1;
		Ok((loss, metrics))
	}

	fn compute_metrics(&self, prediction: ArrayView4<f32>, reference: ArrayView4<f32>) -> Result<Vec<f32>> {
		self.metrics
			.iter()
			.map(|metric| metric.compute(prediction.view(), reference.view()))
			.collect()
	}

	/// Checks the pair against the model and returns the reference at the output extent.
	/// A reference with the input extent is centre cropped; anything else is a mismatch.
	fn prepare_reference<'a>(&self, noisy: ArrayView4<f32>, reference: ArrayView4<'a, f32>) -> Result<ArrayView4<'a, f32>> {
		let (samples, h, w, c) = noisy.dim();
		let (ih, iw, ic) = self.model.input_shape();
		let (oh, ow, oc) = self.model.output_shape();

		if (h, w, c) != (ih, iw, ic) {
			return Err(DenoiserError::ShapeMismatch(format!(
				"noisy patches are {}x{}x{}, model expects {}x{}x{}",
				h, w, c, ih, iw, ic
			)));
		}
		if samples == 0 {
			return Err(DenoiserError::ShapeMismatch("no samples to train on".into()));
		}

		let (ref_samples, rh, rw, rc) = reference.dim();
		if ref_samples != samples {
			return Err(DenoiserError::ShapeMismatch(format!(
				"{} noisy patches but {} reference patches",
				samples, ref_samples
			)));
		}
		if rc != oc {
			return Err(DenoiserError::ShapeMismatch(format!(
				"reference patches have {} channels, model outputs {}",
				rc, oc
			)));
		}

		if (rh, rw) == (oh, ow) {
			Ok(reference)
		} else if (rh, rw) == (ih, iw) {
			center_crop(reference, oh, ow)
		} else {
			Err(DenoiserError::ShapeMismatch(format!(
				"reference patches are {}x{}, expected {}x{} or {}x{}",
				rh, rw, oh, ow, ih, iw
			)))
		}
	}
}

fn epoch_progress(verbose: bool, batches: u64, epoch: usize, epochs: usize) -> ProgressBar {
	if !verbose {
		return ProgressBar::hidden();
	}
	let pb = ProgressBar::new(batches);
	pb.set_style(
		ProgressStyle::default_bar()
			.template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
			.unwrap_or_else(|_| ProgressStyle::default_bar())
			.progress_chars("=>-"),
	);
	pb.set_prefix(format!("Epoch {}/{}", epoch, epochs));
	pb
}

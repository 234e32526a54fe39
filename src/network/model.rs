use std::fmt;

use ndarray::{Array4, ArrayView4};
use rand::Rng;

use super::conv::Conv2d;
use super::layer::{Activation, LayerSpec, Shape3};
use super::parameter::Parameter;
use crate::error::{DenoiserError, Result};

/// A linear stack of convolution layers; layer `i` feeds layer `i + 1`.
#[derive(Debug, Clone)]
pub struct Sequential {
	layers: Vec<Conv2d>,
	specs: Vec<LayerSpec>,
}

impl Sequential {
	/// Builds a model from layer records. The first record must declare the input shape,
	/// every later shape is inferred, and any stage that would leave an empty output is
	/// rejected as a configuration error.
	pub fn from_specs<R: Rng + ?Sized>(specs: &[LayerSpec], rng: &mut R) -> Result<Self> {
		let first = specs
			.first()
			.ok_or_else(|| DenoiserError::Config("A model needs at least one layer".into()))?;
		let mut shape = first
			.input_shape
			.ok_or_else(|| DenoiserError::Config("The first layer must declare its input shape".into()))?;

		let mut layers = Vec::with_capacity(specs.len());
		for (index, spec) in specs.iter().enumerate() {
			if let Some(declared) = spec.input_shape {
				if declared != shape {
					return Err(DenoiserError::Config(format!(
						"Layer {} declares input shape {:?} but receives {:?}",
						index + 1,
						declared,
						shape
					)));
				}
			}
			let layer = Conv2d::from_spec(format!("conv2d_{}", index + 1), spec, shape, rng)?;
			shape = layer.output_shape();
			layers.push(layer);
		}

		Ok(Sequential {
			layers,
			specs: specs.to_vec(),
		})
	}

	pub fn layers(&self) -> &[Conv2d] {
		&self.layers
	}

	pub fn specs(&self) -> &[LayerSpec] {
		&self.specs
	}

	pub fn input_shape(&self) -> Shape3 {
		self.layers[0].input_shape()
	}

	pub fn output_shape(&self) -> Shape3 {
		self.layers[self.layers.len() - 1].output_shape()
	}

	pub fn predict(&self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
		let mut output = self.layers[0].forward(input)?;
		for layer in &self.layers[1..] {
			output = layer.forward(output.view())?;
		}
		Ok(output)
	}

	/// Forward pass keeping every intermediate activation for `backward`.
	/// `tape[0]` is the input and `tape[i + 1]` the output of layer `i`.
	pub fn forward_with_tape(&self, input: ArrayView4<f32>) -> Result<Vec<Array4<f32>>> {
		let mut tape = Vec::with_capacity(self.layers.len() + 1);
		tape.push(input.to_owned());
		for layer in &self.layers {
			let output = layer.forward(tape[tape.len() - 1].view())?;
			tape.push(output);
		}
		Ok(tape)
	}

	/// Backpropagates `grad_output` through the recorded tape, leaving a gradient on every
	/// parameter.
	pub fn backward(&mut self, tape: &[Array4<f32>], grad_output: Array4<f32>) -> Result<()> {
		if tape.len() != self.layers.len() + 1 {
			return Err(DenoiserError::Training(format!(
				"tape holds {} activations, model with {} layers needs {}",
				tape.len(),
				self.layers.len(),
				self.layers.len() + 1
			)));
		}

		let mut grad = grad_output;
		for (index, layer) in self.layers.iter_mut().enumerate().rev() {
			let input_grad = layer.backward(tape[index].view(), tape[index + 1].view(), grad.view(), index > 0)?;
			if let Some(input_grad) = input_grad {
				grad = input_grad;
			}
		}
		Ok(())
	}

	pub fn parameters(&self) -> Vec<&Parameter> {
		self.layers.iter().flat_map(|layer| layer.parameters()).collect()
	}

	pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
		self.layers.iter_mut().flat_map(|layer| layer.parameters_mut()).collect()
	}

	pub fn zero_grad(&mut self) {
		for parameter in self.parameters_mut() {
			parameter.zero_grad();
		}
	}

	pub fn parameter_count(&self) -> usize {
		self.layers.iter().map(|layer| layer.parameter_count()).sum()
	}

	pub fn summary(&self) -> ModelSummary {
		ModelSummary {
			input_shape: self.input_shape(),
			layers: self
				.layers
				.iter()
				.map(|layer| LayerSummary {
					name: layer.name().to_string(),
					output_shape: layer.output_shape(),
					activation: layer.activation(),
					parameters: layer.parameter_count(),
				})
				.collect(),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
	pub name: String,
	pub output_shape: Shape3,
	pub activation: Activation,
	pub parameters: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
	pub input_shape: Shape3,
	pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
	pub fn total_parameters(&self) -> usize {
		self.layers.iter().map(|layer| layer.parameters).sum()
	}
}

impl fmt::Display for ModelSummary {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let (h, w, c) = self.input_shape;
		writeln!(f, "Input: (None, {}, {}, {})", h, w, c)?;
		writeln!(f, "{:<20}{:<26}{:<12}{:>10}", "Layer", "Output shape", "Activation", "Params")?;
		for layer in &self.layers {
			let (h, w, c) = layer.output_shape;
			writeln!(
				f,
				"{:<20}{:<26}{:<12}{:>10}",
				layer.name,
				format!("(None, {}, {}, {})", h, w, c),
				layer.activation.to_string(),
				layer.parameters
			)?;
		}
		write!(f, "Total params: {}", self.total_parameters())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::network::init::seeded_rng;
	use ndarray::Array4;

	fn small_specs() -> Vec<LayerSpec> {
		vec![
			LayerSpec::conv2d(4, (3, 3))
				.with_activation(Activation::Relu)
				.with_input_shape((8, 8, 2)),
			LayerSpec::conv2d(1, (3, 3)),
		]
	}

	#[test]
	fn test_shapes_are_inferred() {
		let model = Sequential::from_specs(&small_specs(), &mut seeded_rng(Some(0))).unwrap();
		assert_eq!(model.input_shape(), (8, 8, 2));
		assert_eq!(model.layers()[0].output_shape(), (6, 6, 4));
		assert_eq!(model.output_shape(), (4, 4, 1));
		assert_eq!(model.parameter_count(), (3 * 3 * 2 * 4 + 4) + (3 * 3 * 4 + 1));
	}

	#[test]
	fn test_first_layer_must_declare_input() {
		let specs = vec![LayerSpec::conv2d(4, (3, 3))];
		let err = Sequential::from_specs(&specs, &mut seeded_rng(Some(0))).unwrap_err();
		assert!(matches!(err, DenoiserError::Config(_)));

		let err = Sequential::from_specs(&[], &mut seeded_rng(Some(0))).unwrap_err();
		assert!(matches!(err, DenoiserError::Config(_)));
	}

	#[test]
	fn test_conflicting_declared_shape() {
		let mut specs = small_specs();
		specs[1].input_shape = Some((8, 8, 4));
		let err = Sequential::from_specs(&specs, &mut seeded_rng(Some(0))).unwrap_err();
		assert!(matches!(err, DenoiserError::Config(_)));
	}

	#[test]
	fn test_tape_matches_predict() {
		let model = Sequential::from_specs(&small_specs(), &mut seeded_rng(Some(5))).unwrap();
		let input = Array4::from_shape_fn((3, 8, 8, 2), |(n, y, x, c)| ((n + y * 3 + x * 5 + c) % 7) as f32 / 7.0);
		let tape = model.forward_with_tape(input.view()).unwrap();
		assert_eq!(tape.len(), 3);
		assert_eq!(tape[0], input);
		assert_eq!(tape[2], model.predict(input.view()).unwrap());
	}

	#[test]
	fn test_backward_sets_every_gradient() {
		let mut model = Sequential::from_specs(&small_specs(), &mut seeded_rng(Some(5))).unwrap();
		let input = Array4::from_elem((2, 8, 8, 2), 0.5);
		let tape = model.forward_with_tape(input.view()).unwrap();
		model.backward(&tape, Array4::ones((2, 4, 4, 1))).unwrap();
		assert!(model.parameters().iter().all(|p| p.grad().is_some()));

		model.zero_grad();
		assert!(model.parameters().iter().all(|p| p.grad().is_none()));

		let err = model.backward(&tape[..2], Array4::ones((2, 4, 4, 1))).unwrap_err();
		assert!(matches!(err, DenoiserError::Training(_)));
	}

	#[test]
	fn test_summary_lists_layers() {
		let model = Sequential::from_specs(&small_specs(), &mut seeded_rng(Some(0))).unwrap();
		let summary = model.summary();
		assert_eq!(summary.layers.len(), 2);
		assert_eq!(summary.total_parameters(), model.parameter_count());
		let text = summary.to_string();
		assert!(text.contains("conv2d_1"));
		assert!(text.contains("(None, 4, 4, 1)"));
		assert!(text.contains("relu"));
	}
}

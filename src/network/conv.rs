use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Axis, Ix1};
use rand::Rng;
use rayon::prelude::*;

use super::layer::{Activation, LayerSpec, Padding, Shape3};
use super::parameter::Parameter;
use crate::error::{DenoiserError, Result};

/// Window placement for one layer, fixed once the input shape is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
	input: Shape3,
	output: Shape3,
	kernel: (usize, usize),
	stride: (usize, usize),
}

impl Geometry {
	fn new(spec: &LayerSpec, input: Shape3) -> Option<Self> {
		let output = spec.output_shape(input)?;
		Some(Geometry {
			input,
			output,
			kernel: spec.kernel,
			stride: spec.stride,
		})
	}

	fn patch_len(&self) -> usize {
		self.kernel.0 * self.kernel.1 * self.input.2
	}

	/// Top left corner of the window producing output row `index` of the im2col matrix.
	fn window_origin(&self, index: usize) -> (usize, usize) {
		(index / self.output.1 * self.stride.0, index % self.output.1 * self.stride.1)
	}
}

struct SampleGrad {
	kernel: Array2<f32>,
	bias: Array1<f32>,
	input: Option<Array3<f32>>,
}

/// 2-D convolution over NHWC tensors with an optional bias and a fused activation.
///
/// The kernel is stored as `[kh, kw, in, out]` so that, flattened to
/// `[kh * kw * in, out]`, it multiplies the im2col matrix of an input sample directly.
#[derive(Debug, Clone)]
pub struct Conv2d {
	name: String,
	kernel: Parameter,
	bias: Option<Parameter>,
	activation: Activation,
	padding: Padding,
	geometry: Geometry,
}

impl Conv2d {
	pub fn from_spec<R: Rng + ?Sized>(name: impl Into<String>, spec: &LayerSpec, input: Shape3, rng: &mut R) -> Result<Self> {
		let name = name.into();
		let geometry = Geometry::new(spec, input).ok_or_else(|| {
			DenoiserError::Config(format!(
				"{} cannot be applied to an input of shape {:?}: a {}x{} {} convolution with stride {:?} and {} filters leaves no output",
				name, input, spec.kernel.0, spec.kernel.1, spec.padding, spec.stride, spec.filters
			))
		})?;

		let (kh, kw) = spec.kernel;
		let (inputs, outputs) = (input.2, spec.filters);
		let kernel = spec
			.kernel_initializer
			.initialize(&[kh, kw, inputs, outputs], kh * kw * inputs, kh * kw * outputs, rng)?;
		let bias = if spec.use_bias {
			let values = spec.bias_initializer.initialize(&[outputs], outputs, outputs, rng)?;
			Some(Parameter::new(format!("{}/bias", name), values))
		} else {
			None
		};

		Ok(Conv2d {
			kernel: Parameter::new(format!("{}/kernel", name), kernel),
			bias,
			activation: spec.activation,
			padding: spec.padding,
			geometry,
			name,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn input_shape(&self) -> Shape3 {
		self.geometry.input
	}

	pub fn output_shape(&self) -> Shape3 {
		self.geometry.output
	}

	pub fn activation(&self) -> Activation {
		self.activation
	}

	pub fn padding(&self) -> Padding {
		self.padding
	}

	pub fn filters(&self) -> usize {
		self.geometry.output.2
	}

	pub fn kernel(&self) -> &Parameter {
		&self.kernel
	}

	pub fn bias(&self) -> Option<&Parameter> {
		self.bias.as_ref()
	}

	pub fn parameters(&self) -> Vec<&Parameter> {
		let mut parameters = vec![&self.kernel];
		if let Some(bias) = self.bias.as_ref() {
			parameters.push(bias);
		}
		parameters
	}

	pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
		let mut parameters = vec![&mut self.kernel];
		if let Some(bias) = self.bias.as_mut() {
			parameters.push(bias);
		}
		parameters
	}

	pub fn parameter_count(&self) -> usize {
		self.parameters().iter().map(|p| p.len()).sum()
	}

	/// Computes the activated output for a batch. Samples are processed in parallel.
	pub fn forward(&self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
		self.check_batch("input", &input, self.geometry.input)?;
		let kernel = self.kernel_matrix()?;
		let bias = self.bias_vector()?;

		let outputs = (0..input.len_of(Axis(0)))
			.into_par_iter()
			.map(|n| self.forward_sample(input.index_axis(Axis(0), n), kernel.view(), bias.as_ref().map(|b| b.view())))
			.collect::<Result<Vec<_>>>()?;
		stack_samples(&outputs)
	}

	/// Stores the kernel and bias gradients for the batch and, if `input_grad`, returns
	/// the gradient with respect to `input`.
	///
	/// `output` must be the value `forward` returned for `input`.
	pub fn backward(
		&mut self,
		input: ArrayView4<f32>,
		output: ArrayView4<f32>,
		grad_output: ArrayView4<f32>,
		input_grad: bool,
	) -> Result<Option<Array4<f32>>> {
		self.check_batch("input", &input, self.geometry.input)?;
		self.check_batch("output", &output, self.geometry.output)?;
		self.check_batch("output gradient", &grad_output, self.geometry.output)?;
		if input.len_of(Axis(0)) != grad_output.len_of(Axis(0)) || output.len_of(Axis(0)) != grad_output.len_of(Axis(0)) {
			return Err(DenoiserError::ShapeMismatch(format!(
				"{} received batches of different sizes during backpropagation",
				self.name
			)));
		}

		let samples = {
			let kernel = self.kernel_matrix()?;
			(0..input.len_of(Axis(0)))
				.into_par_iter()
				.map(|n| {
					self.backward_sample(
						input.index_axis(Axis(0), n),
						output.index_axis(Axis(0), n),
						grad_output.index_axis(Axis(0), n),
						kernel.view(),
						input_grad,
					)
				})
				.collect::<Result<Vec<_>>>()?
		};

		let mut kernel_grad = Array2::<f32>::zeros((self.geometry.patch_len(), self.geometry.output.2));
		let mut bias_grad = Array1::<f32>::zeros(self.geometry.output.2);
		let mut input_grads = Vec::with_capacity(if input_grad { samples.len() } else { 0 });
		for sample in samples {
			kernel_grad += &sample.kernel;
			bias_grad += &sample.bias;
			if let Some(grad) = sample.input {
				input_grads.push(grad);
			}
		}

		let kernel_shape = self.kernel.value().shape().to_vec();
		self.kernel.set_grad(kernel_grad.into_shape(kernel_shape)?)?;
		if let Some(bias) = self.bias.as_mut() {
			bias.set_grad(bias_grad.into_dyn())?;
		}

		if input_grad {
			Ok(Some(stack_samples(&input_grads)?))
		} else {
			Ok(None)
		}
	}

	fn forward_sample(&self, input: ArrayView3<f32>, kernel: ArrayView2<f32>, bias: Option<ArrayView1<f32>>) -> Result<Array3<f32>> {
		let (height, width, channels) = self.geometry.output;
		let mut output = self.im2col(input).dot(&kernel);
		if let Some(bias) = bias {
			output += &bias;
		}
		self.activation.apply(&mut output);
		Ok(output.into_shape((height, width, channels))?)
	}

	fn backward_sample(
		&self,
		input: ArrayView3<f32>,
		output: ArrayView3<f32>,
		grad_output: ArrayView3<f32>,
		kernel: ArrayView2<f32>,
		input_grad: bool,
	) -> Result<SampleGrad> {
		let (height, width, channels) = self.geometry.output;
		let mut delta = grad_output.as_standard_layout().into_owned();
		self.activation.backprop(output, &mut delta);
		let delta = delta.into_shape((height * width, channels))?;

		let cols = self.im2col(input);
		let kernel_grad = cols.t().dot(&delta);
		let bias_grad = delta.sum_axis(Axis(0));
		let input = if input_grad {
			Some(self.col2im(delta.dot(&kernel.t()).view()))
		} else {
			None
		};

		Ok(SampleGrad {
			kernel: kernel_grad,
			bias: bias_grad,
			input,
		})
	}

	fn kernel_matrix(&self) -> Result<ArrayView2<f32>> {
		Ok(self
			.kernel
			.value()
			.view()
			.into_shape((self.geometry.patch_len(), self.geometry.output.2))?)
	}

	fn bias_vector(&self) -> Result<Option<ArrayView1<f32>>> {
		match self.bias.as_ref() {
			Some(bias) => Ok(Some(bias.value().view().into_dimensionality::<Ix1>()?)),
			None => Ok(None),
		}
	}

	/// One row per output pixel holding the receptive field in (ky, kx, channel) order.
	fn im2col(&self, input: ArrayView3<f32>) -> Array2<f32> {
		let g = &self.geometry;
		let mut cols = Array2::zeros((g.output.0 * g.output.1, g.patch_len()));
		for (index, mut row) in cols.outer_iter_mut().enumerate() {
			let (y, x) = g.window_origin(index);
			let window = input.slice(s![y..y + g.kernel.0, x..x + g.kernel.1, ..]);
			row.iter_mut().zip(window.iter()).for_each(|(dst, &src)| *dst = src);
		}
		cols
	}

	/// Scatter-adds im2col rows back onto the input grid.
	fn col2im(&self, cols: ArrayView2<f32>) -> Array3<f32> {
		let g = &self.geometry;
		let mut grid = Array3::<f32>::zeros(g.input);
		for (index, row) in cols.outer_iter().enumerate() {
			let (y, x) = g.window_origin(index);
			let mut window = grid.slice_mut(s![y..y + g.kernel.0, x..x + g.kernel.1, ..]);
			window.iter_mut().zip(row.iter()).for_each(|(dst, &src)| *dst += src);
		}
		grid
	}

	fn check_batch(&self, what: &str, batch: &ArrayView4<f32>, expected: Shape3) -> Result<()> {
		let (n, h, w, c) = batch.dim();
		if n == 0 {
			return Err(DenoiserError::ShapeMismatch(format!("{} received an empty {} batch", self.name, what)));
		}
		if (h, w, c) != expected {
			return Err(DenoiserError::ShapeMismatch(format!(
				"{} expects {} of shape (batch, {}, {}, {}), found {:?}",
				self.name,
				what,
				expected.0,
				expected.1,
				expected.2,
				batch.shape()
			)));
		}
		Ok(())
	}
}

fn stack_samples(samples: &[Array3<f32>]) -> Result<Array4<f32>> {
	let views = samples.iter().map(|s| s.view()).collect::<Vec<_>>();
	Ok(ndarray::stack(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::network::init::{seeded_rng, Initializer};
	use approx::assert_abs_diff_eq;
	use ndarray::{Array, ArrayD, IxDyn};

	fn layer(spec: &LayerSpec, input: Shape3) -> Conv2d {
		Conv2d::from_spec("conv", spec, input, &mut seeded_rng(Some(11))).unwrap()
	}

	fn ramp(shape: (usize, usize, usize, usize)) -> Array4<f32> {
		let len = shape.0 * shape.1 * shape.2 * shape.3;
		Array::from_shape_vec(shape, (0..len).map(|i| ((i * 37 % 17) as f32 - 8.0) / 8.0).collect()).unwrap()
	}

	#[test]
	fn test_valid_convolution_shrinks_by_four() {
		let spec = LayerSpec::conv2d(6, (5, 5)).with_activation(Activation::Relu);
		let conv = layer(&spec, (12, 12, 3));
		let output = conv.forward(ramp((2, 12, 12, 3)).view()).unwrap();
		assert_eq!(output.dim(), (2, 8, 8, 6));
		assert!(output.iter().all(|v| *v >= 0.0));
	}

	#[test]
	fn test_box_filter_values() {
		let spec = LayerSpec::conv2d(1, (3, 3)).with_kernel_initializer(Initializer::Zeros);
		let mut conv = layer(&spec, (4, 4, 1));
		conv.kernel.value_mut().fill(1.0);
		conv.bias.as_mut().unwrap().value_mut().fill(0.5);

		let input = Array4::from_elem((1, 4, 4, 1), 2.0);
		let output = conv.forward(input.view()).unwrap();
		assert_eq!(output.dim(), (1, 2, 2, 1));
		assert!(output.iter().all(|v| (*v - 18.5).abs() < 1e-6));
	}

	#[test]
	fn test_wrong_input_shape_is_rejected() {
		let spec = LayerSpec::conv2d(2, (3, 3));
		let conv = layer(&spec, (8, 8, 3));
		let err = conv.forward(Array4::zeros((1, 8, 8, 4)).view()).unwrap_err();
		assert!(matches!(err, DenoiserError::ShapeMismatch(_)));
		let err = conv.forward(Array4::zeros((0, 8, 8, 3)).view()).unwrap_err();
		assert!(matches!(err, DenoiserError::ShapeMismatch(_)));
	}

	#[test]
	fn test_kernel_that_does_not_fit_is_config_error() {
		let spec = LayerSpec::conv2d(2, (5, 5));
		let err = Conv2d::from_spec("conv", &spec, (4, 4, 3), &mut seeded_rng(Some(1))).unwrap_err();
		assert!(matches!(err, DenoiserError::Config(_)));
	}

	/// Loss = sum(output * weights), so dL/doutput = weights.
	fn projected_loss(conv: &Conv2d, input: &Array4<f32>, weights: &Array4<f32>) -> f32 {
		(conv.forward(input.view()).unwrap() * weights).sum()
	}

	fn check_gradients(spec: LayerSpec, input_shape: Shape3) {
		let mut conv = layer(&spec, input_shape);
		let input = ramp((2, input_shape.0, input_shape.1, input_shape.2));
		let output = conv.forward(input.view()).unwrap();
		let weights = ramp(output.dim()).mapv(|v| v * 0.5 + 0.1);

		let input_grad = conv
			.backward(input.view(), output.view(), weights.view(), true)
			.unwrap()
			.unwrap();
		let kernel_grad: ArrayD<f32> = conv.kernel.grad().unwrap().clone();
		let bias_grad: ArrayD<f32> = conv.bias.as_ref().unwrap().grad().unwrap().clone();

		let eps = 1e-2;
		for index in [0usize, 7, 19, kernel_grad.len() - 1].iter().cloned() {
			let original = conv.kernel.value().as_slice().unwrap()[index];
			conv.kernel.value_mut().as_slice_mut().unwrap()[index] = original + eps;
			let plus = projected_loss(&conv, &input, &weights);
			conv.kernel.value_mut().as_slice_mut().unwrap()[index] = original - eps;
			let minus = projected_loss(&conv, &input, &weights);
			conv.kernel.value_mut().as_slice_mut().unwrap()[index] = original;
			let numeric = (plus - minus) / (2.0 * eps);
			assert_abs_diff_eq!(kernel_grad.as_slice().unwrap()[index], numeric, epsilon = 2e-2);
		}

		let expected_bias: f32 = weights.index_axis(Axis(3), 0).sum();
		assert_abs_diff_eq!(bias_grad[IxDyn(&[0])], expected_bias, epsilon = 1e-3);

		for &(n, y, x, c) in [(0usize, 0usize, 0usize, 0usize), (1, 2, 3, 1), (1, input_shape.0 - 1, input_shape.1 - 1, input_shape.2 - 1)].iter() {
			let mut shifted = input.clone();
			shifted[[n, y, x, c]] += eps;
			let plus = projected_loss(&conv, &shifted, &weights);
			shifted[[n, y, x, c]] -= 2.0 * eps;
			let minus = projected_loss(&conv, &shifted, &weights);
			let numeric = (plus - minus) / (2.0 * eps);
			assert_abs_diff_eq!(input_grad[[n, y, x, c]], numeric, epsilon = 2e-2);
		}
	}

	#[test]
	fn test_linear_gradients_match_finite_differences() {
		check_gradients(LayerSpec::conv2d(3, (3, 3)), (6, 6, 2));
	}

	#[test]
	fn test_strided_gradients_match_finite_differences() {
		check_gradients(LayerSpec::conv2d(2, (3, 3)).with_stride((2, 2)), (7, 7, 2));
	}

	#[test]
	fn test_backward_without_input_grad() {
		let spec = LayerSpec::conv2d(2, (3, 3)).with_activation(Activation::Relu);
		let mut conv = layer(&spec, (5, 5, 1));
		let input = ramp((1, 5, 5, 1));
		let output = conv.forward(input.view()).unwrap();
		let grad = Array4::ones(output.dim());
		let result = conv.backward(input.view(), output.view(), grad.view(), false).unwrap();
		assert!(result.is_none());
		assert!(conv.kernel().grad().is_some());
		assert!(conv.bias().unwrap().grad().is_some());
	}
}

//! Convolutional network building blocks: declarative layer records, the
//! convolution layer itself and the sequential model assembled from them.

pub mod architecture;
pub mod conv;
pub mod init;
pub mod layer;
pub mod model;
pub mod parameter;

pub use self::architecture::{build_denoiser, build_denoiser_with_rng, denoiser_layer_specs};
pub use self::conv::Conv2d;
pub use self::init::{glorot_uniform_limit, seeded_rng, Initializer};
pub use self::layer::{Activation, LayerSpec, Padding, Shape3};
pub use self::model::{LayerSummary, ModelSummary, Sequential};
pub use self::parameter::Parameter;

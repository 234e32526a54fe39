use std::io;
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DenoiserError {
	#[error("IO error: {0}")]
	Io(#[from] io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Invalid parameter: {0}")]
	InvalidParameter(String),

	#[error("Shape mismatch: {0}")]
	ShapeMismatch(String),

	#[error("Dataset error: {0}")]
	Dataset(String),

	#[error("Training error: {0}")]
	Training(String),

	#[error("Serialization error: {0}")]
	Serialization(String),

	#[error("Tensor error: {0}")]
	Tensor(#[from] ndarray::ShapeError),
}

impl From<ParseIntError> for DenoiserError {
	fn from(err: ParseIntError) -> Self {
		DenoiserError::Parse(format!("Failed to parse integer: {}", err))
	}
}

impl From<ParseFloatError> for DenoiserError {
	fn from(err: ParseFloatError) -> Self {
		DenoiserError::Parse(format!("Failed to parse float: {}", err))
	}
}

pub type Result<T> = std::result::Result<T, DenoiserError>;

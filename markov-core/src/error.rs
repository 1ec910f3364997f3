//! Error types for the Markov chain engine.

use thiserror::Error;

use crate::model::context::Context;

/// Result type alias for Markov chain operations.
pub type Result<T> = std::result::Result<T, MarkovError>;

/// Errors that can occur while building or querying a model.
#[derive(Error, Debug)]
pub enum MarkovError {
	/// The context was never observed during training.
	///
	/// Recoverable: callers decide whether to stop, ask again or fall back.
	#[error("unknown context: {0}")]
	UnknownContext(Context),

	/// The configured order is below 1.
	#[error("invalid order {0}: order must be >= 1")]
	InvalidOrder(usize),

	/// Tokenization of the training text produced no token at all.
	#[error("empty corpus: no token found in training text")]
	EmptyCorpus,

	/// A context does not have exactly `order` tokens.
	#[error("context has {found} token(s), expected {expected}")]
	ContextLength {
		expected: usize,
		found: usize,
	},

	/// Two models of different order cannot be merged.
	#[error("order mismatch: {left} != {right}")]
	OrderMismatch {
		left: usize,
		right: usize,
	},

	/// Summing transition counts of a context would exceed `u64::MAX`.
	#[error("transition count overflow for context {0}")]
	CountOverflow(Context),

	/// I/O error.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// Model file encoding/decoding error.
	#[error("serialization error: {0}")]
	Serialization(#[from] postcard::Error),
}

impl MarkovError {
	/// Returns `true` for the conditions a caller is expected to recover from.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::UnknownContext(_) | Self::EmptyCorpus | Self::ContextLength { .. })
	}
}

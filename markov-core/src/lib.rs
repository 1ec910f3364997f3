//! Word-level Markov chain language model.
//!
//! This crate builds a variable-order Markov chain from a text corpus and
//! uses it to predict next words and generate text:
//! - Tokenization of raw text into normalized words
//! - Sliding-window context extraction and transition counting
//! - Probability normalization, weighted sampling and scoring
//! - Seeded, reproducible text generation
//! - Model persistence and corpus loading
//!
//! Randomness is always injected by the caller, so every sampling call is
//! reproducible with a seeded generator.

/// Error type shared by every operation.
pub mod error;

/// Corpus loading and path helpers.
pub mod io;

/// Models, probability view and generator.
pub mod model;

/// Model file encoding (`postcard`) and train-or-load caching.
pub mod persistence;

/// Text normalization into word tokens.
pub mod tokenizer;

pub use error::{MarkovError, Result};
pub use model::context::Context;
pub use model::generator::{Generation, GenerationConfig, GenerationState, Generator, StopReason};
pub use model::markov_model::{MarkovModel, ModelStats, TrainReport};
pub use model::probability::{Distribution, ProbabilityModel, Strategy};
pub use tokenizer::{Token, Tokenizer, tokenize};

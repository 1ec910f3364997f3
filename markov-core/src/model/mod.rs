//! Word-level Markov chain: training and inference.
//!
//! - Sliding context windows over a token stream (`context`)
//! - Transition counting (`state`, `transition_table`)
//! - The trained model and its statistics (`markov_model`)
//! - Normalized distributions, sampling and scoring (`probability`)
//! - Text generation from a seed context (`generator`)

/// Fixed-length contexts and the lazy `(context, next)` window iterator.
pub mod context;

/// Seeded, step-by-step text generation.
///
/// Stops early, with a reason, when the trailing context was never observed.
pub mod generator;

/// Fixed-order model owning the transition table.
///
/// Handles training (sequential or sharded over threads), merging and statistics.
pub mod markov_model;

/// Read-only probability view over a trained model.
pub mod probability;

/// Outgoing transitions of a single context.
///
/// Tracks occurrence counts and supports weighted random sampling.
pub mod state;

/// Context -> next token -> count mapping.
pub mod transition_table;

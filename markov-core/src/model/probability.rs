use rand::Rng;

use super::context::Context;
use super::markov_model::MarkovModel;
use super::state::State;
use crate::error::{MarkovError, Result};
use crate::tokenizer::Token;

/// How the next token is chosen from a distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
	/// Weighted random draw, proportional to probability mass.
	#[default]
	Sample,
	/// Always the most probable token (ties: lexicographically smallest).
	MostLikely,
}

/// Normalized next-token probabilities of one context.
///
/// Entries are ranked by decreasing probability, ties in lexicographic
/// order. Probabilities are in `(0, 1]` and sum to 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
	entries: Vec<(Token, f64)>,
}

impl Distribution {
	fn from_state(state: &State) -> Self {
		let total = state.total() as f64;
		let mut entries: Vec<(Token, f64)> = state
			.transitions()
			.iter()
			.map(|(next, count)| (next.clone(), *count as f64 / total))
			.collect();
		// Stable sort keeps the lexicographic order among equal probabilities
		entries.sort_by(|a, b| b.1.total_cmp(&a.1));
		Self { entries }
	}

	/// Probability of `token`, 0 if absent.
	pub fn probability(&self, token: &str) -> f64 {
		self.entries
			.iter()
			.find(|(next, _)| next.as_str() == token)
			.map(|(_, p)| *p)
			.unwrap_or(0.0)
	}

	/// Ranked `(token, probability)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&Token, f64)> {
		self.entries.iter().map(|(next, p)| (next, *p))
	}

	/// The `k` most probable entries.
	pub fn top(&self, k: usize) -> &[(Token, f64)] {
		&self.entries[..k.min(self.entries.len())]
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn sum(&self) -> f64 {
		self.entries.iter().map(|(_, p)| p).sum()
	}
}

/// Read-only probability view over a trained [`MarkovModel`].
///
/// Distributions are computed on demand from the transition counts; nothing
/// is cached, so the view always reflects the model it borrows.
#[derive(Clone, Copy, Debug)]
pub struct ProbabilityModel<'a> {
	model: &'a MarkovModel,
}

impl<'a> ProbabilityModel<'a> {
	pub fn new(model: &'a MarkovModel) -> Self {
		Self { model }
	}

	pub fn model(&self) -> &'a MarkovModel {
		self.model
	}

	/// Looks up the outgoing transitions of `context`.
	///
	/// # Errors
	/// - [`MarkovError::ContextLength`] if `context` does not match the order
	/// - [`MarkovError::UnknownContext`] if it was never observed
	fn state(&self, context: &Context) -> Result<&'a State> {
		self.model.check_context(context)?;
		match self.model.table().state(context) {
			Some(state) if state.total() > 0 => Ok(state),
			_ => Err(MarkovError::UnknownContext(context.clone())),
		}
	}

	/// Normalized distribution of the tokens following `context`.
	///
	/// Each probability is `count / total count of the context`. No smoothing
	/// is applied: an unseen context fails with
	/// [`MarkovError::UnknownContext`] instead of getting a made-up distribution.
	pub fn distribution_for(&self, context: &Context) -> Result<Distribution> {
		Ok(Distribution::from_state(self.state(context)?))
	}

	/// Draws one next token, proportionally to its probability.
	///
	/// Deterministic for a given `rng` state.
	pub fn sample<R: Rng + ?Sized>(&self, context: &Context, rng: &mut R) -> Result<&'a Token> {
		let state = self.state(context)?;
		state.sample(rng).ok_or_else(|| MarkovError::UnknownContext(context.clone()))
	}

	/// Most probable next token; ties go to the lexicographically smallest.
	pub fn most_likely(&self, context: &Context) -> Result<&'a Token> {
		let state = self.state(context)?;
		state.most_likely().ok_or_else(|| MarkovError::UnknownContext(context.clone()))
	}

	/// Picks the next token with the given strategy.
	pub fn predict_next<R: Rng + ?Sized>(&self, context: &Context, strategy: Strategy, rng: &mut R) -> Result<&'a Token> {
		match strategy {
			Strategy::Sample => self.sample(context, rng),
			Strategy::MostLikely => self.most_likely(context),
		}
	}

	/// Raw probability of `token` following `context`; 0 when either was never seen.
	pub fn score(&self, context: &Context, token: &str) -> f64 {
		match self.model.table().state(context) {
			Some(state) if state.total() > 0 => state.count(token) as f64 / state.total() as f64,
			_ => 0.0,
		}
	}
}

use log::debug;
use rand::Rng;

use super::context::Context;
use super::markov_model::MarkovModel;
use super::probability::{ProbabilityModel, Strategy};
use crate::error::{MarkovError, Result};
use crate::tokenizer::Token;

/// Parameters of one generation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationConfig {
	/// Maximum number of tokens to add after the seed.
	pub length: usize,
	/// How each next token is picked.
	pub strategy: Strategy,
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self { length: 20, strategy: Strategy::Sample }
	}
}

/// Progress of a generation run.
///
/// `Seeded -> Extending` on the first produced token, `Extending -> Extending`
/// on each following one, and `-> Exhausted` once the length is reached or the
/// trailing context is unknown. `Exhausted` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationState {
	Seeded,
	Extending,
	Exhausted,
}

/// Why a run became exhausted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
	/// The requested number of tokens was produced.
	LengthReached,
	/// The trailing context has no observed transition.
	UnknownContext(Context),
}

/// Result of [`Generator::generate`]: the produced tokens and why it stopped.
///
/// A run stopped by an unknown context is a partial result, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
	pub seed: Context,
	pub tokens: Vec<Token>,
	pub stop: StopReason,
}

impl Generation {
	/// `true` if generation stopped before producing `length` tokens.
	pub fn is_partial(&self) -> bool {
		matches!(self.stop, StopReason::UnknownContext(_))
	}

	/// Produced tokens only, joined by single spaces.
	pub fn text(&self) -> String {
		join(self.tokens.iter())
	}

	/// Seed followed by the produced tokens, joined by single spaces.
	pub fn text_with_seed(&self) -> String {
		join(self.seed.tokens().iter().chain(self.tokens.iter()))
	}
}

fn join<'t>(tokens: impl Iterator<Item = &'t Token>) -> String {
	tokens.map(Token::as_str).collect::<Vec<_>>().join(" ")
}

/// Step-by-step generation, driven by [`Run::step`].
#[derive(Clone, Debug)]
pub struct Run<'a> {
	probabilities: ProbabilityModel<'a>,
	seed: Context,
	context: Context,
	remaining: usize,
	strategy: Strategy,
	state: GenerationState,
	tokens: Vec<Token>,
	stop: Option<StopReason>,
}

impl Run<'_> {
	pub fn state(&self) -> GenerationState {
		self.state
	}

	/// Current trailing context (the seed until a token is produced).
	pub fn context(&self) -> &Context {
		&self.context
	}

	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	fn exhaust(&mut self, reason: StopReason) {
		self.state = GenerationState::Exhausted;
		self.stop = Some(reason);
	}

	/// Produces the next token, or `None` once exhausted.
	pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Option<Token>> {
		if self.state == GenerationState::Exhausted {
			return Ok(None);
		}
		if self.remaining == 0 {
			self.exhaust(StopReason::LengthReached);
			return Ok(None);
		}

		let next = match self.probabilities.predict_next(&self.context, self.strategy, rng) {
			Ok(next) => next.clone(),
			Err(MarkovError::UnknownContext(context)) => {
				debug!("generation stopped on unknown context {}", context);
				self.exhaust(StopReason::UnknownContext(context));
				return Ok(None);
			}
			Err(e) => return Err(e),
		};

		self.context = self.context.shift(next.clone());
		self.tokens.push(next.clone());
		self.remaining -= 1;
		self.state = GenerationState::Extending;
		if self.remaining == 0 {
			self.exhaust(StopReason::LengthReached);
		}

		Ok(Some(next))
	}

	/// Runs to exhaustion and returns the outcome.
	pub fn finish<R: Rng + ?Sized>(mut self, rng: &mut R) -> Result<Generation> {
		while self.step(rng)?.is_some() {}
		Ok(Generation {
			seed: self.seed,
			tokens: self.tokens,
			stop: self.stop.unwrap_or(StopReason::LengthReached),
		})
	}
}

/// Extends a seed context by repeatedly sampling from a trained model.
///
/// Holds a shared borrow of the model and never mutates it. Calling
/// [`generate`](Generator::generate) twice with the same seed and a random
/// source reset to the same state yields the same sequence.
#[derive(Clone, Copy, Debug)]
pub struct Generator<'a> {
	probabilities: ProbabilityModel<'a>,
	config: GenerationConfig,
}

impl<'a> Generator<'a> {
	pub fn new(model: &'a MarkovModel) -> Self {
		Self::with_config(model, GenerationConfig::default())
	}

	pub fn with_config(model: &'a MarkovModel, config: GenerationConfig) -> Self {
		Self { probabilities: ProbabilityModel::new(model), config }
	}

	pub fn config(&self) -> &GenerationConfig {
		&self.config
	}

	/// Starts a run from `seed` producing at most `length` tokens.
	///
	/// # Errors
	/// Returns [`MarkovError::ContextLength`] if the seed does not have exactly
	/// `order` tokens.
	pub fn start(&self, seed: &Context, length: usize) -> Result<Run<'a>> {
		self.probabilities.model().check_context(seed)?;
		Ok(Run {
			probabilities: self.probabilities,
			seed: seed.clone(),
			context: seed.clone(),
			remaining: length,
			strategy: self.config.strategy,
			state: GenerationState::Seeded,
			tokens: Vec::with_capacity(length),
			stop: None,
		})
	}

	/// Generates up to `length` tokens after `seed`.
	///
	/// Stops early when the trailing context was never observed; the tokens
	/// produced so far are returned together with
	/// [`StopReason::UnknownContext`].
	pub fn generate<R: Rng + ?Sized>(&self, seed: &Context, length: usize, rng: &mut R) -> Result<Generation> {
		self.start(seed, length)?.finish(rng)
	}

	/// [`generate`](Generator::generate) with the configured length.
	pub fn generate_default<R: Rng + ?Sized>(&self, seed: &Context, rng: &mut R) -> Result<Generation> {
		self.generate(seed, self.config.length, rng)
	}
}

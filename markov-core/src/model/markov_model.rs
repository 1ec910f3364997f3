use std::collections::{BTreeMap, HashSet};
use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};

use super::context::{Context, contexts};
use super::transition_table::TransitionTable;
use crate::error::{MarkovError, Result};
use crate::tokenizer::{Token, Tokenizer};

/// Word-level Markov chain of a fixed order.
///
/// The model owns its transition table. It is created empty, filled by one
/// or more training passes, then only read by
/// [`ProbabilityModel`](super::probability::ProbabilityModel) and
/// [`Generator`](super::generator::Generator).
///
/// # Invariants
/// - `order` is always >= 1
/// - every context stored in `table` has exactly `order` tokens
/// - `vocabulary` contains every token the model was trained on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkovModel {
	order: usize,
	table: TransitionTable,
	vocabulary: HashSet<Token>,
}

/// What a training pass saw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainReport {
	/// Tokens produced by the tokenizer.
	pub tokens: usize,
	/// `(context, next)` pairs fed to the transition table.
	pub transitions: usize,
}

impl TrainReport {
	/// Turns a pass that saw no token into [`MarkovError::EmptyCorpus`].
	pub fn ensure_not_empty(self) -> Result<Self> {
		if self.tokens == 0 {
			return Err(MarkovError::EmptyCorpus);
		}
		Ok(self)
	}
}

/// Summary of a trained model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelStats {
	pub order: usize,
	pub vocabulary_size: usize,
	pub unique_contexts: usize,
	pub total_transitions: u64,
}

impl MarkovModel {
	/// Creates an empty model of order `order`.
	///
	/// # Errors
	/// Returns [`MarkovError::InvalidOrder`] if `order < 1`.
	pub fn new(order: usize) -> Result<Self> {
		if order < 1 {
			return Err(MarkovError::InvalidOrder(order));
		}
		Ok(Self { order, table: TransitionTable::new(), vocabulary: HashSet::new() })
	}

	/// Rebuilds a model from persisted parts.
	pub(crate) fn from_parts(order: usize, table: TransitionTable, vocabulary: HashSet<Token>) -> Result<Self> {
		let mut model = Self::new(order)?;
		model.table = table;
		model.vocabulary = vocabulary;
		Ok(model)
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn table(&self) -> &TransitionTable {
		&self.table
	}

	pub fn vocabulary(&self) -> &HashSet<Token> {
		&self.vocabulary
	}

	/// `true` if no transition has been observed yet.
	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}

	/// Trains the model on raw text.
	///
	/// Tokenizes `text`, slides a window of `order` tokens over it and records
	/// every `(context, next)` pair. Text that yields no token leaves the model
	/// untouched; this is reported in the returned [`TrainReport`], not as an
	/// error.
	pub fn train(&mut self, text: &str) -> TrainReport {
		let report = self.train_tokens(Tokenizer::new().tokens(text));
		if report.tokens == 0 {
			warn!("training text produced no token, model left unchanged");
		}
		report
	}

	/// Trains the model on an already tokenized sequence.
	pub fn train_tokens<I>(&mut self, tokens: I) -> TrainReport
	where
		I: IntoIterator<Item = Token>,
	{
		let mut seen_tokens = 0;
		let mut transitions = 0;
		let vocabulary = &mut self.vocabulary;
		let seen = tokens.into_iter().inspect(|token| {
			seen_tokens += 1;
			if !vocabulary.contains(token) {
				vocabulary.insert(token.clone());
			}
		});

		for (context, next) in contexts(seen, self.order) {
			self.table.observe(context, next);
			transitions += 1;
		}

		let report = TrainReport { tokens: seen_tokens, transitions };

		debug!(
			"trained order {} on {} token(s), {} transition(s)",
			self.order, report.tokens, report.transitions
		);
		report
	}

	/// Records one transition. The context must have exactly `order` tokens.
	///
	/// # Errors
	/// Returns [`MarkovError::ContextLength`] otherwise.
	pub fn observe(&mut self, context: Context, next: Token) -> Result<()> {
		self.check_context(&context)?;
		for token in context.tokens() {
			self.vocabulary.insert(token.clone());
		}
		self.vocabulary.insert(next.clone());
		self.table.observe(context, next);
		Ok(())
	}

	/// Trains on `text` with the token stream sharded over worker threads.
	///
	/// The whole text is tokenized first, then cut into contiguous chunks.
	/// Each worker sees its chunk plus the `order` tokens before it, so it
	/// records exactly the windows whose next token falls in its own chunk.
	/// Partial models are merged by count addition once every worker is done:
	/// the result equals [`train`](MarkovModel::train) on the same text.
	/// `threads == 0` picks the number of CPUs.
	pub fn train_parallel(&mut self, text: &str, threads: usize) -> Result<TrainReport> {
		let tokens: Vec<Token> = Tokenizer::new().tokens(text).collect();
		if tokens.is_empty() {
			warn!("training text produced no token, model left unchanged");
			return Ok(TrainReport::default());
		}

		let workers = if threads == 0 { num_cpus::get() } else { threads };
		let chunk_size = tokens.len().div_ceil(workers.max(1));
		let order = self.order;
		info!("training order {} on {} token(s) with {} worker(s)", order, tokens.len(), workers);

		let (tx, rx) = mpsc::channel();
		let joined: Result<()> = thread::scope(|scope| {
			let mut handles = Vec::new();
			for start in (0..tokens.len()).step_by(chunk_size) {
				let end = (start + chunk_size).min(tokens.len());
				// Windows of this slice all end inside [start, end)
				let shard = &tokens[start.saturating_sub(order)..end];
				let tx = tx.clone();

				handles.push(scope.spawn(move || -> Result<()> {
					let mut partial = MarkovModel::new(order)?;
					let report = partial.train_tokens(shard.iter().cloned());
					// The receiver outlives every worker
					let _ = tx.send((partial, report.transitions));
					Ok(())
				}));
			}
			for handle in handles {
				match handle.join() {
					Ok(result) => result?,
					Err(_) => return Err(std::io::Error::other("training worker panicked").into()),
				}
			}
			Ok(())
		});
		drop(tx);
		joined?;

		let mut total = TrainReport { tokens: tokens.len(), transitions: 0 };
		for (partial, transitions) in rx.iter() {
			self.merge(&partial)?;
			total.transitions += transitions;
		}
		Ok(total)
	}

	/// Merges another model of the same order into this one.
	///
	/// # Errors
	/// - [`MarkovError::OrderMismatch`] if the orders differ
	/// - [`MarkovError::CountOverflow`] if a summed count exceeds `u64::MAX`
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.order != other.order {
			return Err(MarkovError::OrderMismatch { left: self.order, right: other.order });
		}
		self.table.merge(&other.table)?;
		self.vocabulary.extend(other.vocabulary.iter().cloned());
		Ok(())
	}

	/// Next-token counts for `context`; empty if the context is unknown.
	pub fn counts_for(&self, context: &Context) -> &BTreeMap<Token, u64> {
		self.table.counts_for(context)
	}

	pub fn stats(&self) -> ModelStats {
		ModelStats {
			order: self.order,
			vocabulary_size: self.vocabulary.len(),
			unique_contexts: self.table.len(),
			total_transitions: self.table.total_transitions(),
		}
	}

	pub(crate) fn check_context(&self, context: &Context) -> Result<()> {
		if context.len() != self.order {
			return Err(MarkovError::ContextLength { expected: self.order, found: context.len() });
		}
		Ok(())
	}
}

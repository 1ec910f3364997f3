use std::collections::{BTreeMap, HashMap};

use super::context::Context;
use super::state::State;
use crate::error::{MarkovError, Result};
use crate::tokenizer::Token;

static NO_TRANSITIONS: BTreeMap<Token, u64> = BTreeMap::new();

/// Counts of observed `(context -> next token)` occurrences.
///
/// # Responsibilities
/// - Accumulate transition counts, one observation at a time
/// - Answer count queries for a context (empty for unknown contexts)
/// - Merge with another table by count addition
///
/// # Invariants
/// - Every stored count is >= 1 (entries only appear on observation)
/// - Every stored state has at least one transition
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionTable {
	/// Mapping from a context to its outgoing transitions
	states: HashMap<Context, State>,
}

impl TransitionTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Increments the count of `(context, next)` by one.
	pub fn observe(&mut self, context: Context, next: Token) {
		self.states.entry(context).or_default().add_transition(next);
	}

	/// Adds `count` observations of `(context, next)` at once.
	///
	/// Used when rebuilding a table from persisted triples. A zero count
	/// creates nothing.
	///
	/// # Errors
	/// [`MarkovError::CountOverflow`] if the context total would exceed
	/// `u64::MAX`; the table is left unchanged.
	pub(crate) fn observe_many(&mut self, context: Context, next: Token, count: u64) -> Result<()> {
		if count == 0 {
			return Ok(());
		}
		if let Some(state) = self.states.get_mut(&context) {
			if !state.add_occurrences(next, count) {
				return Err(MarkovError::CountOverflow(context));
			}
		} else {
			let mut state = State::new();
			// A fresh state holds any single u64 count
			let _ = state.add_occurrences(next, count);
			self.states.insert(context, state);
		}
		Ok(())
	}

	/// Returns the next-token counts of `context`.
	///
	/// An unknown context gets an empty mapping, not an error.
	pub fn counts_for(&self, context: &Context) -> &BTreeMap<Token, u64> {
		self.states.get(context).map(State::transitions).unwrap_or(&NO_TRANSITIONS)
	}

	pub fn state(&self, context: &Context) -> Option<&State> {
		self.states.get(context)
	}

	/// Number of distinct contexts observed.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	/// Total number of observations across all contexts.
	pub fn total_transitions(&self) -> u64 {
		self.states.values().fold(0, |sum, state| sum.saturating_add(state.total()))
	}

	pub fn contexts(&self) -> impl Iterator<Item = &Context> {
		self.states.keys()
	}

	/// Iterates over all `(context, next, count)` triples, in no particular order.
	pub fn triples(&self) -> impl Iterator<Item = (&Context, &Token, u64)> {
		self.states.iter().flat_map(|(context, state)| {
			state.transitions().iter().map(move |(next, count)| (context, next, *count))
		})
	}

	/// Merges another table into this one.
	///
	/// Counts for matching transitions are summed, so merging is associative
	/// and commutative.
	///
	/// # Errors
	/// [`MarkovError::CountOverflow`] if a context total would exceed
	/// `u64::MAX`. Contexts merged before that one keep their new counts.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		for (context, state) in &other.states {
			if let Some(existing) = self.states.get_mut(context) {
				if !existing.merge(state) {
					return Err(MarkovError::CountOverflow(context.clone()));
				}
			} else {
				self.states.insert(context.clone(), state.clone());
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::context::contexts;
	use crate::tokenizer::tokenize;

	fn table(text: &str, order: usize) -> TransitionTable {
		let mut table = TransitionTable::new();
		for (context, next) in contexts(tokenize(text), order) {
			table.observe(context, next);
		}
		table
	}

	#[test]
	fn test_counts_for_observed_context() {
		let table = table("a b c a b c", 1);
		let counts = table.counts_for(&Context::parse("a"));
		assert_eq!(counts.get("b"), Some(&2));
		assert_eq!(counts.len(), 1);
	}

	#[test]
	fn test_counts_for_unknown_context_is_empty() {
		let table = table("a b c", 1);
		assert!(table.counts_for(&Context::parse("zzz")).is_empty());
	}

	#[test]
	fn test_totals() {
		let table = table("the cat sat on the mat", 1);
		assert_eq!(table.total_transitions(), 5);
		assert_eq!(table.len(), 4);
		assert_eq!(table.triples().map(|(_, _, c)| c).sum::<u64>(), 5);
	}

	#[test]
	fn test_merge_is_commutative() {
		let a = table("the cat sat on the mat", 2);
		let b = table("the cat ran to the mat", 2);

		let mut ab = a.clone();
		ab.merge(&b).unwrap();
		let mut ba = b.clone();
		ba.merge(&a).unwrap();

		assert_eq!(ab, ba);
		assert_eq!(ab.counts_for(&Context::parse("the cat")).len(), 2);
	}

	#[test]
	fn test_observe_many_zero_creates_nothing() {
		let mut table = TransitionTable::new();
		table.observe_many(Context::parse("a"), Token::normalize("b").unwrap(), 0).unwrap();
		assert!(table.is_empty());
		table.observe_many(Context::parse("a"), Token::normalize("b").unwrap(), 3).unwrap();
		assert_eq!(table.counts_for(&Context::parse("a")).get("b"), Some(&3));
	}

	#[test]
	fn test_observe_many_overflow() {
		let mut table = TransitionTable::new();
		let a = Context::parse("a");
		table.observe_many(a.clone(), Token::normalize("b").unwrap(), u64::MAX).unwrap();
		let result = table.observe_many(a.clone(), Token::normalize("c").unwrap(), 1);
		assert!(matches!(result, Err(MarkovError::CountOverflow(context)) if context == a));
		assert_eq!(table.counts_for(&a).len(), 1);
		assert_eq!(table.total_transitions(), u64::MAX);
	}
}

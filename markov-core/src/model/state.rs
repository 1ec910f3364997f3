use std::collections::BTreeMap;

use rand::Rng;

use crate::tokenizer::Token;

/// Outgoing transitions of one context.
///
/// Conceptually, this is a node in the Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate transition occurrences during learning
/// - Pick the next token by weighted random sampling
/// - Merge with the state of the same context coming from another model
///
/// ## Invariants
/// - Each transition occurrence count is strictly positive
/// - `total` is the sum of all occurrence counts
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
	/// Outgoing transitions indexed by the next token, in lexicographic order.
	/// Example: { "cat" => 2, "mat" => 1 }
	transitions: BTreeMap<Token, u64>,
	total: u64,
}

impl State {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one more occurrence of a transition toward `next`.
	pub fn add_transition(&mut self, next: Token) {
		// One call per observed token: the total cannot reach u64::MAX
		let _ = self.add_occurrences(next, 1);
	}

	/// Records `occurrences` observations at once. Zero is ignored.
	///
	/// Returns `false`, leaving the state untouched, if the total would
	/// overflow. Every count is bounded by the total, so checking it is enough.
	#[must_use]
	pub(crate) fn add_occurrences(&mut self, next: Token, occurrences: u64) -> bool {
		if occurrences == 0 {
			return true;
		}
		let Some(total) = self.total.checked_add(occurrences) else {
			return false;
		};
		*self.transitions.entry(next).or_insert(0) += occurrences;
		self.total = total;
		true
	}

	pub fn transitions(&self) -> &BTreeMap<Token, u64> {
		&self.transitions
	}

	/// Sum of all occurrence counts.
	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn count(&self, next: &str) -> u64 {
		self.transitions.get(next).copied().unwrap_or(0)
	}

	/// Draws the next token with probability proportional to its count.
	///
	/// Performs an O(n) cumulative scan. The scan order is the map order,
	/// so the result only depends on the state of `rng`.
	///
	/// Returns `None` if the state has no transitions.
	pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Token> {
		if self.total == 0 {
			return None;
		}

		let mut r = rng.random_range(0..self.total);
		for (next, occurrence) in &self.transitions {
			if r < *occurrence {
				return Some(next);
			}
			r -= occurrence;
		}

		// Unreachable while `total` matches the transitions
		self.transitions.keys().next_back()
	}

	/// Most observed next token; ties go to the lexicographically smallest.
	pub fn most_likely(&self) -> Option<&Token> {
		let mut best: Option<(&Token, u64)> = None;
		for (next, occurrence) in &self.transitions {
			match best {
				Some((_, count)) if count >= *occurrence => (),
				_ => best = Some((next, *occurrence)),
			}
		}
		best.map(|(next, _)| next)
	}

	/// Adds the counts of `other` to this state.
	///
	/// Returns `false`, leaving the state untouched, if the summed total
	/// would overflow.
	#[must_use]
	pub fn merge(&mut self, other: &Self) -> bool {
		let Some(total) = self.total.checked_add(other.total) else {
			return false;
		};
		for (next, occurrence) in &other.transitions {
			*self.transitions.entry(next.clone()).or_insert(0) += occurrence;
		}
		self.total = total;
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn token(word: &str) -> Token {
		Token::normalize(word).unwrap()
	}

	fn state(words: &[&str]) -> State {
		let mut state = State::new();
		for word in words {
			state.add_transition(token(word));
		}
		state
	}

	#[test]
	fn test_counts_and_total() {
		let state = state(&["cat", "mat", "cat"]);
		assert_eq!(state.count("cat"), 2);
		assert_eq!(state.count("mat"), 1);
		assert_eq!(state.count("dog"), 0);
		assert_eq!(state.total(), 3);
	}

	#[test]
	fn test_empty_state_samples_nothing() {
		let mut rng = StdRng::seed_from_u64(1);
		assert!(State::new().sample(&mut rng).is_none());
		assert!(State::new().most_likely().is_none());
	}

	#[test]
	fn test_single_transition_always_sampled() {
		let state = state(&["only"]);
		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..20 {
			assert_eq!(state.sample(&mut rng).map(Token::as_str), Some("only"));
		}
	}

	#[test]
	fn test_sampling_follows_weights() {
		let state = state(&["a", "a", "a", "b"]);
		let mut rng = StdRng::seed_from_u64(42);
		let draws = 4000;
		let a = (0..draws)
			.filter(|_| state.sample(&mut rng).map(Token::as_str) == Some("a"))
			.count();
		let ratio = a as f64 / draws as f64;
		assert!((ratio - 0.75).abs() < 0.05, "ratio was {ratio}");
	}

	#[test]
	fn test_most_likely_tie_break() {
		assert_eq!(state(&["b", "a"]).most_likely().map(Token::as_str), Some("a"));
		assert_eq!(state(&["b", "a", "b"]).most_likely().map(Token::as_str), Some("b"));
	}

	#[test]
	fn test_merge_adds_counts() {
		let mut left = state(&["cat", "mat"]);
		assert!(left.merge(&state(&["cat", "dog"])));
		assert_eq!(left.count("cat"), 2);
		assert_eq!(left.count("dog"), 1);
		assert_eq!(left.total(), 4);
	}

	#[test]
	fn test_overflow_leaves_state_untouched() {
		let mut full = State::new();
		assert!(full.add_occurrences(token("cat"), u64::MAX - 1));
		let before = full.clone();

		assert!(!full.add_occurrences(token("dog"), 2));
		assert!(!full.merge(&state(&["cat", "dog"])));
		assert_eq!(full, before);

		assert!(full.add_occurrences(token("cat"), 1));
		assert_eq!(full.total(), u64::MAX);
	}
}

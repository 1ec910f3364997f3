use std::borrow::Borrow;
use std::fmt;
use std::str::SplitWhitespace;

use serde::{Deserialize, Serialize};

/// One normalized word unit.
///
/// A token is always lowercase, never empty, and never starts or ends
/// with punctuation. Build one through [`Tokenizer`] (or [`Token::normalize`])
/// so that equality follows the normalization rules.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
	/// Normalizes a single raw word.
	///
	/// Returns `None` when nothing is left after stripping punctuation.
	pub fn normalize(word: &str) -> Option<Self> {
		let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
		if trimmed.is_empty() {
			return None;
		}
		Some(Self(trimmed.to_lowercase()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for Token {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for Token {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Splits raw text into [`Token`]s.
///
/// Rules, applied per whitespace-separated word:
/// - lowercase folding
/// - leading/trailing punctuation stripped (inner punctuation such as
///   `don't` or `well-known` is kept)
/// - whitespace runs act as a single separator
/// - words that end up empty are dropped
///
/// No stemming and no stop-word removal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tokenizer;

impl Tokenizer {
	pub fn new() -> Self {
		Self
	}

	/// Returns a lazy iterator over the tokens of `text`.
	///
	/// The iterator is `Clone`; a clone taken before consumption replays
	/// the same sequence.
	pub fn tokens<'a>(&self, text: &'a str) -> Tokens<'a> {
		Tokens { words: text.split_whitespace() }
	}
}

/// Lazy token sequence produced by [`Tokenizer::tokens`].
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
	words: SplitWhitespace<'a>,
}

impl Iterator for Tokens<'_> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		self.words.by_ref().find_map(Token::normalize)
	}
}

/// Tokenizes `text` into an owned vector.
pub fn tokenize(text: &str) -> Vec<Token> {
	Tokenizer::new().tokens(text).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn words(text: &str) -> Vec<String> {
		tokenize(text).into_iter().map(|t| t.to_string()).collect()
	}

	#[test]
	fn test_lowercase_and_split() {
		assert_eq!(words("The cat sat on the mat"), vec!["the", "cat", "sat", "on", "the", "mat"]);
		assert_eq!(words("THE CAT"), vec!["the", "cat"]);
	}

	#[test]
	fn test_strips_outer_punctuation_only() {
		assert_eq!(words("\"Well,\" she said. (don't) well-known!"), vec!["well", "she", "said", "don't", "well-known"]);
	}

	#[test]
	fn test_whitespace_runs_and_empty_tokens() {
		assert_eq!(words("  a \t\n b   -- ... c  "), vec!["a", "b", "c"]);
	}

	#[test]
	fn test_empty_text() {
		assert!(tokenize("").is_empty());
		assert!(tokenize("   \n\t").is_empty());
		assert!(tokenize("?! ...").is_empty());
	}

	#[test]
	fn test_tokens_are_restartable() {
		let tokens = Tokenizer::new().tokens("one two three");
		let replay = tokens.clone();
		assert_eq!(tokens.collect::<Vec<_>>(), replay.collect::<Vec<_>>());
	}

	#[test]
	fn test_deterministic() {
		let text = "It was the best of times, it was the worst of times.";
		assert_eq!(tokenize(text), tokenize(text));
	}

	#[test]
	fn test_unicode_lowercase() {
		assert_eq!(words("Élan ÇA"), vec!["élan", "ça"]);
	}
}

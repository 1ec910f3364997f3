use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tokenizer::{Token, Tokenizer};

/// Ordered, fixed-length sequence of tokens preceding a prediction point.
///
/// Used as the key of the transition table. Two contexts are equal iff
/// their tokens are equal element-wise.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Context(Vec<Token>);

impl Context {
	pub fn new(tokens: Vec<Token>) -> Self {
		Self(tokens)
	}

	/// Builds a context by tokenizing free text with the default [`Tokenizer`].
	pub fn parse(text: &str) -> Self {
		Self(Tokenizer::new().tokens(text).collect())
	}

	/// Number of tokens (the order this context matches).
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn tokens(&self) -> &[Token] {
		&self.0
	}

	/// Returns the context that follows this one once `next` is appended.
	///
	/// The window keeps its length: the oldest token is dropped.
	pub fn shift(&self, next: Token) -> Self {
		let mut tokens = Vec::with_capacity(self.0.len());
		tokens.extend(self.0.iter().skip(1).cloned());
		tokens.push(next);
		Self(tokens)
	}

	/// Keeps only the last `order` tokens.
	///
	/// Returns `None` when fewer than `order` tokens are available.
	pub fn trailing(tokens: &[Token], order: usize) -> Option<Self> {
		if tokens.len() < order {
			return None;
		}
		Some(Self(tokens[tokens.len() - order..].to_vec()))
	}
}

impl From<Vec<Token>> for Context {
	fn from(tokens: Vec<Token>) -> Self {
		Self(tokens)
	}
}

impl fmt::Display for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("(")?;
		for (i, token) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "\"{}\"", token)?;
		}
		f.write_str(")")
	}
}

/// Lazy sliding window over a token sequence.
///
/// Yields `(context, next)` pairs where `context` holds the `order` tokens
/// immediately preceding `next`. The window advances one token per step, so
/// every overlapping context is produced.
#[derive(Clone, Debug)]
pub struct ContextWindows<I> {
	tokens: I,
	order: usize,
	window: VecDeque<Token>,
}

impl<I: Iterator<Item = Token>> ContextWindows<I> {
	/// `order` must be >= 1; an order of 0 yields nothing.
	pub fn new(tokens: I, order: usize) -> Self {
		Self { tokens, order, window: VecDeque::with_capacity(order + 1) }
	}
}

impl<I: Iterator<Item = Token>> Iterator for ContextWindows<I> {
	type Item = (Context, Token);

	fn next(&mut self) -> Option<Self::Item> {
		if self.order == 0 {
			return None;
		}

		// Fill the window up to `order` tokens
		while self.window.len() < self.order {
			self.window.push_back(self.tokens.next()?);
		}

		let next = self.tokens.next()?;
		let context = Context(self.window.iter().cloned().collect());

		self.window.pop_front();
		self.window.push_back(next.clone());

		Some((context, next))
	}
}

/// Shorthand for [`ContextWindows::new`].
pub fn contexts<I>(tokens: I, order: usize) -> ContextWindows<I::IntoIter>
where
	I: IntoIterator<Item = Token>,
{
	ContextWindows::new(tokens.into_iter(), order)
}

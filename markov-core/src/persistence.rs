//! Model file format.
//!
//! A model is stored as its order, its vocabulary and the flat list of
//! `(context tokens, next token, count)` triples, encoded with `postcard`.
//! Triple order carries no meaning: decoding rebuilds an equal table.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};
use crate::io::{cache_path, read_corpus};
use crate::model::context::Context;
use crate::model::markov_model::MarkovModel;
use crate::model::transition_table::TransitionTable;
use crate::tokenizer::Token;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Triple {
	context: Context,
	next: Token,
	count: u64,
}

#[derive(Serialize, Deserialize, Debug)]
struct ModelFile {
	version: u32,
	order: usize,
	vocabulary: Vec<Token>,
	triples: Vec<Triple>,
}

/// Encodes `model` into bytes.
pub fn to_bytes(model: &MarkovModel) -> Result<Vec<u8>> {
	let file = ModelFile {
		version: FORMAT_VERSION,
		order: model.order(),
		vocabulary: model.vocabulary().iter().cloned().collect(),
		triples: model
			.table()
			.triples()
			.map(|(context, next, count)| Triple { context: context.clone(), next: next.clone(), count })
			.collect(),
	};
	Ok(postcard::to_stdvec(&file)?)
}

/// Decodes a model previously encoded with [`to_bytes`].
///
/// # Errors
/// - [`MarkovError::Serialization`] on malformed bytes, an unknown format
///   version, or counts of one context summing past `u64::MAX`
/// - [`MarkovError::InvalidOrder`] or [`MarkovError::ContextLength`] when the
///   content contradicts itself
pub fn from_bytes(bytes: &[u8]) -> Result<MarkovModel> {
	let file: ModelFile = postcard::from_bytes(bytes)?;
	if file.version != FORMAT_VERSION {
		return Err(postcard::Error::DeserializeBadEncoding.into());
	}

	let mut table = TransitionTable::new();
	let mut vocabulary: HashSet<Token> = file.vocabulary.into_iter().collect();
	let shape = MarkovModel::new(file.order)?;
	for triple in file.triples {
		shape.check_context(&triple.context)?;
		vocabulary.extend(triple.context.tokens().iter().cloned());
		vocabulary.insert(triple.next.clone());
		table.observe_many(triple.context, triple.next, triple.count).map_err(|e| match e {
			MarkovError::CountOverflow(_) => MarkovError::Serialization(postcard::Error::DeserializeBadEncoding),
			other => other,
		})?;
	}

	MarkovModel::from_parts(file.order, table, vocabulary)
}

/// Writes `model` to `path`.
pub fn save<P: AsRef<Path>>(model: &MarkovModel, path: P) -> Result<()> {
	let bytes = to_bytes(model)?;
	fs::write(&path, &bytes)?;
	debug!("saved model ({} bytes) to {}", bytes.len(), path.as_ref().display());
	Ok(())
}

/// Reads a model written by [`save`].
pub fn load<P: AsRef<Path>>(path: P) -> Result<MarkovModel> {
	let bytes = fs::read(&path)?;
	let model = from_bytes(&bytes)?;
	debug!("loaded order {} model from {}", model.order(), path.as_ref().display());
	Ok(model)
}

/// Loads the cached model of `corpus_path` if it is up to date,
/// otherwise trains it and writes the cache for future fast loading.
///
/// - The cache lives next to the corpus (see [`cache_path`]).
/// - A cache older than the corpus is retrained and overwritten.
/// - A cache whose corpus is gone is used as is.
/// - Training is sharded over `threads` workers (`0` = number of CPUs).
pub fn load_or_train<P: AsRef<Path>>(corpus_path: P, order: usize, threads: usize) -> Result<MarkovModel> {
	let corpus_path = corpus_path.as_ref();
	let cached = cache_path(corpus_path, order)?;
	if cache_is_fresh(corpus_path, &cached) {
		info!("loading cached model {}", cached.display());
		return load(&cached);
	}

	let text = read_corpus(corpus_path)?;
	let mut model = MarkovModel::new(order)?;
	let report = model.train_parallel(&text, threads)?;
	info!(
		"trained order {} on {} token(s), {} transition(s)",
		order, report.tokens, report.transitions
	);

	save(&model, &cached)?;
	Ok(model)
}

/// Whether `cached` exists and was written after `corpus` last changed.
fn cache_is_fresh(corpus: &Path, cached: &Path) -> bool {
	let Ok(cache_time) = fs::metadata(cached).and_then(|m| m.modified()) else {
		return false;
	};
	match fs::metadata(corpus).and_then(|m| m.modified()) {
		Ok(corpus_time) if corpus_time > cache_time => {
			warn!("{} changed after {} was written, retraining", corpus.display(), cached.display());
			false
		}
		Ok(_) => true,
		Err(e) => {
			warn!("cannot stat {} ({e}), using cache {}", corpus.display(), cached.display());
			true
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::{Duration, SystemTime};

	fn trained(text: &str, order: usize) -> MarkovModel {
		let mut model = MarkovModel::new(order).unwrap();
		model.train(text);
		model
	}

	#[test]
	fn test_bytes_round_trip() {
		let model = trained("the cat sat on the mat the cat ran", 2);
		let decoded = from_bytes(&to_bytes(&model).unwrap()).unwrap();
		assert_eq!(decoded, model);
	}

	#[test]
	fn test_empty_model_round_trip() {
		let model = MarkovModel::new(3).unwrap();
		let decoded = from_bytes(&to_bytes(&model).unwrap()).unwrap();
		assert_eq!(decoded.order(), 3);
		assert!(decoded.is_empty());
	}

	#[test]
	fn test_garbage_is_rejected() {
		assert!(matches!(from_bytes(&[0xff, 0xff, 0xff]), Err(MarkovError::Serialization(_))));
	}

	#[test]
	fn test_inconsistent_context_is_rejected() {
		let file = ModelFile {
			version: FORMAT_VERSION,
			order: 2,
			vocabulary: Vec::new(),
			triples: vec![Triple {
				context: Context::parse("a"),
				next: Token::normalize("b").unwrap(),
				count: 1,
			}],
		};
		let bytes = postcard::to_stdvec(&file).unwrap();
		assert!(matches!(from_bytes(&bytes), Err(MarkovError::ContextLength { .. })));
	}

	#[test]
	fn test_overflowing_counts_are_rejected() {
		let triple = |next: &str, count| Triple {
			context: Context::parse("a"),
			next: Token::normalize(next).unwrap(),
			count,
		};
		let file = ModelFile {
			version: FORMAT_VERSION,
			order: 1,
			vocabulary: Vec::new(),
			triples: vec![triple("b", u64::MAX), triple("c", 1)],
		};
		let bytes = postcard::to_stdvec(&file).unwrap();
		assert!(matches!(from_bytes(&bytes), Err(MarkovError::Serialization(_))));
	}

	#[test]
	fn test_save_and_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.bin");
		let model = trained("a b c a b d", 1);
		save(&model, &path).unwrap();
		assert_eq!(load(&path).unwrap(), model);
	}

	#[test]
	fn test_load_or_train_writes_cache() {
		let dir = tempfile::tempdir().unwrap();
		let corpus = dir.path().join("books.txt");
		fs::write(&corpus, "the cat sat\non the mat").unwrap();

		let trained_model = load_or_train(&corpus, 1, 2).unwrap();
		assert!(dir.path().join("books.o1.bin").exists());

		// Second call reads the cache even if the corpus is gone
		fs::remove_file(&corpus).unwrap();
		let cached_model = load_or_train(&corpus, 1, 2).unwrap();
		assert_eq!(cached_model, trained_model);
	}

	fn set_modified(path: &Path, time: SystemTime) {
		fs::File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
	}

	#[test]
	fn test_load_or_train_retrains_stale_cache() {
		let dir = tempfile::tempdir().unwrap();
		let corpus = dir.path().join("books.txt");
		let cached = dir.path().join("books.o1.bin");
		fs::write(&corpus, "the cat sat").unwrap();
		load_or_train(&corpus, 1, 2).unwrap();

		fs::write(&corpus, "a dog ran\naway").unwrap();
		set_modified(&cached, SystemTime::UNIX_EPOCH + Duration::from_secs(1));

		let model = load_or_train(&corpus, 1, 2).unwrap();
		assert_eq!(model, trained("a dog ran away", 1));
		assert!(model.counts_for(&Context::parse("cat")).is_empty());
		assert_eq!(load(&cached).unwrap(), model);
	}

	#[test]
	fn test_load_or_train_keeps_fresh_cache() {
		let dir = tempfile::tempdir().unwrap();
		let corpus = dir.path().join("books.txt");
		let cached = dir.path().join("books.o1.bin");
		fs::write(&corpus, "the cat sat").unwrap();
		set_modified(&corpus, SystemTime::UNIX_EPOCH + Duration::from_secs(1));

		let stored = trained("x y z", 1);
		save(&stored, &cached).unwrap();
		assert_eq!(load_or_train(&corpus, 1, 2).unwrap(), stored);
	}
}

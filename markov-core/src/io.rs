use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reads a whole corpus file as text.
///
/// - Reads the entire file into memory
/// - Invalid UTF-8 sequences are replaced, not rejected
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	let bytes = fs::read(filename)?;
	Ok(match String::from_utf8(bytes) {
		Ok(text) => text,
		Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
	})
}

/// Reads and concatenates several corpus files, separated by a line break.
pub fn read_corpora<P: AsRef<Path>>(filenames: &[P]) -> io::Result<String> {
	let mut text = String::new();
	for filename in filenames {
		if !text.is_empty() && !text.ends_with('\n') {
			text.push('\n');
		}
		text.push_str(&read_corpus(filename)?);
	}
	Ok(text)
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/input.txt` + `"bin"` → `data/input.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Path of the cached model trained with `order` on `corpus_path`.
///
/// Example:
/// `data/books.txt` + order 2 → `data/books.o2.bin`
pub fn cache_path<P: AsRef<Path>>(corpus_path: P, order: usize) -> io::Result<PathBuf> {
	build_output_path(corpus_path, &format!("o{order}.bin"))
}

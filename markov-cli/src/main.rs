use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use markov_core::io::read_corpora;
use markov_core::persistence::{load, load_or_train, save};
use markov_core::{
	Context, GenerationConfig, Generator, MarkovError, MarkovModel, ProbabilityModel, StopReason, Strategy,
};

const DEFAULT_CORPUS: &str = "./MarkovData/gutenberg_combined.txt";

#[derive(Parser)]
#[command(name = "markov")]
#[command(about = "Word-level Markov chain: next word prediction and text generation")]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
	/// Train a model on one or more corpus files and save it
	Train {
		#[command(flatten)]
		source: CorpusArgs,

		/// Output model file
		#[arg(short = 'O', long)]
		output: PathBuf,
	},

	/// Show the ranked next-word distribution of a context
	Predict {
		#[command(flatten)]
		source: SourceArgs,

		/// Context words (exactly `order` words once tokenized)
		context: String,

		/// Number of ranked words to show
		#[arg(short, long, default_value = "5")]
		top: usize,
	},

	/// Generate text from a seed context
	Generate {
		#[command(flatten)]
		source: SourceArgs,

		/// Seed words (exactly `order` words once tokenized)
		seed_text: String,

		#[command(flatten)]
		sampling: SamplingArgs,
	},

	/// Show model statistics
	Stats {
		#[command(flatten)]
		source: SourceArgs,
	},

	/// Menu-driven session (default when no command is given)
	Interactive {
		/// Corpus file; asked for when missing and the default file does not exist
		#[arg(short, long)]
		corpus: Option<PathBuf>,

		#[command(flatten)]
		sampling: SamplingArgs,
	},
}

#[derive(Args)]
struct CorpusArgs {
	/// Corpus text file; repeat the flag to concatenate several in order
	#[arg(short, long, default_value = DEFAULT_CORPUS, action = ArgAction::Append)]
	corpus: Vec<PathBuf>,

	/// Markov chain order (number of context words)
	#[arg(short, long, default_value = "1")]
	order: usize,

	/// Training threads (0 = number of CPUs)
	#[arg(long, default_value = "0")]
	threads: usize,
}

#[derive(Args)]
struct SourceArgs {
	/// Load a saved model instead of training on the corpus
	#[arg(short, long, conflicts_with = "corpus")]
	model: Option<PathBuf>,

	#[command(flatten)]
	corpus: CorpusArgs,
}

#[derive(Args, Clone, Copy)]
struct SamplingArgs {
	/// Number of words to generate
	#[arg(short, long, default_value = "20")]
	length: usize,

	/// Random seed for reproducible output
	#[arg(short, long)]
	seed: Option<u64>,

	/// Next word selection
	#[arg(long, value_enum, default_value_t = StrategyArg::Sample)]
	strategy: StrategyArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyArg {
	/// Weighted random draw
	Sample,
	/// Most probable word
	Max,
}

impl From<StrategyArg> for Strategy {
	fn from(arg: StrategyArg) -> Self {
		match arg {
			StrategyArg::Sample => Strategy::Sample,
			StrategyArg::Max => Strategy::MostLikely,
		}
	}
}

impl SamplingArgs {
	fn rng(&self) -> StdRng {
		match self.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_os_rng(),
		}
	}

	fn config(&self) -> GenerationConfig {
		GenerationConfig { length: self.length, strategy: self.strategy.into() }
	}
}

impl CorpusArgs {
	/// Trains on the corpus files.
	///
	/// A single file goes through the on-disk cache; several files are
	/// concatenated and trained in memory.
	fn train(&self) -> Result<MarkovModel, MarkovError> {
		if let [single] = self.corpus.as_slice() {
			return load_or_train(single, self.order, self.threads);
		}
		let text = read_corpora(&self.corpus)?;
		let mut model = MarkovModel::new(self.order)?;
		model.train_parallel(&text, self.threads)?.ensure_not_empty()?;
		Ok(model)
	}
}

impl SourceArgs {
	fn model(&self) -> Result<MarkovModel, MarkovError> {
		match &self.model {
			Some(path) => load(path),
			None => self.corpus.train(),
		}
	}
}

fn print_stats(model: &MarkovModel) {
	let stats = model.stats();
	println!("{}", "=".repeat(60));
	println!("MODEL STATISTICS");
	println!("{}", "=".repeat(60));
	println!("Order: {}", stats.order);
	println!("Vocabulary size: {}", stats.vocabulary_size);
	println!("Unique contexts: {}", stats.unique_contexts);
	println!("Total transitions: {}", stats.total_transitions);
	println!("{}", "=".repeat(60));
}

/// Prints a ranked distribution, or the reason there is none.
fn show_prediction(model: &MarkovModel, context: &Context, top: usize) -> Result<(), MarkovError> {
	match ProbabilityModel::new(model).distribution_for(context) {
		Ok(distribution) => {
			for (rank, (token, probability)) in distribution.top(top).iter().enumerate() {
				println!("{:>2}. {:<20} {:.4}", rank + 1, token, probability);
			}
			Ok(())
		}
		Err(e) if e.is_recoverable() => {
			println!("{e}");
			Ok(())
		}
		Err(e) => Err(e),
	}
}

fn show_generation(model: &MarkovModel, seed: &Context, sampling: &SamplingArgs, rng: &mut StdRng) -> Result<(), MarkovError> {
	let generator = Generator::with_config(model, sampling.config());
	match generator.generate_default(seed, rng) {
		Ok(generation) => {
			println!("\nGenerated:\n{}\n", generation.text_with_seed());
			if let StopReason::UnknownContext(context) = &generation.stop {
				println!("(stopped after {} word(s): no continuation for {})", generation.tokens.len(), context);
			}
			Ok(())
		}
		Err(e) if e.is_recoverable() => {
			println!("{e}");
			Ok(())
		}
		Err(e) => Err(e),
	}
}

/// Reads one trimmed line from stdin; `None` on end of input.
fn prompt(message: &str) -> io::Result<Option<String>> {
	print!("{message}");
	io::stdout().flush()?;
	let mut line = String::new();
	if io::stdin().lock().read_line(&mut line)? == 0 {
		return Ok(None);
	}
	Ok(Some(line.trim().to_owned()))
}

fn interactive(corpus: Option<PathBuf>, sampling: SamplingArgs) -> Result<(), Box<dyn Error>> {
	println!("\n{}", "=".repeat(60));
	println!("MARKOV CHAIN CLI");
	println!("{}\n", "=".repeat(60));

	println!("Select order:");
	println!("1. Order 1 (single word context)");
	println!("2. Order 2 (two word context)");
	println!("3. Order 3 (three word context)");
	let order = match prompt("\nEnter choice (1-3): ")?.as_deref() {
		Some("1") => 1,
		Some("2") => 2,
		Some("3") => 3,
		_ => {
			println!("Invalid choice!");
			return Ok(());
		}
	};

	let default_corpus = PathBuf::from(DEFAULT_CORPUS);
	let corpus = match corpus {
		Some(path) => path,
		None if default_corpus.exists() => default_corpus,
		None => match prompt("\nEnter path to training file: ")? {
			Some(path) if !path.is_empty() => PathBuf::from(path),
			_ => return Ok(()),
		},
	};
	println!("\nUsing data file: {}", corpus.display());

	println!("\nTraining model (order={order})...");
	let start = Instant::now();
	let model = load_or_train(&corpus, order, 0)?;
	println!("Training completed in {:.2} seconds\n", start.elapsed().as_secs_f64());
	print_stats(&model);

	let mut rng = sampling.rng();
	loop {
		println!("\nOptions:");
		println!("1. Predict next word");
		println!("2. Generate text");
		println!("3. Exit");

		let Some(choice) = prompt("\nEnter choice (1-3): ")? else { break };
		match choice.as_str() {
			"1" => {
				let Some(text) = prompt(&format!("Enter {order} word(s): "))? else { break };
				show_prediction(&model, &Context::parse(&text), 5)?;
			}
			"2" => {
				let Some(length) = prompt("Words to generate? ")? else { break };
				let Ok(length) = length.parse::<usize>() else {
					println!("Invalid number");
					continue;
				};
				let Some(text) = prompt(&format!("Start with {order} word(s): "))? else { break };
				let sampling = SamplingArgs { length, ..sampling };
				show_generation(&model, &Context::parse(&text), &sampling, &mut rng)?;
			}
			"3" => {
				println!("Done!");
				break;
			}
			_ => println!("Invalid choice!"),
		}
	}

	Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
	match cli.command {
		Some(Commands::Train { source, output }) => {
			let model = source.train()?;
			save(&model, &output)?;
			info!("model written to {}", output.display());
			print_stats(&model);
		}
		Some(Commands::Predict { source, context, top }) => {
			let model = source.model()?;
			show_prediction(&model, &Context::parse(&context), top)?;
		}
		Some(Commands::Generate { source, seed_text, sampling }) => {
			let model = source.model()?;
			let mut rng = sampling.rng();
			show_generation(&model, &Context::parse(&seed_text), &sampling, &mut rng)?;
		}
		Some(Commands::Stats { source }) => {
			print_stats(&source.model()?);
		}
		Some(Commands::Interactive { corpus, sampling }) => interactive(corpus, sampling)?,
		None => {
			let sampling = SamplingArgs { length: 20, seed: None, strategy: StrategyArg::Sample };
			interactive(None, sampling)?
		}
	}
	Ok(())
}

fn main() -> std::process::ExitCode {
	env_logger::init();

	match run(Cli::parse()) {
		Ok(()) => std::process::ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("Error: {e}");
			std::process::ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_cli_definition() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_parse_generate() {
		let cli = Cli::try_parse_from([
			"markov", "generate", "the cat", "--order", "2", "--length", "7", "--seed", "3", "--strategy", "max",
		])
		.unwrap();
		match cli.command {
			Some(Commands::Generate { source, seed_text, sampling }) => {
				assert_eq!(source.corpus.order, 2);
				assert_eq!(seed_text, "the cat");
				assert_eq!(sampling.length, 7);
				assert_eq!(sampling.seed, Some(3));
				assert_eq!(Strategy::from(sampling.strategy), Strategy::MostLikely);
			}
			_ => panic!("expected generate"),
		}
	}

	#[test]
	fn test_corpus_flag_before_positional() {
		let cli = Cli::try_parse_from(["markov", "predict", "--corpus", "a.txt", "the cat", "-o", "2"]).unwrap();
		match cli.command {
			Some(Commands::Predict { source, context, .. }) => {
				assert_eq!(source.corpus.corpus, vec![PathBuf::from("a.txt")]);
				assert_eq!(context, "the cat");
				assert_eq!(source.corpus.order, 2);
			}
			_ => panic!("expected predict"),
		}
	}

	#[test]
	fn test_corpus_flag_repeated() {
		let cli = Cli::try_parse_from(["markov", "train", "-c", "a.txt", "-c", "b.txt", "-O", "m.bin"]).unwrap();
		match cli.command {
			Some(Commands::Train { source, output }) => {
				assert_eq!(source.corpus, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
				assert_eq!(output, PathBuf::from("m.bin"));
			}
			_ => panic!("expected train"),
		}
	}

	#[test]
	fn test_corpus_default() {
		let cli = Cli::try_parse_from(["markov", "stats"]).unwrap();
		match cli.command {
			Some(Commands::Stats { source }) => {
				assert!(source.model.is_none());
				assert_eq!(source.corpus.corpus, vec![PathBuf::from(DEFAULT_CORPUS)]);
			}
			_ => panic!("expected stats"),
		}
	}

	#[test]
	fn test_model_conflicts_with_corpus() {
		let result = Cli::try_parse_from(["markov", "stats", "--model", "m.bin", "--corpus", "a.txt"]);
		assert!(result.is_err());
	}

	#[test]
	fn test_no_command_is_interactive() {
		let cli = Cli::try_parse_from(["markov"]).unwrap();
		assert!(cli.command.is_none());
	}
}

//! Offline check of the artifacts: prints the vocabulary size, then the token
//! sequence, padded input and prediction for each text.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use newsclf_core::{Classifier, ClassifierConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SAMPLE_TEXTS: [&str; 4] = [
    "Aliens have landed in New York City and are eating pizza.",
    "The government successfully passed the new healthcare bill yesterday.",
    "Hillary Clinton emails reveal secret plot.",
    "Local cat wins mayor election in small town.",
];

#[derive(Parser, Debug)]
#[command(name = "newsclf-inspect")]
#[command(about = "Run the classifier on sample texts and print every intermediate step", long_about = None)]
struct Args {
    /// Directory holding config.json and model.safetensors
    #[arg(short, long, default_value = "fake_news_model", env = "NEWSCLF_MODEL_DIR")]
    model_dir: PathBuf,

    /// Tokenizer exported with Keras `Tokenizer.to_json()`
    #[arg(short, long, default_value = "tokenizer.json", env = "NEWSCLF_TOKENIZER")]
    tokenizer: PathBuf,

    /// Override the sequence length declared in the model config
    #[arg(long, env = "NEWSCLF_MAX_LENGTH")]
    max_length: Option<usize>,

    /// Print one JSON object per text instead of plain text
    #[arg(long)]
    json: bool,

    /// Texts to classify (defaults to a few built-in samples)
    texts: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let classifier = Classifier::load(&ClassifierConfig {
        model_dir: args.model_dir,
        tokenizer_path: args.tokenizer,
        max_length: args.max_length,
    })?;

    let texts: Vec<String> = if args.texts.is_empty() {
        SAMPLE_TEXTS.iter().map(|s| s.to_string()).collect()
    } else {
        args.texts
    };

    if !args.json {
        println!("Vocab size: {}", classifier.tokenizer().vocab_size());
        println!("Model ({}): {}", classifier.model().source().display(), classifier.model().summary());
        println!("Decision: {:?}", classifier.decision());
    }

    for text in &texts {
        let inspection = classifier.inspect(text)?;
        if args.json {
            let line = serde_json::json!({
                "text": text,
                "tokens": inspection.tokens,
                "padded": inspection.padded,
                "output": inspection.output,
                "label": inspection.prediction.label,
                "confidence": inspection.prediction.confidence,
            });
            println!("{}", line);
        } else {
            println!("\nText: {}", text);
            println!("Sequence: {:?}", inspection.tokens);
            println!("Padded ({}): {:?}", inspection.padded.len(), inspection.padded);
            println!("Raw output: {:?}", inspection.output);
            println!(
                "Result: {} (confidence {:.4})",
                inspection.prediction.label, inspection.prediction.confidence
            );
        }
    }

    Ok(())
}

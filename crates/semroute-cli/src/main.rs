//! semroute-embed — encode documents with the local or Mistral encoder and
//! print the vectors as JSON.

use std::io::BufRead;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use semroute_core::config::CONFIG_PATH_ENV;
use semroute_core::{DenseEncoder, EncoderSettings, EncoderType};
use semroute_infer::{LocalEncoder, LocalEncoderConfig};
use semroute_remote::{MistralEncoder, MistralEncoderConfig};

mod args;

use args::{CliArgs, Command};

#[derive(Serialize)]
struct EmbedOutput<'a> {
    encoder: EncoderType,
    name: &'a str,
    dimension: usize,
    embeddings: Vec<Vec<f32>>,
}

fn build_encoder(settings: &EncoderSettings) -> anyhow::Result<Box<dyn DenseEncoder>> {
    let encoder: Box<dyn DenseEncoder> = match settings.encoder {
        EncoderType::Local => {
            let encoder = LocalEncoder::new(LocalEncoderConfig::from(&settings.local))?;
            info!(
                "Local encoder ready: {} on {}",
                encoder.name(),
                encoder.device()
            );
            Box::new(encoder)
        }
        EncoderType::Mistral => {
            let encoder = MistralEncoder::new(MistralEncoderConfig::from(&settings.mistral))?;
            info!("Mistral encoder ready: {}", encoder.name());
            Box::new(encoder)
        }
    };
    Ok(encoder)
}

fn read_stdin_docs() -> anyhow::Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut docs = Vec::new();
    for line in stdin.lock().lines() {
        let line = line?;
        if !line.trim().is_empty() {
            docs.push(line);
        }
    }
    Ok(docs)
}

fn run(cli: CliArgs) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
    let mut settings = EncoderSettings::load(config_path.as_deref())?;
    if let Some(encoder) = cli.encoder {
        settings.encoder = encoder;
    }

    let docs = if cli.docs.is_empty() {
        read_stdin_docs()?
    } else {
        cli.docs
    };
    if docs.is_empty() {
        anyhow::bail!("No documents to encode");
    }

    let mut encoder = build_encoder(&settings)?;
    info!("Encoding {} documents with {}", docs.len(), encoder.encoder_type());
    let embeddings = encoder.encode(&docs)?;

    let output = EmbedOutput {
        encoder: encoder.encoder_type(),
        name: encoder.name(),
        dimension: embeddings.first().map(Vec::len).unwrap_or(0),
        embeddings,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args::parse(&args) {
        Ok(Command::Help) => {
            args::print_usage();
            Ok(())
        }
        Ok(Command::Embed(cli)) => run(cli),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

//! Command-line parsing.

use std::path::PathBuf;

use semroute_core::EncoderType;

#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub encoder: Option<EncoderType>,
    pub config: Option<PathBuf>,
    pub docs: Vec<String>,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Embed(CliArgs),
}

/// Parse arguments after the program name.
pub fn parse(args: &[String]) -> anyhow::Result<Command> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Ok(Command::Help),
            "--encoder" | "-e" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--encoder needs a value (local|mistral)"))?;
                parsed.encoder = Some(value.parse()?);
            }
            "--config" | "-c" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a file path"))?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--" => {
                parsed.docs.extend(iter.by_ref().cloned());
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                anyhow::bail!("Unknown option: {}. Use 'semroute-embed help' for usage.", flag);
            }
            doc => parsed.docs.push(doc.to_string()),
        }
    }

    Ok(Command::Embed(parsed))
}

pub fn print_usage() {
    println!("semroute-embed — encode text into dense vectors");
    println!();
    println!("Usage: semroute-embed [options] [text ...]");
    println!();
    println!("Reads one document per stdin line when no text is given.");
    println!();
    println!("Options:");
    println!("  -e, --encoder <local|mistral>  Encoder to use (env SEMROUTE_ENCODER)");
    println!("  -c, --config <file>            JSON settings file (env SEMROUTE_CONFIG)");
    println!("  -h, --help                     Show this help message");
}

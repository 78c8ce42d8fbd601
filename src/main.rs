//! epistle - peer-review letter to JATS XML converter

use std::process::ExitCode;

use clap::Parser;

use epistle::{Config, generate_xml};

#[derive(Parser)]
#[command(name = "epistle")]
#[command(version, about = "Convert peer-review letters to JATS XML", long_about = None)]
#[command(after_help = "EXAMPLES:
    epistle letter.xml output.xml     Convert converter output to JATS
    epistle --pretty letter.xml       Print formatted JATS to stdout")]
struct Cli {
    /// Input markup file (the document converter's output)
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file; stdout when omitted
    #[arg(value_name = "OUTPUT")]
    output: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Source manuscript name, used for DOI and asset filename assignment
    /// (defaults to INPUT)
    #[arg(short, long)]
    file_name: Option<String>,

    /// Indent the XML output
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let content = std::fs::read_to_string(&cli.input).map_err(|e| e.to_string())?;

    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
            Some(serde_json::from_str::<Config>(&raw).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    let file_name = cli.file_name.as_deref().unwrap_or(&cli.input);
    let jats = generate_xml(&content, Some(file_name), config.as_ref(), cli.pretty)
        .map_err(|e| e.to_string())?;

    match &cli.output {
        Some(path) => std::fs::write(path, jats).map_err(|e| e.to_string())?,
        None => println!("{jats}"),
    }
    Ok(())
}

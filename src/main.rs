use std::path::PathBuf;

use chronos::config::{GenerationMode, Settings};
use chronos::core::{RawScenario, validate};
use chronos::{api, generation, telemetry};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chronos", about = "Divergent life timelines from a single decision")]
struct Cli {
    /// Settings file (defaults to ./chronos.yaml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    mode: Option<GenerationMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate one simulation and print it as JSON.
    Generate {
        #[arg(long)]
        age: String,
        #[arg(long)]
        occupation: String,
        #[arg(long, default_value = "")]
        regret: String,
        #[arg(long)]
        decision: String,
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                settings.port = port;
            }
            if let Err(e) = settings.validate() {
                eprintln!("Configuration error: {e}");
                std::process::exit(1);
            }
            if let Err(e) = api::run_http_server(&settings).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Generate {
            age,
            occupation,
            regret,
            decision,
            api_key,
        } => {
            if let Err(e) = settings.validate() {
                eprintln!("Configuration error: {e}");
                std::process::exit(1);
            }
            let raw = RawScenario {
                age: Some(age.into()),
                occupation: Some(occupation),
                regret: Some(regret),
                decision: Some(decision),
            };
            let input = match validate(raw) {
                Ok(input) => input,
                Err(e) => {
                    eprintln!("Invalid scenario: {e}");
                    std::process::exit(2);
                }
            };
            let outcome = match generation::from_settings(&settings) {
                Ok(generator) => generator.generate(&input, api_key.as_deref()).await,
                Err(e) => Err(e),
            };
            match outcome.map(|result| serde_json::to_string_pretty(&result)) {
                Ok(Ok(json)) => println!("{json}"),
                Ok(Err(e)) => {
                    eprintln!("Could not encode simulation: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Simulation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use memorybook_lib::{
    commands::{generate, parse, settings},
    core::{errors::AppResult, types::Provider},
    init_tracing, AppState,
};

#[derive(Debug, Parser)]
#[command(name = "memorybook", version, about = "Draft memory books from photos with Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyse photos and draft a book
    Generate {
        #[arg(required = true)]
        photos: Vec<PathBuf>,
        /// JSON file with book preferences
        #[arg(long, value_name = "FILE")]
        request: Option<PathBuf>,
    },
    /// Suggest follow-up questions about a set of photos
    Questions {
        #[arg(required = true)]
        photos: Vec<PathBuf>,
        #[arg(long = "name")]
        partner_names: Vec<String>,
        #[arg(long, default_value = "couple")]
        relationship: String,
    },
    /// Recover a draft from saved model output without calling the model
    Parse {
        file: PathBuf,
        #[arg(default_value_t = 0)]
        photo_count: usize,
    },
    /// Store the Gemini API key in the OS keyring
    SetKey { api_key: String },
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli, state: AppState) -> AppResult<()> {
    match cli.command {
        Command::Generate { photos, request } => {
            let request = generate::load_request(request.as_deref()).await?;
            print_json(&generate::generate_book(&state, &photos, &request).await?)
        }
        Command::Questions {
            photos,
            partner_names,
            relationship,
        } => print_json(
            &generate::generate_questions(&state, &photos, &partner_names, &relationship).await?,
        ),
        Command::Parse { file, photo_count } => {
            print_json(&parse::parse_saved_output(&file, photo_count).await?)
        }
        Command::SetKey { api_key } => {
            print_json(&settings::set_provider_key(Provider::Gemini, &api_key)?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match AppState::from_env() {
        Ok(state) => {
            init_tracing(&state.settings);
            run(cli, state).await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let body = serde_json::to_string(&err).unwrap_or_else(|_| err.to_string());
            eprintln!("{body}");
            ExitCode::FAILURE
        }
    }
}

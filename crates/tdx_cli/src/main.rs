//! `tabledigest`: digest one table into a vector index, answer one question
//! about it, and mail a summary.
//!
//! ```bash
//! tabledigest --config ./tabledigest.toml          # same as `run`
//! tabledigest ask "Which type has the highest values?"
//! tabledigest check-db
//! tabledigest check-provider
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use tabledigest::logging::init_tracing;
use tabledigest::Pipeline;
use tdx_ai::embeddings::openai_embed::OpenAiEmbedder;
use tdx_ai::llm::openai_chat::OpenAiChat;
use tdx_ai::provider::ProviderClient;
use tdx_core::config::{AppConfig, DEFAULT_CONFIG_FILE};
use tdx_core::error::AppError;
use tdx_core::fetch::RowFetcher;
use tdx_core::notify::SmtpNotifier;

#[derive(Parser)]
#[command(name = "tabledigest", version, about = "Index a table, ask it a question, mail the digest")]
struct Cli {
    /// Path to the TOML configuration file. `TDX_*` environment variables override it.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, index, answer the configured question, save and email (default).
    Run,
    /// Answer a question from the index saved by a previous run.
    Ask {
        question: String,
    },
    /// Open and close one database connection.
    CheckDb,
    /// List the provider's models to confirm the base URL and API key.
    CheckProvider,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration error");
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config),
        Command::Ask { question } => ask(&config, &question),
        Command::CheckDb => check_db(&config),
        Command::CheckProvider => check_provider(&config),
    }
}

fn clients(config: &AppConfig) -> Result<(OpenAiEmbedder, OpenAiChat), AppError> {
    let client = ProviderClient::from_config(&config.provider)?;
    let embedder = OpenAiEmbedder::new(client.clone());
    let llm = OpenAiChat::from_config(client, &config.provider);
    Ok((embedder, llm))
}

fn run(config: &AppConfig) -> ExitCode {
    let (embedder, llm) = match clients(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    let mailer = SmtpNotifier::new(config.email.clone());

    println!("Fetching data from '{}' table...", config.database.table);
    let outcome = Pipeline::new(config, &embedder, &llm, &mailer).run();

    match outcome.rows_fetched {
        None => println!("No data fetched from database."),
        Some(0) => println!("No data fetched from database or data is empty."),
        Some(n) => {
            println!("Fetched {n} records; built {} documents", outcome.documents);
            match outcome.indexed {
                Some(k) => println!("Indexed {k} documents"),
                None => println!("Index was not built"),
            }
            println!(
                "Response: {}",
                outcome.answer.as_deref().unwrap_or("None")
            );
            println!(
                "Index saved: {}",
                if outcome.saved { "yes" } else { "no" }
            );
            if let Some(summary) = &outcome.summary {
                println!("\n{summary}");
            }
            println!(
                "Email sent: {}",
                if outcome.emailed { "yes" } else { "no" }
            );
        }
    }
    ExitCode::SUCCESS
}

fn ask(config: &AppConfig, question: &str) -> ExitCode {
    let (embedder, llm) = match clients(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    let mailer = SmtpNotifier::new(config.email.clone());

    match Pipeline::new(config, &embedder, &llm, &mailer).ask(question) {
        Ok(out) => {
            println!("{}", out.answer);
            for hit in &out.sources {
                println!("  [row {}] score={:.3}", hit.row_index, hit.score);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn check_db(config: &AppConfig) -> ExitCode {
    match RowFetcher::new(&config.database).check_connection() {
        Ok(()) => {
            println!("Connection OK: {}", config.database.path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn check_provider(config: &AppConfig) -> ExitCode {
    let result = ProviderClient::from_config(&config.provider).and_then(|client| {
        client.health_check()?;
        Ok(client)
    });
    match result {
        Ok(client) => {
            println!("Provider OK: {}", client.base_url());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

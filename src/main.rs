use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indexmap::IndexMap;

use natural_query::correction::CorrectionLoop;
use natural_query::db::{Database, ExecutionOutcome, MySqlDatabase};
use natural_query::display::render_table;
use natural_query::llm::{DEFAULT_MODEL, GeminiClient};
use natural_query::prompt::{Prompter, StdPrompter};
use natural_query::store::{QueryStore, bind_template};
use natural_query::translate::{Translator, system_instruction};
use natural_query::{resolve_schema_path, resolve_store_path};

#[derive(Parser)]
#[command(
    name = "nlquery",
    about = "Query a MySQL database in natural language"
)]
struct Cli {
    /// Gemini model to use for translation
    #[arg(long)]
    model: Option<String>,

    /// List available Gemini models and exit
    #[arg(long)]
    list_models: bool,

    /// Path to the schema documentation file
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Path to the saved-query store
    #[arg(long)]
    queries: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_models {
        let api_key =
            std::env::var("GEMINI_API_KEY").map_err(|_| "GEMINI_API_KEY is not set")?;
        for name in GeminiClient::list_models(&api_key).await? {
            println!("{name}");
        }
        return Ok(());
    }

    let model = cli
        .model
        .or_else(|| std::env::var("GEMINI_DEFAULT_MODEL").ok())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let schema_path = cli.schema.unwrap_or_else(resolve_schema_path);
    let schema_doc = std::fs::read_to_string(&schema_path).map_err(|e| {
        format!(
            "Could not load schema documentation from {}: {e}",
            schema_path.display()
        )
    })?;

    // Translation is required — fail early if the key is missing.
    let llm = GeminiClient::from_env(model.clone(), system_instruction(&schema_doc))
        .map_err(|e| format!("{e}. Set GEMINI_API_KEY to enable translation."))?;

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL environment variable not found")?;
    let db = Arc::new(
        MySqlDatabase::connect(&database_url)
            .await
            .map_err(|e| format!("Database connection failed: {e}"))?,
    );

    let store_path = cli.queries.unwrap_or_else(resolve_store_path);
    let mut store = QueryStore::open(&store_path).map_err(|e| {
        format!(
            "Could not open saved-query store at {}: {e}",
            store_path.display()
        )
    })?;

    // Interrupt closes the database connection before exit.
    {
        let db = db.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted; closing database connection.");
                db.close().await;
                std::process::exit(0);
            }
        });
    }

    println!("Natural Language Query Tool");
    println!("===========================");
    println!("Model: {model}");
    println!();
    println!("Type a question in natural language, or \"quit\" to exit.");
    println!("Statements run with the connection's full privileges and may modify data.");
    println!();
    println!("Commands:");
    println!("  list              - list saved queries");
    println!("  run <label>       - run a saved query, prompting per parameter");
    println!();

    let mut translator = Translator::new(Arc::new(llm));
    let mut prompter = StdPrompter;
    let stdin = std::io::stdin();

    loop {
        print!("query> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        let lowered = input.to_lowercase();

        if input.is_empty() {
            continue;
        }
        if lowered == "quit" || lowered == "exit" {
            break;
        }
        if lowered == "list" {
            list_saved(&store);
            continue;
        }
        if lowered == "run" {
            eprintln!("Provide a label to run.");
            continue;
        }
        if lowered.starts_with("run ") {
            let label = input[4..].trim();
            run_saved(db.as_ref(), &store, &mut prompter, label).await;
            continue;
        }

        let mut correction = CorrectionLoop::new(&mut translator, db.as_ref());
        if let Err(e) = correction.run(input, &mut prompter, &mut store).await {
            eprintln!("{e}");
        }
        println!(
            "Session usage: {} tokens, ${:.6}",
            translator.cost().total_tokens(),
            translator.cost().total_cost()
        );
    }

    println!("Goodbye.");
    db.close().await;
    Ok(())
}

/// Enumerate saved labels in store order.
fn list_saved(store: &QueryStore) {
    let labels = store.labels();
    if labels.is_empty() {
        println!("No queries saved yet.");
        return;
    }
    println!("Saved queries:");
    for label in labels {
        println!("  - {label}");
    }
}

/// Resolve a saved query — prompting for each parameter in order — and run
/// it at full scale with driver-native binding.
async fn run_saved(
    db: &dyn Database,
    store: &QueryStore,
    prompter: &mut dyn Prompter,
    label: &str,
) {
    let Some(saved) = store.get(label) else {
        eprintln!("No saved query with label \"{label}\".");
        return;
    };

    let mut values = IndexMap::new();
    for param in &saved.params {
        match prompter.input(&format!("Enter value for {param}:")) {
            Ok(value) => {
                values.insert(param.clone(), value);
            }
            Err(e) => {
                eprintln!("Prompt failed: {e}");
                return;
            }
        }
    }

    let (sql, bound) = bind_template(&saved.sql, &values);
    match db.execute_bound(&sql, &bound).await {
        ExecutionOutcome::Failure(error) => eprintln!("Execution failed: {error}"),
        ExecutionOutcome::Success(rows) if rows.is_empty() => println!("No rows."),
        ExecutionOutcome::Success(rows) => {
            println!("Results ({} rows):", rows.len());
            print!("{}", render_table(&rows));
        }
    }
}

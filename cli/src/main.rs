//! Quaero CLI — run SPARQL queries from the command line
//!
//! Uses the quaero SparqlClient against any SPARQL endpoint; defaults to
//! the Wikidata Query Service.

use std::collections::BTreeSet;
use std::time::Duration;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use quaero::{EndpointConfig, RetryPolicy, SparqlClient};

#[derive(Parser)]
#[command(name = "quaero", version, about = "SPARQL query client CLI")]
struct Cli {
    /// SPARQL endpoint URL
    #[arg(
        long,
        default_value = quaero::WIKIDATA_SPARQL_ENDPOINT,
        global = true,
        env = "QUAERO_ENDPOINT"
    )]
    endpoint: String,

    /// Entity URI prefix used to derive short item identifiers
    #[arg(
        long,
        default_value = quaero::WIKIDATA_ENTITY_URL,
        global = true,
        env = "QUAERO_ENTITY_URL"
    )]
    entity_url: String,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Maximum number of retries after a request timeout
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Seconds to wait before the first retry (doubles per retry)
    #[arg(long, global = true)]
    retry_wait: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SELECT query
    Select {
        /// The SPARQL query string
        query: String,
    },
    /// Run an ASK query and print true or false
    Ask {
        /// The SPARQL query string
        query: String,
    },
    /// Run a SELECT query and print the entity identifiers it binds
    Items {
        /// The SPARQL query string
        query: String,

        /// Variable the entity URIs are bound to
        #[arg(long, default_value = "item")]
        var: String,
    },
    /// Start an interactive query shell
    Shell,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = run(&cli);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = EndpointConfig::new(cli.endpoint.clone(), cli.entity_url.clone())?;

    let mut retry = RetryPolicy::default();
    if let Some(max_retries) = cli.max_retries {
        retry.max_retries = max_retries;
    }
    if let Some(retry_wait) = cli.retry_wait {
        retry.retry_wait = Duration::from_secs_f64(retry_wait);
    }

    let mut client = SparqlClient::new(config)?.retry_policy(retry);

    match &cli.command {
        Commands::Select { query } => run_select(&mut client, query, &cli.format),
        Commands::Ask { query } => run_ask(&mut client, query),
        Commands::Items { query, var } => run_items(&mut client, query, var),
        Commands::Shell => run_shell(&mut client, &cli.format),
    }
}

fn run_select(
    client: &mut SparqlClient,
    query: &str,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = client.select(query, None)?.unwrap_or_default();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Csv => {
            if let Some(first) = rows.first() {
                let columns: Vec<&str> = first.keys().map(String::as_str).collect();
                println!("{}", columns.join(","));
                for row in &rows {
                    let cells: Vec<String> =
                        row.values().map(|v| format_csv_value(v.as_deref())).collect();
                    println!("{}", cells.join(","));
                }
            }
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(rows[0].keys().map(String::as_str));

            for row in &rows {
                let cells: Vec<&str> =
                    row.values().map(|v| v.as_deref().unwrap_or("null")).collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!("{} row(s)", rows.len());
        }
    }

    Ok(())
}

fn run_ask(client: &mut SparqlClient, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = client.ask(query, None)?;
    println!("{}", result);
    Ok(())
}

fn run_items(
    client: &mut SparqlClient,
    query: &str,
    var: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let items: BTreeSet<String> = client.get_items(query, var)?;
    for item in &items {
        println!("{}", item);
    }
    eprintln!("{} item(s)", items.len());
    Ok(())
}

fn run_shell(
    client: &mut SparqlClient,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Quaero Interactive Shell");
    println!("Type SPARQL SELECT queries, or :help for commands. :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        eprint!("quaero> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            ":quit" | ":exit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  :ask <query>  — Run an ASK query");
                println!("  :quit         — Exit shell");
                println!("  <query>       — Run a SELECT query");
            }
            input => {
                let result = if let Some(ask_query) = input.strip_prefix(":ask ") {
                    run_ask(client, ask_query.trim())
                } else {
                    run_select(client, input, format)
                };
                if let Err(e) = result {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }

    println!("Bye!");
    Ok(())
}

fn format_csv_value(value: Option<&str>) -> String {
    match value {
        None => String::new(),
        Some(s) if s.contains(',') || s.contains('"') || s.contains('\n') => {
            format!("\"{}\"", s.replace('"', "\"\""))
        }
        Some(s) => s.to_string(),
    }
}

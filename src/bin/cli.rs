//! sketchdb CLI - Main entry point for the CLI binary
//!
//! This binary provides the `sketchdb` tool for managing a store.

use sketchdb::engine::{
    cli::{formatter::CliFormatter, parse_document, parse_value, Cli, Commands, OutputFormat},
    config::StoreConfig,
    store::{Document, Store},
};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_cli(cli).await {
        CliFormatter::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match cli.root {
        Some(root) => StoreConfig::new(root),
        None => StoreConfig::from_env()?,
    };
    let json_output = cli.format == OutputFormat::Json;

    // setup creates the layout; every other command needs it to exist
    let store = match cli.command {
        Commands::Setup => Store::setup(config).await?,
        _ => Store::open(config).await?,
    };

    match cli.command {
        Commands::Setup => {
            let root = store.root().display().to_string();
            report(json_output, json!({ "success": true, "root": root }), &format!("Store ready at {}", root));
        }
        Commands::Tables => {
            let tables = store.list_tables().await?;
            if json_output {
                println!("{}", json!({ "tables": tables }));
            } else {
                CliFormatter::header("Tables");
                if tables.is_empty() {
                    CliFormatter::item("(none)");
                }
                for name in &tables {
                    CliFormatter::item(name);
                }
            }
        }
        Commands::CreateTable { name } => {
            store.create_table(&name).await?;
            report(json_output, json!({ "success": true, "table": name }), &format!("Created table {}", name));
        }
        Commands::DropTable { name } => {
            store.delete_table(&name).await?;
            report(json_output, json!({ "success": true, "table": name }), &format!("Dropped table {}", name));
        }
        Commands::RenameTable { name, new_name } => {
            store.rename_table(&name, &new_name).await?;
            report(
                json_output,
                json!({ "success": true, "from": name, "to": new_name }),
                &format!("Renamed table {} to {}", name, new_name),
            );
        }
        Commands::Insert { table, data, id } => {
            let data = parse_document(&data)?;
            let id = match id {
                Some(id) => store.insert_with_id(&table, id, data).await?,
                None => store.insert(&table, data).await?,
            };
            report(json_output, json!({ "success": true, "id": id }), &format!("Inserted {}/{}", table, id));
        }
        Commands::Get { table, id } => {
            let doc = store.get_row(&table, id.as_str()).await?;
            print_document(json_output, &doc)?;
        }
        Commands::Update { table, id, data } => {
            let partial = parse_document(&data)?;
            let doc = store.update(&table, id.as_str(), partial).await?;
            print_document(json_output, &doc)?;
        }
        Commands::Delete { table, id } => {
            store.delete_row(&table, id.as_str()).await?;
            report(json_output, json!({ "success": true, "id": id }), &format!("Deleted {}/{}", table, id));
        }
        Commands::Move { from, to, id } => {
            store.move_row(&from, &to, id.as_str()).await?;
            report(
                json_output,
                json!({ "success": true, "id": id, "from": from, "to": to }),
                &format!("Moved {} from {} to {}", id, from, to),
            );
        }
        Commands::All { table } => {
            let docs = store.get_all(&table).await?;
            print_documents(json_output, &table, &docs)?;
        }
        Commands::Filter { table, key, value } => {
            let docs = store.filter(&table, &key, parse_value(&value)).await?;
            print_documents(json_output, &table, &docs)?;
        }
        Commands::Join { left, right, key } => {
            let docs = store.eq_join(&left, &right, &key).await?;
            print_documents(json_output, &format!("{} ⟕ {}", left, right), &docs)?;
        }
        Commands::Count { table } => {
            let count = store.count(&table).await?;
            if json_output {
                println!("{}", json!({ "table": table, "count": count }));
            } else {
                CliFormatter::kv(&table, &count.to_string());
            }
        }
    }

    Ok(())
}

fn report(json_output: bool, value: serde_json::Value, message: &str) {
    if json_output {
        println!("{}", value);
    } else {
        CliFormatter::success(message);
    }
}

fn print_document(json_output: bool, doc: &Document) -> Result<(), Box<dyn std::error::Error>> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(doc)?);
    } else {
        CliFormatter::document(doc);
    }
    Ok(())
}

fn print_documents(json_output: bool, title: &str, docs: &[Document]) -> Result<(), Box<dyn std::error::Error>> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(docs)?);
    } else if docs.is_empty() {
        CliFormatter::info(&format!("{}: no rows", title));
    } else {
        CliFormatter::documents(title, docs);
    }
    Ok(())
}

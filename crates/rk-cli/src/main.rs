//! # rk: command-line client for rk-hub
//!
//! - `rk find todos --query '{"complete":false}'` lists matching rows.
//! - `rk get todos 3` fetches one row.
//! - `rk create todos '{"text":"milk"}'` inserts one row or an array of rows.
//! - `rk patch|update|remove todos [ID]` edit one row, or every row matching
//!   `--query` when no id is given.
//!
//! The hub address comes from `RK_BASE_URL`.

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "rk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Output {
    /// Render rows as a table instead of JSON.
    #[arg(long)]
    table: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List rows, paginated when the resource is.
    Find {
        resource: String,
        /// Query object, e.g. '{"age":{"$gt":20},"$sort":{"name":1}}'
        #[arg(long)]
        query: Option<String>,
        #[command(flatten)]
        output: Output,
    },

    /// Fetch one row by id.
    Get {
        resource: String,
        id: String,
        #[arg(long)]
        query: Option<String>,
        #[command(flatten)]
        output: Output,
    },

    /// Insert a JSON object or an array of objects.
    Create { resource: String, data: String },

    /// Merge fields into one row, or into every row matching --query.
    Patch {
        resource: String,
        id: Option<String>,
        #[arg(long)]
        data: String,
        #[arg(long)]
        query: Option<String>,
    },

    /// Replace one row.
    Update {
        resource: String,
        id: String,
        #[arg(long)]
        data: String,
    },

    /// Delete one row, or every row matching --query.
    Remove {
        resource: String,
        id: Option<String>,
        #[arg(long)]
        query: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to build tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(async_main(cli.command)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn async_main(cmd: Commands) -> CliResult<()> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("RK_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3030".to_string());

    match cmd {
        Commands::Find {
            resource,
            query,
            output,
        } => {
            let url = format!("{}/{}", base_url, resource);
            let req = with_query(client.get(&url), query.as_deref())?;
            print(send(req).await?, output.table)
        }

        Commands::Get {
            resource,
            id,
            query,
            output,
        } => {
            let url = format!("{}/{}/{}", base_url, resource, id);
            let req = with_query(client.get(&url), query.as_deref())?;
            print(send(req).await?, output.table)
        }

        Commands::Create { resource, data } => {
            let url = format!("{}/{}", base_url, resource);
            let req = client.post(&url).json(&parse_json(&data)?);
            print(send(req).await?, false)
        }

        Commands::Patch {
            resource,
            id,
            data,
            query,
        } => {
            let req = with_query(client.patch(item_url(&base_url, &resource, id.as_deref())), query.as_deref())?
                .json(&parse_json(&data)?);
            print(send(req).await?, false)
        }

        Commands::Update { resource, id, data } => {
            let url = format!("{}/{}/{}", base_url, resource, id);
            let req = client.put(&url).json(&parse_json(&data)?);
            print(send(req).await?, false)
        }

        Commands::Remove {
            resource,
            id,
            query,
        } => {
            let req = with_query(client.delete(item_url(&base_url, &resource, id.as_deref())), query.as_deref())?;
            print(send(req).await?, false)
        }
    }
}

fn item_url(base_url: &str, resource: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{}/{}/{}", base_url, resource, id),
        None => format!("{}/{}", base_url, resource),
    }
}

fn parse_json(raw: &str) -> CliResult<Value> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON {:?}: {}", raw, e).into())
}

/// The hub reads the whole query object from the `q` parameter.
fn with_query(req: reqwest::RequestBuilder, query: Option<&str>) -> CliResult<reqwest::RequestBuilder> {
    match query {
        Some(raw) => {
            let value = parse_json(raw)?;
            if !value.is_object() {
                return Err("--query must be a JSON object".into());
            }
            Ok(req.query(&[("q", value.to_string())]))
        }
        None => Ok(req),
    }
}

async fn send(req: reqwest::RequestBuilder) -> CliResult<Value> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.json::<Value>().await?;
    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(format!("{}: {}", status, message).into());
    }
    Ok(body)
}

fn print(body: Value, table: bool) -> CliResult<()> {
    if table {
        if let Some(rendered) = render_table(&body) {
            println!("{}", rendered);
            return Ok(());
        }
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Renders a row, an array of rows, or a page envelope. Columns follow the
/// first row's key order; `None` when there is nothing tabular to show.
fn render_table(body: &Value) -> Option<String> {
    let rows: Vec<&serde_json::Map<String, Value>> = match body {
        Value::Object(map) if map.contains_key("data") && map.contains_key("total") => {
            map.get("data")?.as_array()?.iter().filter_map(Value::as_object).collect()
        }
        Value::Object(map) => vec![map],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => return None,
    };
    let header: Vec<String> = rows.first()?.keys().cloned().collect();

    let mut builder = Builder::default();
    builder.push_record(header.clone());
    for row in &rows {
        builder.push_record(header.iter().map(|column| match row.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }));
    }

    let mut table = builder.build();
    table.with(Style::modern());

    let mut rendered = table.to_string();
    if let Value::Object(map) = body {
        if let Some(total) = map.get("total").and_then(Value::as_u64) {
            let skip = map.get("skip").and_then(Value::as_u64).unwrap_or(0);
            rendered.push_str(&format!("\n{} of {} (skip {})", rows.len(), total, skip));
        }
    }
    Some(rendered)
}

//! Lightweight CLI client for ecg-server, over a TCP line-delimited
//! JSON-RPC connection.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "ecg")]
#[command(about = "ECG digitization and interpretation CLI")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8420")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Digitize one image and run the interpretation engine over it.
    Digitize {
        /// Path to a staged raw-RGBA payload (see ecg-server::server for
        /// the header format).
        path: String,
        /// Patient age in days, used for age-banded clinical thresholds.
        #[arg(long, default_value = "10950")]
        age_days: i64,
    },
    Status,
    Cache {
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Serialize)]
struct Request {
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_days: Option<i64>,
}

#[derive(Deserialize)]
struct Response {
    success: bool,
    message: Option<String>,
    data: Option<serde_json::Value>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let server = cli.server.clone();
    let request = match cli.command {
        Commands::Digitize { path, age_days } => Request {
            method: "digitize".into(),
            path: Some(path),
            age_days: Some(age_days),
        },
        Commands::Status => Request { method: "status".into(), path: None, age_days: None },
        Commands::Cache { clear } => Request {
            method: if clear { "cache_clear" } else { "cache_stats" }.into(),
            path: None,
            age_days: None,
        },
    };

    let mut stream = TcpStream::connect(&server).map_err(|e| format!("cannot connect to server at {}: {}", server, e))?;

    let request_json = serde_json::to_string(&request)?;
    writeln!(stream, "{}", request_json)?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: Response = serde_json::from_str(&response_line)?;

    if response.success {
        if let Some(msg) = response.message {
            println!("✓ {}", msg);
        }
        if let Some(data) = response.data {
            print_data(&data, &request.method);
        }
    } else {
        if let Some(msg) = response.message {
            eprintln!("✗ {}", msg);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_data(data: &serde_json::Value, method: &str) {
    match method {
        "digitize" => {
            let leads = data.get("signal_lead_count").and_then(|v| v.as_u64()).unwrap_or(0);
            let tier = data.get("tier_used").and_then(|v| v.as_u64()).unwrap_or(0);
            let score = data.get("validation_score").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let rhythm = data.get("rhythm_label").and_then(|v| v.as_str()).unwrap_or("?");
            println!("  Leads digitized: {}", leads);
            println!("  Tier used:       {}", tier);
            println!("  Validation score:{:.2}", score);
            println!("  Rhythm:          {}", rhythm);
            if let Some(interpretation) = data.get("interpretation") {
                if let Some(one_liner) = interpretation.get("summary").and_then(|s| s.get("one_liner")).and_then(|v| v.as_str()) {
                    println!("  Summary:         {}", one_liner);
                }
            }
        }
        "cache_stats" => {
            let entries = data.get("entries").and_then(|v| v.as_u64()).unwrap_or(0);
            let size_mb = data.get("size_mb").and_then(|v| v.as_f64()).unwrap_or(0.0);
            println!("  Entries: {}", entries);
            println!("  Size: {:.2} MB", size_mb);
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        }
    }
}

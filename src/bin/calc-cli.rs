use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "calc-cli")]
#[command(about = "Command-line client for a calc-mesh edge service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add two numbers
    Sum { a: f64, b: f64 },
    /// Subtract B from A
    Subtract { a: f64, b: f64 },
    /// List recorded operations
    History,
    /// Show queue depth and circuit state per target
    Queues,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Sum { a, b } => {
            client
                .post(format!("{base}/sum"))
                .json(&json!({ "operandA": a, "operandB": b }))
                .send()
                .await?
        }
        Commands::Subtract { a, b } => {
            client
                .post(format!("{base}/subtract"))
                .json(&json!({ "operandA": a, "operandB": b }))
                .send()
                .await?
        }
        Commands::History => client.get(format!("{base}/history")).send().await?,
        Commands::Queues => client.get(format!("{base}/admin/queues")).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let degraded = res
        .headers()
        .get("x-degraded")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: edge returned status {}", status);
    }
    if let Some(reason) = degraded {
        eprintln!("Degraded answer ({reason})");
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}

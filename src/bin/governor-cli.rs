use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "governor-cli")]
#[command(about = "Management CLI for the request governor", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Admin bearer token
    #[arg(short, long)]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether the governor is governing, disabled or emergency-stopped
    Status,
    /// Show call volume, cache and circuit statistics
    Stats,
    /// Re-enable governance (also clears an emergency stop)
    Enable,
    /// Disable governance; calls pass straight through
    Disable,
    /// Drop every cached response
    ClearCache,
    /// Close every circuit
    ResetCircuits,
    /// Re-read the config file and apply its governor policy
    Reload,
}

impl Commands {
    fn endpoint(&self) -> (Method, &'static str) {
        match self {
            Commands::Status => (Method::GET, "/admin/status"),
            Commands::Stats => (Method::GET, "/admin/stats"),
            Commands::Enable => (Method::POST, "/admin/enable"),
            Commands::Disable => (Method::POST, "/admin/disable"),
            Commands::ClearCache => (Method::DELETE, "/admin/cache"),
            Commands::ResetCircuits => (Method::POST, "/admin/circuits/reset"),
            Commands::Reload => (Method::POST, "/admin/reload"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path) = cli.command.endpoint();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

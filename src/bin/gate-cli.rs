use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, ORIGIN, USER_AGENT};
use serde_json::Value;

use request_gate::auth::{sign_stripe_payload, unix_now};
use request_gate::config::load_config;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator CLI for the request gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate liveness
    Health,
    /// Validate a configuration file and print its route table
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Send a request through the gate and print the verdict
    Send {
        path: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(short, long)]
        token: Option<String>,
        #[arg(short, long)]
        origin: Option<String>,
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Print a Stripe-Signature header for a payload
    SignStripe {
        #[arg(short, long)]
        secret: String,
        body: String,
        #[arg(short, long)]
        timestamp: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Check { config } => {
            let config = load_config(&config)?;
            println!("deployment: {:?}", config.deployment);
            for route in &config.routes {
                let methods = if route.methods.is_empty() {
                    "*".to_string()
                } else {
                    route.methods.join(",")
                };
                println!("{:<32} {:<20} {}", route.path, format!("{:?}", route.mode), methods);
            }
        }
        Commands::Send { path, method, token, origin, body } => {
            let mut headers = HeaderMap::new();
            headers.insert(USER_AGENT, HeaderValue::from_static("gate-cli/0.1 (operator)"));
            if let Some(token) = token {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            }
            if let Some(origin) = origin {
                headers.insert(ORIGIN, HeaderValue::from_str(&origin)?);
            }
            let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut req = client.request(method, format!("{}{}", cli.url, path)).headers(headers);
            if let Some(body) = body {
                req = req.header("content-type", "application/json").body(body);
            }
            print_response(req.send().await?).await?;
        }
        Commands::SignStripe { secret, body, timestamp } => {
            let ts = timestamp.unwrap_or_else(unix_now);
            println!("{}", sign_stripe_payload(secret.as_bytes(), ts, body.as_bytes()));
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("status: {status}");
    if let Some(retry_after) = res.headers().get("retry-after") {
        println!("retry-after: {}", retry_after.to_str().unwrap_or("?"));
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{text}"),
        Err(_) => {}
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Inspect a running yggdrasil-gateway", long_about = None)]
struct Cli {
    /// Base URL printed by the gateway at startup.
    #[arg(short, long, default_value = "http://127.0.0.1:25585")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show request and connection counters
    Metrics,
    /// Resolve player names to UUIDs through the merged namespace
    Uuids {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Fetch a profile by UUID (dashless)
    Profile {
        uuid: String,
        /// Ask for signed properties
        #[arg(long)]
        signed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Metrics => {
            client
                .get(format!("{base}/http/yggdrasil-gateway/debug/metrics"))
                .send()
                .await?
        }
        Commands::Uuids { names } => {
            client
                .post(format!("{base}/https/api.mojang.com/profiles/minecraft"))
                .json(&names)
                .send()
                .await?
        }
        Commands::Profile { uuid, signed } => {
            let mut url = format!("{base}/https/sessionserver.mojang.com/session/minecraft/profile/{uuid}");
            if signed {
                url.push_str("?unsigned=false");
            }
            client.get(url).send().await?
        }
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        eprintln!("Not found");
        return Ok(());
    }
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

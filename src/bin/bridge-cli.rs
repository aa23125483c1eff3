use clap::{Parser, Subcommand};
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use rest_bridge::gate::SignedQuery;

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Sign and send events to a REST bridge endpoint", long_about = None)]
struct Cli {
    /// Signing key identifier.
    #[arg(short, long, env = "BRIDGE_KEY")]
    key: Option<String>,

    /// Shared signing secret.
    #[arg(short, long, env = "BRIDGE_SECRET")]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the signed query string for a JSON body
    Sign {
        /// JSON event body
        body: String,
    },
    /// Sign (when a secret is given) and POST a JSON body
    Send {
        /// Endpoint URL, e.g. http://localhost:8080/publish
        url: String,
        /// JSON event body
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Sign { body } => {
            let signed = sign(&cli, body)?.ok_or("sign requires --key and --secret")?;
            println!("{}", signed.to_query_string());
        }
        Commands::Send { url, body } => {
            let target = match sign(&cli, body)? {
                Some(signed) => format!("{}?{}", url, signed.to_query_string()),
                None => url.clone(),
            };
            let res = reqwest::Client::new()
                .post(target)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn sign(cli: &Cli, body: &str) -> Result<Option<SignedQuery>, Box<dyn std::error::Error>> {
    serde_json::from_str::<Value>(body)?;
    let (Some(key), Some(secret)) = (&cli.key, &cli.secret) else {
        return Ok(None);
    };
    let mut rng = rand::thread_rng();
    let seq = rng.gen_range(0..u64::from(u32::MAX));
    let nonce = rng.gen_range(0..1u64 << 53);
    Ok(Some(SignedQuery::new(
        key,
        secret.as_bytes(),
        seq,
        nonce,
        body.as_bytes(),
        chrono::Utc::now(),
    )))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: bridge returned status {}", status);
        eprint!("{}", text);
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

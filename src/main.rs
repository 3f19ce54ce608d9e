//! `lfs-client`: inspect the resolved LFS client configuration and issue
//! authenticated JSON requests.

use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use reqwest::Method;
use url::Url;

use lfs_client::env::load_git_env;
use lfs_client::observability::logging::init_logging;
use lfs_client::{sanitize_url, Client, Env, MapEnv};

#[derive(Parser)]
#[command(name = "lfs-client")]
#[command(about = "Git LFS API client diagnostics", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration resolved from the environment and git config
    Env,
    /// GET a URL and print its JSON body
    Get {
        url: Url,

        /// Transfer bucket the response is accounted under
        #[arg(short, long, default_value = "download")]
        bucket: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let os_env: Arc<dyn Env> = Arc::new(MapEnv::from_process());
    let git_env: Arc<dyn Env> = Arc::new(load_git_env());
    let client = Client::new(Some(os_env), Some(git_env))?;

    match cli.command {
        Commands::Env => {
            println!("{}", serde_json::to_string_pretty(client.config())?);
        }
        Commands::Get { url, bucket } => {
            let display_url = sanitize_url(&url);
            let started = Instant::now();
            let res = client
                .execute(reqwest::Request::new(Method::GET, url))
                .await?;

            let id = client.track_response(&bucket, &res, started, None);
            tracing::info!(
                url = %display_url,
                status = res.status().as_u16(),
                in_flight = client.transfers().bucket_len(&bucket),
                "Response received"
            );

            let decoded = res.json::<serde_json::Value>().await;
            client.release_transfer(id);

            match decoded {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(e) if e.is_decode_type() => {
                    eprintln!("{}: server did not return JSON ({})", display_url, e);
                    std::process::exit(2);
                }
                Err(e) => {
                    eprintln!("{}: corrupt JSON response ({})", display_url, e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

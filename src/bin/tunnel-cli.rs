use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use vless_tunnel::config::ShareConfig;
use vless_tunnel::http::share_link;
use vless_tunnel::protocol::{encode_header, AuthToken};

#[derive(Parser)]
#[command(name = "tunnel-cli")]
#[command(about = "Client utilities for the VLESS tunnel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh user id
    Uuid,
    /// Render a client share link
    Link {
        #[arg(short, long)]
        uuid: String,
        #[arg(long)]
        host: String,
        #[arg(short, long, default_value_t = 443)]
        port: u16,
        #[arg(long, default_value = "/?ed=2048")]
        path: String,
    },
    /// Fetch the service document
    Status {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Open a tunnel, send one payload and print the first reply
    Probe {
        #[arg(short, long, default_value = "ws://localhost:8080/")]
        url: String,
        #[arg(long)]
        uuid: String,
        /// Destination as host:port
        #[arg(short, long)]
        target: String,
        #[arg(short, long, default_value = "")]
        payload: String,
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Uuid => {
            println!("{}", AuthToken::generate());
        }
        Commands::Link {
            uuid,
            host,
            port,
            path,
        } => {
            AuthToken::parse(&uuid)?;
            println!("{}", share_link(&uuid, &host, &ShareConfig { port, path }));
        }
        Commands::Status { url } => {
            let res = reqwest::Client::new().get(&url).send().await?;
            print_response(res).await?;
        }
        Commands::Probe {
            url,
            uuid,
            target,
            payload,
            timeout_secs,
        } => {
            let token = AuthToken::parse(&uuid)?;
            let (host, port) = split_target(&target)?;
            let mut frame = encode_header(0, &token, host, port)?;
            frame.extend_from_slice(payload.as_bytes());

            let (mut ws, _) = connect_async(url.as_str()).await?;
            ws.send(Message::Binary(frame.into())).await?;

            let reply = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
                while let Some(message) = ws.next().await {
                    match message? {
                        Message::Binary(data) => return Ok(Some(data)),
                        Message::Close(_) => return Ok(None),
                        _ => continue,
                    }
                }
                Ok::<_, tokio_tungstenite::tungstenite::Error>(None)
            })
            .await??;

            match reply {
                Some(data) if data.len() >= 2 => {
                    println!("{}", String::from_utf8_lossy(&data[2..]));
                }
                Some(_) => eprintln!("Error: reply shorter than the response header"),
                None => eprintln!("Error: tunnel closed without a reply"),
            }
            let _ = ws.close(None).await;
        }
    }

    Ok(())
}

fn split_target(target: &str) -> Result<(&str, u16), Box<dyn std::error::Error>> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("target must be host:port, got {target:?}"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host, port.parse()?))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        return Ok(());
    }

    let json: serde_json::Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

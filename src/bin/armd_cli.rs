//! armd CLI - one-shot socket peer
//!
//! Waits for the daemon (or dials one started with `--listen`), sends a single
//! command and prints the state reply.

use armd::protocol::{EXIT_MESSAGE, GRIPPER_CLOSE_MESSAGE, GRIPPER_OPEN_MESSAGE};
use armd::dispatcher::MAX_MESSAGE_BYTES;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

#[derive(Parser)]
#[command(name = "armd_cli")]
#[command(about = "Send one command to the arm daemon and print the reply")]
#[command(version)]
struct Args {
    /// Address to listen on, or to dial with --connect
    #[arg(long, default_value = "127.0.0.1:65432")]
    address: String,

    /// Dial the daemon instead of waiting for it
    #[arg(long)]
    connect: bool,

    /// Seconds to wait for the reply
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Print the reply as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Move the tool tip: position [m] and rotation vector [rad]
    #[command(allow_negative_numbers = true)]
    Move {
        x: f64,
        y: f64,
        z: f64,
        rx: f64,
        ry: f64,
        rz: f64,
    },
    /// Open the gripper
    Open,
    /// Close the gripper
    Close,
    /// Send a raw message
    Raw { message: String },
}

impl CliCommand {
    fn message(&self) -> String {
        match self {
            CliCommand::Move { x, y, z, rx, ry, rz } => {
                format!(">move<>{}<>{}<>{}<>{}<>{}<>{}<", x, y, z, rx, ry, rz)
            }
            CliCommand::Open => GRIPPER_OPEN_MESSAGE.to_string(),
            CliCommand::Close => GRIPPER_CLOSE_MESSAGE.to_string(),
            CliCommand::Raw { message } => message.clone(),
        }
    }
}

/// Reply fields in order of appearance
fn reply_fields(reply: &str) -> Result<Vec<(String, String)>> {
    let pattern = Regex::new(r"\[([^=\]]+)=([^\]]*)\]")?;
    Ok(pattern
        .captures_iter(reply)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect())
}

async fn open_stream(args: &Args) -> Result<TcpStream> {
    if args.connect {
        return TcpStream::connect(&args.address)
            .await
            .with_context(|| format!("Failed to connect to {}", args.address));
    }

    let listener = TcpListener::bind(&args.address)
        .await
        .with_context(|| format!("Failed to bind {}", args.address))?;
    info!("Waiting for the daemon on {}", args.address);
    let (stream, peer) = listener.accept().await.context("Failed to accept daemon")?;
    info!("Daemon connected from {}", peer);
    Ok(stream)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("armd_cli=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut stream = open_stream(&args).await?;

    let message = args.command.message();
    info!("Sending {}", message);
    stream.write_all(message.as_bytes()).await?;

    let mut buffer = [0u8; MAX_MESSAGE_BYTES];
    let n = tokio::time::timeout(Duration::from_secs(args.timeout), stream.read(&mut buffer))
        .await
        .context("Timed out waiting for the reply")??;
    if n == 0 {
        anyhow::bail!("Daemon closed the connection without replying");
    }
    let reply = String::from_utf8_lossy(&buffer[..n]).to_string();

    if args.json {
        let fields: serde_json::Map<String, serde_json::Value> = reply_fields(&reply)?
            .into_iter()
            .map(|(name, value)| {
                let value = value
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::String(value));
                (name, value)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        for (name, value) in reply_fields(&reply)? {
            println!("{:>16} = {}", name, value);
        }
    }

    stream.write_all(EXIT_MESSAGE.as_bytes()).await?;
    Ok(())
}

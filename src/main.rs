mod cli;
mod config;
mod exchange;
mod protocol;
mod report;
mod session;
mod utils;

#[cfg(test)]
mod test_helpers;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::ClientConfig;
use protocol::{PacketStream, TransportError};
use report::ConsoleReporter;
use session::{Session, SessionEnd};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cix=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    if let Some(path) = &cli.generate_config {
        config.save(path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    info!("starting");
    let address = config.address();
    info!("connecting to {}", address);
    let stream = connect(&address, &config).await?;
    match stream.peer_addr() {
        Ok(peer) => info!("connected to {}", peer),
        Err(_) => info!("connected to {}", address),
    }

    let packets = PacketStream::new(stream, config.max_payload_bytes, config.io_timeout());
    let input = BufReader::new(tokio::io::stdin());

    let status = match Session::new(packets, input, ConsoleReporter, ".").run().await {
        SessionEnd::Exit => {
            info!("exit requested");
            ExitCode::SUCCESS
        }
        SessionEnd::EndOfInput => ExitCode::SUCCESS,
        SessionEnd::Fatal(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    };

    info!("finishing");
    Ok(status)
}

async fn connect(address: &str, config: &ClientConfig) -> anyhow::Result<TcpStream> {
    let attempt = TcpStream::connect(address);
    let stream = match config.io_timeout() {
        None => attempt.await,
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| TransportError::TimedOut(limit))?,
    };
    stream.with_context(|| format!("connecting to {}", address))
}

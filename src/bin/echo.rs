//! quietwire Echo Binary
//!
//! Runs a blocking echo server, or the in-process self-test.

use std::time::Duration;

use clap::Parser;
use quietwire::{echo_handler, self_test, Config, RunMode, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// quietwire echo server
#[derive(Parser, Debug)]
#[command(name = "quietwire-echo")]
#[command(about = "Pause-delimited TCP echo server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5551")]
    port: u16,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    address: String,

    /// Read/connect timeout in seconds
    #[arg(short, long, default_value = "60")]
    timeout: u64,

    /// Log internal failures with full detail
    #[arg(short, long)]
    debug: bool,

    /// Run the loopback self-test and exit
    #[arg(long)]
    self_test: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,quietwire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    if args.self_test {
        match self_test() {
            Ok(reply) => {
                tracing::info!("self-test passed");
                println!("{}", String::from_utf8_lossy(&reply));
            }
            Err(e) => {
                tracing::error!("self-test failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    tracing::info!("quietwire v{}", quietwire::VERSION);
    tracing::info!("Listen address: {}:{}", args.address, args.port);

    let config = Config::builder()
        .bind_addr(&args.address)
        .timeout(Duration::from_secs(args.timeout))
        .debug(args.debug)
        .build();

    let server = Server::new(&config);
    if let Err(e) = server.start(echo_handler, args.port, RunMode::Blocking) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use args::{Args, Command};
use clap::Parser;
use config::Config;
use server::ServeConfig;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::GenerateKey) = args.command {
        return generate_key();
    }

    let config = args.config()?;

    logger::init(&args);

    if let Err(e) = server::serve(serve_config(&args, config)).await {
        log::error!("Server failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}

/// Print a fresh API key and its digest. The plaintext goes into the
/// [server.auth] api_keys list; the digest is what to keep in records.
fn generate_key() -> anyhow::Result<()> {
    let key = gate::generate_api_key();

    println!("API key: {key}");
    println!("SHA-256: {}", gate::hash_api_key(&key));

    Ok(())
}

fn serve_config(args: &Args, config: Config) -> ServeConfig {
    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8815)));

    ServeConfig {
        listen_address,
        config,
        dispatch: None,
    }
}

// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use memfabric_coord::http::serve;
use memfabric_coord::store::Store;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

struct Args {
    host: String,
    port: u16,
}

/// Parses `--host <addr>` and `--port <n>`, both optional. There's no
/// subcommand structure and no config file to load, so a tiny hand-rolled
/// parser is simpler than bringing in an argument-parsing crate for two
/// flags.
fn parse_args() -> Args {
    let mut host = DEFAULT_HOST.to_string();
    let mut port = DEFAULT_PORT;

    let mut argv = std::env::args().skip(1);
    while let Some(flag) = argv.next() {
        match flag.as_str() {
            "--host" => {
                host = argv.next().unwrap_or_else(|| {
                    eprintln!("--host requires a value");
                    std::process::exit(2);
                });
            }
            "--port" => {
                let raw = argv.next().unwrap_or_else(|| {
                    eprintln!("--port requires a value");
                    std::process::exit(2);
                });
                port = raw.parse().unwrap_or_else(|_| {
                    eprintln!("--port must be a u16, got {raw}");
                    std::process::exit(2);
                });
            }
            other => {
                eprintln!("unrecognized argument: {other}");
                std::process::exit(2);
            }
        }
    }

    Args { host, port }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args();
    let ip: IpAddr = args.host.parse().unwrap_or_else(|_| {
        eprintln!("invalid --host value: {}", args.host);
        std::process::exit(2);
    });
    let addr = SocketAddr::new(ip, args.port);

    let store = Arc::new(Store::new());
    if let Err(err) = serve(addr, store).await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use fleetdash::command::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _ = rustls::crypto::ring::default_provider().install_default();
    init_tracing(cli.log_json);

    if let Err(e) = command::run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
    } else {
        fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

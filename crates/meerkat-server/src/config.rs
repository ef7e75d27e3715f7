//! Command line and configuration loading for the server binary.

use anyhow::Context;
use clap::Parser;
use meerkat_core::MeerkatConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meerkat-server", version, about = "Meerkat automation gateway")]
pub struct Cli {
    /// Path to the YAML configuration file. Defaults apply when it is absent.
    #[arg(long, short, env = "MEERKAT_CONFIG", default_value = "meerkat.yaml")]
    pub config: PathBuf,

    /// Override `server.listen_port`.
    #[arg(long, short, env = "MEERKAT_PORT")]
    pub port: Option<u16>,
}

pub fn load(cli: &Cli) -> anyhow::Result<MeerkatConfig> {
    let mut config = MeerkatConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if let Some(port) = cli.port {
        config.server.listen_port = port;
    }
    Ok(config)
}

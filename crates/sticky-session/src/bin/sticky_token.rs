/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use ring::rand::{SecureRandom, SystemRandom};
use sticky_session::config::{self, SessionAffinityConfig, ENV_COOKIE_NAME, ENV_COOKIE_SECRET};
use sticky_session::{AffinityConfig, BackendAddress, StickySession};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sticky-token",
    version,
    about = "Inspect and produce session affinity cookies"
)]
struct Cli {
    /// TOML file with a [session_affinity] section
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cookie secret
    #[arg(long, global = true, env = ENV_COOKIE_SECRET, hide_env_values = true)]
    secret: Option<String>,

    /// Cookie name
    #[arg(long, global = true, env = ENV_COOKIE_NAME)]
    cookie_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the affinity token for a backend URL
    Encode {
        address: String,
        /// Print the full Set-Cookie header instead of the bare token
        #[arg(long)]
        set_cookie: bool,
    },
    /// Check whether a token belongs to a backend URL
    Verify { address: String, token: String },
    /// Generate a random cookie secret
    Secret {
        /// Number of random bytes
        #[arg(long, default_value_t = 32)]
        bytes: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    match &args.command {
        Commands::Encode {
            address,
            set_cookie,
        } => {
            let session = StickySession::new(affinity_config(&args).await?)?;
            let address = BackendAddress::parse(address)?;
            let cookie = session.stick_to(&address);
            if *set_cookie {
                println!("Set-Cookie: {}", cookie.to_header_string());
            } else {
                println!("{}", cookie.value());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { address, token } => {
            let session = StickySession::new(affinity_config(&args).await?)?;
            let address = BackendAddress::parse(address)?;
            if session.codec().verify(&address, token.trim()) {
                println!("valid");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Secret { bytes } => {
            if *bytes == 0 {
                bail!("--bytes must be greater than zero");
            }
            let mut secret = vec![0u8; *bytes];
            SystemRandom::new()
                .fill(&mut secret)
                .map_err(|_| anyhow!("system random generator unavailable"))?;
            println!("{}", hex::encode(secret));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Command line values win over the configuration file
async fn affinity_config(args: &Cli) -> anyhow::Result<AffinityConfig> {
    let mut section = match &args.config {
        Some(path) => config::load_from_file(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionAffinityConfig {
            enabled: true,
            ..Default::default()
        },
    };

    if let Some(secret) = &args.secret {
        section.secret = secret.clone();
    }
    if let Some(cookie_name) = &args.cookie_name {
        section.cookie_name = cookie_name.clone();
    }
    debug!(?section, "Resolved affinity configuration");

    section
        .into_affinity()?
        .ok_or_else(|| anyhow!("session affinity is disabled in the configuration"))
}

//! PromptVault CLI: seal and open prompt records outside the browser.
//!
//! Uses the same envelope encryption as the web app, with a local secp256k1
//! key standing in for the wallet.
//!
//! # Usage
//!
//! ```bash
//! promptvault --config vault.toml address
//! promptvault --config vault.toml seal drafts.json records.json
//! promptvault --config vault.toml open records.json
//! promptvault --config vault.toml --validate
//! ```

mod config;
mod vault;

use anyhow::{Context, Result};
use std::path::PathBuf;

enum Command {
    Address,
    Seal { input: PathBuf, output: PathBuf },
    Open { input: PathBuf },
}

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut validate_only = false;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("promptvault {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if other.starts_with('-') => {
                anyhow::bail!("Unknown argument: {}", other);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    // Load config (a file is optional: env vars alone are enough)
    let mut vault_config = match &config_path {
        Some(path) => config::VaultConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::VaultConfig::default(),
    };
    vault_config.apply_env_overrides();
    vault_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    env_logger::Builder::new()
        .parse_filters(&vault_config.vault.log_level)
        .init();

    if validate_only {
        println!("✅ Configuration is valid.");
        println!("  KDF iterations: {}", vault_config.vault.kdf_iterations);
        println!(
            "  Password:       {}",
            if vault_config.identity.password.is_some() { "set" } else { "none" }
        );
        return Ok(());
    }

    let command = parse_command(&positional)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(run(command, &vault_config))
}

fn parse_command(positional: &[String]) -> Result<Command> {
    match positional {
        [cmd] if cmd == "address" => Ok(Command::Address),
        [cmd, input, output] if cmd == "seal" => Ok(Command::Seal {
            input: PathBuf::from(input),
            output: PathBuf::from(output),
        }),
        [cmd, input] if cmd == "open" => Ok(Command::Open {
            input: PathBuf::from(input),
        }),
        [] => anyhow::bail!("No command given (try --help)"),
        _ => anyhow::bail!("Unrecognised command: {}", positional.join(" ")),
    }
}

async fn run(command: Command, config: &config::VaultConfig) -> Result<()> {
    let session = vault::open_session(config)?;

    let outcome = execute(command, &session).await;
    session.close();
    outcome
}

async fn execute(command: Command, session: &promptvault_core::VaultSession) -> Result<()> {
    match command {
        Command::Address => {
            let address = session.identity().address().await?;
            println!("{}", address);
        }
        Command::Seal { input, output } => {
            vault::seal_file(session, &input, &output).await?;
        }
        Command::Open { input } => {
            let bulk = vault::open_file(session, &input).await?;
            println!("{}", serde_json::to_string_pretty(&bulk.opened)?);
            for (id, err) in &bulk.skipped {
                eprintln!("skipped {}: {}", id, err);
            }
            anyhow::ensure!(
                bulk.skipped.is_empty(),
                "{} record(s) could not be opened",
                bulk.skipped.len()
            );
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "promptvault {}

Seal and open PromptVault prompt records.

USAGE:
    promptvault [OPTIONS] <COMMAND>

COMMANDS:
    address                     Print the identity address
    seal <drafts> <records>     Encrypt non-public drafts into records
    open <records>              Decrypt records and print them as JSON

OPTIONS:
    -c, --config <PATH>   Config file (TOML)
    --validate            Validate config and exit
    -h, --help            Print help
    -V, --version         Print version

ENVIRONMENT:
    PROMPTVAULT_SIGNING_KEY      Secret key hex (overrides config)
    PROMPTVAULT_PASSWORD         Extra derivation secret
    PROMPTVAULT_KDF_ITERATIONS   PBKDF2 iterations (>= 100000)
    PROMPTVAULT_LOG_LEVEL        Log level (default: info)

There is no key recovery: losing the signing key or password loses every
private record.",
        env!("CARGO_PKG_VERSION")
    );
}

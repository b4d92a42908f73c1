use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use vaultboot::client::VaultClient;
use vaultboot::config::Settings;
use vaultboot::orchestrator::Orchestrator;

const DEFAULT_VAULT_URL: &str = "http://localhost:8200";
const DEFAULT_CONFIG_FILE: &str = "services.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend API URL
    #[arg(long, env = "VAULT_ADDR", default_value = DEFAULT_VAULT_URL, global = true)]
    vault_url: String,

    /// Path to the infrastructure config file (YAML or JSON)
    #[arg(long, env = "VAULTBOOT_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Initialize, unseal and provision the backend from the config file
    Bootstrap(BootstrapArgs),
    /// Read a secret (operator inspection)
    Read(ReadArgs),
    /// List secret keys under a prefix
    List(ListArgs),
    /// Create a userpass login bound to the read-only policy
    CreateUser(CreateUserArgs),
}

#[derive(Args, Debug)]
struct BootstrapArgs {
    /// Root token from a previous run (required if already initialized)
    #[arg(long, env = "VAULT_ROOT_TOKEN")]
    root_token: Option<String>,
}

#[derive(Args, Debug)]
struct ReadArgs {
    /// KV area (mount) name
    area: String,

    /// Secret path within the area, e.g. postgres/config
    path: String,

    /// Root token for the authenticated call
    #[arg(long, env = "VAULT_ROOT_TOKEN")]
    root_token: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// KV area (mount) name
    area: String,

    /// Path prefix to list under
    #[arg(default_value = "")]
    prefix: String,

    /// Root token for the authenticated call
    #[arg(long, env = "VAULT_ROOT_TOKEN")]
    root_token: String,
}

#[derive(Args, Debug)]
struct CreateUserArgs {
    username: String,

    #[arg(long, env = "VAULTBOOT_USER_PASSWORD")]
    password: String,

    /// Root token for the authenticated call
    #[arg(long, env = "VAULT_ROOT_TOKEN")]
    root_token: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run().await {
        eprintln!("vaultboot error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    let client = VaultClient::new(&cli.vault_url)?;
    let mut orchestrator = Orchestrator::new(client, settings);

    match cli.command {
        CliCommand::Bootstrap(args) => {
            orchestrator.bootstrap(args.root_token).await?;
            if let Some(bundle) = orchestrator.unseal_bundle() {
                // First run: this is the only copy of the unseal material.
                // Hand it to the operator on stdout, never through the logs.
                println!("store the following material securely; it is not persisted anywhere:");
                println!("root token: {}", bundle.root_token);
                for (index, key) in bundle.keys.iter().enumerate() {
                    println!("unseal key {}: {key}", index + 1);
                }
            }
            info!("bootstrap complete");
        }
        CliCommand::Read(args) => {
            orchestrator.authenticate(args.root_token);
            match orchestrator.read_secret(&args.area, &args.path).await? {
                Some(data) => {
                    let rendered = serde_json::to_string_pretty(&data)
                        .context("Failed to render secret data")?;
                    println!("{rendered}");
                }
                None => println!("no secret at {}/{}", args.area, args.path),
            }
        }
        CliCommand::List(args) => {
            orchestrator.authenticate(args.root_token);
            for key in orchestrator.list_secrets(&args.area, &args.prefix).await {
                println!("{key}");
            }
        }
        CliCommand::CreateUser(args) => {
            orchestrator.authenticate(args.root_token);
            orchestrator
                .create_userpass(&args.username, &args.password)
                .await?;
            info!(username = %args.username, "userpass login created");
        }
    }
    Ok(())
}

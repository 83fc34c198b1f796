//! `passport`: developer CLI over `passport-core`.
//!
//! Talks to the chain and artifact store directly, without the login handshake, so contracts
//! can be inspected and exercised from a terminal.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};
use passport_core::{
    auth::{OAuthClient, PkceChallenge},
    chain::{ChainClient, LocalSigner},
    contracts::values_to_json,
    scan::{route, ScanPayload},
    AbiRegistry, PassportConfig,
};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Developer CLI for the Passport SDK", long_about = None)]
struct Cli {
    /// Path to a JSON `PassportConfig`.
    #[arg(long, env = "PASSPORT_CONFIG")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the ABI of a contract type, e.g. `LoyaltyContract`.
    Abi { contract_type: String },
    /// Call a view function and print the decoded outputs as JSON.
    Call {
        contract_type: String,
        address: String,
        function: String,
        args: Vec<String>,
    },
    /// Sign a transaction with the configured key and broadcast it.
    Send {
        contract_type: String,
        address: String,
        function: String,
        args: Vec<String>,
    },
    /// Print an authorization URL with a fresh PKCE challenge.
    AuthorizeUrl,
    /// Classify a scanned NFC/QR string and print its backend route.
    Scan { raw: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> eyre::Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Abi { contract_type } => {
            let abis = AbiRegistry::new(&config.artifact_base_url, config.request_timeout());
            let abi = abis.fetch_abi(&contract_type).await?;
            println!("{}", abi.json());
        }
        Command::Call {
            contract_type,
            address,
            function,
            args,
        } => {
            let abis = AbiRegistry::new(&config.artifact_base_url, config.request_timeout());
            let chain = ChainClient::from_config(&config)?;
            let binding = chain.bind(&address, &*abis.fetch_abi(&contract_type).await?)?;
            let args = binding.coerce_args(&function, &args)?;
            let values = chain.call_view(&binding, &function, &args).await?;
            println!("{}", serde_json::to_string_pretty(&values_to_json(&values))?);
        }
        Command::Send {
            contract_type,
            address,
            function,
            args,
        } => {
            let key = config
                .signer_private_key
                .as_ref()
                .ok_or_else(|| eyre!("signer_private_key is not configured"))?;
            let signer = LocalSigner::from_secret(key)?;
            let abis = AbiRegistry::new(&config.artifact_base_url, config.request_timeout());
            let chain = ChainClient::from_config(&config)?;
            let binding = chain.bind(&address, &*abis.fetch_abi(&contract_type).await?)?;
            let args = binding.coerce_args(&function, &args)?;
            let hash = chain
                .submit_transaction(&binding, &function, &args, &signer)
                .await?;
            tracing::info!(chain_id = chain.chain_id(), "broadcast {function}");
            println!("{hash}");
        }
        Command::AuthorizeUrl => {
            let pkce = PkceChallenge::generate();
            let url = OAuthClient::from_config(&config).authorization_url(&pkce)?;
            println!("{url}");
            println!("state:    {}", pkce.state());
            println!("verifier: {}", pkce.verifier().expose_secret());
        }
        Command::Scan { raw } => {
            let payload = ScanPayload::parse(&raw)?;
            println!("{payload:?}");
            if matches!(payload, ScanPayload::Envelope { .. }) {
                let routed = route(&raw, config.chain_id)?;
                println!("POST {}{}", config.pass_code_base_url, routed.path);
                println!("{}", serde_json::to_string_pretty(&routed.body)?);
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<PassportConfig> {
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let config = PassportConfig::from_json(&json)?;
    tracing::debug!(chain_id = config.chain_id, "loaded config");
    Ok(config)
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use zkp_registration::{
    backend::{groth16::Groth16Verifier, Deadline},
    config::Config,
    ethereum::Address,
    proof::{ProofFormatter, RawProof, RegistrationCall},
    store::{FileStore, RegistryStore},
    utils::field_to_decimal,
    Registrar, RegistrationError,
};

/// Default maximum size for proof, signal and calldata files (1MB)
const MAX_INPUT_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate and record identity registrations", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "zkreg.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn raw prover output into registration calldata
    Format {
        #[arg(short, long)]
        proof: PathBuf,
        #[arg(short = 's', long)]
        public: PathBuf,
        #[arg(short, long, default_value = "registration_call.json")]
        output: PathBuf,
    },
    /// Verify a proof and record the registration
    Register {
        /// Account submitting the registration; must be the proven address
        #[arg(long)]
        sender: String,
        /// Raw prover output; requires --public
        #[arg(short, long, requires = "public", conflicts_with = "call")]
        proof: Option<PathBuf>,
        /// Public signals array written by the prover
        #[arg(short = 's', long)]
        public: Option<PathBuf>,
        /// Calldata produced by `format`
        #[arg(long)]
        call: Option<PathBuf>,
    },
    /// Show the registration state of an address
    Status {
        #[arg(short, long)]
        address: String,
    },
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load_from_file(path)?
    } else {
        debug!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn read_input(path: &Path, what: &str) -> Result<String> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read {what} file metadata: {}", path.display()))?;
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(anyhow::anyhow!(
            "{what} file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        ));
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {what} file: {}", path.display()))
}

fn build_call(config: &Config, proof: &Path, public: &Path) -> Result<RegistrationCall> {
    let raw: RawProof = serde_json::from_str(&read_input(proof, "proof")?)
        .context("Failed to parse proof JSON")?;
    let signals: Vec<String> = serde_json::from_str(&read_input(public, "public signals")?)
        .context("Failed to parse public signals JSON")?;

    let formatter = ProofFormatter::for_backend(config.proof.backend);
    debug!("Formatting {:?} proof", config.proof.backend);
    Ok(formatter.format(&raw, &signals)?)
}

fn explain(err: RegistrationError) -> anyhow::Error {
    error!("{err}");
    anyhow::anyhow!("Registration failed: {err} (next step: {:?})", err.recovery())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    match args.command {
        Command::Format {
            proof,
            public,
            output,
        } => {
            let call = build_call(&config, &proof, &public)?;
            let json =
                serde_json::to_string_pretty(&call).context("Failed to serialize calldata")?;
            fs::write(&output, json).context("Failed to write calldata file")?;
            println!("Calldata written to: {}", output.display());
        }
        Command::Register {
            sender,
            proof,
            public,
            call,
        } => {
            let sender: Address = sender.parse().context("Invalid sender address")?;
            let call = match (call, proof, public) {
                (Some(path), _, _) => serde_json::from_str(&read_input(&path, "calldata")?)
                    .context("Failed to parse calldata JSON")?,
                (None, Some(proof), Some(public)) => build_call(&config, &proof, &public)?,
                _ => {
                    return Err(anyhow::anyhow!(
                        "Provide either --call or both --proof and --public"
                    ))
                }
            };

            info!(
                "Loading verification key from: {}",
                config.verifier.verification_key.display()
            );
            let verifier = Groth16Verifier::load(&config.verifier.verification_key)
                .context("Failed to load verification key")?;
            let verifier = Deadline::new(verifier, config.verifier.timeout());
            let store = FileStore::open(&config.registry.path)
                .context("Failed to open registry")?;

            let mut registrar = Registrar::new(verifier, store, config.chain.id);
            let signals = registrar
                .register_from(&sender, &call)
                .map_err(explain)?;

            println!("Registration recorded");
            println!("  Address: {}", signals.address);
            println!("  Chain ID: {}", signals.chain_id);
            println!("  Commitment: {}", signals.commitment);
        }
        Command::Status { address } => {
            let address: Address = address.parse().context("Invalid address")?;
            let store =
                FileStore::open(&config.registry.path).context("Failed to open registry")?;
            match store.state().records.get(&address) {
                Some(public_key) => {
                    println!("{address} is registered");
                    println!("  Public key X: {}", field_to_decimal(&public_key.x));
                    println!("  Public key Y: {}", field_to_decimal(&public_key.y));
                }
                None => println!("{address} is not registered"),
            }
        }
    }

    Ok(())
}

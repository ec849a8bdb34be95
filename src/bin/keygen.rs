use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use rand::rngs::OsRng;
use std::fs;
use std::path::{Path, PathBuf};
use zkp_registration::{
    babyjubjub::ScalarField,
    config::Config,
    ethereum::Address,
    keys::{KeyFile, KeyPair, Scalar},
    registration::{prepare_registration, prepare_with_key, PreparedRegistration},
    utils::{field_to_decimal, parse_field},
};

/// Key files hold two short decimal strings; anything larger is not one.
const MAX_KEY_FILE_SIZE: u64 = 64 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Derive a registration key and prover input", long_about = None)]
struct Args {
    /// Account address being registered
    #[arg(short, long)]
    address: String,

    /// Chain id to bind; defaults to the configured chain
    #[arg(long)]
    chain_id: Option<u64>,

    /// Reuse the key in this file instead of deriving a new one
    #[arg(short, long)]
    key_file: Option<PathBuf>,

    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(short, long, default_value = "zkreg.toml")]
    config: PathBuf,
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

fn load_key(path: &Path) -> Result<KeyPair> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read key file metadata: {}", path.display()))?;
    if metadata.len() > MAX_KEY_FILE_SIZE {
        return Err(anyhow::anyhow!(
            "Key file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_KEY_FILE_SIZE
        ));
    }

    let content = fs::read_to_string(path).context("Failed to read key file")?;
    let stored: KeyFile = serde_json::from_str(&content).context("Failed to parse key file")?;

    let value: ScalarField =
        parse_field(&stored.private_key).context("Key file holds an invalid private key")?;
    let scalar = Scalar::new(value).context("Key file holds a zero private key")?;
    let key_pair = KeyPair::from_scalar(scalar);

    if key_pair.public_key() != &stored.public_key {
        return Err(anyhow::anyhow!(
            "Public key in {} does not match its private key",
            path.display()
        ));
    }
    Ok(key_pair)
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {name}"))?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    let chain_id = args.chain_id.unwrap_or(config.chain.id);
    let address: Address = args.address.parse().context("Invalid address")?;

    info!("Preparing registration for {address} on chain {chain_id}");

    let prepared: PreparedRegistration = match &args.key_file {
        Some(path) => {
            println!("Loading key from: {}", path.display());
            let key_pair = load_key(path)?;
            prepare_with_key(key_pair, chain_id, address)
                .context("Failed to bind commitment; derive a new key")?
        }
        None => {
            println!("Deriving a new key...");
            prepare_registration(&mut OsRng, chain_id, address)
                .context("Failed to derive a registration key")?
        }
    };

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            args.output_dir.display()
        )
    })?;

    if args.key_file.is_none() {
        let key_path = write_json(&args.output_dir, "key.json", &prepared.key_pair.to_key_file())?;
        println!("Key written to: {}", key_path.display());
    }
    let witness_path = write_json(&args.output_dir, "witness.json", &prepared.witness)?;
    let input_path = write_json(
        &args.output_dir,
        "input.json",
        &prepared.witness.to_circom_input(),
    )?;

    let public_key = prepared.key_pair.public_key();
    println!("Address: {}", prepared.address);
    println!("Chain ID: {}", prepared.chain_id);
    println!(
        "Public key: ({}, {})",
        field_to_decimal(&public_key.x),
        field_to_decimal(&public_key.y)
    );
    println!("Commitment: {}", prepared.commitment);
    println!("Witness written to: {}", witness_path.display());
    println!("Circuit input written to: {}", input_path.display());

    Ok(())
}

//! # selfcustody
//!
//! Offline helpers around the signing pipeline: credential hashes, the
//! public keys a subscription registers, and signing a `buildTx` response
//! without ever sending key material anywhere.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::value::RawValue;
use zeroize::Zeroizing;

use selfcustody_core::config::DEFAULT_MAX_VERIFICATION_VERSION;
use selfcustody_core::utils::logging;
use selfcustody_core::{auth_info, BuildTxResponse, BuiltTransaction, HdKeyStore, Signature, SigningCoordinator};

#[derive(Parser, Debug)]
#[command(
    name = "selfcustody",
    about = "Offline tools for the self-custody transaction pipeline",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit debug logs on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the hashed credentials sent with every request.
    AuthInfo(AuthInfoArgs),
    /// Print the public keys to register for a subscription.
    Pubkeys(PubkeysArgs),
    /// Sign the pre-images of a buildTx response.
    Sign(SignArgs),
}

#[derive(Parser, Debug)]
struct AuthInfoArgs {
    #[arg(long)]
    guid: String,

    #[arg(long)]
    shared_key: String,
}

#[derive(Parser, Debug)]
struct PubkeysArgs {
    /// Account-level extended private key (xprv/tprv).
    #[arg(long)]
    xprv: String,

    /// First descriptor.
    #[arg(long, default_value_t = 0)]
    from: u32,

    /// Number of descriptors.
    #[arg(long, default_value_t = 20)]
    count: u32,
}

#[derive(Parser, Debug)]
struct SignArgs {
    /// Account-level extended private key (xprv/tprv).
    #[arg(long)]
    xprv: String,

    /// File holding the `data` object of a buildTx response.
    #[arg(long, short = 'i')]
    input: PathBuf,

    #[arg(long)]
    currency: String,

    /// Highest verification version this signer accepts.
    #[arg(long, default_value_t = DEFAULT_MAX_VERIFICATION_VERSION)]
    max_verification_version: u32,
}

/// `pushTx` body without the auth block
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedOutput<'a> {
    currency: &'a str,
    raw_tx: &'a RawValue,
    signatures: &'a [Signature],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    match cli.command {
        Commands::AuthInfo(args) => {
            let auth = auth_info(&args.guid, &args.shared_key)?;
            println!("{}", serde_json::to_string_pretty(&auth)?);
        }
        Commands::Pubkeys(args) => {
            let xprv = Zeroizing::new(args.xprv);
            let store = HdKeyStore::from_xprv(&xprv)?;
            let end = args
                .from
                .checked_add(args.count)
                .context("descriptor range overflows")?;
            let infos = store.pub_key_infos(args.from..end)?;
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Commands::Sign(args) => sign(args)?,
    }
    Ok(())
}

fn sign(args: SignArgs) -> Result<()> {
    if args.currency.trim().is_empty() {
        bail!("--currency must not be empty");
    }
    let xprv = Zeroizing::new(args.xprv);
    let store = Arc::new(HdKeyStore::from_xprv(&xprv)?);

    let body = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let response: BuildTxResponse = serde_json::from_str(&body).context("input is not a buildTx response")?;
    let built = BuiltTransaction::from_response(args.currency, response, args.max_verification_version)?;

    let signed = SigningCoordinator::new(store).sign_all(built)?;
    let output = SignedOutput {
        currency: signed.currency(),
        raw_tx: signed.raw_tx(),
        signatures: signed.signatures(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

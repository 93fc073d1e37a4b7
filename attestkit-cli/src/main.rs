//! attestkit CLI - WebAuthn registration verification and FIDO MDS3 lookups.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use commands::MetadataArgs;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments)
  65  Registration rejected or malformed data
  66  Input file not found or unreadable
  69  Metadata service unavailable";

#[derive(Parser)]
#[command(name = "attestkit")]
#[command(
    author,
    version,
    about = "WebAuthn attestation verification and FIDO metadata tool",
    long_about = None
)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the MDS trust anchors for an authenticator model
    Lookup {
        /// AAGUID of the authenticator model
        #[arg(value_name = "AAGUID")]
        aaguid: String,

        #[command(flatten)]
        metadata: MetadataArgs,

        /// Print the matching entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look an AAGUID up in the FIDO conformance metadata
    Conformance {
        /// Relying party endpoint registered with the conformance tools
        #[arg(value_name = "ENDPOINT")]
        endpoint: String,

        /// AAGUID of the authenticator model
        #[arg(value_name = "AAGUID")]
        aaguid: String,

        #[command(flatten)]
        metadata: MetadataArgs,
    },

    /// Verify a registration (PublicKeyCredential JSON)
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the PublicKeyCredential JSON returned by navigator.credentials.create()
    #[arg(value_name = "CREDENTIAL_JSON")]
    pub credential: PathBuf,

    /// Allowed origin (repeatable)
    #[arg(long, required = true)]
    pub origin: Vec<String>,

    /// Relying party ID
    #[arg(long)]
    pub rp_id: String,

    /// Challenge issued for the ceremony (base64url)
    #[arg(long)]
    pub challenge: String,

    /// PEM file of trusted attestation roots (repeatable)
    #[arg(long, value_name = "PEM")]
    pub anchor: Vec<PathBuf>,

    /// Also trust the attestation roots published in the FIDO MDS BLOB
    #[arg(long)]
    pub mds: bool,

    /// Require the user verified (UV) flag
    #[arg(long)]
    pub require_user_verification: bool,

    /// Reject self attestation
    #[arg(long)]
    pub no_self_attestation: bool,

    /// Print the verified registration as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub metadata: MetadataArgs,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("attestkit=info,attestkit_core=info,warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let quiet = cli.quiet;

    let result: Result<()> = match cli.command {
        Commands::Lookup { aaguid, metadata, json } => {
            commands::lookup::execute(aaguid, metadata, json, quiet).await
        }
        Commands::Conformance {
            endpoint,
            aaguid,
            metadata,
        } => commands::conformance::execute(endpoint, aaguid, metadata, quiet).await,
        Commands::Verify(args) => commands::verify::execute(args, quiet).await,
    };

    if let Err(err) = result {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}

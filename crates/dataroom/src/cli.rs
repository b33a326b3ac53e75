//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dataroom_core::HttpMethod;

/// Dataroom - encrypted document storage
#[derive(Parser, Debug)]
#[command(name = "dataroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to dataroom.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file (encrypted unless --plain)
    Put(PutArgs),

    /// Download an object (decrypted unless --raw)
    Get(GetArgs),

    /// Delete an object
    Rm(KeyArgs),

    /// List object keys
    Ls(LsArgs),

    /// Show object size, type and metadata
    Info(InfoArgs),

    /// Copy an object
    Cp(CpArgs),

    /// Issue a time-limited URL for an object
    SignUrl(SignUrlArgs),

    /// Check a local signed URL
    VerifyUrl(VerifyUrlArgs),

    /// SHA-256 of a file
    Hash(HashArgs),

    /// Generate a raw encryption key
    Keygen(KeygenArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Object key
    pub key: String,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Object key
    pub key: String,

    /// File to upload, or `-` for stdin
    pub file: Utf8PathBuf,

    /// Content type recorded with the object
    #[arg(long)]
    pub content_type: Option<String>,

    /// Metadata entry (repeatable)
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Store without encrypting
    #[arg(long)]
    pub plain: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object key
    pub key: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,

    /// Write the stored bytes without decrypting
    #[arg(long)]
    pub raw: bool,

    /// Expected SHA-256 of the output
    #[arg(long)]
    pub expect_hash: Option<String>,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Key prefix
    pub prefix: Option<String>,

    /// Page size
    #[arg(long)]
    pub max_keys: Option<usize>,

    /// Continuation token from a previous page
    #[arg(long)]
    pub token: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Object key
    pub key: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source key
    pub source: String,

    /// Destination key
    pub dest: String,
}

#[derive(Args, Debug)]
pub struct SignUrlArgs {
    /// Object key
    pub key: String,

    /// Operation the URL authorizes
    #[arg(short, long, value_enum, default_value_t = MethodArg::Get)]
    pub method: MethodArg,

    /// Lifetime in seconds
    #[arg(short, long, default_value_t = dataroom_core::types::DEFAULT_SIGNED_URL_EXPIRY_SECS)]
    pub expires_in: u64,
}

#[derive(Args, Debug)]
pub struct VerifyUrlArgs {
    /// Signed URL issued by the local provider
    pub url: String,
}

#[derive(Args, Debug)]
pub struct HashArgs {
    /// File to hash, or `-` for stdin
    pub file: Utf8PathBuf,

    /// Fail unless the digest matches
    #[arg(long)]
    pub expect: Option<String>,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print as a STORAGE_ENCRYPTION_KEY assignment
    #[arg(long)]
    pub export: bool,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration
    Show(ConfigShowArgs),

    /// Validate the configuration
    Validate,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodArg {
    Get,
    Put,
    Delete,
    Head,
}

impl From<MethodArg> for HttpMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Get => HttpMethod::Get,
            MethodArg::Put => HttpMethod::Put,
            MethodArg::Delete => HttpMethod::Delete,
            MethodArg::Head => HttpMethod::Head,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

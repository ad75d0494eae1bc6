//! # CLI Interface
//!
//! Defines the command-line argument structure for `places-node` using
//! `clap` derive. Subcommands: `derive`, `show`, `jumps`, `serve`, and
//! `version`.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use places_protocol::config::{
    DEFAULT_API_BASE_URL, DEFAULT_API_PORT, DEFAULT_DEBOUNCE, DEFAULT_REFERENCE,
    DEFAULT_REQUEST_TIMEOUT,
};
use places_protocol::network::{HttpSourceConfig, Jump};
use places_protocol::Coordinate;

/// Bitcoin Places.
///
/// Turns a Bitcoin block hash into a point on the map, in the same
/// one-degree cell as a reference location you pick.
#[derive(Parser, Debug)]
#[command(
    name = "places-node",
    about = "Bitcoin Places: block hashes as coordinates",
    version,
    propagate_version = true
)]
pub struct PlacesNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "PLACES_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the coordinate for a block hash. No network access.
    Derive(DeriveArgs),
    /// Fetch a block by height (or named jump) and print its place.
    Show(ShowArgs),
    /// Print the quick-jump heights computed from the current tip.
    Jumps(SourceArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

/// Where blocks come from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Base URL of the Esplora-style block API.
    #[arg(long, env = "PLACES_API_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

impl SourceArgs {
    pub fn source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// The point whose one-degree cell derived coordinates land in.
#[derive(Args, Debug, Clone, Copy)]
pub struct ReferenceArgs {
    /// Reference latitude in degrees.
    #[arg(long, default_value_t = DEFAULT_REFERENCE.0, allow_hyphen_values = true)]
    pub lat: f64,

    /// Reference longitude in degrees.
    #[arg(long, default_value_t = DEFAULT_REFERENCE.1, allow_hyphen_values = true)]
    pub lng: f64,
}

impl ReferenceArgs {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// 64-character hex block hash.
    pub hash: String,

    #[command(flatten)]
    pub reference: ReferenceArgs,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Block height. Defaults to the chain tip.
    pub height: Option<u64>,

    /// Named jump instead of a height: current, day, week, genesis.
    #[arg(long, conflicts_with = "height")]
    pub jump: Option<Jump>,

    #[command(flatten)]
    pub reference: ReferenceArgs,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the HTTP API (also serves `/metrics`).
    #[arg(long, env = "PLACES_PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Debounce window for cache-missing selections, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE.as_millis() as u64)]
    pub debounce_ms: u64,

    #[command(flatten)]
    pub reference: ReferenceArgs,

    #[command(flatten)]
    pub source: SourceArgs,
}

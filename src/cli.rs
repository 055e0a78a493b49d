use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use cloudstack::{ConnectionArgs, DEFAULT_REGION, DEFAULT_TIMEOUT_SECS, HttpMethod};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(version)]
#[command(about = "Declarative resource management for CloudStack clouds", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub connection: ConnectionFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the resource described by a declaration file
    Apply(ApplyArgs),

    /// Show what apply would change, without changing anything
    Plan(PlanArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// List supported resource types
    Types,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Declaration file (.toml or .json)
    pub file: PathBuf,

    /// Dry run: report what would change
    #[arg(long)]
    pub check: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Declaration file (.toml or .json)
    pub file: PathBuf,
}

// ============================================================================
// Connection
// ============================================================================

#[derive(Args)]
pub struct ConnectionFlags {
    /// API key
    #[arg(long, env = "CLOUDSTACK_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// API secret
    #[arg(long, env = "CLOUDSTACK_API_SECRET", global = true, hide_env_values = true)]
    pub api_secret: Option<String>,

    /// API endpoint URL
    #[arg(long, env = "CLOUDSTACK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// HTTP method used for requests: get or post
    #[arg(long, env = "CLOUDSTACK_API_HTTP_METHOD", global = true, default_value = "get")]
    pub api_http_method: HttpMethod,

    /// Request timeout in seconds
    #[arg(long, env = "CLOUDSTACK_API_TIMEOUT", global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub api_timeout: u64,

    /// Profile to read credentials from
    #[arg(long, env = "CLOUDSTACK_API_REGION", global = true, default_value = DEFAULT_REGION)]
    pub api_region: String,
}

impl ConnectionFlags {
    pub fn to_args(&self) -> ConnectionArgs {
        ConnectionArgs {
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
            api_url: self.api_url.clone(),
            api_http_method: self.api_http_method,
            api_timeout: self.api_timeout,
            api_region: self.api_region.clone(),
        }
    }
}

//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "filterbar")]
#[command(author, version, about = "Validate and convert filter expressions", long_about = None)]
pub struct Cli {
    /// Output as JSON (default)
    #[arg(long, global = true, conflicts_with_all = ["yaml", "toml"])]
    pub json: bool,

    /// Output as YAML
    #[arg(long, global = true, conflicts_with_all = ["json", "toml"])]
    pub yaml: bool,

    /// Output as TOML
    #[arg(long, global = true, conflicts_with_all = ["json", "yaml"])]
    pub toml: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Explicit format flag, when one was given.
    pub fn output_format(&self) -> Option<OutputFormat> {
        if self.yaml {
            Some(OutputFormat::Yaml)
        } else if self.toml {
            Some(OutputFormat::Toml)
        } else if self.json {
            Some(OutputFormat::Json)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Toml,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<OutputFormat> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            "toml" => Some(OutputFormat::Toml),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a schema file
    CheckSchema(CheckSchemaArgs),
    /// Validate an expression file against a schema
    Check(CheckArgs),
    /// Convert an expression file to another representation
    Convert(ConvertArgs),
    /// Parse a URL query string into expressions
    ParseQuery(ParseQueryArgs),
    /// Drive the build state machine from an event script
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckSchemaArgs {
    /// Schema file (JSON or YAML); falls back to the configured default
    pub schema: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Expression file in the wire format (JSON or YAML)
    pub expressions: PathBuf,

    /// Schema file; falls back to the configured default
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConvertTarget {
    /// The compact wire format
    #[default]
    Wire,
    /// A percent-encoded URL query string (lossy)
    Query,
    /// A human-readable display string
    Display,
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Expression file in the wire format (JSON or YAML)
    pub expressions: PathBuf,

    /// Schema file; falls back to the configured default
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Target representation
    #[arg(long, value_enum, default_value_t = ConvertTarget::Wire)]
    pub to: ConvertTarget,
}

#[derive(clap::Args, Debug)]
pub struct ParseQueryArgs {
    /// The query string, e.g. "name=test&status=active"
    pub query: String,

    /// Schema file; falls back to the configured default
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// Event script file, one event per line
    pub script: PathBuf,

    /// Schema file; falls back to the configured default
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
}

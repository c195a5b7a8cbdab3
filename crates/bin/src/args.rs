use std::{error::Error, path::PathBuf};

use clap::Parser;
use log::LevelFilter;
use weft::Value;

#[derive(Debug, Parser)]
#[clap(
    version,
    about = "Compile a weft template and render it.",
    arg_required_else_help(true)
)]
pub struct Args {
    /// Template file to render, or `-` to read it from stdin.
    #[clap(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// JSON file whose top-level object supplies render values.
    ///
    /// May be repeated; later files override earlier ones on shared keys.
    #[clap(help_heading = "Values", long = "context", value_name = "FILE")]
    pub contexts: Vec<PathBuf>,

    /// A single render value, as KEY=VALUE.
    ///
    /// VALUE is parsed as JSON when it is valid JSON (so `n=3` is a number
    /// and `xs=[1,2]` a list), and used as a plain string otherwise.
    /// Overrides values from `--context`.
    #[clap(
        help_heading = "Values",
        short = 'v',
        long = "var",
        value_name = "KEY=VALUE",
        value_parser = parse_key_val
    )]
    pub vars: Vec<(String, Value)>,

    /// Print the generated render procedure instead of rendering.
    #[clap(help_heading = "Inspection", long, conflicts_with = "list_vars")]
    pub emit_code: bool,

    /// Print the variables the template needs, one per line, instead of
    /// rendering.
    #[clap(help_heading = "Inspection", long)]
    pub list_vars: bool,

    /// Settings file.
    ///
    /// Defaults to `weft/config.toml` under the user's config directory, which
    /// is ignored if it doesn't exist.
    #[clap(help_heading = "Meta", long, env = "WEFT_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Utility log level
    ///
    /// Set to `trace` to print the generated code of every template.
    #[clap(
        help_heading = "Meta",
        long,
        env = "WEFT_LOG",
        default_value = "warn",
        value_name = "LEVEL"
    )]
    pub log_level: LevelFilter,

    /// Print logs in json format to be parsable.
    #[clap(help_heading = "Meta", long)]
    pub json_output: bool,
}

/// Parse a single key-value pair
fn parse_key_val(s: &str) -> Result<(String, Value), Box<dyn Error + Send + Sync + 'static>> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;

    let value = serde_json::from_str::<serde_json::Value>(value)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(value));

    Ok((key.to_owned(), value))
}

pub fn parse() -> Args {
    Args::parse()
}

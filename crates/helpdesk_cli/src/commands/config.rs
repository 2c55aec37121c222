//! Config command - Print the effective configuration.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use helpdesk_runtime::HelpdeskConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

pub fn execute(args: ConfigArgs, path: Option<&Path>) -> Result<()> {
    let config = HelpdeskConfig::load(path)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_toml()?);
    }

    let key = if config.ai.has_api_key() { "set" } else { "not set (offline fallback replies)" };
    eprintln!("# OpenAI API key: {key}");
    Ok(())
}

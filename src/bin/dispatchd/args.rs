use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "/etc/dispatchd/config.yaml")]
    pub config: PathBuf,
    /// Enables human-friendly logging at TRACE level instead of JSON.
    #[arg(short, long, default_value_t)]
    pub debug: bool,
}

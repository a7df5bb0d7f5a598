use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fixit",
    version,
    about = "Machinery diagnosis from photos and videos via Gemini"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a photo or video and produce a diagnosis
    Analyze {
        source: PathBuf,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        config: Option<String>,
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Follow-up chat about the most recent diagnosis
    Chat {
        message: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        config: Option<String>,
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// List stored scans
    History {
        #[arg(long)]
        store: Option<PathBuf>,
        /// Delete the stored scan history
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
}

//! CLI surface (spec §6: "only the core-relevant flags").

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Remote signing daemon for Algorand transactions")]
pub struct Cli {
    /// Identity-scoped root directory; also settable via APSIGNER_DATA.
    #[arg(short = 'd', long = "data-dir", env = "APSIGNER_DATA")]
    pub data_dir: PathBuf,

    /// Identity namespace under `<data_dir>/store/users/`.
    #[arg(long, default_value = "default")]
    pub identity: String,
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use classmend::repair_command;

/// Repair stripped SourceFile attributes in a JAR's class files.
///
/// Tools that map compiled classes back to source misbehave on classes whose
/// SourceFile attribute was removed or overwritten with a stripped-marker.
/// This CLI is a thin wrapper around `classmend-core`: all substantive logic
/// lives in the library so it can be tested thoroughly and reused from other
/// frontends.
#[derive(Parser, Debug)]
#[command(
    name = "classmend",
    version,
    about = "Repair stripped SourceFile attributes in JAR class files",
    long_about = None
)]
struct Cli {
    /// Path to the .jar archive to repair in place.
    archive: PathBuf,

    /// Additional attribute value treated as a stripped-marker (repeatable).
    /// The conventional "stripped" sentinel is always recognized.
    #[arg(long = "sentinel", value_name = "VALUE")]
    sentinels: Vec<String>,

    /// Emit the repair summary as JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    repair_command(&cli.archive, &cli.sentinels, cli.json)
}

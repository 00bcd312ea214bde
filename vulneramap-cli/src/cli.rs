use std::path::PathBuf;

use clap::Parser;

/// Analyze a CycloneDX SBOM for known-vulnerable components and rank
/// them by supply-chain risk
#[derive(Parser)]
#[command(name = "vulneramap", version)]
pub struct Cli {
    /// Path to a CycloneDX JSON SBOM file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Emit the full analysis result as JSON on stdout (logs switch to
    /// JSON lines on stderr)
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero when any component reaches this final severity
    /// (low, medium, high or critical)
    #[arg(long, value_name = "SEVERITY")]
    pub fail_on: Option<String>,

    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,
}

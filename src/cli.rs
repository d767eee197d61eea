use clap::Parser;
use std::path::Path;

use crate::error::HighlightError;

#[derive(Parser)]
#[command(name = "teampulse-highlight")]
#[command(version = "1.2.0")]
#[command(about = "Streaming negotiation-analysis highlighter for conversation text")]
pub struct Args {
    /// Text to analyze, or @path to read it from a file
    pub text: String,

    /// Path to a JSON file with a pre-computed annotation array (offline mode)
    #[arg(long)]
    pub annotations: Option<String>,

    /// Analysis backend URL that streams annotation events
    #[arg(long)]
    pub backend: Option<String>,

    /// Emit segments as JSON instead of colored terminal output
    #[arg(long)]
    pub json: bool,

    /// Disable terminal colors
    #[arg(long)]
    pub no_color: bool,

    /// Launch the web dashboard on localhost instead of terminal output
    #[arg(long)]
    pub web: bool,

    /// Port for the web dashboard server
    #[arg(long, default_value = "8787")]
    pub port: u16,

    /// Client label attached to streamed segment snapshots
    #[arg(long, default_value = "cli")]
    pub client: String,
}

/// Resolve the text argument: a literal string, or the contents of a file
/// when prefixed with `@`.
pub fn load_text(arg: &str) -> Result<String, HighlightError> {
    if let Some(path) = arg.strip_prefix('@') {
        return Ok(std::fs::read_to_string(Path::new(path))?);
    }
    Ok(arg.to_string())
}

/// Parse an offline annotation file: a top-level JSON array of annotations.
pub fn load_annotations(path: &str) -> Result<Vec<crate::Annotation>, HighlightError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

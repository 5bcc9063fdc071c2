//! CLI command implementations.

pub mod codes;
pub mod stress;
pub mod validate;

/// Output format shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses a `--format` argument.
    pub fn parse(format: &str) -> Result<Self, Box<dyn std::error::Error>> {
        match format {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(format!("Unknown format '{other}' (expected text or json)").into()),
        }
    }
}

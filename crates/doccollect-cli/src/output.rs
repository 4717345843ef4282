//! Output format selection.

/// How command results are printed on stdout
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines (default)
    Text,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    /// Whether stdout carries machine-readable output.
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Json)
    }
}

//! Error type shared across the crate

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuelRouteError {
    /// Invalid parameters, either for clustering or for the service itself
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No chain of recorded drives connects the start of the graph to the end
    #[error("No route exists between the start and end of the graph")]
    Unreachable,

    /// A row in one of the input files could not be interpreted
    #[error("Unable to parse {}, line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Edge costs have already been finalized, no more drives can be merged")]
    GraphFinalized,

    #[error("Edge costs must be finalized before searching the graph")]
    GraphNotFinalized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FuelRouteError>;

use thiserror::Error;

/// Reasons an import payload is rejected as a whole.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("import failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid import format: expected an array of entries")]
    NotAnArray,

    #[error("invalid import format: entry {index} is missing id, word or category")]
    MissingField { index: usize },

    #[error("invalid import format: vocabTasks and listeningTasks are required")]
    MissingTaskLists,

    #[error("import failed: {0}")]
    Storage(#[from] anyhow::Error),
}

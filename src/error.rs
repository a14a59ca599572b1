use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("the CSV file has no \"id\" column")]
    MissingIdColumn,

    #[error("an import or export is already in progress")]
    InterchangeBusy,

    #[error("title id must not be blank")]
    EmptyId,

    #[error("episode must be a positive number, got {0}")]
    InvalidEpisode(u32),

    #[error("storage failure for key \"{key}\": {source}")]
    Storage {
        key: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ShelfError {
    /// Short status line shown to the user instead of a failure trace.
    pub fn message(&self) -> String {
        match self {
            ShelfError::MissingIdColumn => {
                "Import failed: the file needs an \"id\" column.".to_string()
            }
            ShelfError::InterchangeBusy => {
                "Another import or export is still running.".to_string()
            }
            ShelfError::EmptyId => "A title id cannot be blank.".to_string(),
            ShelfError::InvalidEpisode(ep) => format!("Episode {ep} is not a valid episode."),
            ShelfError::Storage { key, .. } => format!("Could not access saved {key}."),
        }
    }
}

//! Text processing: normalization and query spelling correction.

mod lexicon;
mod normalizer;
mod spelling;

pub use lexicon::{Lexicon, LexiconFile};
pub use normalizer::{clean_token, TextNormalizer};
pub use spelling::SpellingCorrector;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported format version {found} in {path}")]
    UnsupportedFormat { path: PathBuf, found: u32 },
}

pub type Result<T> = std::result::Result<T, TextError>;

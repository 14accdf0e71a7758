//! Versioned JSON artifacts shared by the lexical and semantic indexes.

use super::{RagError, Result};
use crate::persist;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub(crate) const FORMAT_VERSION: u32 = 1;

pub(crate) const SOURCES_FILE: &str = "sources.json";

/// Written at the top of every artifact. Files committed together share
/// one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ArtifactHeader {
    pub format_version: u32,
    pub generation: String,
}

impl ArtifactHeader {
    pub fn new(generation: &str) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generation: generation.to_string(),
        }
    }
}

/// Read and decode an artifact; `None` if the file does not exist.
pub(crate) async fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = persist::read_optional(path).await.map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    data.map(|bytes| {
        serde_json::from_slice(&bytes).map_err(|source| RagError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    })
    .transpose()
}

/// Read an artifact that must exist.
pub(crate) async fn read_required<T: DeserializeOwned>(path: &Path) -> Result<T> {
    read(path)
        .await?
        .ok_or_else(|| RagError::MissingArtifact(path.to_path_buf()))
}

pub(crate) fn encode<T: Serialize>(path: PathBuf, value: &T) -> Result<(PathBuf, Vec<u8>)> {
    Ok((path, serde_json::to_vec(value)?))
}

/// Commit a set of encoded artifacts as one unit.
pub(crate) async fn commit(dir: &Path, files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    persist::write_all_atomic(files).await.map_err(|source| RagError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Every header must carry the supported version and the same generation.
pub(crate) fn check_headers(dir: &Path, headers: &[(&Path, &ArtifactHeader)]) -> Result<()> {
    for (path, header) in headers {
        if header.format_version != FORMAT_VERSION {
            return Err(RagError::UnsupportedFormat {
                path: path.to_path_buf(),
                found: header.format_version,
            });
        }
    }

    let mut generations = headers.iter().map(|(_, header)| header.generation.as_str());
    if let Some(first) = generations.next() {
        if generations.any(|generation| generation != first) {
            return Err(RagError::StaleArtifacts(dir.to_path_buf()));
        }
    }
    Ok(())
}

/// Whether any of the given artifact files exists.
pub(crate) async fn any_exists(paths: &[&Path]) -> Result<bool> {
    for path in paths {
        let exists = tokio::fs::try_exists(path).await.map_err(|source| RagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if exists {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_generations_are_stale() {
        let a = ArtifactHeader::new("1");
        let b = ArtifactHeader::new("2");
        let result = check_headers(
            Path::new("idx"),
            &[(Path::new("idx/a.json"), &a), (Path::new("idx/b.json"), &b)],
        );
        assert!(matches!(result, Err(RagError::StaleArtifacts(_))));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut header = ArtifactHeader::new("1");
        header.format_version = 99;
        let result = check_headers(Path::new("idx"), &[(Path::new("idx/a.json"), &header)]);
        assert!(matches!(result, Err(RagError::UnsupportedFormat { found: 99, .. })));
    }
}

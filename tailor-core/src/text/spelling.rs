use super::{clean_token, Result, TextError, TextNormalizer};
use crate::persist;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

const VOCAB_FORMAT_VERSION: u32 = 1;
const MAX_EDIT_DISTANCE: usize = 2;

#[derive(Serialize, Deserialize)]
struct VocabFile {
    format_version: u32,
    words: HashMap<String, u64>,
    sources: BTreeSet<String>,
}

/// Query spelling correction against a corpus frequency dictionary.
///
/// Each whitespace-separated query word is replaced by the closest
/// dictionary word within two edits (optimal string alignment, so a swap of
/// adjacent letters counts once). Words with no candidate are kept as typed.
///
/// The dictionary remembers which sources it has absorbed, independently of
/// the indexes, so a document is counted once no matter how often it is
/// ingested.
#[derive(Debug, Clone, Default)]
pub struct SpellingCorrector {
    frequencies: HashMap<String, u64>,
    sources: BTreeSet<String>,
    normalizer: TextNormalizer,
}

impl SpellingCorrector {
    pub fn new(normalizer: TextNormalizer) -> Self {
        Self {
            frequencies: HashMap::new(),
            sources: BTreeSet::new(),
            normalizer,
        }
    }

    /// Build a dictionary from scratch.
    pub fn from_corpus<S: AsRef<str>>(normalizer: TextNormalizer, corpus: &[S]) -> Self {
        let mut corrector = Self::new(normalizer);
        corrector.update(corpus);
        corrector
    }

    /// Load a persisted dictionary. A missing file yields an empty one.
    pub async fn load(path: &Path, normalizer: TextNormalizer) -> Result<Self> {
        let Some(data) = persist::read_optional(path).await.map_err(|source| TextError::Io {
            path: path.to_path_buf(),
            source,
        })?
        else {
            debug!(path = %path.display(), "No vocabulary file, starting empty");
            return Ok(Self::new(normalizer));
        };

        let file: VocabFile = serde_json::from_slice(&data)?;
        if file.format_version != VOCAB_FORMAT_VERSION {
            return Err(TextError::UnsupportedFormat {
                path: path.to_path_buf(),
                found: file.format_version,
            });
        }

        info!(
            path = %path.display(),
            words = file.words.len(),
            sources = file.sources.len(),
            "Loaded vocabulary"
        );
        Ok(Self {
            frequencies: file.words,
            sources: file.sources,
            normalizer,
        })
    }

    /// Load a persisted dictionary, degrading to an empty one on any failure.
    pub async fn load_or_empty(path: &Path, normalizer: TextNormalizer) -> Self {
        match Self::load(path, normalizer.clone()).await {
            Ok(corrector) => corrector,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Vocabulary unavailable, correction disabled");
                Self::new(normalizer)
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let file = VocabFile {
            format_version: VOCAB_FORMAT_VERSION,
            words: self.frequencies.clone(),
            sources: self.sources.clone(),
        };
        let data = serde_json::to_vec(&file)?;
        persist::write_atomic(path, &data)
            .await
            .map_err(|source| TextError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), words = self.frequencies.len(), "Saved vocabulary");
        Ok(())
    }

    /// Merge the token counts of `corpus` into the dictionary.
    pub fn update<S: AsRef<str>>(&mut self, corpus: &[S]) {
        let before = self.frequencies.len();
        for text in corpus {
            for token in self.normalizer.normalize(text.as_ref()) {
                *self.frequencies.entry(token).or_insert(0) += 1;
            }
        }
        debug!(
            documents = corpus.len(),
            new_words = self.frequencies.len() - before,
            "Updated vocabulary"
        );
    }

    /// Merge one document's tokens unless `source` was absorbed before.
    ///
    /// Returns whether the dictionary changed.
    pub fn absorb(&mut self, source: &str, text: &str) -> bool {
        if self.sources.contains(source) {
            return false;
        }
        self.sources.insert(source.to_string());
        self.update(&[text]);
        true
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.sources.contains(source)
    }

    pub fn frequency(&self, word: &str) -> Option<u64> {
        self.frequencies.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Rewrite a query word by word. Never fails; never drops a word.
    pub fn correct(&self, query: &str) -> String {
        query
            .split_whitespace()
            .map(|word| self.correct_word(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Correct one word, or return it unchanged.
    pub fn correct_word(&self, word: &str) -> String {
        if self.frequencies.is_empty() {
            return word.to_string();
        }

        let cleaned = clean_token(word);
        if cleaned.is_empty() || self.normalizer.is_stopword(&cleaned) {
            return word.to_string();
        }
        if self.frequencies.contains_key(&cleaned) {
            return word.to_string();
        }

        match self.best_candidate(&cleaned) {
            Some(candidate) => {
                debug!(original = word, corrected = candidate, "Corrected query word");
                candidate.to_string()
            }
            None => word.to_string(),
        }
    }

    fn best_candidate(&self, word: &str) -> Option<&str> {
        let target: Vec<char> = word.chars().collect();
        let mut best: Option<(usize, u64, &str)> = None;

        for (candidate, &freq) in &self.frequencies {
            let candidate_len = candidate.chars().count();
            if candidate_len.abs_diff(target.len()) > MAX_EDIT_DISTANCE {
                continue;
            }

            let chars: Vec<char> = candidate.chars().collect();
            let distance = osa_distance(&target, &chars);
            if distance > MAX_EDIT_DISTANCE {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_distance, best_freq, best_word)) => {
                    (distance, std::cmp::Reverse(freq), candidate.as_str())
                        < (best_distance, std::cmp::Reverse(best_freq), best_word)
                }
            };
            if better {
                best = Some((distance, freq, candidate.as_str()));
            }
        }

        best.map(|(_, _, word)| word)
    }
}

/// Optimal string alignment distance: Levenshtein plus adjacent transposition.
fn osa_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let width = b.len() + 1;
    let mut d = vec![0usize; (a.len() + 1) * width];
    for i in 0..=a.len() {
        d[i * width] = i;
    }
    for (j, cell) in d.iter_mut().enumerate().take(width) {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut value = (d[(i - 1) * width + j] + 1)
                .min(d[i * width + j - 1] + 1)
                .min(d[(i - 1) * width + j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                value = value.min(d[(i - 2) * width + j - 2] + 1);
            }
            d[i * width + j] = value;
        }
    }

    d[a.len() * width + b.len()]
}

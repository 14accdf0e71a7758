use super::{Result, TextError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// English stopwords (NLTK list).
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Irregular plural nouns and their lemma.
const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("people", "person"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("geese", "goose"),
    ("mice", "mouse"),
    ("lice", "louse"),
    ("oxen", "ox"),
    ("dice", "die"),
    ("knives", "knife"),
    ("wives", "wife"),
    ("lives", "life"),
    ("leaves", "leaf"),
    ("loaves", "loaf"),
    ("wolves", "wolf"),
    ("halves", "half"),
    ("shelves", "shelf"),
    ("thieves", "thief"),
    ("calves", "calf"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("analyses", "analysis"),
    ("crises", "crisis"),
    ("theses", "thesis"),
    ("businessmen", "businessman"),
    ("fishermen", "fisherman"),
    ("policemen", "policeman"),
    // Words that look plural but are their own lemma.
    ("news", "news"),
    ("series", "series"),
    ("species", "species"),
    ("means", "means"),
    ("always", "always"),
    ("perhaps", "perhaps"),
    ("whereas", "whereas"),
];

/// Stopword set and lemma exceptions used by the normalizer.
///
/// Entries are stored in normalized form (lowercase, letters only), which is
/// the form tokens have when they are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexicon {
    stopwords: HashSet<String>,
    irregular: HashMap<String, String>,
}

/// On-disk shape of a custom lexicon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexiconFile {
    #[serde(default)]
    pub stopwords: Vec<String>,
    #[serde(default)]
    pub irregular: HashMap<String, String>,
}

fn letters_only(word: &str) -> String {
    word.to_lowercase().chars().filter(|c| c.is_alphabetic()).collect()
}

impl Lexicon {
    pub fn new<S, I>(stopwords: S, irregular: I) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|w| letters_only(w.as_ref()))
                .filter(|w| !w.is_empty())
                .collect(),
            irregular: irregular
                .into_iter()
                .map(|(from, to)| (letters_only(&from), letters_only(&to)))
                .filter(|(from, to)| !from.is_empty() && !to.is_empty())
                .collect(),
        }
    }

    /// Built-in English lexicon.
    pub fn english() -> Self {
        Self::new(
            ENGLISH_STOPWORDS.iter().copied(),
            IRREGULAR_NOUNS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string())),
        )
    }

    /// Load a lexicon from a JSON file of the form
    /// `{"stopwords": [...], "irregular": {"plural": "lemma"}}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| TextError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LexiconFile = serde_json::from_str(&contents)?;
        Ok(Self::new(file.stopwords, file.irregular))
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn irregular_lemma(&self, token: &str) -> Option<&str> {
        self.irregular.get(token).map(String::as_str)
    }

    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::english()
    }
}

use super::Lexicon;
use std::sync::Arc;

/// Turns raw text into normalized tokens.
///
/// Pipeline: split on whitespace, lowercase, keep alphabetic characters only,
/// drop empty tokens and stopwords, lemmatize what remains. The output is a
/// pure function of the input and the lexicon.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    lexicon: Arc<Lexicon>,
}

impl TextNormalizer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon: Arc::new(lexicon),
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(clean_token)
            .filter(|token| !token.is_empty() && !self.lexicon.is_stopword(token))
            .map(|token| self.lemmatize(&token))
            .collect()
    }

    /// Reduce a cleaned, lowercase token to its noun lemma.
    pub fn lemmatize(&self, token: &str) -> String {
        if let Some(lemma) = self.lexicon.irregular_lemma(token) {
            return lemma.to_string();
        }
        lemmatize_regular(token)
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.lexicon.is_stopword(token)
    }
}

/// Lowercase and strip everything that is not a letter.
pub fn clean_token(raw: &str) -> String {
    raw.to_lowercase().chars().filter(|c| c.is_alphabetic()).collect()
}

fn lemmatize_regular(token: &str) -> String {
    let len = token.chars().count();
    if len <= 3 {
        return token.to_string();
    }

    // Singular forms that end in "s".
    if token.ends_with("ss")
        || token.ends_with("us")
        || token.ends_with("is")
        || token.ends_with("ics")
    {
        return token.to_string();
    }

    if len > 4 {
        if let Some(stem) = token.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }

    for suffix in ["sses", "ches", "shes", "xes", "zes"] {
        if token.ends_with(suffix) {
            return token[..token.len() - 2].to_string();
        }
    }

    match token.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::default()
    }

    #[test]
    fn test_pipeline_order() {
        let tokens = normalizer().normalize("The Towers of PARIS, and 3 museums!");
        assert_eq!(tokens, vec!["tower", "paris", "museum"]);
    }

    #[test]
    fn test_non_alphabetic_tokens_dropped() {
        let tokens = normalizer().normalize("2024 -- 42% ok");
        assert_eq!(tokens, vec!["ok"]);
    }

    #[test]
    fn test_possessive_and_punctuation() {
        let tokens = normalizer().normalize("Eiffel's tower.");
        assert_eq!(tokens, vec!["eiffel", "tower"]);
    }

    #[test]
    fn test_lemma_rules() {
        let n = normalizer();
        assert_eq!(n.lemmatize("cities"), "city");
        assert_eq!(n.lemmatize("churches"), "church");
        assert_eq!(n.lemmatize("boxes"), "box");
        assert_eq!(n.lemmatize("glasses"), "glass");
        assert_eq!(n.lemmatize("glass"), "glass");
        assert_eq!(n.lemmatize("bus"), "bus");
        assert_eq!(n.lemmatize("analysis"), "analysis");
        assert_eq!(n.lemmatize("children"), "child");
        assert_eq!(n.lemmatize("news"), "news");
        assert_eq!(n.lemmatize("hotels"), "hotel");
    }

    #[test]
    fn test_deterministic() {
        let n = normalizer();
        let text = "Sushi restaurants in Tokyo serve fresh fish";
        assert_eq!(n.normalize(text), n.normalize(text));
    }

    #[test]
    fn test_unicode_letters_kept() {
        let tokens = normalizer().normalize("Café Zürich");
        assert_eq!(tokens, vec!["café", "zürich"]);
    }
}

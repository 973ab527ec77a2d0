/// Text normalization and feature extraction
use crate::config::VectorizerConfig;
use crate::error::{Result, TextsimError};
use ahash::AHashSet;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Prefix for whole-word features
const WORD_PREFIX: &str = "w:";
/// Prefix for character n-gram features
const NGRAM_PREFIX: &str = "c:";
/// Prefix for n-grams over the whole text, used when it has no word tokens
const TEXT_PREFIX: &str = "t:";

/// Splits text into word and character n-gram features
#[derive(Debug, Clone)]
pub struct Tokenizer {
    word_re: Regex,
    stop_words: AHashSet<String>,
    min_token_chars: usize,
    ngram_range: Option<(usize, usize)>,
    fold_accents: bool,
}

impl Tokenizer {
    pub fn new(config: &VectorizerConfig) -> Result<Self> {
        let word_re = Regex::new(&config.token_pattern).map_err(|e| {
            TextsimError::InvalidConfigValue {
                path: "vectorizer.token_pattern".to_string(),
                message: e.to_string(),
            }
        })?;

        let fold_accents = config.fold_accents;
        let stop_words = config
            .stop_words
            .iter()
            .map(|w| normalize(w, fold_accents))
            .collect();

        let ngram_range = if config.char_ngram_max == 0 {
            None
        } else {
            Some((config.char_ngram_min.max(1), config.char_ngram_max))
        };

        Ok(Self {
            word_re,
            stop_words,
            min_token_chars: config.min_token_chars,
            ngram_range,
            fold_accents,
        })
    }

    /// Normalized word tokens, stop words and short tokens removed
    pub fn words(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text, self.fold_accents);
        self.word_re
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|w| w.chars().count() >= self.min_token_chars)
            .filter(|w| !self.stop_words.contains(*w))
            .map(str::to_string)
            .collect()
    }

    /// All features of a text, with repetitions (term frequency is their count)
    ///
    /// A text whose words are all filtered out falls back to its unfiltered
    /// tokens, and a text with no tokens at all (emoji, punctuation) to
    /// n-grams over the whole text, so only blank text has no features.
    pub fn features(&self, text: &str) -> Vec<String> {
        let mut words = self.words(text);
        if words.is_empty() {
            words = self.raw_words(text);
        }

        let mut features = Vec::with_capacity(words.len() * 8);

        for word in &words {
            features.push(format!("{}{}", WORD_PREFIX, word));

            if let Some((min, max)) = self.ngram_range {
                push_char_ngrams(NGRAM_PREFIX, word, min, max, &mut features);
            }
        }

        if features.is_empty() {
            push_text_ngrams(&normalize(text, self.fold_accents), self.ngram_range, &mut features);
        }

        features
    }

    /// Normalized tokens with no stop word or length filtering
    fn raw_words(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text, self.fold_accents);
        self.word_re
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|w| !w.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// N-grams over whitespace-collapsed text; the whole text when it is shorter
/// than the smallest n-gram or n-grams are disabled
fn push_text_ngrams(normalized: &str, range: Option<(usize, usize)>, out: &mut Vec<String>) {
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return;
    }

    let before = out.len();
    if let Some((min, max)) = range {
        push_char_ngrams(TEXT_PREFIX, &collapsed, min, max, out);
    }
    if out.len() == before {
        out.push(format!("{}{}", TEXT_PREFIX, collapsed));
    }
}

/// N-grams over the space-padded word so prefixes and suffixes are marked
fn push_char_ngrams(prefix: &str, word: &str, min: usize, max: usize, out: &mut Vec<String>) {
    let padded: Vec<char> = std::iter::once(' ')
        .chain(word.chars())
        .chain(std::iter::once(' '))
        .collect();

    for n in min..=max {
        if n > padded.len() {
            break;
        }
        for window in padded.windows(n) {
            let mut gram = String::with_capacity(prefix.len() + n * 2);
            gram.push_str(prefix);
            gram.extend(window.iter());
            out.push(gram);
        }
    }
}

/// Lowercase and optionally strip diacritics ("Ríe" -> "rie")
pub fn normalize(text: &str, fold_accents: bool) -> String {
    if fold_accents {
        text.nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase()
    } else {
        text.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(&VectorizerConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_folds_accents() {
        assert_eq!(normalize("Ríe y SONRÍE", true), "rie y sonrie");
        assert_eq!(normalize("Ríe", false), "ríe");
    }

    #[test]
    fn test_words_filter_stop_words_and_short_tokens() {
        let words = tokenizer().words("El amor todo lo puede, y más!");
        assert_eq!(words, vec!["amor", "todo", "puede", "mas"]);
    }

    #[test]
    fn test_features_include_padded_ngrams() {
        let features = tokenizer().features("te");
        assert!(features.contains(&"w:te".to_string()));
        assert!(features.contains(&"c: te".to_string()));
        assert!(features.contains(&"c:te ".to_string()));
        assert!(features.contains(&"c: te ".to_string()));
    }

    #[test]
    fn test_ngrams_disabled() {
        let config = VectorizerConfig {
            char_ngram_max: 0,
            ..VectorizerConfig::default()
        };
        let features = Tokenizer::new(&config).unwrap().features("nunca te rindas");
        assert_eq!(features, vec!["w:nunca", "w:te", "w:rindas"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let config = VectorizerConfig {
            token_pattern: "(".to_string(),
            ..VectorizerConfig::default()
        };
        assert!(Tokenizer::new(&config).is_err());
    }

    #[test]
    fn test_stop_words_only_fall_back_to_raw_tokens() {
        let features = tokenizer().features("Y tú, ¿qué?");
        assert!(features.contains(&"w:tu".to_string()));
        assert!(features.contains(&"w:que".to_string()));
        assert!(features.contains(&"w:y".to_string()));
    }

    #[test]
    fn test_tokenless_text_uses_text_ngrams() {
        let features = tokenizer().features("😂😂😂");
        assert!(!features.is_empty());
        assert!(features.iter().all(|f| f.starts_with("t:")));
        assert!(features.contains(&"t: 😂😂".to_string()));

        let config = VectorizerConfig {
            char_ngram_max: 0,
            ..VectorizerConfig::default()
        };
        let features = Tokenizer::new(&config).unwrap().features("¡¿...?!");
        assert_eq!(features, vec!["t:¡¿...?!"]);
    }

    #[test]
    fn test_blank_text_has_no_features() {
        assert!(tokenizer().features(" \t\n").is_empty());
    }
}

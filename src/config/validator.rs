use crate::config::Config;
use crate::error::{Result, TextsimError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_corpus(config, &mut errors);
        Self::validate_vectorizer(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_daemon(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TextsimError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.corpus.default_category.trim().is_empty() {
            errors.push(ValidationError::new(
                "corpus.default_category",
                "Default category cannot be empty",
            ));
        }

        if config.corpus.load_batch_size == 0 {
            errors.push(ValidationError::new(
                "corpus.load_batch_size",
                "Load batch size must be greater than 0",
            ));
        }
    }

    fn validate_vectorizer(config: &Config, errors: &mut Vec<ValidationError>) {
        let v = &config.vectorizer;

        if let Err(e) = regex::Regex::new(&v.token_pattern) {
            errors.push(ValidationError::new(
                "vectorizer.token_pattern",
                format!("Invalid token pattern: {}", e),
            ));
        }

        if v.min_token_chars == 0 {
            errors.push(ValidationError::new(
                "vectorizer.min_token_chars",
                "Minimum token length must be greater than 0",
            ));
        }

        // char_ngram_max == 0 disables n-grams entirely
        if v.char_ngram_max > 0 && (v.char_ngram_min == 0 || v.char_ngram_min > v.char_ngram_max)
        {
            errors.push(ValidationError::new(
                "vectorizer.char_ngram_min",
                format!(
                    "N-gram range must satisfy 1 <= min <= max, got {}..={}",
                    v.char_ngram_min, v.char_ngram_max
                ),
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.search.default_top_n == 0 {
            errors.push(ValidationError::new(
                "search.default_top_n",
                "Default top-N must be greater than 0",
            ));
        }

        if config.search.percent_decimals > 6 {
            errors.push(ValidationError::new(
                "search.percent_decimals",
                format!(
                    "Percent precision must be at most 6 decimals, got {}",
                    config.search.percent_decimals
                ),
            ));
        }

        if config.search.stale_threshold == 0 {
            errors.push(ValidationError::new(
                "search.stale_threshold",
                "Stale threshold must be greater than 0",
            ));
        }
    }

    fn validate_daemon(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.daemon.socket_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "daemon.socket_path",
                "Socket path cannot be empty",
            ));
        }

        if config.daemon.max_connections == 0 {
            errors.push(ValidationError::new(
                "daemon.max_connections",
                "Max connections must be greater than 0",
            ));
        }
    }
}

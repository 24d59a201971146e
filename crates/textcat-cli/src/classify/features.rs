//! Bag-of-n-grams features for raw text queries.
use serde::{Deserialize, Serialize};

use textcat_classifiers::feature_extraction::{FeatureExtractor, FeatureMap};
use textcat_classifiers::resources::{FrequencyTable, Resources, QUERY_FREQ_RSC, WORD_FREQ_RSC};

/// Replacement token for words below the frequency threshold.
pub const OOV_TOKEN: &str = "<OOV>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub ngram_lengths: Vec<usize>,
    /// Words seen fewer times than this in the training data are masked as
    /// [`OOV_TOKEN`]. At 1 only words unseen in training are masked, so the
    /// masked n-grams never reach the fitted vocabulary and are dropped.
    pub min_word_freq: u32,
    /// Emit an `exact|query` feature for each input.
    pub exact_query: bool,
    /// Queries seen fewer times than this in training share the
    /// `exact|query:<OOV>` feature.
    pub min_query_freq: u32,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            ngram_lengths: vec![1, 2],
            min_word_freq: 1,
            exact_query: true,
            min_query_freq: 2,
        }
    }
}

/// Lowercase and split on anything that is not alphanumeric or an apostrophe.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens joined by single spaces.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Count words and whole normalized queries over the training texts.
pub fn build_resources(texts: &[String]) -> Resources {
    let mut word_freq = FrequencyTable::new();
    let mut query_freq = FrequencyTable::new();
    for text in texts {
        let tokens = tokenize(text);
        for token in &tokens {
            *word_freq.entry(token.clone()).or_insert(0) += 1;
        }
        *query_freq.entry(tokens.join(" ")).or_insert(0) += 1;
    }
    log::debug!(
        "Built resources: {} distinct words, {} distinct queries",
        word_freq.len(),
        query_freq.len()
    );

    let mut resources = Resources::new();
    resources.insert(WORD_FREQ_RSC, word_freq);
    resources.insert(QUERY_FREQ_RSC, query_freq);
    resources
}

#[derive(Debug, Clone, Default)]
pub struct NgramExtractor {
    settings: FeatureSettings,
}

impl NgramExtractor {
    pub fn new(settings: FeatureSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FeatureSettings {
        &self.settings
    }

    fn mask<'a>(&self, token: &'a str, word_freq: Option<&FrequencyTable>) -> &'a str {
        match word_freq {
            Some(freq) if freq.get(token).copied().unwrap_or(0) < self.settings.min_word_freq => OOV_TOKEN,
            _ => token,
        }
    }
}

impl FeatureExtractor<String> for NgramExtractor {
    fn extract(&self, text: &String, resources: &Resources) -> FeatureMap {
        let tokens = tokenize(text);
        let word_freq = resources.word_freq();
        let masked: Vec<&str> = tokens
            .iter()
            .map(|token| self.mask(token, word_freq))
            .collect();

        let mut features = FeatureMap::new();
        for &n in &self.settings.ngram_lengths {
            if n == 0 {
                continue;
            }
            for window in masked.windows(n) {
                *features
                    .entry(format!("ngram{}|{}", n, window.join(" ")))
                    .or_insert(0.0) += 1.0;
            }
        }

        if self.settings.exact_query {
            let query = tokens.join(" ");
            let known = resources
                .query_freq()
                .and_then(|freq| freq.get(&query))
                .map_or(false, |&count| count >= self.settings.min_query_freq);
            let key = if known {
                format!("exact|query:{}", query)
            } else {
                format!("exact|query:{}", OOV_TOKEN)
            };
            features.insert(key, 1.0);
        }
        features
    }
}

use anyhow::{Context, Result, anyhow};
use moka::sync::Cache;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};
use tracing::{debug, warn};
use xxhash_rust::xxh64::Xxh64;

/// A labelled piece of prompt text, in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Short label for logs ("overview", a file path)
    pub label: String,
    pub text: String,
}

impl Section {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Token counter backed by tiktoken-rs with a count cache
pub struct TokenCounter {
    /// Byte Pair Encoding (BPE) tokenizer
    bpe: CoreBPE,

    /// xxh64(text) -> token count
    cache: Cache<u64, usize>,
}

impl TokenCounter {
    /// Create a counter for a model or encoding name.
    ///
    /// Model names ("gpt-4o", "gpt-4") are looked up first; otherwise
    /// "o200k_base" and "cl100k_base" are accepted as encoding names.
    ///
    /// # Errors
    /// Returns an error if the model or encoding is unknown or fails to load.
    pub fn new(model_or_encoding: &str) -> Result<Self> {
        let lower = model_or_encoding.to_ascii_lowercase();

        let bpe = match get_bpe_from_model(&lower) {
            Ok(b) => b,
            Err(_) => match lower.as_str() {
                "o200k_base" => o200k_base().context("load o200k_base")?,
                "cl100k_base" => cl100k_base().context("load cl100k_base")?,
                _ => return Err(anyhow!("Unsupported model/encoding: {model_or_encoding}")),
            },
        };

        Ok(Self {
            bpe,
            cache: Cache::new(10_000),
        })
    }

    /// Number of tokens in `s`
    pub fn count(&self, s: &str) -> usize {
        let mut hasher = Xxh64::new(0);
        hasher.update(s.as_bytes());
        let key = hasher.digest();

        if let Some(t) = self.cache.get(&key) {
            return t;
        }

        let t = self.bpe.encode_ordinary(s).len();
        self.cache.insert(key, t);
        t
    }

    /// Keep `sections` in order while their running total fits `budget`.
    ///
    /// The first section is always kept; when it alone is over budget it is
    /// cut down to a prefix that fits. Later sections are all-or-nothing.
    pub fn fit_sections(&self, sections: Vec<Section>, budget: usize) -> Vec<Section> {
        let mut used = 0usize;
        let mut out = Vec::with_capacity(sections.len());

        for (i, mut section) in sections.into_iter().enumerate() {
            let tokens = self.count(&section.text);

            if i == 0 && tokens > budget {
                warn!(label = %section.label, tokens, budget, "leading section over budget, trimming");
                section.text = self.take_prefix(&section.text, budget);
                used = self.count(&section.text);
                out.push(section);
                continue;
            }

            if used + tokens > budget {
                debug!(label = %section.label, tokens, used, budget, "section dropped");
                continue;
            }

            used += tokens;
            out.push(section);
        }

        out
    }

    /// Longest char-prefix of `s` with at most `max_tokens` tokens
    fn take_prefix(&self, s: &str, max_tokens: usize) -> String {
        if max_tokens == 0 {
            return String::new();
        }

        // Char offsets, so every probe is a valid UTF-8 boundary
        let bounds: Vec<usize> = s.char_indices().map(|(i, _)| i).chain([s.len()]).collect();

        let (mut lo, mut hi) = (0usize, bounds.len() - 1);
        while lo < hi {
            let mid = (lo + hi).div_ceil(2);
            if self.bpe.encode_ordinary(&s[..bounds[mid]]).len() <= max_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        s[..bounds[lo]].to_string()
    }
}

//! Token counting for context budgets.

use crate::Result;

/// Counts and truncates text in model tokens.
pub trait TokenCounter: Send + Sync + std::fmt::Debug {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Longest prefix of `text` costing at most `max_tokens`.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;

    /// Counter name for logs.
    fn name(&self) -> &'static str;
}

/// Approximate token counter based on character count.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateTokenCounter {
    /// Characters per token ratio (default: 4).
    chars_per_token: usize,
}

impl Default for ApproximateTokenCounter {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl ApproximateTokenCounter {
    /// Create a new approximate token counter. A ratio of zero is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl TokenCounter for ApproximateTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let max_chars = max_tokens.saturating_mul(self.chars_per_token);
        text.chars().take(max_chars).collect()
    }

    fn name(&self) -> &'static str {
        "approximate"
    }
}

/// Exact counter using the `cl100k_base` BPE.
#[cfg(feature = "tiktoken")]
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter").finish_non_exhaustive()
    }
}

#[cfg(feature = "tiktoken")]
impl TiktokenCounter {
    /// Load the `cl100k_base` encoding.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(crate::LecternError::external)?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_with_special_tokens(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        // A cut can land inside a multi-byte character; back off until it decodes.
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(decoded) = self.bpe.decode(tokens[..end].to_vec()) {
                return decoded;
            }
            end -= 1;
        }
        String::new()
    }

    fn name(&self) -> &'static str {
        "cl100k_base"
    }
}

/// The best counter available in this build.
pub fn default_token_counter() -> Result<std::sync::Arc<dyn TokenCounter>> {
    #[cfg(feature = "tiktoken")]
    {
        Ok(std::sync::Arc::new(TiktokenCounter::cl100k()?))
    }
    #[cfg(not(feature = "tiktoken"))]
    {
        Ok(std::sync::Arc::new(ApproximateTokenCounter::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", 0 ; "empty")]
    #[test_case("abcd", 1 ; "exact")]
    #[test_case("abcde", 2 ; "rounds up")]
    #[test_case("héllo wörld", 3 ; "counts characters not bytes")]
    fn test_approximate_count(text: &str, expected: usize) {
        assert_eq!(ApproximateTokenCounter::default().count(text), expected);
    }

    #[test]
    fn test_truncate_fits_budget() {
        let counter = ApproximateTokenCounter::default();
        let text = "a".repeat(100);
        let cut = counter.truncate(&text, 5);
        assert_eq!(cut.len(), 20);
        assert!(counter.count(&cut) <= 5);
        assert_eq!(counter.truncate("short", 10), "short");
    }

    #[test]
    fn test_default_counter_matches_build() {
        let counter = default_token_counter().unwrap();
        #[cfg(feature = "tiktoken")]
        assert_eq!(counter.name(), "cl100k_base");
        #[cfg(not(feature = "tiktoken"))]
        assert_eq!(counter.name(), "approximate");
    }

    #[cfg(feature = "tiktoken")]
    #[test]
    fn test_tiktoken_truncate_fits_budget() {
        let counter = TiktokenCounter::cl100k().unwrap();
        let text = "Attention is all you need. ".repeat(50);
        let cut = counter.truncate(&text, 12);
        assert!(counter.count(&cut) <= 12);
        assert!(text.starts_with(&cut));
    }
}

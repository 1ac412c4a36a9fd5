//! Token counting and budget arithmetic.
//!
//! Counts use the gpt-4o BPE (`o200k_base`) so budgets match what the
//! model will actually see. The 4-chars-per-token estimate is kept for
//! deployments that point at a different model family, and for tests.

use std::sync::Arc;

use souschef_core::message::Message;
use souschef_core::{Error, Result};
use tiktoken_rs::CoreBPE;

/// Flat charge for one inline image (a 1024×1024 image at high detail:
/// 85 base + 4 tiles × 170).
pub const IMAGE_TOKEN_COST: usize = 765;

#[derive(Clone)]
pub enum TokenBudgeter {
    Bpe(Arc<CoreBPE>),
    Estimate,
}

impl TokenBudgeter {
    /// The gpt-4o tokenizer.
    pub fn o200k() -> Result<Self> {
        let bpe = tiktoken_rs::o200k_base().map_err(|e| Error::Config {
            message: format!("failed to load o200k_base tokenizer: {e}"),
        })?;
        Ok(Self::Bpe(Arc::new(bpe)))
    }

    pub fn estimate() -> Self {
        Self::Estimate
    }

    /// Build from the `assistant.tokenizer` setting.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "o200k_base" => Self::o200k(),
            "estimate" => Ok(Self::estimate()),
            other => Err(Error::Config {
                message: format!("unknown tokenizer \"{other}\""),
            }),
        }
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Self::Estimate => estimate_tokens(text),
        }
    }

    /// Tokens a user message costs: its text plus a flat charge per image.
    pub fn count_message(&self, message: &Message) -> usize {
        self.count(&message.content) + message.images.len() * IMAGE_TOKEN_COST
    }

    /// What is left of `total` after `consumed`, never below zero.
    pub fn remaining(total: usize, consumed: usize) -> usize {
        total.saturating_sub(consumed)
    }
}

impl std::fmt::Debug for TokenBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bpe(_) => f.write_str("TokenBudgeter::Bpe(o200k_base)"),
            Self::Estimate => f.write_str("TokenBudgeter::Estimate"),
        }
    }
}

/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

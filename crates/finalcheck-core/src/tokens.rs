//! Token-level view of a string.
//!
//! Useful when a completion fails on whitespace or line boundaries: the
//! listing shows exactly which pieces the model emitted. With the `tiktoken`
//! feature the `cl100k_base` BPE is used; otherwise, or when the encoding
//! cannot be built, the text is shown as raw UTF-8 bytes.

use serde::Serialize;

/// Name reported for the byte fallback.
pub const BYTE_TOKENIZER: &str = "fallback/utf8_bytes";

/// Name reported for the BPE tokenizer.
pub const BPE_TOKENIZER: &str = "tiktoken/cl100k_base";

/// One token id and the text it decodes to on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub id: u32,
    /// Decoded piece; incomplete UTF-8 shows as U+FFFD.
    pub piece: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tokenization {
    pub tokenizer: String,
    pub tokens: Vec<Token>,
}

impl Tokenization {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Tokenize with the best tokenizer available, falling back to bytes.
pub fn tokenize(text: &str) -> Tokenization {
    bpe_tokens(text).unwrap_or_else(|| byte_tokens(text))
}

/// One token per UTF-8 byte.
pub fn byte_tokens(text: &str) -> Tokenization {
    let tokens = text
        .bytes()
        .map(|b| Token {
            id: u32::from(b),
            piece: String::from_utf8_lossy(&[b]).into_owned(),
        })
        .collect();
    Tokenization {
        tokenizer: BYTE_TOKENIZER.to_string(),
        tokens,
    }
}

#[cfg(feature = "tiktoken")]
fn bpe_tokens(text: &str) -> Option<Tokenization> {
    let bpe = match tiktoken_rs::cl100k_base() {
        Ok(bpe) => bpe,
        Err(e) => {
            tracing::debug!(error = %e, "cl100k_base unavailable, using byte tokens");
            return None;
        }
    };
    let tokens = bpe
        .encode_ordinary(text)
        .into_iter()
        .map(|id| Token {
            id: id as u32,
            piece: bpe
                .decode(vec![id])
                .unwrap_or_else(|_| char::REPLACEMENT_CHARACTER.to_string()),
        })
        .collect();
    Some(Tokenization {
        tokenizer: BPE_TOKENIZER.to_string(),
        tokens,
    })
}

#[cfg(not(feature = "tiktoken"))]
fn bpe_tokens(_text: &str) -> Option<Tokenization> {
    None
}

/// Plain-text listing: header, then one `index id piece` row per token.
pub fn render_tokens(text: &str, tokenization: &Tokenization) -> String {
    let mut out = String::new();
    out.push_str(&format!("Tokenizer: {}\n", tokenization.tokenizer));
    out.push_str(&format!("Input repr: {text:?}\n"));
    out.push_str(&format!("Token count: {}\n\n", tokenization.len()));
    for (idx, token) in tokenization.tokens.iter().enumerate() {
        out.push_str(&format!(
            "{idx:03}  id={:<6}  token={:?}\n",
            token.id, token.piece
        ));
    }
    out
}

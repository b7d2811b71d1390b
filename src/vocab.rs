//! Symbol table and task definition the components are sized against

use std::collections::HashMap;

use crate::error::{MganError, Result};

pub const PAD: &str = "<pad>";
pub const BOS: &str = "<s>";
pub const EOS: &str = "</s>";
pub const UNK: &str = "<unk>";
pub const MASK: &str = "<mask>";

/// Number of reserved symbols at the start of every vocabulary
pub const NUM_SPECIAL: usize = 5;

#[derive(Debug, Clone)]
pub struct Vocab {
    symbols: Vec<String>,
    indices: HashMap<String, usize>,
}

impl Vocab {
    pub fn new() -> Self {
        let mut vocab = Self {
            symbols: Vec::new(),
            indices: HashMap::new(),
        };
        for special in [PAD, BOS, EOS, UNK, MASK] {
            vocab.add_symbol(special);
        }
        vocab
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        for symbol in symbols {
            vocab.add_symbol(symbol.as_ref());
        }
        vocab
    }

    /// Returns the index of `symbol`, inserting it if unseen
    pub fn add_symbol(&mut self, symbol: &str) -> usize {
        if let Some(&idx) = self.indices.get(symbol) {
            return idx;
        }
        let idx = self.symbols.len();
        self.symbols.push(symbol.to_string());
        self.indices.insert(symbol.to_string(), idx);
        idx
    }

    pub fn index(&self, symbol: &str) -> usize {
        self.indices.get(symbol).copied().unwrap_or(self.unk())
    }

    pub fn symbol(&self, index: usize) -> &str {
        self.symbols.get(index).map(String::as_str).unwrap_or(UNK)
    }

    pub fn pad(&self) -> usize {
        0
    }

    pub fn bos(&self) -> usize {
        1
    }

    pub fn eos(&self) -> usize {
        2
    }

    pub fn unk(&self) -> usize {
        3
    }

    pub fn mask(&self) -> usize {
        4
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Render ids as space separated symbols, dropping padding and stopping at `</s>`
    pub fn string(&self, ids: &[i64]) -> String {
        ids.iter()
            .map(|&id| id.max(0) as usize)
            .take_while(|&id| id != self.eos())
            .filter(|&id| id != self.pad())
            .map(|id| self.symbol(id))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

/// What the components are built for: currently just the vocabulary
#[derive(Debug, Clone)]
pub struct Task {
    pub vocab: Vocab,
}

impl Task {
    pub fn new(vocab: Vocab) -> Self {
        Self { vocab }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.vocab.len() <= NUM_SPECIAL {
            return Err(MganError::config(
                "vocab",
                "contains no symbols besides the reserved ones",
            ));
        }
        Ok(())
    }
}

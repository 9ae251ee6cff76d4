//! The binary grammar format understood by the recognition engine's grammar loading interface.
//!
//! A serialized grammar starts with a header (`SRHDRTYPE_CFG`, `SRHDRFLAG_UNICODE`) followed by
//! three chunks, each prefixed with its tag and byte length:
//!
//! 1. `SRCKCFG_EXPORTRULES`: the rule name table.
//! 2. `SRCKCFG_WORDS`: the word table.
//! 3. `SRCKCFG_RULES`: one definition table per rule, in rule id order.
//!
//! All integers are little-endian. Names are UTF-16LE with a null terminator, padded to a multiple
//! of four bytes.

use std::fmt;

use strum_macros::Display;
use tracing::debug;

use crate::{Grammar, Grouping, Result};

mod directive;
mod names;
mod reader;

pub use names::padded_len;
pub use reader::{read, CompiledGrammar, RuleTable};

/// Header type of a context-free grammar.
pub const SRHDRTYPE_CFG: u32 = 0;
/// Header flag marking names as UTF-16.
pub const SRHDRFLAG_UNICODE: u32 = 1;
/// Size of one encoded [`Directive`].
pub const DIRECTIVE_LEN: usize = 8;

/// Identifies a chunk of the serialized grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ChunkTag {
    /// Word table
    #[strum(serialize = "SRCKCFG_WORDS")]
    Words = 2,
    /// Rule definition tables
    #[strum(serialize = "SRCKCFG_RULES")]
    Rules = 3,
    /// Rule name table
    #[strum(serialize = "SRCKCFG_EXPORTRULES")]
    ExportRules = 4,
}

impl ChunkTag {
    /// The tag's numeric value.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Looks up the tag with the given value.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::Words),
            3 => Some(Self::Rules),
            4 => Some(Self::ExportRules),
            _ => None,
        }
    }
}

/// The type of a [`Directive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DirectiveType {
    /// Opens a group; the payload is the grouping code.
    #[strum(serialize = "SRCFG_STARTOPERATION")]
    StartOperation = 1,
    /// Closes a group; the payload is the grouping code.
    #[strum(serialize = "SRCFG_ENDOPERATION")]
    EndOperation = 2,
    /// A word; the payload is the word id.
    #[strum(serialize = "SRCFG_WORD")]
    Word = 3,
    /// A rule reference; the payload is the rule id.
    #[strum(serialize = "SRCFG_RULE")]
    Rule = 4,
    /// A list reference; the payload is the list id.
    #[strum(serialize = "SRCFG_LIST")]
    List = 6,
}

impl DirectiveType {
    /// The type's numeric value.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up the type with the given value.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::StartOperation),
            2 => Some(Self::EndOperation),
            3 => Some(Self::Word),
            4 => Some(Self::Rule),
            6 => Some(Self::List),
            _ => None,
        }
    }
}

/// One record of a rule definition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Directive {
    /// What the record describes.
    pub kind: DirectiveType,
    /// Relative probability; always written as zero.
    pub probability: u16,
    /// Leaf id or grouping code, depending on `kind`.
    pub value: u32,
}

impl Directive {
    /// Opens a group of the given kind.
    pub fn start(grouping: Grouping) -> Self {
        Self::new(DirectiveType::StartOperation, grouping.code())
    }

    /// Closes a group of the given kind.
    pub fn end(grouping: Grouping) -> Self {
        Self::new(DirectiveType::EndOperation, grouping.code())
    }

    /// Refers to a word, rule or list by id.
    pub fn new(kind: DirectiveType, value: u32) -> Self {
        Self {
            kind,
            probability: 0,
            value,
        }
    }

    /// The grouping opened or closed by this directive.
    pub fn grouping(&self) -> Option<Grouping> {
        match self.kind {
            DirectiveType::StartOperation | DirectiveType::EndOperation => {
                Grouping::from_code(self.value)
            }
            _ => None,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.kind.code().to_le_bytes());
        out.extend_from_slice(&self.probability.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.grouping() {
            Some(grouping) => write!(f, "{} {}", self.kind, grouping),
            None => write!(f, "{} {}", self.kind, self.value),
        }
    }
}

impl Grammar {
    /// Serializes all of the grammar's rules into the engine's binary grammar format.
    ///
    /// Fails if a rule refers to a rule that is not registered.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }
}

/// Serializes all of the grammar's rules into the engine's binary grammar format.
pub fn serialize(grammar: &Grammar) -> Result<Vec<u8>> {
    let state = grammar.state();

    let tables = state
        .rules
        .iter()
        .map(|rule| directive::definition_table(&state, rule))
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::new();
    out.extend_from_slice(&SRHDRTYPE_CFG.to_le_bytes());
    out.extend_from_slice(&SRHDRFLAG_UNICODE.to_le_bytes());

    let rule_names = state.rules.iter().map(|rule| (rule.id, rule.name.as_str()));
    write_chunk(&mut out, ChunkTag::ExportRules, &names::encode(rule_names));

    let words = state.words.iter().zip(1u32..).map(|(word, id)| (id, word.as_str()));
    write_chunk(&mut out, ChunkTag::Words, &names::encode(words));

    write_chunk(&mut out, ChunkTag::Rules, &directive::encode(&tables));

    debug!(
        grammar = %grammar.info().name,
        rules = tables.len(),
        words = state.words.len(),
        bytes = out.len(),
        "serialized grammar"
    );
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, tag: ChunkTag, chunk: &[u8]) {
    out.extend_from_slice(&tag.code().to_le_bytes());
    out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(chunk);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GrammarInfo;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn empty_grammar_has_header_and_empty_chunks() {
        let grammar = Grammar::detached(GrammarInfo::new("empty"));
        let bytes = grammar.serialize().unwrap();
        assert_eq!(bytes.len(), 8 + 3 * 8);
        assert_eq!(u32_at(&bytes, 0), SRHDRTYPE_CFG);
        assert_eq!(u32_at(&bytes, 4), SRHDRFLAG_UNICODE);
        assert_eq!(u32_at(&bytes, 8), ChunkTag::ExportRules.code());
        assert_eq!(u32_at(&bytes, 16), ChunkTag::Words.code());
        assert_eq!(u32_at(&bytes, 24), ChunkTag::Rules.code());
    }

    #[test]
    fn directives_are_eight_bytes() {
        let mut out = Vec::new();
        Directive::start(Grouping::Optional).write_to(&mut out);
        assert_eq!(out, [1, 0, 0, 0, 4, 0, 0, 0]);
        assert_eq!(
            Directive::start(Grouping::Optional).to_string(),
            "SRCFG_STARTOPERATION OPTIONAL"
        );
        assert_eq!(Directive::new(DirectiveType::Word, 7).to_string(), "SRCFG_WORD 7");
    }
}

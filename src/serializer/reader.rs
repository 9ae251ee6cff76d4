use crate::{Error, Result};

use super::{ChunkTag, Directive, DirectiveType, DIRECTIVE_LEN, SRHDRFLAG_UNICODE, SRHDRTYPE_CFG};

/// The contents of a serialized grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledGrammar {
    /// Rule names as `(id, name)` pairs, in the order they were written.
    pub rule_names: Vec<(u32, String)>,
    /// Words as `(id, word)` pairs, in the order they were written.
    pub words: Vec<(u32, String)>,
    /// Rule definition tables, in the order they were written.
    pub rules: Vec<RuleTable>,
}

/// The definition table of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    /// Rule number, counted from 1.
    pub number: i32,
    /// The flattened rule tree.
    pub directives: Vec<Directive>,
}

/// Parses a grammar produced by [`serialize`](super::serialize).
///
/// Every chunk must appear exactly once. Trailing padding after a name is ignored.
pub fn read(bytes: &[u8]) -> Result<CompiledGrammar> {
    let mut cursor = Cursor::new(bytes, 0);

    let kind = cursor.u32()?;
    if kind != SRHDRTYPE_CFG {
        return Err(cursor.malformed(format!("unsupported header type {}", kind)));
    }
    let flags = cursor.u32()?;
    if flags & SRHDRFLAG_UNICODE == 0 {
        return Err(cursor.malformed("names are not UTF-16"));
    }

    let mut rule_names = None;
    let mut words = None;
    let mut rules = None;
    while !cursor.is_empty() {
        let code = cursor.u32()?;
        let tag = ChunkTag::from_code(code)
            .ok_or_else(|| cursor.malformed(format!("unknown chunk tag {}", code)))?;
        let len = cursor.u32()? as usize;
        let mut chunk = cursor.take(len)?;

        let slot_taken = match tag {
            ChunkTag::ExportRules => rule_names.replace(read_names(&mut chunk)?).is_some(),
            ChunkTag::Words => words.replace(read_names(&mut chunk)?).is_some(),
            ChunkTag::Rules => rules.replace(read_rules(&mut chunk)?).is_some(),
        };
        if slot_taken {
            return Err(cursor.malformed(format!("duplicate {} chunk", tag)));
        }
    }

    let missing = |tag: ChunkTag| Error::Malformed {
        offset: bytes.len(),
        reason: format!("missing {} chunk", tag),
    };
    Ok(CompiledGrammar {
        rule_names: rule_names.ok_or_else(|| missing(ChunkTag::ExportRules))?,
        words: words.ok_or_else(|| missing(ChunkTag::Words))?,
        rules: rules.ok_or_else(|| missing(ChunkTag::Rules))?,
    })
}

fn read_names(chunk: &mut Cursor<'_>) -> Result<Vec<(u32, String)>> {
    let mut names = Vec::new();
    while !chunk.is_empty() {
        let len = chunk.u32()? as usize;
        let id = chunk.u32()?;
        let name_len = len
            .checked_sub(8)
            .ok_or_else(|| chunk.malformed(format!("name entry length {} is too short", len)))?;
        let mut name = chunk.take(name_len)?;

        let mut units = Vec::with_capacity(name_len / 2);
        while !name.is_empty() {
            match name.u16()? {
                0 => break,
                unit => units.push(unit),
            }
        }
        let name = String::from_utf16(&units)
            .map_err(|_| chunk.malformed(format!("name {} is not valid UTF-16", id)))?;
        names.push((id, name));
    }
    Ok(names)
}

fn read_rules(chunk: &mut Cursor<'_>) -> Result<Vec<RuleTable>> {
    let mut rules = Vec::new();
    while !chunk.is_empty() {
        let len = chunk.i32()?;
        let number = chunk.i32()?;
        let body = usize::try_from(len)
            .ok()
            .and_then(|len| len.checked_sub(4))
            .filter(|body| body % DIRECTIVE_LEN == 0)
            .ok_or_else(|| chunk.malformed(format!("rule table length {} is invalid", len)))?;

        let mut table = chunk.take(body)?;
        let mut directives = Vec::with_capacity(body / DIRECTIVE_LEN);
        while !table.is_empty() {
            let code = table.u16()?;
            let kind = DirectiveType::from_code(code)
                .ok_or_else(|| table.malformed(format!("unknown directive type {}", code)))?;
            let probability = table.u16()?;
            let value = table.u32()?;
            directives.push(Directive {
                kind,
                probability,
                value,
            });
        }
        rules.push(RuleTable {
            number,
            directives,
        });
    }
    Ok(rules)
}

/// Reads little-endian values from a slice, remembering the absolute offset for error reports.
struct Cursor<'b> {
    bytes: &'b [u8],
    offset: usize,
}

impl<'b> Cursor<'b> {
    fn new(bytes: &'b [u8], offset: usize) -> Self {
        Self {
            bytes,
            offset,
        }
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn malformed<S: Into<String>>(&self, reason: S) -> Error {
        Error::Malformed {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn take(&mut self, len: usize) -> Result<Cursor<'b>> {
        if self.bytes.len() < len {
            return Err(self.malformed(format!(
                "needed {} bytes, only {} left",
                len,
                self.bytes.len()
            )));
        }
        let bytes = self.bytes;
        let (head, tail) = bytes.split_at(len);
        let taken = Cursor::new(head, self.offset);
        self.bytes = tail;
        self.offset += len;
        Ok(taken)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?.bytes);
        Ok(array)
    }

    fn u16(&mut self) -> Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32> {
        self.array().map(i32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Grammar, GrammarInfo, Grouping};

    #[test]
    fn reads_back_serialized_grammar() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        grammar.add_rule("greet", |r| r.say("Hello").optionally_say("there")).unwrap();
        let compiled = read(&grammar.serialize().unwrap()).unwrap();

        assert_eq!(compiled.rule_names, [(1, "greet".to_string())]);
        assert_eq!(compiled.words, [(1, "Hello".to_string()), (2, "there".to_string())]);
        assert_eq!(compiled.rules.len(), 1);
        assert_eq!(compiled.rules[0].number, 1);
        assert_eq!(
            compiled.rules[0].directives,
            [
                Directive::start(Grouping::Sequence),
                Directive::new(DirectiveType::Word, 1),
                Directive::start(Grouping::Optional),
                Directive::new(DirectiveType::Word, 2),
                Directive::end(Grouping::Optional),
                Directive::end(Grouping::Sequence),
            ]
        );
    }

    #[test]
    fn truncated_input_reports_offset() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        grammar.add_rule("greet", |r| r.say("Hello")).unwrap();
        let bytes = grammar.serialize().unwrap();
        match read(&bytes[..bytes.len() - 3]) {
            Err(Error::Malformed {
                offset, ..
            }) => assert!(offset < bytes.len()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_chunks_and_directives() {
        let mut bytes = vec![0, 0, 0, 0, 1, 0, 0, 0];
        bytes.extend_from_slice(&9u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(read(&bytes), Err(Error::Malformed { offset: 12, .. })));

        let mut bytes = vec![0, 0, 0, 0, 1, 0, 0, 0];
        for tag in [ChunkTag::ExportRules, ChunkTag::Words] {
            bytes.extend_from_slice(&tag.code().to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
        }
        bytes.extend_from_slice(&ChunkTag::Rules.code().to_le_bytes());
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&12i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&[5, 0, 0, 0, 1, 0, 0, 0]);
        assert!(matches!(read(&bytes), Err(Error::Malformed { .. })));
    }

    #[test]
    fn missing_chunk_is_an_error() {
        let bytes = [0, 0, 0, 0, 1, 0, 0, 0];
        assert!(matches!(read(&bytes), Err(Error::Malformed { offset: 8, .. })));
    }
}

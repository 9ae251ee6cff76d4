use tracing::trace;

use crate::grammar::GrammarState;
use crate::{Element, Error, Result, Rule};

use super::{Directive, DirectiveType, DIRECTIVE_LEN};

/// Flattens a rule's tree into its definition table.
pub(crate) fn definition_table(state: &GrammarState, rule: &Rule) -> Result<Vec<Directive>> {
    let mut builder = TableBuilder {
        state,
        rule,
        directives: Vec::new(),
    };
    let root = rule.root();
    // Several top-level elements form an implicit sequence, which the format requires to be
    // spelled out.
    let wrap = match root.grouping() {
        Some(grouping) if root.grammar_children() > 1 => Some(grouping),
        _ => None,
    };

    if let Some(grouping) = wrap {
        builder.directives.push(Directive::start(grouping));
    }
    builder.build(root.children())?;
    if let Some(grouping) = wrap {
        builder.directives.push(Directive::end(grouping));
    }
    Ok(builder.directives)
}

/// Encodes the definition tables of all rules, numbering them from 1.
pub(crate) fn encode(tables: &[Vec<Directive>]) -> Vec<u8> {
    let mut out = Vec::new();
    for (number, table) in (1i32..).zip(tables) {
        let length = (table.len() * DIRECTIVE_LEN + 4) as i32;
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&number.to_le_bytes());
        for directive in table {
            trace!(rule = number, "{}", directive);
            directive.write_to(&mut out);
        }
    }
    out
}

struct TableBuilder<'s> {
    state: &'s GrammarState,
    rule: &'s Rule,
    directives: Vec<Directive>,
}

impl<'s> TableBuilder<'s> {
    fn build(&mut self, elements: &[Element]) -> Result<()> {
        for element in elements {
            match element {
                Element::Action(_) => {}
                Element::Word(word) => {
                    let id = self.resolve(word, self.state.word_id(word))?;
                    self.directives.push(Directive::new(DirectiveType::Word, id));
                }
                Element::RuleReference(name) => {
                    let id = self.resolve(name, self.state.rule_id(name))?;
                    self.directives.push(Directive::new(DirectiveType::Rule, id));
                }
                Element::ListReference(name) => {
                    let id = self.resolve(name, self.state.list_id(name))?;
                    self.directives.push(Directive::new(DirectiveType::List, id));
                }
                Element::Sequence(children)
                | Element::Alternatives(children)
                | Element::Optional(children)
                | Element::Repeat(children) => {
                    let grouping = element.grouping().filter(|_| element.grammar_children() > 0);
                    if let Some(grouping) = grouping {
                        self.directives.push(Directive::start(grouping));
                    }
                    self.build(children)?;
                    if let Some(grouping) = grouping {
                        self.directives.push(Directive::end(grouping));
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str, id: Option<u32>) -> Result<u32> {
        id.ok_or_else(|| Error::UnresolvedReference {
            rule: self.rule.name().to_string(),
            reference: name.to_string(),
        })
    }
}

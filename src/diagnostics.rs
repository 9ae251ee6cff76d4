//! Human-readable rendering of grammars.
//!
//! The binary format is what the engine consumes, but it is hard to inspect. [`render`] writes the
//! same rules as an XML document in the style of the engine's text grammar format:
//!
//! | Element            | XML                              |
//! |--------------------|----------------------------------|
//! | word               | `<P>word</P>`                    |
//! | sequence           | `<P>...</P>`                     |
//! | alternatives       | `<L>...</L>`                     |
//! | optional group     | `<O>...</O>`                     |
//! | repeated group     | `<P MIN="1" MAX="INF">...</P>`   |
//! | rule reference     | `<RULEREF NAME="rule"/>`         |
//! | list reference     | `<LIST NAME="list"/>`            |
//!
//! Actions have no textual form and are left out.

use xml::writer::XmlEvent;
use xml::{EmitterConfig, EventWriter};

use crate::grammar::GrammarState;
use crate::{Element, Grammar, Result, Rule};

impl Grammar {
    /// Renders the grammar's rules as an XML document. See the [`diagnostics`](crate::diagnostics)
    /// module for the format.
    pub fn to_xml(&self) -> Result<String> {
        render(self)
    }
}

/// Renders the grammar's rules as an XML document.
pub fn render(grammar: &Grammar) -> Result<String> {
    let state = grammar.state();
    let info = grammar.info();

    let mut writer = EventWriter::new_with_config(
        Vec::new(),
        EmitterConfig::new().perform_indent(true).write_document_declaration(false),
    );
    let mut start = XmlEvent::start_element("GRAMMAR").attr("NAME", &info.name);
    if !info.description.is_empty() {
        start = start.attr("DESCRIPTION", &info.description);
    }
    writer.write(start)?;
    for rule in &state.rules {
        write_rule(&mut writer, &state, rule)?;
    }
    writer.write(XmlEvent::end_element())?;

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_rule(writer: &mut EventWriter<Vec<u8>>, state: &GrammarState, rule: &Rule) -> Result<()> {
    let id = rule.id().to_string();
    let toplevel = if state.active.contains(&rule.id()) { "ACTIVE" } else { "INACTIVE" };
    writer.write(
        XmlEvent::start_element("RULE")
            .attr("ID", &id)
            .attr("NAME", rule.name())
            .attr("TOPLEVEL", toplevel),
    )?;
    for child in rule.root().children() {
        write_element(writer, child)?;
    }
    writer.write(XmlEvent::end_element())?;
    Ok(())
}

fn write_element(writer: &mut EventWriter<Vec<u8>>, element: &Element) -> Result<()> {
    let start = match element {
        Element::Action(_) => return Ok(()),
        Element::Word(word) => {
            writer.write(XmlEvent::start_element("P"))?;
            writer.write(XmlEvent::characters(word))?;
            writer.write(XmlEvent::end_element())?;
            return Ok(());
        }
        Element::RuleReference(name) => XmlEvent::start_element("RULEREF").attr("NAME", name),
        Element::ListReference(name) => XmlEvent::start_element("LIST").attr("NAME", name),
        Element::Sequence(_) => XmlEvent::start_element("P"),
        Element::Alternatives(_) => XmlEvent::start_element("L"),
        Element::Optional(_) => XmlEvent::start_element("O"),
        Element::Repeat(_) => XmlEvent::start_element("P").attr("MIN", "1").attr("MAX", "INF"),
    };
    writer.write(start)?;
    for child in element.children() {
        write_element(writer, child)?;
    }
    writer.write(XmlEvent::end_element())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Grammar, GrammarInfo};

    #[test]
    fn renders_rules_and_groups() {
        let grammar = Grammar::detached(GrammarInfo::new("demo").with_description("Demo grammar"));
        grammar.add_rule("inner", |r| r.say("good")).unwrap();
        grammar
            .add_rule("outer", |r| {
                r.say("say").optionally_with_rule("inner").repeat(&|r| r.say_one_of(["a", "b"]))
            })
            .unwrap();
        grammar.activate_rule("outer").unwrap();

        let xml = grammar.to_xml().unwrap();
        assert!(xml.starts_with("<GRAMMAR NAME=\"demo\" DESCRIPTION=\"Demo grammar\">"));
        assert!(xml.contains("<RULE ID=\"1\" NAME=\"inner\" TOPLEVEL=\"INACTIVE\">"));
        assert!(xml.contains("<RULE ID=\"2\" NAME=\"outer\" TOPLEVEL=\"ACTIVE\">"));
        assert!(xml.contains("<RULEREF NAME=\"inner\" />"));
        assert!(xml.contains("<P MIN=\"1\" MAX=\"INF\">"));
        assert!(xml.contains("<L>"));
        assert!(xml.contains("<P>good</P>"));
    }
}

use std::collections::HashMap;
use std::slice;

use tracing::{trace, warn};

use super::rule::{Callback, Element, Rule};

/// Rule references nested deeper than this fail to match. Guards against rules that refer to
/// themselves without consuming a word first.
pub const MAX_REFERENCE_DEPTH: usize = 64;

/// A callback together with the words it should receive.
pub(crate) type Invocation = (Callback, Vec<String>);

/// Recognized words, consumed from the front.
struct WordStack<'w> {
    words: &'w [String],
    pos: usize,
}

impl<'w> WordStack<'w> {
    fn new(words: &'w [String]) -> Self {
        Self {
            words,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'w String> {
        self.words.get(self.pos)
    }

    fn pop(&mut self) -> Option<&'w String> {
        let word = self.peek()?;
        self.pos += 1;
        Some(word)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.words.len()
    }
}

/// Read-only view of a grammar's tables that walks rule trees against recognized words.
pub(crate) struct Matcher<'g> {
    pub rules: &'g [Rule],
    pub rule_ids: &'g HashMap<String, u32>,
    pub lists: &'g HashMap<String, Vec<String>>,
}

impl<'g> Matcher<'g> {
    /// Matches the words against the rule. Succeeds only if every word is consumed, in which case
    /// the callbacks to invoke are returned in tree order.
    pub fn match_rule(&self, rule: &Rule, words: &[String]) -> Option<Vec<Invocation>> {
        let mut stack = WordStack::new(words);
        let mut calls = Vec::new();
        let mut buffer = Vec::new();
        let root = slice::from_ref(&rule.root);
        let matched = self.walk(root, &mut stack, &mut calls, &mut buffer, 0);
        if !matched {
            trace!(rule = %rule.name, "rule did not match");
            return None;
        }
        if !stack.is_empty() {
            trace!(rule = %rule.name, leftover = stack.words.len() - stack.pos, "words left over");
            return None;
        }
        Some(calls)
    }

    /// Walks the elements in order. On success, the words consumed by this container are appended
    /// to `buffer`.
    fn walk(
        &self,
        elements: &[Element],
        stack: &mut WordStack,
        calls: &mut Vec<Invocation>,
        buffer: &mut Vec<String>,
        depth: usize,
    ) -> bool {
        let mut consumed = Vec::new();
        for element in elements {
            if !self.step(element, stack, calls, &mut consumed, depth) {
                return false;
            }
        }
        buffer.append(&mut consumed);
        true
    }

    /// Like `walk`, but leaves the stack and the recorded callbacks untouched when it fails.
    fn attempt(
        &self,
        elements: &[Element],
        stack: &mut WordStack,
        calls: &mut Vec<Invocation>,
        buffer: &mut Vec<String>,
        depth: usize,
    ) -> bool {
        let pos = stack.pos;
        let recorded = calls.len();
        if self.walk(elements, stack, calls, buffer, depth) {
            return true;
        }
        stack.pos = pos;
        calls.truncate(recorded);
        false
    }

    fn step(
        &self,
        element: &Element,
        stack: &mut WordStack,
        calls: &mut Vec<Invocation>,
        consumed: &mut Vec<String>,
        depth: usize,
    ) -> bool {
        match element {
            Element::Word(word) => match stack.peek() {
                Some(next) if same_word(word, next) => {
                    stack.pop();
                    consumed.push(next.clone());
                    true
                }
                _ => false,
            },
            Element::ListReference(name) => {
                let list = self.lists.get(&name.to_lowercase());
                match (list, stack.peek()) {
                    (Some(list), Some(next)) if list.iter().any(|w| same_word(w, next)) => {
                        stack.pop();
                        consumed.push(next.clone());
                        true
                    }
                    _ => false,
                }
            }
            Element::RuleReference(name) => {
                if depth >= MAX_REFERENCE_DEPTH {
                    warn!(rule = %name, depth, "rule references nested too deeply");
                    return false;
                }
                match self.lookup(name) {
                    Some(rule) => {
                        self.walk(slice::from_ref(&rule.root), stack, calls, consumed, depth + 1)
                    }
                    None => {
                        warn!(rule = %name, "reference to unknown rule");
                        false
                    }
                }
            }
            Element::Optional(content) => {
                self.attempt(content, stack, calls, consumed, depth);
                true
            }
            // A bare action is not a branch; the engine never sees it.
            Element::Alternatives(branches) => branches
                .iter()
                .filter(|branch| branch.is_grammar())
                .any(|branch| self.attempt(slice::from_ref(branch), stack, calls, consumed, depth)),
            Element::Repeat(content) => {
                let mut repetitions = 0;
                loop {
                    let pos = stack.pos;
                    if !self.attempt(content, stack, calls, consumed, depth) {
                        break;
                    }
                    repetitions += 1;
                    if stack.pos == pos {
                        break;
                    }
                }
                repetitions > 0
            }
            Element::Sequence(children) => self.walk(children, stack, calls, consumed, depth),
            Element::Action(action) => {
                calls.push((action.callback(), std::mem::take(consumed)));
                true
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<&'g Rule> {
        let id = *self.rule_ids.get(&name.to_lowercase())?;
        self.rules.get(usize::try_from(id).ok()?.checked_sub(1)?)
    }
}

pub(crate) fn same_word(expected: &str, spoken: &str) -> bool {
    expected == spoken || expected.to_lowercase() == spoken.to_lowercase()
}

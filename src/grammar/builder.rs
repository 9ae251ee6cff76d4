use std::mem;

use crate::Error;

use super::rule::{Action, Element, Grouping};

/// A sub-builder passed to one of the grouping combinators. It receives the same builder, with
/// the group as its current container.
pub type Branch<'b> = &'b dyn Fn(&mut RuleBuilder) -> &mut RuleBuilder;

/// Helper type that describes the element tree of a rule through a chain of combinator calls.
///
/// Consecutive calls form a sequence:
/// ```
/// # use command_grammar::RuleBuilder;
/// let mut builder = RuleBuilder::new();
/// builder
///     .say("move")
///     .one_of(&[&|r| r.say("left"), &|r| r.say("right")])
///     .optionally(&|r| r.say("quickly"));
/// let tree = builder.build().unwrap();
/// ```
/// Given this rule, the engine will recognize "move left", "move right quickly" and so on.
///
/// Combinators that are misused (for example, a choice with a single branch) do not fail
/// immediately. The first such error is kept and reported by [`build`](RuleBuilder::build).
pub struct RuleBuilder {
    current: Frame,
    saved: Vec<Frame>,
    chain: Chain,
    saved_chains: Vec<Chain>,
    error: Option<Error>,
}

struct Frame {
    grouping: Grouping,
    children: Vec<Element>,
}

impl Frame {
    fn new(grouping: Grouping) -> Self {
        Self {
            grouping,
            children: Vec::new(),
        }
    }

    fn into_element(self) -> Element {
        self.grouping.into_element(self.children)
    }
}

/// Tracks consecutive appends to the current container. `start` is the index of the chain's
/// first element, which turns into a sequence once a second element arrives. Once `promoted`,
/// everything the chain receives goes into that sequence.
#[derive(Clone, Copy, Default)]
struct Chain {
    count: usize,
    start: usize,
    promoted: bool,
}

impl RuleBuilder {
    /// Constructs a new builder whose top-level container is a sequence.
    pub fn new() -> Self {
        Self {
            current: Frame::new(Grouping::Sequence),
            saved: Vec::new(),
            chain: Chain::default(),
            saved_chains: Vec::new(),
            error: None,
        }
    }

    /// Appends a word to recognize.
    pub fn say<S: Into<String>>(&mut self, word: S) -> &mut Self {
        self.append(Element::Word(word.into()))
    }

    /// Appends a choice between the given words. A single word is appended as is. Giving no words
    /// at all is an error.
    pub fn say_one_of<I, S>(&mut self, words: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<Element> =
            words.into_iter().map(|w| Element::Word(w.into())).collect();
        match words.len() {
            0 => self.fail("say_one_of", 0),
            1 => {
                let word = words.remove(0);
                self.append(word)
            }
            _ => self.append(Element::Alternatives(words)),
        }
    }

    /// Appends a word that may be skipped.
    pub fn optionally_say<S: Into<String>>(&mut self, word: S) -> &mut Self {
        self.append(Element::Optional(vec![Element::Word(word.into())]))
    }

    /// Appends a reference to another rule of the grammar.
    pub fn with_rule<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.append(Element::RuleReference(name.into()))
    }

    /// Appends a reference to another rule of the grammar that may be skipped.
    pub fn optionally_with_rule<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.append(Element::Optional(vec![Element::RuleReference(name.into())]))
    }

    /// Appends a reference to a word list whose contents are supplied separately.
    pub fn with_list<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.append(Element::ListReference(name.into()))
    }

    /// Appends a choice between the given groups. At least two branches are required.
    pub fn one_of(&mut self, branches: &[Branch]) -> &mut Self {
        if branches.len() < 2 {
            return self.fail("one_of", branches.len());
        }
        self.group(Grouping::Alternatives, branches, None)
    }

    /// Appends a group that may be skipped.
    pub fn optionally(&mut self, branch: Branch) -> &mut Self {
        self.group(Grouping::Optional, &[branch], None)
    }

    /// Appends a choice between the given groups that may be skipped altogether.
    pub fn optionally_one_of(&mut self, branches: &[Branch]) -> &mut Self {
        if branches.len() < 2 {
            return self.fail("optionally_one_of", branches.len());
        }
        self.group(Grouping::Alternatives, branches, Some(Grouping::Optional))
    }

    /// Appends a group that must be recognized one or more times.
    pub fn repeat(&mut self, branch: Branch) -> &mut Self {
        self.group(Grouping::Repeat, &[branch], None)
    }

    /// Appends a choice between the given groups that must be recognized one or more times. Every
    /// repetition may choose a different branch.
    pub fn repeat_one_of(&mut self, branches: &[Branch]) -> &mut Self {
        if branches.len() < 2 {
            return self.fail("repeat_one_of", branches.len());
        }
        self.group(Grouping::Alternatives, branches, Some(Grouping::Repeat))
    }

    /// Attaches a callback right after the most recently appended element. When an utterance
    /// matches the rule, the callback receives the words recognized since the previous callback in
    /// the same group.
    ///
    /// Inside a choice, the callback stays part of its branch: a branch holding one element and a
    /// callback becomes a sequence of the two.
    pub fn action<F: Fn(&[String]) + Send + Sync + 'static>(&mut self, f: F) -> &mut Self {
        let action = Element::Action(Action::new(f));
        let children = &mut self.current.children;
        if self.chain.promoted {
            if let Some(Element::Sequence(seq)) = children.get_mut(self.chain.start) {
                seq.push(action);
                return self;
            }
        }
        if self.current.grouping == Grouping::Alternatives {
            // Each child of a choice is a branch.
            if self.chain.count == 0 {
                self.chain.start = children.len();
            }
            let mut seq = children.split_off(self.chain.start);
            seq.push(action);
            children.push(Element::Sequence(seq));
            self.chain.promoted = true;
            return self;
        }
        children.push(action);
        self
    }

    /// Finishes the rule and returns its top-level container, or the first error recorded while
    /// describing it.
    pub fn build(self) -> Result<Element, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.current.into_element()),
        }
    }

    fn group(
        &mut self,
        grouping: Grouping,
        branches: &[Branch],
        wrap: Option<Grouping>,
    ) -> &mut Self {
        self.saved.push(mem::replace(&mut self.current, Frame::new(grouping)));
        self.saved_chains.push(self.chain);

        for branch in branches {
            self.chain = Chain::default();
            branch(self);
        }

        self.chain = self.saved_chains.pop().unwrap_or_default();
        let parent = self.saved.pop().unwrap_or_else(|| Frame::new(Grouping::Sequence));
        let mut group = mem::replace(&mut self.current, parent).into_element();
        if let Some(outer) = wrap {
            group = outer.into_element(vec![group]);
        }
        self.append(group)
    }

    fn append(&mut self, element: Element) -> &mut Self {
        let children = &mut self.current.children;
        if self.chain.promoted {
            match children.get_mut(self.chain.start) {
                Some(Element::Sequence(seq)) => seq.push(element),
                _ => children.push(element),
            }
        } else if self.chain.count == 0 {
            self.chain.start = children.len();
            children.push(element);
        } else {
            // The chain's first element (and any action attached to it) moves into a new
            // sequence together with the incoming one.
            let mut seq = children.split_off(self.chain.start);
            seq.push(element);
            children.push(Element::Sequence(seq));
            self.chain.promoted = true;
        }
        self.chain.count += 1;
        self
    }

    fn fail(&mut self, combinator: &'static str, count: usize) -> &mut Self {
        if self.error.is_none() {
            self.error = Some(Error::InvalidBranchCount { combinator, count });
        }
        self
    }
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

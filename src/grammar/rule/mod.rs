use std::fmt;
use std::sync::Arc;

use strum_macros::Display;

/// A function invoked with the words recognized for the part of a rule that precedes it.
pub type Callback = Arc<dyn Fn(&[String]) + Send + Sync>;

/// A callback attached to a point in a rule. Has no meaning to the recognition engine.
#[derive(Clone)]
pub struct Action(Callback);

impl Action {
    /// Wraps the given function.
    pub fn new<F: Fn(&[String]) + Send + Sync + 'static>(f: F) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback with the given words.
    pub fn invoke(&self, words: &[String]) {
        (self.0)(words)
    }

    pub(crate) fn callback(&self) -> Callback {
        self.0.clone()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

/// The kind of a container element. The discriminants are the grouping codes used by the binary
/// grammar format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Grouping {
    /// Children must be recognized in order.
    #[strum(serialize = "SEQUENCE")]
    Sequence = 1,
    /// Exactly one of the children must be recognized.
    #[strum(serialize = "ALTERNATIVE")]
    Alternatives = 2,
    /// The content must be recognized one or more times.
    #[strum(serialize = "REPEAT")]
    Repeat = 3,
    /// The content may be recognized or skipped.
    #[strum(serialize = "OPTIONAL")]
    Optional = 4,
}

impl Grouping {
    /// The grouping code written to start and end directives.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Looks up the grouping with the given code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Sequence),
            2 => Some(Self::Alternatives),
            3 => Some(Self::Repeat),
            4 => Some(Self::Optional),
            _ => None,
        }
    }

    /// Creates a container of this kind holding the given children.
    pub fn into_element(self, children: Vec<Element>) -> Element {
        match self {
            Self::Sequence => Element::Sequence(children),
            Self::Alternatives => Element::Alternatives(children),
            Self::Repeat => Element::Repeat(children),
            Self::Optional => Element::Optional(children),
        }
    }
}

/// A node in the tree that describes a rule.
///
/// Optional and repeated groups hold their content as a list of children that must be recognized
/// in order, the same way a sequence does.
#[derive(Debug, Clone)]
pub enum Element {
    /// A literal word
    Word(String),
    /// A reference to another rule of the same grammar, by name
    RuleReference(String),
    /// A reference to a list of words, by name
    ListReference(String),
    /// Elements that must be recognized in order
    Sequence(Vec<Element>),
    /// Elements to choose one from
    Alternatives(Vec<Element>),
    /// Content that may be skipped
    Optional(Vec<Element>),
    /// Content that must be recognized at least once
    Repeat(Vec<Element>),
    /// A callback attachment point
    Action(Action),
}

impl Element {
    /// The children of a container, or an empty slice for leaves.
    pub fn children(&self) -> &[Element] {
        match self {
            Self::Sequence(children)
            | Self::Alternatives(children)
            | Self::Optional(children)
            | Self::Repeat(children) => children,
            Self::Word(_)
            | Self::RuleReference(_)
            | Self::ListReference(_)
            | Self::Action(_) => &[],
        }
    }

    /// Whether this is a container holding at least one child.
    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// The kind of container, or `None` for leaves.
    pub fn grouping(&self) -> Option<Grouping> {
        match self {
            Self::Sequence(_) => Some(Grouping::Sequence),
            Self::Alternatives(_) => Some(Grouping::Alternatives),
            Self::Optional(_) => Some(Grouping::Optional),
            Self::Repeat(_) => Some(Grouping::Repeat),
            _ => None,
        }
    }

    /// The text backing a word, rule reference or list reference.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Word(name) | Self::RuleReference(name) | Self::ListReference(name) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    /// Whether this element means something to the recognition engine, i.e. it is not an action.
    pub fn is_grammar(&self) -> bool {
        !matches!(self, Self::Action(_))
    }

    /// Number of children that are not actions.
    pub fn grammar_children(&self) -> usize {
        self.children().iter().filter(|child| child.is_grammar()).count()
    }
}

/// A named rule registered with a grammar.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) root: Element,
}

impl Rule {
    /// The numeric id assigned to the rule when it was registered, starting from 1.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The rule's name, in lower case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The top-level container of the rule.
    pub fn root(&self) -> &Element {
        &self.root
    }
}

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Fixed-vocabulary voice command grammars.
//!
//! # Features
//!
//! The goal of this crate is to let an application declare the spoken commands it understands, hand
//! them to a continuous-speech recognition engine in the engine's binary grammar format, and turn
//! the word sequences the engine recognizes back into application callbacks.
//!
//! ## Declaring grammars
//!
//! A [`Grammar`] is a set of named rules. Each rule is described with a [`RuleBuilder`] through a
//! chain of combinator calls:
//! ```
//! # use command_grammar::{Grammar, GrammarInfo};
//! let grammar = Grammar::detached(GrammarInfo::new("greetings"));
//! grammar
//!     .add_rule("greet", |r| {
//!         r.say("Hello")
//!             .optionally_say("Cheese")
//!             .say("Please")
//!             .action(|words| println!("heard {:?}", words))
//!     })
//!     .unwrap();
//! ```
//! Rules can refer to each other by name, and can be grouped into alternatives, optional groups
//! and repeated groups. Callbacks attached with [`action`](RuleBuilder::action) receive the words
//! that were recognized since the previous callback in the same group.
//!
//! ## Talking to the engine
//!
//! The crate does not bind to any particular recognition engine. Instead, a [`Grammar`] is
//! created with an implementation of [`GrammarService`], which receives the grammar when it is
//! loaded and is notified whenever a rule is activated or deactivated. The service is expected to
//! serialize the grammar with [`Grammar::serialize`] and hand the bytes to the engine.
//!
//! ## Dispatching recognitions
//!
//! When the engine recognizes an utterance, pass its words to [`Grammar::invoke`]. The active rules
//! are tried in registration order, and the callbacks of the first rule that consumes every word
//! are invoked.
//!
//! # Threading
//!
//! All operations are synchronous. A [`Grammar`] guards its tables with a single mutex, so it can
//! be shared between the thread that builds it and the engine's callback thread. Callbacks are
//! invoked after the lock is released, which means they are free to activate or deactivate rules
//! on the grammar that invoked them.

use std::fmt;

pub mod diagnostics;
mod grammar;
pub mod serializer;
mod service;

pub use grammar::{
    Action, Branch, Callback, Element, Grammar, GrammarInfo, Grouping, Rule, RuleBuilder,
    MAX_REFERENCE_DEPTH,
};
pub use service::{DetachedService, GrammarService};

/// The error type returned by grammar functions and methods.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rule name contains characters other than ASCII letters, digits and underscores.
    #[error("invalid rule name {0:?}: only letters, digits and underscores are allowed")]
    InvalidRuleName(String),

    /// A rule with the same (case-insensitive) name is already registered.
    #[error("grammar already contains a rule called {0:?}")]
    DuplicateRule(String),

    /// A choice combinator was given fewer than two branches.
    #[error("{combinator} requires at least two branches, got {count}")]
    InvalidBranchCount {
        /// Name of the offending combinator.
        combinator: &'static str,
        /// Number of branches it received.
        count: usize,
    },

    /// The rule builder produced no grammar elements.
    #[error("rule {0:?} does not contain any words or references")]
    EmptyRule(String),

    /// The named rule is not registered with the grammar.
    #[error("grammar does not contain a rule called {0:?}")]
    UnknownRule(String),

    /// The numeric rule id is not assigned in the grammar.
    #[error("grammar does not contain a rule with id {0}")]
    InvalidRuleId(u32),

    /// An utterance was dispatched while no rule was active.
    #[error("no active rules to match {}", Words(.words))]
    NoActiveRules {
        /// The recognized words.
        words: Vec<String>,
    },

    /// None of the attempted rules matched the utterance.
    #[error("invalid word sequence {} for rules {rules:?}", Words(.words))]
    InvalidWordSequence {
        /// The recognized words.
        words: Vec<String>,
        /// Names of the rules that were attempted, in the order they were attempted.
        rules: Vec<String>,
    },

    /// A rule refers to another rule that is not registered.
    #[error("rule {rule:?} refers to unknown rule {reference:?}")]
    UnresolvedReference {
        /// The rule containing the reference.
        rule: String,
        /// The name that could not be resolved.
        reference: String,
    },

    /// A serialized grammar could not be parsed.
    #[error("malformed grammar data at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset at which parsing failed.
        offset: usize,
        /// What was wrong with the data.
        reason: String,
    },

    /// The engine collaborator reported a failure.
    #[error("grammar service error: {0}")]
    Service(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Rendering the grammar as XML failed.
    #[error("failed to render grammar: {0}")]
    Render(#[from] xml::writer::Error),
}

/// The type returned by grammar functions and methods.
pub type Result<T> = std::result::Result<T, Error>;

struct Words<'w>(&'w [String]);

impl<'w> fmt::Display for Words<'w> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.join(" "))
    }
}

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::service::{DetachedService, GrammarService};
use crate::{Error, Result};

mod builder;
mod matcher;
mod rule;

pub use builder::{Branch, RuleBuilder};
pub use matcher::MAX_REFERENCE_DEPTH;
pub use rule::{Action, Callback, Element, Grouping, Rule};

use matcher::{Invocation, Matcher};

static RULE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("rule name pattern is valid"));

/// Describes a grammar to the user and to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarInfo {
    /// Display name of the grammar.
    pub name: String,
    /// What the grammar's commands are for.
    pub description: String,
}

impl GrammarInfo {
    /// Creates a description with the given name and no description text.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    /// Sets the description text.
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}

/// A set of named rules that define the commands an application understands.
///
/// Rules are registered once, while the grammar is being set up. Afterwards, rules are activated
/// and deactivated as the application's state changes, and recognized utterances are dispatched
/// to the callbacks of the active rules with [`invoke`](Grammar::invoke).
///
/// Word, rule and list ids are assigned sequentially from 1, per grammar, in the order they are
/// first seen during registration.
pub struct Grammar {
    info: GrammarInfo,
    service: Arc<dyn GrammarService>,
    state: Mutex<GrammarState>,
}

#[derive(Default)]
pub(crate) struct GrammarState {
    pub(crate) rules: Vec<Rule>,
    pub(crate) rule_ids: HashMap<String, u32>,
    pub(crate) words: Vec<String>,
    pub(crate) word_ids: HashMap<String, u32>,
    pub(crate) lists: Vec<String>,
    pub(crate) list_ids: HashMap<String, u32>,
    pub(crate) list_words: HashMap<String, Vec<String>>,
    pub(crate) active: BTreeSet<u32>,
}

impl GrammarState {
    pub(crate) fn rule_id(&self, name: &str) -> Option<u32> {
        self.rule_ids.get(&name.to_lowercase()).copied()
    }

    pub(crate) fn word_id(&self, word: &str) -> Option<u32> {
        self.word_ids.get(&word.to_lowercase()).copied()
    }

    pub(crate) fn list_id(&self, name: &str) -> Option<u32> {
        self.list_ids.get(&name.to_lowercase()).copied()
    }

    fn rule(&self, id: u32) -> Option<&Rule> {
        self.rules.get(usize::try_from(id).ok()?.checked_sub(1)?)
    }

    fn matcher(&self) -> Matcher<'_> {
        Matcher {
            rules: &self.rules,
            rule_ids: &self.rule_ids,
            lists: &self.list_words,
        }
    }

    fn register(&mut self, name: String, root: Element) -> u32 {
        let mut words = Vec::new();
        let mut lists = Vec::new();
        collect_names(&root, &mut words, &mut lists);
        for word in words {
            assign_id(&mut self.words, &mut self.word_ids, word);
        }
        for list in lists {
            assign_id(&mut self.lists, &mut self.list_ids, list);
        }

        let id = next_id(self.rules.len());
        self.rule_ids.insert(name.clone(), id);
        self.rules.push(Rule {
            id,
            name,
            root,
        });
        id
    }
}

impl Grammar {
    /// Creates an empty grammar that reports to the given engine service.
    pub fn new(info: GrammarInfo, service: Arc<dyn GrammarService>) -> Self {
        Self {
            info,
            service,
            state: Mutex::new(GrammarState::default()),
        }
    }

    /// Creates an empty grammar that is not bound to any engine.
    pub fn detached(info: GrammarInfo) -> Self {
        Self::new(info, Arc::new(DetachedService))
    }

    /// The grammar's name and description.
    pub fn info(&self) -> &GrammarInfo {
        &self.info
    }

    /// Describes a rule with the given builder function and registers it under the given name.
    ///
    /// The name is case-insensitive and may only contain ASCII letters, digits and underscores.
    /// Every word in the rule that the grammar hasn't seen before is assigned the next word id, and
    /// then the rule itself is assigned the next rule id, which is returned. Rules may refer to
    /// rules that will be registered later.
    ///
    /// On error, the grammar is left unchanged.
    pub fn add_rule<F>(&self, name: &str, describe: F) -> Result<u32>
    where
        F: FnOnce(&mut RuleBuilder) -> &mut RuleBuilder,
    {
        if !RULE_NAME.is_match(name) {
            return Err(Error::InvalidRuleName(name.to_string()));
        }
        let name = name.to_lowercase();
        if self.state().rule_ids.contains_key(&name) {
            return Err(Error::DuplicateRule(name));
        }

        let mut builder = RuleBuilder::new();
        describe(&mut builder);
        let root = builder.build()?;
        if !has_grammar_elements(&root) {
            return Err(Error::EmptyRule(name));
        }

        let mut state = self.state();
        // The builder ran without the lock held, so check again.
        if state.rule_ids.contains_key(&name) {
            return Err(Error::DuplicateRule(name));
        }
        let id = state.register(name.clone(), root);
        debug!(
            grammar = %self.info.name,
            rule = %name,
            id,
            words = state.words.len(),
            "registered rule"
        );
        Ok(id)
    }

    /// Hands the grammar to the engine service so that its rules can be recognized.
    pub fn load(&self) -> Result<()> {
        info!(grammar = %self.info.name, rules = self.state().rules.len(), "loading grammar");
        self.service.load_grammar(self)
    }

    /// Asks the engine service to release the grammar.
    pub fn unload(&self) -> Result<()> {
        info!(grammar = %self.info.name, "unloading grammar");
        self.service.unload_grammar(self)?;
        self.state().active.clear();
        Ok(())
    }

    /// Makes the rule eligible for recognition. Activating a rule that is already active does
    /// nothing.
    pub fn activate_rule(&self, name: &str) -> Result<()> {
        let id = self.registered_id(name)?;
        if self.state().active.contains(&id) {
            debug!(grammar = %self.info.name, rule = %name, "rule already active");
            return Ok(());
        }
        self.service.activate_rule(self, &name.to_lowercase())?;
        self.state().active.insert(id);
        debug!(grammar = %self.info.name, rule = %name, "activated rule");
        Ok(())
    }

    /// Makes the rule ineligible for recognition, without unregistering it. Deactivating a rule
    /// that is not active does nothing.
    ///
    /// The engine may silently drop other active rules of the grammar when one of its rules is
    /// deactivated. Callers should re-assert every rule they want to keep active with
    /// [`reactivate_rule`](Grammar::reactivate_rule).
    pub fn deactivate_rule(&self, name: &str) -> Result<()> {
        let id = self.registered_id(name)?;
        if !self.state().active.contains(&id) {
            debug!(grammar = %self.info.name, rule = %name, "rule not active");
            return Ok(());
        }
        self.service.deactivate_rule(self, &name.to_lowercase())?;
        self.state().active.remove(&id);
        debug!(grammar = %self.info.name, rule = %name, "deactivated rule");
        Ok(())
    }

    /// Deactivates the rule and immediately activates it again, so that the engine's view of the
    /// rule's state matches the grammar's.
    pub fn reactivate_rule(&self, name: &str) -> Result<()> {
        self.deactivate_rule(name)?;
        self.activate_rule(name)
    }

    /// Asks the engine to recognize only this grammar's rules (`true`), or to go back to
    /// recognizing all loaded grammars (`false`).
    pub fn set_exclusive(&self, exclusive: bool) -> Result<()> {
        debug!(grammar = %self.info.name, exclusive, "setting grammar exclusivity");
        self.service.set_exclusive(self, exclusive)
    }

    /// Sets the words a list reference can stand for. Replaces the previous contents of the list.
    pub fn set_list<I, S>(&self, name: &str, words: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        debug!(grammar = %self.info.name, list = %name, words = words.len(), "setting list");
        self.state().list_words.insert(name.to_lowercase(), words);
    }

    /// Whether the named rule is currently active.
    pub fn is_active(&self, name: &str) -> bool {
        let state = self.state();
        state.rule_id(name).map_or(false, |id| state.active.contains(&id))
    }

    /// Names of the active rules, in rule id order.
    pub fn active_rules(&self) -> Vec<String> {
        let state = self.state();
        state
            .active
            .iter()
            .filter_map(|&id| state.rule(id))
            .map(|rule| rule.name.clone())
            .collect()
    }

    /// All registered rules, in rule id order.
    pub fn rules(&self) -> Vec<Rule> {
        self.state().rules.clone()
    }

    /// Id of the named rule.
    pub fn rule_id(&self, name: &str) -> Option<u32> {
        self.state().rule_id(name)
    }

    /// Id of the given word, looked up case-insensitively.
    pub fn word_id(&self, word: &str) -> Option<u32> {
        self.state().word_id(word)
    }

    /// The word table as `(id, word)` pairs in id order. Each word is spelled the way it was first
    /// registered.
    pub fn word_ids(&self) -> Vec<(u32, String)> {
        numbered(&self.state().words)
    }

    /// The rule table as `(id, name)` pairs in id order.
    pub fn rule_ids(&self) -> Vec<(u32, String)> {
        self.state().rules.iter().map(|rule| (rule.id, rule.name.clone())).collect()
    }

    /// The list table as `(id, name)` pairs in id order.
    pub fn list_ids(&self) -> Vec<(u32, String)> {
        numbered(&self.state().lists)
    }

    /// Matches recognized words against the active rules and invokes the callbacks of the first
    /// rule, in rule id order, that consumes every word. Returns the name of that rule.
    ///
    /// Each callback receives the words recognized since the previous callback in the same group.
    /// Callbacks run after the grammar's lock is released, so they may activate or deactivate
    /// rules.
    pub fn invoke<S: AsRef<str>>(&self, spoken: &[S]) -> Result<String> {
        let words: Vec<String> = spoken.iter().map(|w| w.as_ref().to_string()).collect();
        let (name, calls) = {
            let state = self.state();
            if state.active.is_empty() {
                return Err(Error::NoActiveRules {
                    words,
                });
            }

            let matcher = state.matcher();
            let mut attempted = Vec::new();
            let mut found = None;
            for rule in state.active.iter().filter_map(|&id| state.rule(id)) {
                attempted.push(rule.name.clone());
                if let Some(calls) = matcher.match_rule(rule, &words) {
                    found = Some((rule.name.clone(), calls));
                    break;
                }
            }
            match found {
                Some(found) => found,
                None => {
                    debug!(grammar = %self.info.name, words = ?words, "no rule matched");
                    return Err(Error::InvalidWordSequence {
                        words,
                        rules: attempted,
                    });
                }
            }
        };

        debug!(
            grammar = %self.info.name,
            rule = %name,
            callbacks = calls.len(),
            "matched utterance"
        );
        fire(calls);
        Ok(name)
    }

    /// Matches recognized words against the rule with the given id, whether it is active or not,
    /// and invokes its callbacks.
    pub fn invoke_rule<S: AsRef<str>>(&self, id: u32, spoken: &[S]) -> Result<()> {
        let words: Vec<String> = spoken.iter().map(|w| w.as_ref().to_string()).collect();
        let calls = {
            let state = self.state();
            let rule = state.rule(id).ok_or(Error::InvalidRuleId(id))?;
            match state.matcher().match_rule(rule, &words) {
                Some(calls) => calls,
                None => {
                    return Err(Error::InvalidWordSequence {
                        words,
                        rules: vec![rule.name.clone()],
                    })
                }
            }
        };
        fire(calls);
        Ok(())
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, GrammarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registered_id(&self, name: &str) -> Result<u32> {
        self.state().rule_id(name).ok_or_else(|| Error::UnknownRule(name.to_string()))
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Grammar")
            .field("info", &self.info)
            .field("rules", &state.rules.len())
            .field("words", &state.words.len())
            .field("active", &state.active)
            .finish()
    }
}

fn fire(calls: Vec<Invocation>) {
    for (callback, words) in calls {
        callback(&words);
    }
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len + 1).unwrap_or(u32::MAX)
}

fn assign_id(names: &mut Vec<String>, ids: &mut HashMap<String, u32>, name: String) {
    let key = name.to_lowercase();
    if !ids.contains_key(&key) {
        ids.insert(key, next_id(names.len()));
        names.push(name);
    }
}

fn numbered(names: &[String]) -> Vec<(u32, String)> {
    names.iter().enumerate().map(|(i, name)| (next_id(i), name.clone())).collect()
}

fn collect_names(element: &Element, words: &mut Vec<String>, lists: &mut Vec<String>) {
    match element {
        Element::Word(word) => words.push(word.clone()),
        Element::ListReference(list) => lists.push(list.clone()),
        Element::RuleReference(_) | Element::Action(_) => {}
        _ => {
            for child in element.children() {
                collect_names(child, words, lists);
            }
        }
    }
}

fn has_grammar_elements(element: &Element) -> bool {
    match element.grouping() {
        Some(_) => element.children().iter().any(has_grammar_elements),
        None => element.is_grammar(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_get_ids_in_first_seen_order() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        grammar.add_rule("first", |r| r.say("Hello").say("World")).unwrap();
        grammar.add_rule("second", |r| r.say("hello").say("again")).unwrap();

        assert_eq!(grammar.word_id("HELLO"), Some(1));
        assert_eq!(grammar.word_id("world"), Some(2));
        assert_eq!(grammar.word_id("again"), Some(3));
        assert_eq!(grammar.word_id("missing"), None);
        assert_eq!(
            grammar.word_ids(),
            [(1, "Hello".to_string()), (2, "World".to_string()), (3, "again".to_string())]
        );
    }

    #[test]
    fn rule_names_are_validated() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        assert!(matches!(
            grammar.add_rule("bad name", |r| r.say("x")),
            Err(Error::InvalidRuleName(_))
        ));
        assert!(matches!(grammar.add_rule("", |r| r.say("x")), Err(Error::InvalidRuleName(_))));
        assert_eq!(grammar.add_rule("Good_Name_1", |r| r.say("x")).unwrap(), 1);
        assert!(matches!(
            grammar.add_rule("good_name_1", |r| r.say("y")),
            Err(Error::DuplicateRule(_))
        ));
        assert_eq!(grammar.word_id("y"), None);
    }

    #[test]
    fn failed_registration_leaves_tables_alone() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        let result = grammar.add_rule("broken", |r| r.say("orphan").one_of(&[&|r| r.say("only")]));
        assert!(matches!(result, Err(Error::InvalidBranchCount { .. })));
        assert_eq!(grammar.word_id("orphan"), None);
        assert_eq!(grammar.rule_id("broken"), None);
        assert_eq!(grammar.add_rule("fixed", |r| r.say("orphan")).unwrap(), 1);
    }

    #[test]
    fn empty_rules_are_rejected() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        assert!(matches!(grammar.add_rule("nothing", |r| r), Err(Error::EmptyRule(_))));
        assert!(matches!(
            grammar.add_rule("only_action", |r| r.action(|_| {})),
            Err(Error::EmptyRule(_))
        ));
    }

    #[test]
    fn lists_are_numbered_like_words() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        grammar.add_rule("pick", |r| r.say("pick").with_list("Colours")).unwrap();
        assert_eq!(grammar.list_ids(), [(1, "Colours".to_string())]);
        assert_eq!(grammar.word_id("Colours"), None);
    }

    #[test]
    fn activation_requires_registration() {
        let grammar = Grammar::detached(GrammarInfo::new("test"));
        assert!(matches!(grammar.activate_rule("ghost"), Err(Error::UnknownRule(_))));
        grammar.add_rule("real", |r| r.say("x")).unwrap();
        grammar.activate_rule("REAL").unwrap();
        assert!(grammar.is_active("real"));
        grammar.deactivate_rule("real").unwrap();
        assert!(!grammar.is_active("real"));
        assert_eq!(grammar.rule_id("real"), Some(1));
    }
}

use crate::{Grammar, Result};

/// The recognition engine, as seen by a [`Grammar`].
///
/// Implementations bind grammars to a concrete engine. When a grammar is loaded, the service is
/// expected to serialize it with [`Grammar::serialize`] and pass the bytes to the engine's grammar
/// loading interface. Recognized utterances travel the other way: the service (or whoever receives
/// the engine's results) calls [`Grammar::invoke`] with the recognized words.
///
/// The grammar's lock is never held while a service method is called, so implementations are free
/// to query the grammar.
pub trait GrammarService: Send + Sync {
    /// Loads the grammar into the engine.
    fn load_grammar(&self, grammar: &Grammar) -> Result<()>;

    /// Releases the grammar from the engine.
    fn unload_grammar(&self, grammar: &Grammar) -> Result<()> {
        let _ = grammar;
        Ok(())
    }

    /// Makes the named rule of the grammar eligible for recognition.
    fn activate_rule(&self, grammar: &Grammar, rule_name: &str) -> Result<()>;

    /// Makes the named rule of the grammar ineligible for recognition.
    fn deactivate_rule(&self, grammar: &Grammar, rule_name: &str) -> Result<()>;

    /// Restricts recognition to this grammar's rules, or lifts the restriction.
    fn set_exclusive(&self, grammar: &Grammar, exclusive: bool) -> Result<()>;
}

/// A service for grammars that are not bound to an engine. Every operation succeeds without doing
/// anything, so rules can be activated and utterances dispatched by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedService;

impl GrammarService for DetachedService {
    fn load_grammar(&self, _grammar: &Grammar) -> Result<()> {
        Ok(())
    }

    fn activate_rule(&self, _grammar: &Grammar, _rule_name: &str) -> Result<()> {
        Ok(())
    }

    fn deactivate_rule(&self, _grammar: &Grammar, _rule_name: &str) -> Result<()> {
        Ok(())
    }

    fn set_exclusive(&self, _grammar: &Grammar, _exclusive: bool) -> Result<()> {
        Ok(())
    }
}

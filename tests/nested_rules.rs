use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use command_grammar::{Error, Grammar, GrammarInfo, MAX_REFERENCE_DEPTH};
use rstest::rstest;

fn counter(count: &Arc<AtomicUsize>) -> impl Fn(&[String]) + Send + Sync + 'static {
    let count = Arc::clone(count);
    move |_| {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

fn simple_nested() -> Grammar {
    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar.add_rule("outer", |r| r.say("Something").with_rule("inner")).unwrap();
    grammar.add_rule("inner", |r| r.say("Good")).unwrap();
    grammar.activate_rule("outer").unwrap();
    grammar
}

#[rstest]
#[case(&["Something", "Good"], true)]
#[case(&["Something", "Strange"], false)]
#[case(&["Something", "Good", "Extra"], false)]
#[case(&["Something", "Good", "To", "Eat"], false)]
#[case(&["Something"], false)]
fn simple_nested_rule(#[case] words: &[&str], #[case] accepted: bool) {
    let result = simple_nested().invoke(words);
    if accepted {
        assert_eq!(result.unwrap(), "outer");
    } else {
        assert!(matches!(result, Err(Error::InvalidWordSequence { .. })));
    }
}

#[rstest]
#[case(&["Something", "Good", "To", "Eat"], true)]
#[case(&["Something", "To", "Eat"], true)]
#[case(&["Something", "Good", "Eat"], false)]
fn optional_nested_rule(#[case] words: &[&str], #[case] accepted: bool) {
    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar
        .add_rule("outer", |r| {
            r.say("Something").optionally_with_rule("inner").say("To").say("Eat")
        })
        .unwrap();
    grammar.add_rule("inner", |r| r.say("Good")).unwrap();
    grammar.activate_rule("outer").unwrap();
    assert_eq!(grammar.invoke(words).is_ok(), accepted);
}

#[test]
fn complex_nested_rule_fires_inner_callbacks_only_when_used() {
    let inner_count = Arc::new(AtomicUsize::new(0));
    let outer_count = Arc::new(AtomicUsize::new(0));

    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar
        .add_rule("outer", |r| {
            r.say("Something")
                .optionally_with_rule("inner")
                .say("To")
                .say("Eat")
                .action(counter(&outer_count))
        })
        .unwrap();
    grammar
        .add_rule("inner", |r| {
            r.say_one_of(["Good", "Awesome", "Great"])
                .action(counter(&inner_count))
                .optionally(&|o| o.say("Is").say("Nice"))
        })
        .unwrap();
    grammar.activate_rule("outer").unwrap();

    grammar.invoke(&["Something", "Awesome", "To", "Eat"]).unwrap();
    grammar.invoke(&["Something", "Great", "Is", "Nice", "To", "Eat"]).unwrap();
    grammar.invoke(&["Something", "To", "Eat"]).unwrap();

    assert_eq!(inner_count.load(Ordering::SeqCst), 2);
    assert_eq!(outer_count.load(Ordering::SeqCst), 3);
}

#[test]
fn multiple_nested_rules() {
    let counts: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();

    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar
        .add_rule("outer", |r| {
            r.say("Something").with_rule("inner").say("To").say("Eat").action(counter(&counts[0]))
        })
        .unwrap();
    grammar
        .add_rule("inner", |r| {
            r.say("Good").optionally_with_rule("inner2").action(counter(&counts[1]))
        })
        .unwrap();
    grammar
        .add_rule("inner2", |r| {
            r.say("Is")
                .action(counter(&counts[2]))
                .optionally_say("Sometimes")
                .action(counter(&counts[3]))
                .say("Nice")
                .action(counter(&counts[4]))
        })
        .unwrap();
    grammar.activate_rule("outer").unwrap();

    grammar.invoke(&["Something", "Good", "Is", "Nice", "To", "Eat"]).unwrap();
    grammar.invoke(&["Something", "Good", "Is", "Sometimes", "Nice", "To", "Eat"]).unwrap();
    grammar.invoke(&["Something", "Good", "To", "Eat"]).unwrap();

    let counts: Vec<usize> = counts.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(counts, [3, 3, 2, 2, 2]);
}

#[test]
fn referenced_rule_callbacks_take_their_own_words() {
    let heard = Arc::new(Mutex::new(Vec::new()));
    let record = |tag: &'static str| {
        let heard = Arc::clone(&heard);
        move |words: &[String]| heard.lock().unwrap().push((tag, words.join(" ")))
    };

    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar
        .add_rule("outer", |r| {
            r.say("Something").with_rule("inner").say("To").say("Eat").action(record("outer"))
        })
        .unwrap();
    grammar.add_rule("inner", |r| r.say("Good").action(record("inner"))).unwrap();
    grammar.activate_rule("outer").unwrap();

    grammar.invoke(&["Something", "Good", "To", "Eat"]).unwrap();
    assert_eq!(
        *heard.lock().unwrap(),
        [("inner", "Good".to_string()), ("outer", "Something To Eat".to_string())]
    );
}

#[test]
fn references_are_resolved_at_match_time() {
    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar.add_rule("outer", |r| r.say("Open").with_rule("target")).unwrap();
    grammar.activate_rule("outer").unwrap();
    assert!(grammar.invoke(&["Open", "Door"]).is_err());

    grammar.add_rule("target", |r| r.say_one_of(["Door", "Window"])).unwrap();
    assert_eq!(grammar.invoke(&["Open", "Door"]).unwrap(), "outer");
}

#[test]
fn self_reference_is_cut_off() {
    let grammar = Grammar::detached(GrammarInfo::new("nested"));
    grammar
        .add_rule("words", |r| {
            r.one_of(&[&|r| r.say("Word").with_rule("words"), &|r| r.say("Word")])
        })
        .unwrap();
    grammar.activate_rule("words").unwrap();

    assert!(grammar.invoke(&["Word"; 3]).is_ok());
    assert!(grammar.invoke(vec!["Word"; MAX_REFERENCE_DEPTH + 1].as_slice()).is_ok());
    assert!(grammar.invoke(vec!["Word"; MAX_REFERENCE_DEPTH + 2].as_slice()).is_err());
}

#[test]
fn left_recursion_terminates() {
    let grammar = Grammar::detached(GrammarInfo::new("loop"));
    grammar.add_rule("forever", |r| r.optionally_with_rule("forever").say("End")).unwrap();
    grammar.activate_rule("forever").unwrap();
    assert_eq!(grammar.invoke(&["End"]).unwrap(), "forever");
}

fn plot_grammar(heard: &Arc<Mutex<Vec<String>>>) -> Grammar {
    let record = |tag: &'static str| {
        let heard = Arc::clone(heard);
        move |words: &[String]| heard.lock().unwrap().push(format!("{}: {}", tag, words.join(" ")))
    };

    let grammar = Grammar::detached(GrammarInfo::new("plot"));
    grammar.add_rule("plot", |r| r.say("Plot").optionally_with_rule("post_plot")).unwrap();
    grammar
        .add_rule("post_plot", |r| {
            r.one_of(&[
                &|b| b.with_rule("click"),
                &|b| b.say_one_of(["Black", "White"]).action(record("colour")),
                &|b| b.say_one_of(["Mark", "Drag"]),
                &|b| {
                    b.say_one_of(["Alpha", "Bravo"])
                        .say_one_of(["One", "Three"])
                        .action(record("cell"))
                        .optionally_with_rule("click")
                },
            ])
        })
        .unwrap();
    grammar
        .add_rule("click", |r| r.say_one_of(["Click", "Right Click"]).action(record("click")))
        .unwrap();
    grammar.activate_rule("plot").unwrap();
    grammar
}

#[rstest]
#[case(&["Plot", "Click"], &["click: Click"])]
#[case(&["Plot", "White"], &["colour: White"])]
#[case(&["Plot", "Mark"], &[])]
#[case(&["Plot", "Bravo", "Three"], &["cell: Bravo Three"])]
#[case(&["Plot", "Alpha", "One", "Right Click"], &["cell: Alpha One", "click: Right Click"])]
fn choice_branches_behind_a_reference(#[case] words: &[&str], #[case] expected: &[&str]) {
    let heard = Arc::new(Mutex::new(Vec::new()));
    let grammar = plot_grammar(&heard);
    assert_eq!(grammar.invoke(words).unwrap(), "plot");
    assert_eq!(*heard.lock().unwrap(), expected);
}

//! A keyboard-driven rendition of a "mouse plot" command grammar.
//!
//! The screen is divided into 100x100 pixel cells. Saying "Plot" shows the plot and enables the
//! follow-up commands; saying two coordinates (for example "Bravo Three") moves the mouse to the
//! middle of that cell; saying a click command clicks and dismisses the plot.
//!
//! There is no recognition engine here: type the words you would say, separated by spaces. Run
//! with `RUST_LOG=command_grammar=debug` to watch the grammar at work.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, Weak};

use command_grammar::{Grammar, GrammarInfo, GrammarService, Result};
use tracing_subscriber::EnvFilter;

const CELL_SIZE: i32 = 100;

#[rustfmt::skip]
const ALPHA: &[(&str, char)] = &[
    ("Alpha", 'A'), ("Bravo", 'B'), ("Charlie", 'C'), ("Delta", 'D'), ("Echo", 'E'),
    ("Foxtrot", 'F'), ("Golf", 'G'), ("Hotel", 'H'), ("India", 'I'), ("Juliet", 'J'),
    ("Kilo", 'K'), ("Lima", 'L'), ("Mike", 'M'), ("November", 'N'), ("Oscar", 'O'),
    ("Papa", 'P'), ("Quebec", 'Q'), ("Romeo", 'R'), ("Sierra", 'S'), ("Tango", 'T'),
    ("Uniform", 'U'), ("Victor", 'V'), ("Whiskey", 'W'), ("X-ray", 'X'), ("Yankee", 'Y'),
    ("Zulu", 'Z'), ("Zero", '0'), ("One", '1'), ("Two", '2'), ("Three", '3'), ("Four", '4'),
    ("Five", '5'), ("Six", '6'), ("Seven", '7'), ("Eight", '8'), ("Nine", '9'),
];

const COLOURS: &[&str] = &["Black", "White", "Yellow", "Green", "Red", "Gray"];

const CLICKS: &[&str] = &[
    "Click", "Right Click", "Double Click", "Right Double", "Triple Click", "Right Triple",
    "Middle Click",
];

const SCREENS: &[&str] = &[
    "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve",
];

/// Stands in for the recognition engine and prints what it is asked to do.
struct ConsoleEngine;

impl GrammarService for ConsoleEngine {
    fn load_grammar(&self, grammar: &Grammar) -> Result<()> {
        let bytes = grammar.serialize()?;
        println!("[engine] loaded {:?} ({} bytes)", grammar.info().name, bytes.len());
        Ok(())
    }

    fn activate_rule(&self, _grammar: &Grammar, rule_name: &str) -> Result<()> {
        println!("[engine] activated {}", rule_name);
        Ok(())
    }

    fn deactivate_rule(&self, _grammar: &Grammar, rule_name: &str) -> Result<()> {
        println!("[engine] deactivated {}", rule_name);
        Ok(())
    }

    fn set_exclusive(&self, _grammar: &Grammar, exclusive: bool) -> Result<()> {
        println!("[engine] exclusive = {}", exclusive);
        Ok(())
    }
}

/// The screen the plot is drawn on.
#[derive(Debug, Clone, Copy)]
struct Screen {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

impl Screen {
    fn mouse_x(&self, column: i32) -> i32 {
        let x = self.left + CELL_SIZE * column + CELL_SIZE / 2;
        x.min(self.left + self.width - 1)
    }

    fn mouse_y(&self, row: i32) -> i32 {
        let y = self.top + CELL_SIZE * row + CELL_SIZE / 2;
        y.min(self.top + self.height - 1)
    }
}

fn coordinate_ordinal(word: &str) -> Option<i32> {
    let (_, symbol) = ALPHA
        .iter()
        .find(|(name, symbol)| name.eq_ignore_ascii_case(word) || symbol.to_string() == word)?;
    match symbol.to_digit(10) {
        Some(digit) => Some(digit as i32),
        None => Some(*symbol as i32 - 'A' as i32 + 10),
    }
}

fn build(grammar: &Arc<Grammar>, screen: Arc<Mutex<Screen>>) -> Result<()> {
    let alpha_words: Vec<&str> = ALPHA
        .iter()
        .flat_map(|&(name, symbol)| [name, symbol_str(symbol)])
        .filter(|word| !word.is_empty())
        .collect();

    let weak = Arc::downgrade(grammar);
    grammar.add_rule("mouse_plot", |r| {
        r.say("Plot")
            .action(with_grammar(&weak, |grammar, _| {
                grammar.activate_rule("post_plot")?;
                grammar.set_exclusive(true)?;
                println!("[plot] showing the plot");
                Ok(())
            }))
            .optionally_with_rule("post_plot")
    })?;

    grammar.add_rule("post_plot", |r| {
        r.one_of(&[
            &|p| p.with_rule("mouse_click"),
            &|p| {
                p.say_one_of(["Monitor", "Screen"]).say_one_of(SCREENS.iter().copied()).action(
                    |words| println!("[plot] switching to screen {}", words.join(" ")),
                )
            },
            &|p| {
                p.say_one_of(COLOURS.iter().copied())
                    .action(|words| println!("[plot] colour {}", words.join(" ")))
            },
            &|p| p.say_one_of(["Mark", "Drag"]),
            &|p| {
                let screen = Arc::clone(&screen);
                p.say_one_of(alpha_words.iter().copied())
                    .say_one_of(alpha_words.iter().copied())
                    .action(move |words| zoom(&screen, words))
                    .optionally_one_of(&[&|o| o.with_rule("mouse_click"), &|o| {
                        o.say_one_of(alpha_words.iter().copied())
                            .say_one_of(alpha_words.iter().copied())
                            .optionally(&|q| q.with_rule("mouse_click"))
                    }])
            },
        ])
        .action(|words| println!("[plot] heard {:?}", words))
    })?;

    let weak = Arc::downgrade(grammar);
    grammar.add_rule("mouse_click", |r| {
        r.optionally_say("Mouse").say_one_of(CLICKS.iter().copied()).action(with_grammar(
            &weak,
            |grammar, words| {
                println!("[plot] {} and close the plot", words.join(" "));
                grammar.set_exclusive(false)?;
                grammar.deactivate_rule("post_plot")?;
                grammar.reactivate_rule("mouse_plot")
            },
        ))
    })?;

    grammar.load()?;
    grammar.activate_rule("mouse_plot")
}

fn symbol_str(symbol: char) -> &'static str {
    const SYMBOLS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    match SYMBOLS.find(symbol) {
        Some(index) => &SYMBOLS[index..index + 1],
        None => "",
    }
}

fn zoom(screen: &Mutex<Screen>, words: &[String]) {
    let screen = *screen.lock().unwrap();
    let (row, column) = match words {
        [.., row, column] => (row, column),
        _ => return,
    };
    match (coordinate_ordinal(row), coordinate_ordinal(column)) {
        (Some(y), Some(x)) => {
            println!("[plot] moving the mouse to ({}, {})", screen.mouse_x(x), screen.mouse_y(y))
        }
        _ => println!("[plot] {:?} is not a cell", words),
    }
}

/// Wraps a callback that needs the grammar it belongs to. Callbacks hold the grammar weakly so
/// that the grammar can still be dropped.
fn with_grammar<F>(grammar: &Weak<Grammar>, f: F) -> impl Fn(&[String]) + Send + Sync + 'static
where
    F: Fn(&Grammar, &[String]) -> Result<()> + Send + Sync + 'static,
{
    let grammar = grammar.clone();
    move |words| {
        if let Some(grammar) = grammar.upgrade() {
            if let Err(err) = f(&grammar, words) {
                eprintln!("[plot] {}", err);
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let screen = Arc::new(Mutex::new(Screen {
        left: 0,
        top: 0,
        width: 1920,
        height: 1080,
    }));
    let grammar = Arc::new(Grammar::new(
        GrammarInfo::new("Mouse Plot").with_description("A replacement for \"Mouse Grid\"."),
        Arc::new(ConsoleEngine),
    ));
    build(&grammar, screen).unwrap();

    println!("{}", grammar.to_xml().unwrap());
    println!("Say something (an empty line quits):");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().unwrap();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap() == 0 || line.trim().is_empty() {
            break;
        }

        let words = split_words(&line);
        match grammar.invoke(&words) {
            Ok(rule) => println!("[{}]", rule),
            Err(err) => println!("Sorry, I did not understand: {}", err),
        }
    }
}

/// Splits typed text into recognized words. Multi-word commands such as "Right Click" are single
/// words in the grammar, so they are joined back together.
fn split_words(line: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in line.split_whitespace() {
        if let Some(last) = words.last_mut() {
            let joined = format!("{} {}", last, word);
            if CLICKS.iter().any(|click| click.eq_ignore_ascii_case(&joined)) {
                *last = joined;
                continue;
            }
        }
        words.push(word.to_string());
    }
    words
}

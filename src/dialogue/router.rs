//! Intent routing: decides which flow handles an inbound message.
//!
//! Precedence:
//! 1. A registration step in progress takes every message as flow input.
//! 2. Otherwise the command vocabulary is checked in a fixed order:
//!    start, greeting, register, advice, feedback, help, status.
//! 3. A complete one-shot registration form.
//! 4. Anything else is an invalid command.

use crate::session::ConversationState;

/// A top-level command recognized while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Greeting,
    Register,
    Advice,
    Feedback,
    Help,
    Status,
}

/// Where a message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Input for the registration step the sender is in.
    RegistrationStep(ConversationState),
    Command(Command),
    RegistrationForm,
    Invalid,
}

const START_KEYWORD: &str = "start";

/// Substring-matched commands checked after start and greetings, in order.
const SUBSTRING_COMMANDS: [(&str, Command); 5] = [
    ("register", Command::Register),
    ("advice", Command::Advice),
    ("feedback", Command::Feedback),
    ("help", Command::Help),
    ("status", Command::Status),
];

const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howdy", "greetings", "sup", "yo",
];

const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening", "what's up"];

/// Field labels a one-shot registration form must contain.
pub const FORM_LABELS: [&str; 4] = ["name:", "crop:", "location:", "language:"];

/// Trim and case-fold.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Strip a leading wake word, ignoring ASCII case.
///
/// Returns `None` if the text does not start with the wake word as a whole
/// word. The remainder keeps its original casing.
pub fn strip_wake_word<'a>(text: &'a str, wake_word: &str) -> Option<&'a str> {
    let text = text.trim_start();
    let head = text.get(..wake_word.len())?;
    if !head.eq_ignore_ascii_case(wake_word) {
        return None;
    }
    let rest = &text[wake_word.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(c) if !c.is_alphanumeric() => Some(rest.trim_start_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | ':' | '!' | '.')
        })),
        Some(_) => None,
    }
}

/// Classify already-normalized text for a sender in `state`.
pub fn classify(normalized: &str, state: ConversationState) -> Route {
    if state.is_registration_step() {
        return Route::RegistrationStep(state);
    }
    match match_command(normalized) {
        Some(command) => Route::Command(command),
        None if is_registration_form(normalized) => Route::RegistrationForm,
        None => Route::Invalid,
    }
}

fn match_command(normalized: &str) -> Option<Command> {
    if normalized.is_empty() || normalized.contains(START_KEYWORD) {
        return Some(Command::Start);
    }
    if is_greeting(normalized) {
        return Some(Command::Greeting);
    }
    SUBSTRING_COMMANDS
        .iter()
        .find(|(keyword, _)| normalized.contains(keyword))
        .map(|(_, command)| *command)
}

/// Greeting words must appear as whole words ("hi" does not match "this").
pub fn is_greeting(normalized: &str) -> bool {
    let words: Vec<&str> = normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| GREETING_WORDS.contains(w)) {
        return true;
    }
    let joined = format!(" {} ", words.join(" "));
    GREETING_PHRASES
        .iter()
        .any(|phrase| joined.contains(&format!(" {phrase} ")))
}

/// Whether the text carries every one-shot form label.
pub fn is_registration_form(normalized: &str) -> bool {
    FORM_LABELS.iter().all(|label| normalized.contains(label))
}

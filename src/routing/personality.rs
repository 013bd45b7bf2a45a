//! Personality table: scripted replies to exact client lines.

use super::Response;

/// A scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalityEntry {
    /// Full line to match, case-sensitive. May be empty to match blank input.
    pub trigger: &'static str,
    pub reply: &'static str,
    pub closes: bool,
}

/// Ordered, immutable set of scripted replies.
#[derive(Debug, Clone)]
pub struct PersonalityTable {
    entries: Vec<PersonalityEntry>,
}

impl PersonalityTable {
    pub fn new(entries: Vec<PersonalityEntry>) -> Self {
        Self { entries }
    }

    /// `hello`, blank input and `bye`.
    pub fn standard() -> Self {
        Self::new(vec![
            PersonalityEntry {
                trigger: "hello",
                reply: "Hi there!",
                closes: false,
            },
            PersonalityEntry {
                trigger: "",
                reply: "Say something...",
                closes: false,
            },
            PersonalityEntry {
                trigger: "bye",
                reply: "Goodbye!",
                closes: true,
            },
        ])
    }

    /// Reply for an exact match, or the input unchanged.
    pub fn route(&self, text: &str) -> Response {
        match self.entries.iter().find(|e| e.trigger == text) {
            Some(entry) if entry.closes => Response::closing(entry.reply),
            Some(entry) => Response::open(entry.reply),
            None => Response::open(text),
        }
    }
}

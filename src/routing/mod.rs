//! Routing of accepted client lines.
//!
//! Two immutable tables are built once at startup and shared by every
//! session:
//! - `command`: prefix-matched directives such as `/quit`
//! - `personality`: exact-match scripted replies such as `hello`
//!
//! Both tables are ordered lists and the first matching entry wins.

pub mod command;
pub mod personality;

pub use command::CommandTable;
pub use personality::PersonalityTable;

/// Reply produced for one client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Text written after the server tag.
    pub text: String,
    /// Whether the session ends after this reply.
    pub closes: bool,
}

impl Response {
    /// A reply that keeps the connection open.
    pub fn open(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            closes: false,
        }
    }

    /// A reply after which the connection is closed.
    pub fn closing(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            closes: true,
        }
    }
}

/// Command table followed by personality table.
#[derive(Debug, Clone)]
pub struct Router {
    commands: CommandTable,
    personalities: PersonalityTable,
}

impl Router {
    pub fn new(commands: CommandTable, personalities: PersonalityTable) -> Self {
        Self {
            commands,
            personalities,
        }
    }

    /// Router with the standard command and personality entries.
    pub fn standard() -> Self {
        Self::new(CommandTable::standard(), PersonalityTable::standard())
    }

    /// Route one accepted line (without its trailing newline).
    ///
    /// The personality table is only consulted when no command matched.
    pub fn route(&self, text: &str) -> Response {
        match self.commands.route(text) {
            Some(response) => response,
            None => self.personalities.route(text),
        }
    }
}

//! Command table: prefix-matched protocol directives.
//!
//! A line matches a command when it starts with the command's trigger.
//! Entries are probed in list order and the first match wins, so a short
//! trigger listed before a longer one sharing its prefix (`/e` before
//! `/echo`) shadows it.

use super::Response;
use chrono::Local;

/// Produces the reply text for a matched line.
///
/// The table is passed in so that self-describing commands such as
/// `/help` can list their siblings.
pub type Handler = fn(&CommandTable, &str) -> String;

/// A single command.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub trigger: &'static str,
    pub handler: Handler,
    pub closes: bool,
    pub description: &'static str,
}

/// Ordered, immutable set of commands.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// Build a table from entries. Triggers must be distinct.
    pub fn new(entries: Vec<CommandEntry>) -> Self {
        debug_assert!(
            entries
                .iter()
                .enumerate()
                .all(|(i, a)| entries[i + 1..].iter().all(|b| a.trigger != b.trigger)),
            "command triggers must be distinct"
        );
        Self { entries }
    }

    /// `/time`, `/quit`, `/echo` and `/help`.
    pub fn standard() -> Self {
        Self::new(vec![
            CommandEntry {
                trigger: "/time",
                handler: time,
                closes: false,
                description: "Show the current server time",
            },
            CommandEntry {
                trigger: "/quit",
                handler: quit,
                closes: true,
                description: "Disconnect from the server",
            },
            CommandEntry {
                trigger: "/echo",
                handler: echo,
                closes: false,
                description: "Echo back the text after the command",
            },
            CommandEntry {
                trigger: "/help",
                handler: help,
                closes: false,
                description: "List the available commands",
            },
        ])
    }

    /// Run the first command whose trigger prefixes `text`.
    ///
    /// Returns `None` when nothing matches.
    pub fn route(&self, text: &str) -> Option<Response> {
        let entry = self.entries.iter().find(|e| text.starts_with(e.trigger))?;
        Some(Response {
            text: (entry.handler)(self, text),
            closes: entry.closes,
        })
    }
}

fn time(_: &CommandTable, _: &str) -> String {
    Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f %:z")
        .to_string()
}

fn quit(_: &CommandTable, _: &str) -> String {
    String::new()
}

fn echo(_: &CommandTable, input: &str) -> String {
    // Skip "/echo " (trigger plus one separator)
    if input.len() > "/echo".len() {
        input.get("/echo ".len()..).unwrap_or_default().to_string()
    } else {
        String::new()
    }
}

fn help(table: &CommandTable, _: &str) -> String {
    table
        .entries
        .iter()
        .map(|e| format!("{} - {}", e.trigger, e.description))
        .collect::<Vec<_>>()
        .join("\n")
}

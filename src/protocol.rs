//! Echo Town wire protocol.
//!
//! Newline-delimited UTF-8 text in both directions:
//! - on connect the server sends a welcome banner naming the client
//! - before every line the server sends a prompt `\n[<addr>]: `
//! - each client line is answered with `[Echo Town]: <text>\n`
//! - closing replies are followed by a goodbye line
//! - an idle client gets a timeout notice before the connection closes

use bytes::BytesMut;
use std::fmt::Display;
use std::time::Duration;

/// Tag that prefixes every reply.
pub const SERVER_TAG: &str = "[Echo Town]:";

/// Frame builders for everything the server writes.
pub struct Frame;

impl Frame {
    /// Generate the welcome banner
    pub fn welcome(addr: impl Display) -> BytesMut {
        let mut frame = BytesMut::new();
        frame.extend_from_slice(b"Welcome to Echo Town! (CTRL + C to disconnect)\n");
        frame.extend_from_slice(format!("You are connected as [{}]\n", addr).as_bytes());
        frame.extend_from_slice(b"Type /help to see the available commands.\n");
        frame
    }

    /// Generate the input prompt
    pub fn prompt(addr: impl Display) -> BytesMut {
        BytesMut::from(format!("\n[{}]: ", addr).as_bytes())
    }

    /// Generate a tagged reply line
    pub fn reply(text: &str) -> BytesMut {
        let mut frame = BytesMut::with_capacity(SERVER_TAG.len() + text.len() + 2);
        frame.extend_from_slice(SERVER_TAG.as_bytes());
        frame.extend_from_slice(b" ");
        frame.extend_from_slice(text.as_bytes());
        frame.extend_from_slice(b"\n");
        frame
    }

    /// Generate the goodbye line sent after a closing reply
    pub fn goodbye() -> &'static [u8] {
        b"Thanks for visiting Echo Town. Goodbye!\n"
    }

    /// Generate the idle timeout notice
    pub fn timeout_notice(idle: Duration) -> BytesMut {
        BytesMut::from(
            format!(
                "\n[TIMEOUT] {} seconds have passed. Disconnecting...\n",
                idle.as_secs()
            )
            .as_bytes(),
        )
    }
}

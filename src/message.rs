use std::fmt;

use crate::types::UserId;

/// Sent once to every client that gets a slot in the registry.
pub const WELCOME: &str = "Welcome to the chat server! Type '/nick NAME' to set your nickname.\n";

/// Who a chat line is attributed to.
#[derive(Debug, Clone, Copy)]
pub enum Speaker<'a> {
    Named(&'a str),
    Anonymous(UserId),
}

impl<'a> Speaker<'a> {
    pub fn new(id: UserId, nick: Option<&'a str>) -> Self {
        match nick {
            Some(name) => Speaker::Named(name),
            None => Speaker::Anonymous(id),
        }
    }
}

impl fmt::Display for Speaker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Named(name) => f.write_str(name),
            Speaker::Anonymous(id) => write!(f, "user:{}", id.get()),
        }
    }
}

/// A chat line as it goes out on the wire.
///
/// Display format: `speaker> body`. The trailing newline is added by
/// the `From<Message> for String` conversion.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub from: Speaker<'a>,
    pub body: &'a str,
}

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}> {}", self.from, self.body)
    }
}

impl From<Message<'_>> for String {
    fn from(msg: Message<'_>) -> Self {
        format!("{msg}\n")
    }
}

/// System notice broadcast after a successful `/nick`.
pub fn rename_notice(id: UserId, name: &str) -> String {
    format!("User {} is now known as {name}\n", id.get())
}

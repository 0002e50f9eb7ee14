use crate::error::ChatError;

/// Commands are a closed set, matched exhaustively by the session.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Nick { name: String },
    Quit,
}

impl Command {
    /// Parse a command from a "/" prefixed line.
    ///
    /// The token ends at the first space and is case-insensitive. For
    /// `/nick` the rest of the line, trimmed, is the new name, so names
    /// may contain spaces. Other whitespace stays part of the token:
    /// `/nick\tbob` is an unknown command.
    pub fn parse(input: &str) -> Result<Self, ChatError> {
        let input = input.trim_start();
        let Some(input) = input.strip_prefix('/') else {
            return Err(ChatError::UnsupportedCommand(input.to_string()));
        };

        let (cmd, args) = match input.split_once(' ') {
            Some((cmd, args)) => (cmd, Some(args.trim())),
            None => (input, None),
        };

        match cmd.to_ascii_lowercase().as_str() {
            "nick" => match args {
                None => Err(ChatError::NickUsage),
                Some("") => Err(ChatError::EmptyNick),
                Some(name) => Ok(Command::Nick {
                    name: name.to_string(),
                }),
            },
            "quit" => Ok(Command::Quit),
            _ => Err(ChatError::UnsupportedCommand(cmd.to_string())),
        }
    }
}

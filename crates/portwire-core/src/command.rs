//! Interactive commands.
//!
//! Commands are single-letter keys followed by their arguments, all
//! separated by whitespace. Arguments may continue on the next line.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::PathBuf;

use thiserror::Error;

/// A command read from the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Leave the prompt (`Q`)
    Quit,
    /// Show the help text (`h`)
    Help,
    /// Re-read and show the connections (`r`)
    Refresh,
    /// Show detailed port information (`i`)
    Details,
    /// Connect two ports by index (`c N M`)
    Connect(usize, usize),
    /// Disconnect two ports by index (`d N M`)
    Disconnect(usize, usize),
    /// Remove every connection (`D`)
    DisconnectAll,
    /// Store the connection setup to a file (`C <file>`)
    Save(PathBuf),
    /// Restore a connection setup from a file (`R <file>`)
    Restore(PathBuf),
    /// Show server information (`s`)
    Stats,
    /// Reset the max delay counter (`x`)
    ResetMaxDelay,
}

/// Key, argument syntax and description of every command, for the help text.
pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("Q", "quit"),
    ("r", "refresh connections"),
    ("c N M", "connect port N to port M"),
    ("d N M", "disconnect ports N and M"),
    ("D", "destroy all connections"),
    ("C <f>", "store connection setup to file <f>"),
    ("R <f>", "restore connection setup from file <f>"),
    ("s", "show server info / statistics"),
    ("i", "print detailed port info"),
    ("x", "reset the max delay counter"),
    ("h", "show this help"),
];

/// A command that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown key '{0}'! Enter 'h' for help.")]
    UnknownKey(String),

    #[error("Invalid numbers! '{0}' is not a port number.")]
    InvalidNumber(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),
}

impl Command {
    /// Read the next command from a token stream.
    ///
    /// Returns `None` once the stream is exhausted.
    pub fn next_from<I: Iterator<Item = String>>(
        tokens: &mut I,
    ) -> Option<Result<Self, ParseError>> {
        let key = tokens.next()?;
        Some(Self::parse_key(&key, tokens))
    }

    fn parse_key<I: Iterator<Item = String>>(
        key: &str,
        tokens: &mut I,
    ) -> Result<Self, ParseError> {
        match key {
            "Q" => Ok(Self::Quit),
            "h" => Ok(Self::Help),
            "r" => Ok(Self::Refresh),
            "i" => Ok(Self::Details),
            "D" => Ok(Self::DisconnectAll),
            "s" => Ok(Self::Stats),
            "x" => Ok(Self::ResetMaxDelay),
            "c" => {
                let (a, b) = index_pair(tokens)?;
                Ok(Self::Connect(a, b))
            }
            "d" => {
                let (a, b) = index_pair(tokens)?;
                Ok(Self::Disconnect(a, b))
            }
            "C" => Ok(Self::Save(file_name(tokens)?)),
            "R" => Ok(Self::Restore(file_name(tokens)?)),
            other => Err(ParseError::UnknownKey(other.to_string())),
        }
    }
}

fn index<I: Iterator<Item = String>>(tokens: &mut I) -> Result<usize, ParseError> {
    let token = tokens.next().ok_or(ParseError::MissingArgument("port number"))?;
    token.parse().map_err(|_| ParseError::InvalidNumber(token))
}

fn index_pair<I: Iterator<Item = String>>(tokens: &mut I) -> Result<(usize, usize), ParseError> {
    // Both numbers are consumed even if the first one is bad.
    let first = index(tokens);
    let second = index(tokens);
    Ok((first?, second?))
}

fn file_name<I: Iterator<Item = String>>(tokens: &mut I) -> Result<PathBuf, ParseError> {
    tokens.next().map(PathBuf::from).ok_or(ParseError::MissingArgument("file name"))
}

/// Whitespace-separated tokens of a reader, read a line at a time.
pub struct Tokens<R> {
    reader: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> Tokens<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self { reader, pending: VecDeque::new() }
    }

    /// Whether the tokens of the last line read have all been consumed.
    #[must_use]
    pub fn at_line_start(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<R: BufRead> Iterator for Tokens<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pending.is_empty() {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => self.pending.extend(line.split_whitespace().map(String::from)),
            }
        }
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Vec<Result<Command, ParseError>> {
        let mut tokens = Tokens::new(input.as_bytes());
        std::iter::from_fn(|| Command::next_from(&mut tokens)).collect()
    }

    #[test]
    fn test_parse_simple_keys() {
        assert_eq!(
            parse_all("r i s x h D Q"),
            vec![
                Ok(Command::Refresh),
                Ok(Command::Details),
                Ok(Command::Stats),
                Ok(Command::ResetMaxDelay),
                Ok(Command::Help),
                Ok(Command::DisconnectAll),
                Ok(Command::Quit),
            ]
        );
    }

    #[test]
    fn test_arguments_may_span_lines() {
        assert_eq!(
            parse_all("c 0\n2\nd 3 1\nC studio.conf\nR\n/tmp/live.conf\n"),
            vec![
                Ok(Command::Connect(0, 2)),
                Ok(Command::Disconnect(3, 1)),
                Ok(Command::Save(PathBuf::from("studio.conf"))),
                Ok(Command::Restore(PathBuf::from("/tmp/live.conf"))),
            ]
        );
    }

    #[test]
    fn test_bad_numbers_consume_both_arguments() {
        assert_eq!(
            parse_all("c -1 2 r"),
            vec![Err(ParseError::InvalidNumber("-1".into())), Ok(Command::Refresh)]
        );
    }

    #[test]
    fn test_unknown_key_and_missing_argument() {
        assert_eq!(
            parse_all("q c 1"),
            vec![
                Err(ParseError::UnknownKey("q".into())),
                Err(ParseError::MissingArgument("port number")),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_all("  \n\n").is_empty());
    }
}

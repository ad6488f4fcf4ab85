//! Parsed representation of a single protocol line.
//!
//! Lines follow the RFC 1459 shape:
//!   [`:`prefix SPACE] command [SPACE params] [SPACE `:` trailing]
//!
//! [`Message::parse`] is total. Malformed input never fails; it degrades to an
//! empty [`Command::Unknown`] with no parameters so the router can still show
//! the raw line.

use chrono::{DateTime, Local};
use std::fmt;

pub const RPL_WELCOME: u16 = 1;
pub const RPL_TOPIC: u16 = 332;
pub const RPL_NAMREPLY: u16 = 353;
pub const RPL_ENDOFNAMES: u16 = 366;
pub const ERR_NICKNAMEINUSE: u16 = 433;

/// Command verb of a message, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Join,
    Part,
    Privmsg,
    Notice,
    Quit,
    Nick,
    Mode,
    Kick,
    Topic,
    Ping,
    Pong,
    Error,
    /// Three-digit server reply code.
    Numeric(u16),
    /// Status line generated by the client itself.
    System,
    /// Anything else, upper-cased. Empty for malformed lines.
    Unknown(String),
}

impl Command {
    /// Classify a verb as it appears on the wire. Case-insensitive.
    pub fn from_verb(verb: &str) -> Self {
        if verb.len() == 3 && verb.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(code) = verb.parse() {
                return Command::Numeric(code);
            }
        }
        match verb.to_ascii_uppercase().as_str() {
            "JOIN" => Command::Join,
            "PART" => Command::Part,
            "PRIVMSG" => Command::Privmsg,
            "NOTICE" => Command::Notice,
            "QUIT" => Command::Quit,
            "NICK" => Command::Nick,
            "MODE" => Command::Mode,
            "KICK" => Command::Kick,
            "TOPIC" => Command::Topic,
            "PING" => Command::Ping,
            "PONG" => Command::Pong,
            "ERROR" => Command::Error,
            other => Command::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Command::Join => "JOIN",
            Command::Part => "PART",
            Command::Privmsg => "PRIVMSG",
            Command::Notice => "NOTICE",
            Command::Quit => "QUIT",
            Command::Nick => "NICK",
            Command::Mode => "MODE",
            Command::Kick => "KICK",
            Command::Topic => "TOPIC",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::Error => "ERROR",
            Command::System => "SYSTEM",
            Command::Numeric(code) => return write!(f, "{:03}", code),
            Command::Unknown(verb) => verb,
        };
        f.write_str(verb)
    }
}

/// Returns true for `#` and `&` channel names; anything else is a nick.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

/// One protocol line, parsed once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Message {
    /// The line as received, kept for fallback display.
    pub raw: String,
    /// Sender descriptor without the leading `:`.
    pub prefix: Option<String>,
    pub command: Command,
    /// Positional parameters. A trailing parameter, if any, is always last.
    pub params: Vec<String>,
    /// Capture time. Display only.
    pub timestamp: DateTime<Local>,
}

impl Message {
    /// Parse a line without its terminator.
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw;
        let mut prefix = None;

        if let Some(stripped) = raw.strip_prefix(':') {
            match stripped.split_once(' ') {
                Some((sender, remainder)) => {
                    prefix = Some(sender.to_string());
                    rest = remainder;
                }
                None => {
                    return Self::build(
                        raw.to_string(),
                        Some(stripped.to_string()),
                        Command::Unknown(String::new()),
                        Vec::new(),
                    );
                }
            }
        }

        // The trailing marker is searched after the prefix has been removed,
        // so a colon inside the prefix can't be mistaken for it.
        let (head, trailing) = match rest.find(" :") {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 2..])),
            None => (rest, None),
        };

        let mut tokens = head.split(' ').filter(|t| !t.is_empty());
        let command = tokens
            .next()
            .map(Command::from_verb)
            .unwrap_or_else(|| Command::Unknown(String::new()));
        let mut params: Vec<String> = tokens.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Self::build(raw.to_string(), prefix, command, params)
    }

    /// A client-generated status line for the server view.
    pub fn system(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::build(text.clone(), None, Command::System, vec![text])
    }

    /// A line we sent ourselves, echoed into local history with our nick as
    /// the sender.
    pub fn outgoing(nick: &str, command: Command, params: Vec<String>, wire: &str) -> Self {
        Self::build(wire.to_string(), Some(nick.to_string()), command, params)
    }

    fn build(raw: String, prefix: Option<String>, command: Command, params: Vec<String>) -> Self {
        Self {
            raw,
            prefix,
            command,
            params,
            timestamp: Local::now(),
        }
    }

    /// The acting nick: prefix text before the first `!`, or the whole
    /// prefix. `None` for server-originated lines without a prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref().filter(|p| !p.is_empty())?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// Body of a CTCP `ACTION` carried in a `PRIVMSG`.
    pub fn action_text(&self) -> Option<&str> {
        if self.command != Command::Privmsg {
            return None;
        }
        self.params
            .last()?
            .strip_prefix("\x01ACTION ")?
            .strip_suffix('\x01')
    }

    pub fn formatted_time(&self, format: &str) -> String {
        self.timestamp.format(format).to_string()
    }

    /// Human-readable one-line rendering used by the text front end.
    pub fn summary(&self) -> String {
        let nick = self.nick().unwrap_or("???");
        let first = self.param(0).unwrap_or("");
        let last = self.params.last().map(String::as_str).unwrap_or("");

        match &self.command {
            Command::Privmsg => match self.action_text() {
                Some(action) => format!("* {} {}", nick, action),
                None => format!("<{}> {}", nick, last),
            },
            Command::Join => format!("→ {} joined {}", nick, first),
            Command::Part => format!("← {} left {}", nick, first),
            Command::Quit => format!("← {} quit ({})", nick, first),
            Command::Notice => format!("[{}] {}", self.nick().unwrap_or("Notice"), last),
            Command::System => format!("*** {}", first),
            Command::Nick => format!("{} is now known as {}", nick, self.param(0).unwrap_or("???")),
            Command::Mode => format!(
                "{} sets mode {} on {}",
                self.nick().unwrap_or("Server"),
                self.params.iter().skip(1).cloned().collect::<Vec<_>>().join(" "),
                first
            ),
            Command::Kick => format!(
                "{} was kicked from {} by {} ({})",
                self.param(1).unwrap_or("???"),
                first,
                nick,
                self.param(2).unwrap_or("")
            ),
            Command::Topic => format!("{} changed the topic of {} to: {}", nick, first, self.param(1).unwrap_or("")),
            Command::Numeric(_) => self.params.iter().skip(1).cloned().collect::<Vec<_>>().join(" "),
            _ => self.raw.clone(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_prefix_command_params_and_trailing() {
        let msg = Message::parse(":irc.example.net COMMAND p1 p2 :trailing text");
        assert_eq!(msg.prefix.as_deref(), Some("irc.example.net"));
        assert_eq!(msg.command, Command::Unknown("COMMAND".into()));
        assert_eq!(msg.params, vec!["p1", "p2", "trailing text"]);
        assert_eq!(msg.raw, ":irc.example.net COMMAND p1 p2 :trailing text");
    }

    #[test]
    fn parse_without_prefix() {
        let msg = Message::parse("PING :abc");
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, Command::Ping);
        assert_eq!(msg.params, vec!["abc"]);
        assert_eq!(msg.nick(), None);
    }

    #[test]
    fn nick_is_text_before_bang() {
        let msg = Message::parse(":alice!user@host PRIVMSG #rust :hi");
        assert_eq!(msg.nick(), Some("alice"));

        let msg = Message::parse(":irc.server.net NOTICE * :hello");
        assert_eq!(msg.nick(), Some("irc.server.net"));
    }

    #[test]
    fn colon_in_prefix_is_not_the_trailing_marker() {
        let msg = Message::parse(":nick!u@2001:db8::1 JOIN #rust");
        assert_eq!(msg.prefix.as_deref(), Some("nick!u@2001:db8::1"));
        assert_eq!(msg.command, Command::Join);
        assert_eq!(msg.params, vec!["#rust"]);
    }

    #[test]
    fn trailing_keeps_spaces_and_colons() {
        let msg = Message::parse("PRIVMSG #rust :see: a :b c");
        assert_eq!(msg.params, vec!["#rust", "see: a :b c"]);

        let msg = Message::parse("PRIVMSG #rust ::)");
        assert_eq!(msg.params, vec!["#rust", ":)"]);
    }

    #[test]
    fn empty_trailing_is_kept() {
        let msg = Message::parse("TOPIC #rust :");
        assert_eq!(msg.params, vec!["#rust", ""]);
    }

    #[test]
    fn consecutive_spaces_are_collapsed() {
        let msg = Message::parse("MODE  #rust   +o  alice");
        assert_eq!(msg.command, Command::Mode);
        assert_eq!(msg.params, vec!["#rust", "+o", "alice"]);
    }

    #[test]
    fn commands_are_case_normalized() {
        assert_eq!(Message::parse("privmsg #a :x").command, Command::Privmsg);
        assert_eq!(Message::parse("foo bar").command, Command::Unknown("FOO".into()));
        assert_eq!(Message::parse(":s 353 me = #a :x").command, Command::Numeric(RPL_NAMREPLY));
        assert_eq!(Command::Numeric(1).to_string(), "001");
    }

    #[test]
    fn malformed_lines_degrade_to_empty_command() {
        let msg = Message::parse(":prefix_only");
        assert_eq!(msg.prefix.as_deref(), Some("prefix_only"));
        assert_eq!(msg.command, Command::Unknown(String::new()));
        assert!(msg.params.is_empty());

        let msg = Message::parse("");
        assert_eq!(msg.command, Command::Unknown(String::new()));
        assert!(msg.params.is_empty());
    }

    #[test]
    fn empty_prefix_has_no_nick() {
        let msg = Message::parse(": PRIVMSG #a :x");
        assert_eq!(msg.prefix.as_deref(), Some(""));
        assert_eq!(msg.nick(), None);
    }

    #[test]
    fn detects_ctcp_action() {
        let msg = Message::parse(":bob!u@h PRIVMSG #rust :\x01ACTION waves\x01");
        assert_eq!(msg.action_text(), Some("waves"));
        assert_eq!(msg.summary(), "* bob waves");

        let msg = Message::parse(":bob!u@h PRIVMSG #rust :plain");
        assert_eq!(msg.action_text(), None);
        assert_eq!(msg.summary(), "<bob> plain");
    }

    #[test]
    fn summaries() {
        assert_eq!(Message::parse(":bob!u@h JOIN #rust").summary(), "→ bob joined #rust");
        assert_eq!(Message::parse(":bob!u@h NICK robert").summary(), "bob is now known as robert");
        assert_eq!(
            Message::parse(":op!u@h KICK #rust bob :spam").summary(),
            "bob was kicked from #rust by op (spam)"
        );
        assert_eq!(
            Message::parse(":op!u@h MODE #rust +o-v alice bob").summary(),
            "op sets mode +o-v alice bob on #rust"
        );
        assert_eq!(Message::parse(":srv 001 me :Welcome home").summary(), "Welcome home");
        assert_eq!(Message::system("Disconnected").summary(), "*** Disconnected");
    }
}

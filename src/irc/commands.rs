//! User slash-command parser.
//!
//! Parses `/command arg1 arg2 ...` input lines into typed [`ParsedCommand`]
//! values that the event handler can act on.

/// A parsed user command. Each variant corresponds to a `/command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// Fields left out fall back to the `[server]` config section.
    Connect {
        host: Option<String>,
        port: Option<u16>,
        tls: Option<bool>,
        nick: Option<String>,
    },
    Disconnect,
    Join { channel: String },
    Part { channel: Option<String>, reason: Option<String> },
    Msg { target: String, text: String },
    Query { nick: String },
    Close,
    Me { text: String },
    Nick { nick: String },
    Topic { text: Option<String> },
    Kick { nick: String, reason: Option<String> },
    Mode { args: String },
    Names { channel: Option<String> },
    /// 0 is the status view, 1.. are roster positions.
    Window { index: usize },
    Quit { message: Option<String> },
    Raw { line: String },
}

/// Parse a slash-command string into a [`ParsedCommand`].
///
/// Returns `None` if the input does not start with `/` or a required
/// argument is missing. Commands are case-insensitive; unrecognized ones are
/// passed through as [`ParsedCommand::Raw`].
pub fn parse_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let body = input.strip_prefix('/')?;

    let (cmd, rest) = match body.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (body, ""),
    };
    let rest_opt = (!rest.is_empty()).then(|| rest.to_string());
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let arg1 = parts.first().copied().filter(|s| !s.is_empty());
    let tail = parts.get(1).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    match cmd.to_lowercase().as_str() {
        "connect" | "server" => Some(parse_connect(rest)),
        "disconnect" | "dc" => Some(ParsedCommand::Disconnect),
        "join" | "j" => {
            let channel = arg1?;
            let channel = if !channel.starts_with('#') && !channel.starts_with('&') {
                format!("#{}", channel)
            } else {
                channel.to_string()
            };
            Some(ParsedCommand::Join { channel })
        }
        "part" | "leave" => {
            let (channel, reason) = match arg1 {
                Some(a) if a.starts_with('#') || a.starts_with('&') => (Some(a.to_string()), tail),
                // First arg is reason text, not a channel
                Some(_) => (None, rest_opt),
                None => (None, None),
            };
            Some(ParsedCommand::Part { channel, reason })
        }
        "msg" => {
            let target = arg1?.to_string();
            let text = tail?;
            Some(ParsedCommand::Msg { target, text })
        }
        "query" | "q" => {
            let nick = arg1?.to_string();
            Some(ParsedCommand::Query { nick })
        }
        "close" => Some(ParsedCommand::Close),
        "me" => Some(ParsedCommand::Me { text: rest_opt? }),
        "nick" => {
            let nick = arg1?.to_string();
            Some(ParsedCommand::Nick { nick })
        }
        "topic" | "t" => Some(ParsedCommand::Topic { text: rest_opt }),
        "kick" | "k" => {
            let nick = arg1?.to_string();
            Some(ParsedCommand::Kick { nick, reason: tail })
        }
        "mode" => Some(ParsedCommand::Mode { args: rest_opt? }),
        "names" => Some(ParsedCommand::Names { channel: arg1.map(str::to_string) }),
        "window" | "win" | "w" => {
            let index = arg1?.parse().ok()?;
            Some(ParsedCommand::Window { index })
        }
        "quit" | "exit" => Some(ParsedCommand::Quit { message: rest_opt }),
        "raw" | "quote" => Some(ParsedCommand::Raw { line: rest_opt? }),
        "" => None,
        _ => Some(ParsedCommand::Raw { line: body.to_string() }),
    }
}

/// `/connect host[:port] [port] [+tls|-tls] [nick]`, in any order after the
/// host.
fn parse_connect(args: &str) -> ParsedCommand {
    let mut tokens = args.split_whitespace();
    let mut host = None;
    let mut port = None;
    let mut tls = None;
    let mut nick = None;

    if let Some(addr) = tokens.next() {
        let (h, p, t) = parse_host_port(addr);
        host = Some(h);
        port = p;
        tls = t;
    }
    for token in tokens {
        match token {
            "+tls" | "-ssl" | "+ssl" | "-tls" => tls = Some(token.starts_with('+')),
            _ => match token.parse::<u16>() {
                Ok(p) => port = Some(p),
                Err(_) => nick = Some(token.to_string()),
            },
        }
    }

    ParsedCommand::Connect { host, port, tls, nick }
}

/// Parse a `host`, `host:port`, `host:+port` or `[v6]:port` address string.
///
/// The `+` prefix on the port indicates explicit TLS. Returns
/// `(host, port, tls)`; missing parts are `None`.
fn parse_host_port(addr: &str) -> (String, Option<u16>, Option<bool>) {
    if let Some((host, port_str)) = addr.rsplit_once(':') {
        let (port_str, tls) = match port_str.strip_prefix('+') {
            Some(stripped) => (stripped, Some(true)),
            None => (port_str, None),
        };
        let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            Some(bracketed) => Some(bracketed),
            // A bare IPv6 literal has no port.
            None if host.contains(':') => None,
            None => Some(host),
        };
        if let (Some(host), Ok(port)) = (host.filter(|h| !h.is_empty()), port_str.parse::<u16>()) {
            return (host.to_string(), Some(port), tls);
        }
    }
    (addr.to_string(), None, None)
}

//! Folds incoming protocol messages into session state.
//!
//! Dispatch is on [`Command`] only. Whatever a handler can't attribute to a
//! channel lands in the status view, so no line is ever silently lost.

use crate::app::state::{Session, User};
use crate::irc::message::{
    is_channel_name, Command, Message, ERR_NICKNAMEINUSE, RPL_NAMREPLY, RPL_TOPIC, RPL_WELCOME,
};
use tracing::{debug, info};

pub fn route(session: &mut Session, msg: Message) {
    if msg.command == Command::Ping {
        let token = msg.param(0).unwrap_or("").to_string();
        session.send_raw(format!("PONG :{}", token));
    }

    match msg.command.clone() {
        Command::Join => handle_join(session, msg),
        Command::Part => handle_part(session, msg),
        Command::Privmsg => handle_privmsg(session, msg),
        Command::Quit => handle_quit(session, msg),
        Command::Topic => handle_topic(session, msg),
        Command::Nick => handle_nick(session, msg),
        Command::Mode => handle_mode(session, msg),
        Command::Kick => handle_kick(session, msg),
        Command::Numeric(code) => handle_numeric(session, code, msg),
        Command::Notice
        | Command::Ping
        | Command::Pong
        | Command::Error
        | Command::System
        | Command::Unknown(_) => session.messages.push(msg),
    }
}

fn handle_join(session: &mut Session, msg: Message) {
    let channel = msg.param(0).unwrap_or("").to_string();
    let nick = msg.nick().map(str::to_string);
    let casing = session.options.nick_casing;

    if nick.as_deref().is_some_and(|n| session.is_self(n)) {
        // A channel we already hold (e.g. after a reconnect) is reused.
        let id = match session.find_channel_mut(&channel) {
            Some(ch) => {
                ch.users.clear();
                ch.messages.push(msg);
                ch.id
            }
            None => {
                let ch = session.add_channel(&channel);
                ch.messages.push(msg);
                ch.id
            }
        };
        info!("joined {}", channel);
        session.select_channel(Some(id));
    } else if let Some(ch) = session.find_channel_mut(&channel) {
        ch.messages.push(msg);
        if let Some(nick) = nick {
            ch.add_user(User::new(nick), casing);
        }
    } else {
        session.messages.push(msg);
    }
}

fn handle_part(session: &mut Session, msg: Message) {
    let channel = msg.param(0).unwrap_or("").to_string();
    let nick = msg.nick().map(str::to_string);
    let casing = session.options.nick_casing;

    if nick.as_deref().is_some_and(|n| session.is_self(n)) {
        info!("left {}", channel);
        session.remove_channel(&channel);
    } else if let Some(ch) = session.find_channel_mut(&channel) {
        ch.messages.push(msg);
        if let Some(nick) = nick {
            ch.remove_user(&nick, casing);
        }
    } else {
        session.messages.push(msg);
    }
}

fn handle_privmsg(session: &mut Session, msg: Message) {
    let target = msg.param(0).unwrap_or("").to_string();
    let active = session.active;

    if is_channel_name(&target) {
        match session.find_channel_mut(&target) {
            Some(ch) => {
                if active != Some(ch.id) {
                    ch.unread_count += 1;
                }
                ch.messages.push(msg);
            }
            None => session.messages.push(msg),
        }
        return;
    }

    // Private message: the conversation is keyed by the sender.
    let peer = msg.nick().unwrap_or("unknown").to_string();
    match session.find_channel_mut(&peer) {
        Some(ch) => {
            if active != Some(ch.id) {
                ch.unread_count += 1;
            }
            ch.messages.push(msg);
        }
        None => {
            debug!("opening conversation with {}", peer);
            let ch = session.add_channel(&peer);
            ch.messages.push(msg);
            ch.unread_count = 1;
        }
    }
}

fn handle_quit(session: &mut Session, msg: Message) {
    let Some(nick) = msg.nick().map(str::to_string) else {
        session.messages.push(msg);
        return;
    };
    let casing = session.options.nick_casing;
    for ch in session.channels.iter_mut() {
        if ch.remove_user(&nick, casing) {
            ch.messages.push(msg.clone());
        }
    }
}

fn handle_topic(session: &mut Session, msg: Message) {
    let channel = msg.param(0).unwrap_or("").to_string();
    let topic = msg.param(1).unwrap_or("").to_string();
    match session.find_channel_mut(&channel) {
        Some(ch) => {
            ch.topic = topic;
            ch.messages.push(msg);
        }
        None => session.messages.push(msg),
    }
}

fn handle_nick(session: &mut Session, msg: Message) {
    let old = msg.nick().unwrap_or("").to_string();
    let new = msg.param(0).unwrap_or("").to_string();
    let casing = session.options.nick_casing;

    if session.is_self(&old) {
        info!("nickname changed: {} -> {}", old, new);
        session.nickname = new.clone();
    }

    let mut seen = false;
    for ch in session.channels.iter_mut() {
        if let Some(user) = ch.user_mut(&old, casing) {
            user.nick = new.clone();
            ch.messages.push(msg.clone());
            ch.sort_users();
            seen = true;
        }
    }
    if !seen {
        session.messages.push(msg);
    }
}

fn handle_mode(session: &mut Session, msg: Message) {
    if msg.params.len() < 2 || !is_channel_name(&msg.params[0]) {
        session.messages.push(msg);
        return;
    }
    let casing = session.options.nick_casing;
    let Some(ch) = session.find_channel_mut(&msg.params[0]) else {
        session.messages.push(msg);
        return;
    };

    let mut targets = msg.params[2..].iter();
    let mut adding = true;
    for flag in msg.params[1].chars() {
        match flag {
            '+' => adding = true,
            '-' => adding = false,
            'o' | 'v' => {
                let Some(nick) = targets.next() else { continue };
                if let Some(user) = ch.user_mut(nick, casing) {
                    if flag == 'o' {
                        user.is_op = adding;
                    } else {
                        user.is_voice = adding;
                    }
                }
            }
            _ => {}
        }
    }
    ch.sort_users();
    ch.messages.push(msg);
}

fn handle_kick(session: &mut Session, msg: Message) {
    if msg.params.len() < 2 {
        session.messages.push(msg);
        return;
    }
    let channel = msg.params[0].clone();
    let kicked = msg.params[1].clone();
    let reason = msg.param(2).unwrap_or("No reason").to_string();
    let kicker = msg.nick().unwrap_or("someone").to_string();
    let casing = session.options.nick_casing;

    if session.is_self(&kicked) {
        info!("kicked from {} by {}: {}", channel, kicker, reason);
        match session.find_channel_mut(&channel) {
            Some(ch) => ch.messages.push(msg),
            None => session.messages.push(msg),
        }
        session.remove_channel(&channel);
        session.system_message(format!("You were kicked from {} by {}: {}", channel, kicker, reason));
    } else if let Some(ch) = session.find_channel_mut(&channel) {
        ch.messages.push(msg);
        ch.remove_user(&kicked, casing);
    } else {
        session.messages.push(msg);
    }
}

fn handle_numeric(session: &mut Session, code: u16, msg: Message) {
    match code {
        RPL_TOPIC if msg.params.len() >= 2 => {
            let topic = msg.param(2).unwrap_or("").to_string();
            match session.find_channel_mut(&msg.params[1]) {
                Some(ch) => ch.topic = topic,
                None => session.messages.push(msg),
            }
        }
        RPL_NAMREPLY if msg.params.len() >= 4 => {
            let casing = session.options.nick_casing;
            let Some(ch) = session.find_channel_mut(&msg.params[2]) else {
                session.messages.push(msg);
                return;
            };
            for token in msg.params[3].split_whitespace() {
                let user = parse_names_entry(token);
                if !user.nick.is_empty() {
                    ch.add_user(user, casing);
                }
            }
            ch.sort_users();
        }
        RPL_WELCOME => {
            session.registered = true;
            session.messages.push(msg);
            for channel in session.options.autojoin.clone() {
                session.send_raw(format!("JOIN {}", channel));
            }
        }
        ERR_NICKNAMEINUSE if !session.registered && session.options.alt_nick_on_collision => {
            let alt = format!("{}_", session.nickname);
            session.messages.push(msg);
            session.system_message(format!("Nickname {} is in use, trying {}", session.nickname, alt));
            session.nickname = alt.clone();
            session.send_raw(format!("NICK {}", alt));
        }
        // End-of-names and everything unrecognised go to the status view.
        _ => session.messages.push(msg),
    }
}

/// `@nick` is an operator, `+nick` is voiced. Servers with multi-prefix may
/// send both sigils.
fn parse_names_entry(token: &str) -> User {
    let mut user = User::new("");
    let mut rest = token;
    loop {
        if let Some(stripped) = rest.strip_prefix('@') {
            user.is_op = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('+') {
            user.is_voice = true;
            rest = stripped;
        } else {
            break;
        }
    }
    user.nick = rest.to_string();
    user
}

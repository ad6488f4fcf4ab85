//! User intent turned into protocol lines.
//!
//! Every helper goes through [`Session::send_raw`], so nothing is queued
//! while disconnected.

use crate::app::handler;
use crate::app::state::Session;
use crate::irc::message::{is_channel_name, Command, Message};

impl Session {
    pub fn join(&mut self, channel: &str) {
        self.send_raw(format!("JOIN {}", channel));
    }

    pub fn part(&mut self, channel: &str, reason: Option<&str>) {
        match reason {
            Some(reason) => self.send_raw(format!("PART {} :{}", channel, reason)),
            None => self.send_raw(format!("PART {}", channel)),
        }
    }

    /// Leave a channel. The roster entry goes away when the server echoes
    /// our `PART`.
    pub fn part_channel(&mut self, name: &str) {
        self.part(name, None);
    }

    pub fn privmsg(&mut self, target: &str, text: &str) {
        let line = format!("PRIVMSG {} :{}", target, text);
        self.echo(target, text.to_string(), &line);
        self.send_raw(line);
    }

    /// CTCP `ACTION`, i.e. `/me`.
    pub fn action(&mut self, target: &str, text: &str) {
        let body = format!("\x01ACTION {}\x01", text);
        let line = format!("PRIVMSG {} :{}", target, body);
        self.echo(target, body, &line);
        self.send_raw(line);
    }

    /// The server doesn't echo our own messages back, so they are appended
    /// to the target's history here. A conversation is opened for a nick
    /// target if needed, without selecting it. A channel we are not in never
    /// gets a roster entry; the echo lands in the status view instead.
    fn echo(&mut self, target: &str, body: String, wire: &str) {
        if !self.is_connected() {
            return;
        }
        let msg = Message::outgoing(
            &self.nickname,
            Command::Privmsg,
            vec![target.to_string(), body],
            wire,
        );
        match self.find_channel_mut(target) {
            Some(ch) => ch.messages.push(msg),
            None if is_channel_name(target) => self.messages.push(msg),
            None => self.add_channel(target).messages.push(msg),
        }
    }

    pub fn kick(&mut self, channel: &str, nick: &str, reason: Option<&str>) {
        let reason = reason.map(str::to_string).unwrap_or_else(|| self.options.kick_reason.clone());
        self.send_raw(format!("KICK {} {} :{}", channel, nick, reason));
    }

    /// `args` is the mode string plus its targets, e.g. `+o-v alice bob`.
    pub fn set_mode(&mut self, target: &str, args: &str) {
        let args = args.trim();
        if args.is_empty() {
            self.send_raw(format!("MODE {}", target));
        } else {
            self.send_raw(format!("MODE {} {}", target, args));
        }
    }

    pub fn change_nick(&mut self, nick: &str) {
        self.send_raw(format!("NICK {}", nick));
    }

    pub fn set_topic(&mut self, channel: &str, topic: &str) {
        self.send_raw(format!("TOPIC {} :{}", channel, topic));
    }

    pub fn query_topic(&mut self, channel: &str) {
        self.send_raw(format!("TOPIC {}", channel));
    }

    pub fn names(&mut self, channel: &str) {
        self.send_raw(format!("NAMES {}", channel));
    }

    /// Send `QUIT` and tear the connection down.
    pub fn quit(&mut self, message: Option<&str>) {
        let message = message.map(str::to_string).unwrap_or_else(|| self.options.quit_message.clone());
        self.send_raw(format!("QUIT :{}", message));
        handler::disconnect(self);
    }
}

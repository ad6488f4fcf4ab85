use crate::app::action::Action;
use crate::app::event::ConnectionId;
use crate::config::{AppConfig, ServerConfig};
use crate::irc::casemap::{channel_eq, NickCasing};
use crate::irc::message::{is_channel_name, Message};
use tracing::debug;

/// Stable handle to a channel in the session roster. Survives reordering and
/// removal of other channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Credentials accepted at connect time. Registration is always plain
/// `NICK`/`USER`; these are carried but never negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub nickname: String,
    pub sasl: Option<SaslCredentials>,
    pub accept_invalid_certs: bool,
}

impl From<&ServerConfig> for ConnectRequest {
    fn from(srv: &ServerConfig) -> Self {
        let sasl = match (&srv.sasl_username, &srv.sasl_password) {
            (Some(username), Some(password)) => Some(SaslCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Self {
            host: srv.host.clone(),
            port: srv.port,
            tls: srv.tls,
            nickname: srv.nickname.clone(),
            sasl,
            accept_invalid_certs: srv.accept_invalid_certs,
        }
    }
}

/// Behaviour knobs the engine reads from configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub nick_casing: NickCasing,
    pub realname: String,
    pub quit_message: String,
    pub kick_reason: String,
    pub alt_nick_on_collision: bool,
    /// Channels joined once the server welcomes us.
    pub autojoin: Vec<String>,
    /// Defaults for `/connect` arguments the user leaves out.
    pub server: ServerConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            nick_casing: cfg.behavior.nick_casing,
            realname: cfg.server.realname.clone(),
            quit_message: cfg.behavior.quit_message.clone(),
            kick_reason: cfg.behavior.kick_reason.clone(),
            alt_nick_on_collision: cfg.behavior.alt_nick_on_collision,
            autojoin: cfg.server.channels.clone(),
            server: cfg.server.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub nick: String,
    pub is_op: bool,
    pub is_voice: bool,
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            is_op: false,
            is_voice: false,
        }
    }

    /// `@` for operators, `+` for voiced users. Op wins if both are set.
    pub fn display_name(&self) -> String {
        if self.is_op {
            format!("@{}", self.nick)
        } else if self.is_voice {
            format!("+{}", self.nick)
        } else {
            self.nick.clone()
        }
    }

    fn sort_rank(&self) -> u8 {
        if self.is_op {
            0
        } else if self.is_voice {
            1
        } else {
            2
        }
    }
}

/// A joined channel or a private conversation keyed by the peer's nick.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub messages: Vec<Message>,
    pub users: Vec<User>,
    /// Empty when unset.
    pub topic: String,
    pub unread_count: usize,
}

impl Channel {
    fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            messages: Vec::new(),
            users: Vec::new(),
            topic: String::new(),
            unread_count: 0,
        }
    }

    pub fn is_private(&self) -> bool {
        !is_channel_name(&self.name)
    }

    pub fn user(&self, nick: &str, casing: NickCasing) -> Option<&User> {
        self.users.iter().find(|u| casing.eq(&u.nick, nick))
    }

    pub fn user_mut(&mut self, nick: &str, casing: NickCasing) -> Option<&mut User> {
        self.users.iter_mut().find(|u| casing.eq(&u.nick, nick))
    }

    pub fn has_user(&self, nick: &str, casing: NickCasing) -> bool {
        self.user(nick, casing).is_some()
    }

    /// Returns false if a user with that nick is already present.
    pub fn add_user(&mut self, user: User, casing: NickCasing) -> bool {
        if self.has_user(&user.nick, casing) {
            return false;
        }
        self.users.push(user);
        true
    }

    pub fn remove_user(&mut self, nick: &str, casing: NickCasing) -> bool {
        let before = self.users.len();
        self.users.retain(|u| !casing.eq(&u.nick, nick));
        self.users.len() != before
    }

    /// Operators, then voiced users, then everyone else; nick order within
    /// each group ignores case.
    pub fn sort_users(&mut self) {
        self.users.sort_by(|a, b| {
            a.sort_rank()
                .cmp(&b.sort_rank())
                .then_with(|| a.nick.to_lowercase().cmp(&b.nick.to_lowercase()))
        });
    }
}

/// The single owner of all client state. Mutated only from the event loop.
#[derive(Debug)]
pub struct Session {
    pub(crate) options: SessionOptions,
    pub(crate) nickname: String,
    pub(crate) status: ConnectionStatus,
    /// Status/server view history.
    pub(crate) messages: Vec<Message>,
    pub(crate) channels: Vec<Channel>,
    pub(crate) active: Option<ChannelId>,
    pub(crate) conn_id: Option<ConnectionId>,
    pub(crate) registered: bool,
    pub(crate) sasl: Option<SaslCredentials>,
    pub(crate) pending_actions: Vec<Action>,
    next_conn_id: ConnectionId,
    next_channel_id: u64,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            nickname: options.server.nickname.clone(),
            options,
            status: ConnectionStatus::Disconnected,
            messages: Vec::new(),
            channels: Vec::new(),
            active: None,
            conn_id: None,
            registered: false,
            sasl: None,
            pending_actions: Vec::new(),
            next_conn_id: 0,
            next_channel_id: 0,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Roster in join/open order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn active_channel(&self) -> Option<&Channel> {
        self.active.and_then(|id| self.channel(id))
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Case-insensitive lookup by channel name or private-message peer.
    pub fn find_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| channel_eq(&c.name, name))
    }

    pub(crate) fn find_channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| channel_eq(&c.name, name))
    }

    /// Id of the transport the session currently listens to.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.conn_id
    }

    pub(crate) fn is_self(&self, nick: &str) -> bool {
        self.options.nick_casing.eq(nick, &self.nickname)
    }

    pub(crate) fn allocate_conn_id(&mut self) -> ConnectionId {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        id
    }

    pub(crate) fn is_current(&self, conn_id: ConnectionId) -> bool {
        self.conn_id == Some(conn_id)
    }

    /// Append a new channel to the end of the roster.
    pub(crate) fn add_channel(&mut self, name: &str) -> &mut Channel {
        let id = ChannelId(self.next_channel_id);
        self.next_channel_id += 1;
        self.channels.push(Channel::new(id, name));
        let idx = self.channels.len() - 1;
        &mut self.channels[idx]
    }

    /// Drop a channel from the roster. If it was selected, the first
    /// remaining channel (or the status view) becomes active.
    pub(crate) fn remove_channel(&mut self, name: &str) {
        let removed: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|c| channel_eq(&c.name, name))
            .map(|c| c.id)
            .collect();
        self.channels.retain(|c| !channel_eq(&c.name, name));
        if self.active.is_some_and(|id| removed.contains(&id)) {
            let next = self.channels.first().map(|c| c.id);
            self.select_channel(next);
        }
    }

    pub(crate) fn clear_channels(&mut self) {
        self.channels.clear();
        self.active = None;
    }

    /// Make a channel the active view and clear its unread counter. `None`
    /// selects the status view.
    pub fn select_channel(&mut self, id: Option<ChannelId>) {
        self.active = id.filter(|id| self.channels.iter().any(|c| c.id == *id));
        if let Some(ch) = self.active.and_then(|id| self.channels.iter_mut().find(|c| c.id == id)) {
            ch.unread_count = 0;
        }
    }

    /// Select the conversation with `nick`, opening it if needed.
    pub fn open_private_message(&mut self, nick: &str) -> ChannelId {
        let id = match self.find_channel(nick) {
            Some(existing) => existing.id,
            None => self.add_channel(nick).id,
        };
        self.select_channel(Some(id));
        id
    }

    /// Close a private conversation. Real channels must be parted instead.
    pub fn close_private_message(&mut self, id: ChannelId) {
        let Some(name) = self.channel(id).filter(|c| c.is_private()).map(|c| c.name.clone()) else {
            debug!("close_private_message: {:?} is not an open conversation", id);
            return;
        };
        self.remove_channel(&name);
    }

    pub fn system_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::system(text));
    }

    /// Queue a raw protocol line for the current connection. Dropped unless
    /// connected.
    pub fn send_raw(&mut self, line: impl Into<String>) {
        let line = line.into();
        match (self.status, self.conn_id) {
            (ConnectionStatus::Connected, Some(conn_id)) => {
                debug!(">>> {}", line);
                self.pending_actions.push(Action::Send { conn_id, line });
            }
            _ => debug!("not connected, dropping: {}", line),
        }
    }

    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(ch: &Channel) -> Vec<String> {
        ch.users.iter().map(User::display_name).collect()
    }

    #[test]
    fn users_sort_ops_then_voice_then_rest() {
        let mut session = Session::new(SessionOptions::default());
        let ch = session.add_channel("#rust");
        ch.add_user(User::new("zed"), NickCasing::Exact);
        ch.add_user(User { nick: "Bob".into(), is_op: false, is_voice: true }, NickCasing::Exact);
        ch.add_user(User { nick: "carol".into(), is_op: true, is_voice: false }, NickCasing::Exact);
        ch.add_user(User::new("amy"), NickCasing::Exact);
        ch.add_user(User { nick: "alice".into(), is_op: true, is_voice: true }, NickCasing::Exact);
        ch.sort_users();
        assert_eq!(names(ch), vec!["@alice", "@carol", "+Bob", "amy", "zed"]);
    }

    #[test]
    fn add_user_is_idempotent() {
        let mut session = Session::new(SessionOptions::default());
        let ch = session.add_channel("#rust");
        assert!(ch.add_user(User::new("bob"), NickCasing::Exact));
        assert!(!ch.add_user(User::new("bob"), NickCasing::Exact));
        assert!(ch.add_user(User::new("Bob"), NickCasing::Exact));
        assert!(!ch.add_user(User::new("BOB"), NickCasing::Ascii));
        assert_eq!(ch.users.len(), 2);
    }

    #[test]
    fn select_resets_unread() {
        let mut session = Session::new(SessionOptions::default());
        let ch = session.add_channel("#rust");
        ch.unread_count = 4;
        let id = ch.id;
        session.select_channel(Some(id));
        assert_eq!(session.active_channel().map(|c| c.unread_count), Some(0));
        session.select_channel(None);
        assert!(session.active_channel().is_none());
    }

    #[test]
    fn removing_active_channel_selects_first_remaining() {
        let mut session = Session::new(SessionOptions::default());
        let first = session.add_channel("#a").id;
        let second = session.add_channel("#b").id;
        session.select_channel(Some(second));
        session.remove_channel("#B");
        assert_eq!(session.active, Some(first));
        session.remove_channel("#a");
        assert_eq!(session.active, None);
        assert!(session.channels().is_empty());
    }

    #[test]
    fn open_and_close_private_message() {
        let mut session = Session::new(SessionOptions::default());
        let id = session.open_private_message("dave");
        assert_eq!(session.open_private_message("Dave"), id);
        assert_eq!(session.channels().len(), 1);
        assert_eq!(session.active_channel().map(|c| c.name.as_str()), Some("dave"));

        session.close_private_message(id);
        assert!(session.channels().is_empty());
        assert!(session.active_channel().is_none());
    }

    #[test]
    fn close_private_message_ignores_real_channels() {
        let mut session = Session::new(SessionOptions::default());
        let id = session.add_channel("#rust").id;
        session.close_private_message(id);
        assert_eq!(session.channels().len(), 1);
    }

    #[test]
    fn send_raw_requires_connection() {
        let mut session = Session::new(SessionOptions::default());
        session.send_raw("PRIVMSG #a :hi");
        assert!(session.take_actions().is_empty());

        session.status = ConnectionStatus::Connected;
        session.conn_id = Some(7);
        session.send_raw("PRIVMSG #a :hi");
        assert_eq!(
            session.take_actions(),
            vec![Action::Send { conn_id: 7, line: "PRIVMSG #a :hi".into() }]
        );
    }
}

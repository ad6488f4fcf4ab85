use crate::app::action::Action;
use crate::app::event::{AppEvent, TransportEvent};
use crate::app::router;
use crate::app::state::*;
use crate::irc::commands::{self, ParsedCommand};
use crate::irc::message::Message;
use tracing::{debug, info, warn};

pub fn handle_event(session: &mut Session, event: AppEvent) -> Vec<Action> {
    let mut actions = match event {
        AppEvent::Transport { conn_id, event } => {
            if session.is_current(conn_id) {
                handle_transport(session, event);
            } else {
                debug!("ignoring {:?} from stale connection {}", event, conn_id);
            }
            vec![]
        }
        AppEvent::Input(text) => {
            handle_input(session, &text);
            vec![]
        }
        AppEvent::InputClosed => {
            if session.status() != ConnectionStatus::Disconnected {
                session.quit(None);
            }
            vec![Action::Exit]
        }
    };

    // Drain pending_actions queued by the router and intent helpers; they
    // go out before anything the event itself produced.
    let mut queued = session.take_actions();
    queued.append(&mut actions);
    queued
}

fn handle_transport(session: &mut Session, event: TransportEvent) {
    match event {
        TransportEvent::Ready => {
            info!("connected, registering as {}", session.nickname);
            session.status = ConnectionStatus::Connected;
            session.system_message(format!("Connected! Registering as {}...", session.nickname));
            if let Some(sasl) = &session.sasl {
                warn!("SASL credentials for {} ignored; registering without SASL", sasl.username);
            }
            let nick = session.nickname.clone();
            let realname = session.options.realname.clone();
            session.send_raw(format!("NICK {}", nick));
            session.send_raw(format!("USER {} 0 * :{}", nick, realname));
        }
        TransportEvent::Waiting(reason) => {
            session.system_message(format!("Waiting: {}", reason));
        }
        TransportEvent::Failed(reason) => {
            warn!("connection failed: {}", reason);
            reset_connection(session);
            session.system_message(format!("Connection Failed: {}", reason));
        }
        TransportEvent::Closed => {
            info!("connection closed by peer");
            reset_connection(session);
            session.system_message("Disconnected");
        }
        TransportEvent::Line(line) => {
            debug!("<<< {}", line);
            router::route(session, Message::parse(&line));
        }
        TransportEvent::SendFailed(reason) => {
            warn!("send failed: {}", reason);
            session.system_message(format!("Send failed: {}", reason));
        }
    }
}

fn reset_connection(session: &mut Session) {
    session.status = ConnectionStatus::Disconnected;
    session.conn_id = None;
    session.registered = false;
}

/// Start a connection. Ignored unless currently disconnected.
pub fn connect(session: &mut Session, request: ConnectRequest) {
    if session.status() != ConnectionStatus::Disconnected {
        debug!("connect to {} ignored: already {:?}", request.host, session.status());
        return;
    }

    let conn_id = session.allocate_conn_id();
    info!("connecting to {}:{} (tls: {})", request.host, request.port, request.tls);
    session.clear_channels();
    session.conn_id = Some(conn_id);
    session.status = ConnectionStatus::Connecting;
    session.registered = false;
    session.nickname = request.nickname;
    session.sasl = request.sasl;
    session.system_message(format!("Connecting to {}:{}...", request.host, request.port));
    session.pending_actions.push(Action::Open {
        conn_id,
        host: request.host,
        port: request.port,
        tls: request.tls,
        accept_invalid_certs: request.accept_invalid_certs,
    });
}

/// Tear down the connection from any state, discarding history and roster.
pub fn disconnect(session: &mut Session) {
    if let Some(conn_id) = session.conn_id {
        info!("disconnecting connection {}", conn_id);
        session.pending_actions.push(Action::Close { conn_id });
    }
    reset_connection(session);
    session.messages.clear();
    session.clear_channels();
    session.system_message("Disconnected");
}

pub fn handle_input(session: &mut Session, text: &str) {
    let text = text.trim_end_matches(&['\r', '\n'][..]);
    if text.trim().is_empty() {
        return;
    }

    if text.starts_with('/') {
        handle_command(session, text);
        return;
    }

    match active_target(session) {
        Some(target) if session.is_connected() => session.privmsg(&target, text),
        Some(_) => session.system_message("Not connected"),
        None => session.system_message("No active channel (use /join or /msg)"),
    }
}

/// Name of the selected channel or conversation.
fn active_target(session: &Session) -> Option<String> {
    session.active_channel().map(|c| c.name.clone())
}

/// The explicit channel if given, else the selected channel. Conversations
/// don't count.
fn resolve_channel(session: &Session, explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| {
        session
            .active_channel()
            .filter(|c| !c.is_private())
            .map(|c| c.name.clone())
    })
}

fn require_connection(session: &mut Session) -> bool {
    if !session.is_connected() {
        session.system_message("Not connected");
        return false;
    }
    true
}

fn handle_command(session: &mut Session, text: &str) {
    let Some(command) = commands::parse_command(text) else {
        session.system_message(format!("Invalid command or missing argument: {}", text));
        return;
    };

    match command {
        ParsedCommand::Connect { host, port, tls, nick } => {
            let defaults = session.options.server.clone();
            let mut request = ConnectRequest::from(&defaults);
            if let Some(host) = host {
                request.host = host;
            }
            if let Some(port) = port {
                request.port = port;
                request.tls = port == 6697;
            }
            if let Some(tls) = tls {
                request.tls = tls;
            }
            request.nickname = nick.unwrap_or_else(|| session.nickname.clone());
            if request.host.is_empty() {
                session.system_message("Usage: /connect host [port] [+tls|-tls] [nick]");
                return;
            }
            connect(session, request);
        }
        ParsedCommand::Disconnect => disconnect(session),
        ParsedCommand::Join { channel } => {
            if require_connection(session) {
                session.join(&channel);
            }
        }
        ParsedCommand::Part { channel, reason } => {
            if !require_connection(session) {
                return;
            }
            match resolve_channel(session, channel) {
                Some(channel) => session.part(&channel, reason.as_deref()),
                None => session.system_message("Not in a channel"),
            }
        }
        ParsedCommand::Msg { target, text } => {
            if require_connection(session) {
                session.privmsg(&target, &text);
            }
        }
        ParsedCommand::Query { nick } => {
            session.open_private_message(&nick);
        }
        ParsedCommand::Close => match session.active_channel() {
            Some(ch) if ch.is_private() => {
                let id = ch.id;
                session.close_private_message(id);
            }
            Some(ch) => {
                let name = ch.name.clone();
                if require_connection(session) {
                    session.part_channel(&name);
                }
            }
            None => session.system_message("Nothing to close"),
        },
        ParsedCommand::Me { text } => {
            if !require_connection(session) {
                return;
            }
            match active_target(session) {
                Some(target) => session.action(&target, &text),
                None => session.system_message("No active channel or query"),
            }
        }
        ParsedCommand::Nick { nick } => {
            if session.is_connected() {
                session.change_nick(&nick);
            } else {
                session.nickname = nick;
                session.system_message(format!("Nickname set to {}", session.nickname));
            }
        }
        ParsedCommand::Topic { text } => {
            if !require_connection(session) {
                return;
            }
            match (resolve_channel(session, None), text) {
                (Some(channel), Some(text)) => session.set_topic(&channel, &text),
                (Some(channel), None) => session.query_topic(&channel),
                (None, _) => session.system_message("Not in a channel"),
            }
        }
        ParsedCommand::Kick { nick, reason } => {
            if !require_connection(session) {
                return;
            }
            match resolve_channel(session, None) {
                Some(channel) => session.kick(&channel, &nick, reason.as_deref()),
                None => session.system_message("Not in a channel"),
            }
        }
        ParsedCommand::Mode { args } => {
            if !require_connection(session) {
                return;
            }
            let (target, rest) = args.split_once(' ').unwrap_or((args.as_str(), ""));
            if !target.starts_with(['+', '-']) {
                session.set_mode(target, rest);
                return;
            }
            // Bare mode string: applies to the active channel.
            match resolve_channel(session, None) {
                Some(channel) => session.set_mode(&channel, &args),
                None => session.system_message("Not in a channel"),
            }
        }
        ParsedCommand::Names { channel } => {
            if !require_connection(session) {
                return;
            }
            match resolve_channel(session, channel) {
                Some(channel) => session.names(&channel),
                None => session.system_message("Not in a channel"),
            }
        }
        ParsedCommand::Window { index: 0 } => session.select_channel(None),
        ParsedCommand::Window { index } => match session.channels().get(index - 1).map(|c| c.id) {
            Some(id) => session.select_channel(Some(id)),
            None => session.system_message(format!("No window {}", index)),
        },
        ParsedCommand::Quit { message } => {
            session.quit(message.as_deref());
            session.pending_actions.push(Action::Exit);
        }
        ParsedCommand::Raw { line } => {
            if require_connection(session) {
                session.send_raw(line);
            }
        }
    }
}

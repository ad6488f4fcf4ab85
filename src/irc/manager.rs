use crate::app::action::Action;
use crate::app::event::{AppEvent, ConnectionId};
use crate::irc::transport::{spawn_connection, Connection, Endpoint};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Carries out the engine's [`Action`]s against live transports.
pub struct ConnectionManager {
    connection: Option<Connection>,
    max_line_len: usize,
    event_tx: mpsc::UnboundedSender<AppEvent>,
}

impl ConnectionManager {
    pub fn new(event_tx: mpsc::UnboundedSender<AppEvent>, max_line_len: usize) -> Self {
        Self {
            connection: None,
            max_line_len,
            event_tx,
        }
    }

    pub fn conn_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(Connection::conn_id)
    }

    /// Returns false when the action asks the program to exit.
    pub fn execute(&mut self, action: Action) -> bool {
        match action {
            Action::Open { conn_id, host, port, tls, accept_invalid_certs } => {
                self.close_current();
                let endpoint = Endpoint { host, port, tls, accept_invalid_certs };
                self.connection = Some(spawn_connection(
                    conn_id,
                    endpoint,
                    self.max_line_len,
                    self.event_tx.clone(),
                ));
            }
            Action::Send { conn_id, line } => match &self.connection {
                Some(conn) if conn.conn_id() == conn_id => {
                    if !conn.send(line) {
                        warn!("connection {} is no longer writable", conn_id);
                    }
                }
                _ => debug!("no connection {} to send on", conn_id),
            },
            Action::Close { conn_id } => {
                if self.conn_id() == Some(conn_id) {
                    self.close_current();
                }
            }
            Action::Exit => {
                self.close_current();
                return false;
            }
        }
        true
    }

    /// Drop the transport if the session no longer considers it current,
    /// e.g. after it reported a failure.
    pub fn retain(&mut self, current: Option<ConnectionId>) {
        if self.conn_id().is_some() && self.conn_id() != current {
            self.close_current();
        }
    }

    fn close_current(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

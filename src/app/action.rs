use crate::app::event::ConnectionId;

/// Side effects requested by the engine. The event loop carries them out;
/// the engine itself never touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Open {
        conn_id: ConnectionId,
        host: String,
        port: u16,
        tls: bool,
        accept_invalid_certs: bool,
    },
    /// One protocol line, without its `\r\n` terminator.
    Send { conn_id: ConnectionId, line: String },
    Close { conn_id: ConnectionId },
    /// Leave the program.
    Exit,
}

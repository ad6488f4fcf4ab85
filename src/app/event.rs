pub type ConnectionId = usize;

/// Lifecycle and data notifications from a transport task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket (and TLS, if requested) is up.
    Ready,
    /// Transient condition while connecting; no state change.
    Waiting(String),
    Failed(String),
    /// Peer closed the stream.
    Closed,
    /// One decoded protocol line.
    Line(String),
    SendFailed(String),
}

/// Everything the event loop consumes. All state mutation happens while
/// handling one of these, on a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Transport {
        conn_id: ConnectionId,
        event: TransportEvent,
    },
    /// A line typed by the user: a slash command or text for the active view.
    Input(String),
    /// The input source reached end of file.
    InputClosed,
}

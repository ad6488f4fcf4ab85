use anyhow::Result;
use chrono::{DateTime, Local};
use marina::app::event::AppEvent;
use marina::app::handler;
use marina::app::state::*;
use marina::config;
use marina::irc::manager::ConnectionManager;
use marina::irc::message::Message;
use marina::logging;
use std::collections::HashMap;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

const USAGE: &str = "usage: marina [--write-config]";

#[tokio::main]
async fn main() -> Result<()> {
    let mut write_config = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--write-config" => write_config = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other => {
                eprintln!("unknown argument: {}\n{}", other, USAGE);
                std::process::exit(2);
            }
        }
    }

    // Load config
    let cfg = config::load_config()?;

    if write_config {
        let path = config::save_config(&cfg)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    if let Some(path) = logging::init(&cfg.logging)? {
        info!("marina {} starting, logging to {}", env!("CARGO_PKG_VERSION"), path.display());
    }

    if let Err(e) = run(cfg).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cfg: config::AppConfig) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();

    let mut session = Session::new(SessionOptions::from(&cfg));
    let mut manager = ConnectionManager::new(event_tx.clone(), cfg.behavior.max_line_len);
    let mut printer = Printer::new(cfg.ui.timestamp_format.clone());

    // Spawn stdin input task
    let input_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if input_tx.send(AppEvent::Input(line)).is_err() {
                return;
            }
        }
        let _ = input_tx.send(AppEvent::InputClosed);
    });
    drop(event_tx);

    if cfg.server.auto_connect {
        handler::connect(&mut session, ConnectRequest::from(&cfg.server));
    } else {
        session.system_message("Type /connect [host] [port] [+tls|-tls] [nick] to start");
    }
    let mut running = true;
    for action in session.take_actions() {
        running &= manager.execute(action);
    }
    printer.flush(&session)?;

    while running {
        let Some(event) = event_rx.recv().await else {
            break;
        };
        let actions = handler::handle_event(&mut session, event);
        printer.flush(&session)?;

        for action in actions {
            running &= manager.execute(action);
        }
        manager.retain(session.connection_id());
    }

    info!("event loop finished");
    Ok(())
}

/// Prints whatever history the session gained since the last flush.
struct Printer {
    timestamp_format: String,
    status_seen: usize,
    /// Timestamp of the first status line, to notice when history is reset.
    status_first: Option<DateTime<Local>>,
    channel_seen: HashMap<ChannelId, usize>,
}

impl Printer {
    fn new(timestamp_format: String) -> Self {
        Self {
            timestamp_format,
            status_seen: 0,
            status_first: None,
            channel_seen: HashMap::new(),
        }
    }

    fn flush(&mut self, session: &Session) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();

        let first = session.messages().first().map(|m| m.timestamp);
        if first != self.status_first || session.messages().len() < self.status_seen {
            self.status_seen = 0;
            self.status_first = first;
        }
        for msg in &session.messages()[self.status_seen..] {
            self.print(&mut out, "*", msg)?;
        }
        self.status_seen = session.messages().len();

        self.channel_seen.retain(|id, _| session.channel(*id).is_some());
        let active = session.active_channel().map(|c| c.id);
        for ch in session.channels() {
            let label = if Some(ch.id) == active || ch.unread_count == 0 {
                ch.name.clone()
            } else {
                format!("{} ({})", ch.name, ch.unread_count)
            };
            let seen = self.channel_seen.get(&ch.id).copied().unwrap_or(0);
            for msg in ch.messages.iter().skip(seen) {
                self.print(&mut out, &label, msg)?;
            }
            self.channel_seen.insert(ch.id, ch.messages.len());
        }
        out.flush()
    }

    fn print(&self, out: &mut impl Write, view: &str, msg: &Message) -> io::Result<()> {
        writeln!(
            out,
            "{} [{}] {}",
            msg.formatted_time(&self.timestamp_format),
            view,
            msg.summary()
        )
    }
}

//! WebSocket fan-out standing in for the browser's runtime messaging.
//!
//! Page scripts connect with `channel=page&tabId=<id>`, the popup with
//! `channel=popup`. Each connection gets an unbounded channel; a closed
//! channel is skipped and cleaned up when its socket loop ends.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use models::messages::OutboundMessage;
use service::bridge::PageBridge;

pub type WsSender = mpsc::UnboundedSender<Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Page { tab_id: Option<u32> },
    Popup,
}

struct Connection {
    channel: Channel,
    sender: WsSender,
}

#[derive(Default)]
pub struct WsBridge {
    connections: RwLock<HashMap<String, Connection>>,
    enabled_tabs: RwLock<BTreeSet<u32>>,
}

impl WsBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; the receiver yields frames to forward to its socket.
    pub fn add(&self, conn_id: String, channel: Channel) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut conns) = self.connections.write() {
            conns.insert(conn_id, Connection { channel, sender: tx });
        }
        rx
    }

    pub fn remove(&self, conn_id: &str) {
        if let Ok(mut conns) = self.connections.write() {
            conns.remove(conn_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_action_enabled(&self, tab_id: u32) -> bool {
        self.enabled_tabs.read().map(|t| t.contains(&tab_id)).unwrap_or(false)
    }

    /// Close every connection; used on shutdown.
    pub fn shutdown_all(&self) {
        if let Ok(mut conns) = self.connections.write() {
            let count = conns.len();
            for conn in conns.values() {
                let _ = conn.sender.send(Message::Close(None));
            }
            conns.clear();
            info!(count, "closed all bridge connections");
        }
    }

    fn send_where(&self, msg: &OutboundMessage, wanted: impl Fn(&Channel) -> bool) -> usize {
        let text = match serde_json::to_string(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "cannot encode outbound message");
                return 0;
            }
        };
        let Ok(conns) = self.connections.read() else { return 0 };
        conns
            .values()
            .filter(|conn| wanted(&conn.channel))
            .filter(|conn| conn.sender.send(Message::Text(text.clone())).is_ok())
            .count()
    }
}

impl PageBridge for WsBridge {
    fn send_to_pages(&self, msg: &OutboundMessage) -> usize {
        self.send_where(msg, |c| matches!(c, Channel::Page { .. }))
    }

    fn send_to_popup(&self, msg: &OutboundMessage) -> bool {
        self.send_where(msg, |c| *c == Channel::Popup) > 0
    }

    fn enable_action_button(&self, tab_id: u32) {
        if let Ok(mut tabs) = self.enabled_tabs.write() {
            if tabs.insert(tab_id) {
                debug!(tab_id, "action button enabled");
            }
        }
    }

    fn open_url(&self, url: &str) {
        let msg = OutboundMessage::OpenTab { url: url.to_string() };
        if !self.send_to_popup(&msg) && self.send_to_pages(&msg) == 0 {
            warn!(url, "no connected client to open url");
        }
    }
}

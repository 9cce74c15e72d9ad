use models::messages::OutboundMessage;

/// Outbound side of the runtime messaging: page scripts in game tabs and the popup.
///
/// Delivery is best-effort. Nobody listening is not an error.
pub trait PageBridge: Send + Sync {
    /// Broadcast to every connected page script; returns how many received it.
    fn send_to_pages(&self, msg: &OutboundMessage) -> usize;
    /// Send to the popup if it is open.
    fn send_to_popup(&self, msg: &OutboundMessage) -> bool;
    /// Enable the toolbar action on `tab_id`. Repeated calls are no-ops.
    fn enable_action_button(&self, tab_id: u32);
    /// Ask the browser side to open `url` in a new tab.
    fn open_url(&self, url: &str);
}

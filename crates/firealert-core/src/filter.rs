//! Alert filter
//!
//! Decides whether a raw datagram is a real fire alert. The protocol is a
//! literal one: after UTF-8 decoding and trimming surrounding whitespace the
//! payload must be exactly `"1"`. Everything else, including malformed
//! UTF-8, is noise.

use tracing::debug;

/// The only payload that counts as an alert
pub const ALERT_SIGNAL: &str = "1";

/// Returns `true` if `payload` is a fire alert
pub fn is_fire_alert(payload: &[u8]) -> bool {
    match std::str::from_utf8(payload) {
        Ok(text) if text.trim() == ALERT_SIGNAL => true,
        Ok(text) => {
            debug!("Push notification requested and filtered. Payload: {:?}", text);
            false
        }
        Err(_) => {
            debug!(
                "Push notification requested and filtered. Payload is not UTF-8: {:?}",
                String::from_utf8_lossy(payload)
            );
            false
        }
    }
}

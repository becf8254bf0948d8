//! Outbound one-time code delivery
//!
//! Delivery is fire-and-forget from the caller's point of view: a failed
//! delivery is logged and never fails the flow that issued the code.

use crate::Result;
use std::fmt;
use std::sync::Mutex;

/// Channel that carries one-time codes to a phone
pub trait OtpNotifier: Send + Sync + fmt::Debug {
    /// Implementations must not block on slow delivery.
    fn deliver(&self, phone: &str, code: &str) -> Result<()>;
}

/// Deliver `code`, logging instead of propagating failure
pub fn dispatch(notifier: &dyn OtpNotifier, phone: &str, code: &str) {
    if let Err(e) = notifier.deliver(phone, code) {
        tracing::warn!("OTP delivery to {} failed: {}", mask_phone(phone), e);
    }
}

/// `+998901234567` -> `+99890*****67`
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 7 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..chars.len() - 7].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}*****{tail}")
}

/// Notifier that only records the delivery in the log, without the code
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl OtpNotifier for TracingNotifier {
    fn deliver(&self, phone: &str, _code: &str) -> Result<()> {
        tracing::info!("📨 OTP dispatched to {}", mask_phone(phone));
        Ok(())
    }
}

/// Notifier that keeps every delivered code in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent code delivered to `phone`
    pub fn last_code(&self, phone: &str) -> Option<String> {
        let sent = self.sent.lock().ok()?;
        sent.iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, code)| code.clone())
    }

    pub fn delivered(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl OtpNotifier for RecordingNotifier {
    fn deliver(&self, phone: &str, code: &str) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| crate::internal_error!("Notifier lock error"))?
            .push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

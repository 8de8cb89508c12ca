//! OTP delivery collaborator.

/// Out-of-band delivery of one-time codes (mail, SMS, ...).
///
/// Fire-and-forget: a delivery failure is the collaborator's to log and does
/// not roll back OTP issuance.
pub trait OtpDelivery: Send + Sync {
    fn deliver(&self, email: &str, code: &str);
}

/// Dev/test delivery that writes the code to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogOtpDelivery;

impl OtpDelivery for LogOtpDelivery {
    fn deliver(&self, email: &str, code: &str) {
        tracing::info!(email, code, "mock OTP delivery");
    }
}

//! Alert handling.
//!
//! Alerts open out of band, so [`handle_alert`] waits for one to be present
//! before responding to it. Reading the text of an alert the caller believes
//! is already open is a no-wait operation: absence surfaces immediately as
//! [`NoAlert`](crate::EsperarError::NoAlert).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::result::{EsperarResult, FailureKind};
use crate::session::Session;
use crate::wait::{wait_for, WaitPolicy};

/// How to respond to an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    /// Confirm the alert
    Accept,
    /// Cancel the alert
    Dismiss,
}

/// Wait for an alert to be present, respond to it, and return its text.
///
/// The absence of an alert counts as "not yet" while polling, regardless of
/// the policy's own ignored set.
///
/// # Errors
///
/// Returns a timeout if no alert opens within the policy's deadline.
pub fn handle_alert<S>(
    session: &S,
    action: DialogAction,
    policy: &WaitPolicy,
) -> EsperarResult<String>
where
    S: Session + ?Sized,
{
    let policy = policy.clone().also_ignoring(FailureKind::NoAlert);
    wait_for(session, "alert to be present", &policy, |s: &S| {
        let text = s.alert_text()?;
        debug!("responding {action:?} to alert {text:?}");
        match action {
            DialogAction::Accept => s.accept_alert()?,
            DialogAction::Dismiss => s.dismiss_alert()?,
        }
        Ok(Some(text))
    })
}

/// Read the text of the currently open alert, without waiting.
///
/// # Errors
///
/// Returns [`NoAlert`](crate::EsperarError::NoAlert) immediately when no
/// alert is open.
pub fn alert_text<S>(session: &S) -> EsperarResult<String>
where
    S: Session + ?Sized,
{
    session.alert_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FakeSession;
    use std::time::Duration;

    fn fast_policy() -> WaitPolicy {
        WaitPolicy::new()
            .with_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_accept_returns_text() {
        let session = FakeSession::new();
        session.set_alert("Delete 3 items?");

        let text = handle_alert(&session, DialogAction::Accept, &fast_policy()).unwrap();
        assert_eq!(text, "Delete 3 items?");
        assert_eq!(session.accepted_alerts(), vec!["Delete 3 items?".to_string()]);
    }

    #[test]
    fn test_dismiss_records_dismissal() {
        let session = FakeSession::new();
        session.set_alert("Leave page?");

        handle_alert(&session, DialogAction::Dismiss, &fast_policy()).unwrap();
        assert_eq!(session.dismissed_alerts(), vec!["Leave page?".to_string()]);
        assert!(session.accepted_alerts().is_empty());
    }

    #[test]
    fn test_no_alert_times_out() {
        let session = FakeSession::new();
        let err = handle_alert(&session, DialogAction::Accept, &fast_policy()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_alert_text_is_immediate() {
        let session = FakeSession::new();
        let err = alert_text(&session).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoAlert);

        session.set_alert("hi");
        assert_eq!(alert_text(&session).unwrap(), "hi");
    }
}

//! Poll lifecycle
//!
//! A poll's state is a pure function of the clock and its window. Nothing
//! here is persisted and no timer ever transitions a poll; every caller
//! recomputes the state from `now`.

use crate::types::{Poll, PollWindow};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Computed state of a poll at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// Start instant lies in the future
    Scheduled,
    /// `now` within `[start, end]`, treating absent bounds as unbounded
    Open,
    /// End instant lies in the past
    Closed,
}

impl PollState {
    /// Classify `window` at `now`
    pub fn at(window: &PollWindow, now: DateTime<Utc>) -> Self {
        if window.start().is_some_and(|start| now < start) {
            PollState::Scheduled
        } else if window.end().is_some_and(|end| now > end) {
            PollState::Closed
        } else {
            PollState::Open
        }
    }
}

impl Poll {
    /// Computed state of this poll at `now`
    pub fn state(&self, now: DateTime<Utc>) -> PollState {
        PollState::at(&self.window, now)
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == PollState::Closed
    }
}

/// Reject candidate roster changes on a closed poll
pub fn ensure_roster_mutable(poll: &Poll, now: DateTime<Utc>) -> Result<()> {
    if poll.is_closed(now) {
        tracing::warn!("Roster change refused: poll={} is closed", poll.id);
        return Err(Error::PollClosed);
    }
    Ok(())
}

/// Exactly the polls whose computed state is `Closed`, in input order
pub fn finished<'a, I>(polls: I, now: DateTime<Utc>) -> Vec<&'a Poll>
where
    I: IntoIterator<Item = &'a Poll>,
{
    polls.into_iter().filter(|poll| poll.is_closed(now)).collect()
}

/// Reject windows whose resolved end precedes their resolved start
pub fn validate_window(window: &PollWindow) -> Result<()> {
    if let (Some(start), Some(end)) = (window.start(), window.end()) {
        if end < start {
            return Err(Error::validation("end", "end must not precede start"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn poll_with(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Poll {
        Poll::new("Poll", "", PollWindow::between(start, end), now())
    }

    #[test]
    fn test_state_transitions() {
        let hour = Duration::hours(1);

        let scheduled = poll_with(Some(now() + hour), Some(now() + hour * 2));
        assert_eq!(scheduled.state(now()), PollState::Scheduled);

        let open = poll_with(Some(now() - hour), Some(now() + hour));
        assert_eq!(open.state(now()), PollState::Open);

        let closed = poll_with(Some(now() - hour * 2), Some(now() - hour));
        assert_eq!(closed.state(now()), PollState::Closed);
        assert!(closed.is_closed(now()));
    }

    #[test]
    fn test_unbounded_sides() {
        assert_eq!(poll_with(None, None).state(now()), PollState::Open);
        assert_eq!(
            poll_with(None, Some(now() - Duration::seconds(1))).state(now()),
            PollState::Closed
        );
        assert_eq!(
            poll_with(Some(now() + Duration::seconds(1)), None).state(now()),
            PollState::Scheduled
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let poll = poll_with(Some(now()), Some(now()));
        assert_eq!(poll.state(now()), PollState::Open);
    }

    #[test]
    fn test_half_window_is_no_bound() {
        let mut poll = poll_with(None, Some(now() - Duration::days(1)));
        poll.window.end_time = None;
        assert_eq!(poll.state(now()), PollState::Open);
    }

    #[test]
    fn test_roster_gate() {
        let closed = poll_with(None, Some(now() - Duration::minutes(1)));
        assert!(matches!(
            ensure_roster_mutable(&closed, now()),
            Err(Error::PollClosed)
        ));

        let scheduled = poll_with(Some(now() + Duration::minutes(1)), None);
        assert!(ensure_roster_mutable(&scheduled, now()).is_ok());
    }

    #[test]
    fn test_finished_selects_only_closed() {
        let polls = vec![
            poll_with(None, Some(now() - Duration::hours(1))),
            poll_with(None, None),
            poll_with(Some(now() + Duration::hours(1)), None),
            poll_with(None, Some(now() - Duration::days(3))),
        ];

        let done = finished(&polls, now());
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].id, polls[0].id);
        assert_eq!(done[1].id, polls[3].id);
    }

    #[test]
    fn test_window_validation() {
        let inverted = PollWindow::between(Some(now()), Some(now() - Duration::hours(1)));
        assert!(matches!(
            validate_window(&inverted),
            Err(Error::Validation { ref field, .. }) if field == "end"
        ));
        assert!(validate_window(&PollWindow::unbounded()).is_ok());
    }
}

/// Page cycle state definitions for the crawl controller
///
/// This module defines every state a page cycle can be in and the transitions
/// allowed between them.
use std::fmt;

/// Represents the current state of the crawl controller's page cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    /// No page has been requested yet
    Idle,

    // ===== Happy Path =====
    /// A fetch attempt for the current page is in flight
    Fetching,

    /// The fetched page was parsed into records
    ParsedOk,

    /// The page's records were appended to the sink
    Written,

    /// The cursor moved on to the next page
    Advanced,

    // ===== Failure Path =====
    /// The last fetch attempt failed
    Failed,

    /// Waiting out the backoff before another attempt
    Retrying,

    /// All attempts failed and the page was given up on
    Skipped,

    // ===== Terminal States =====
    /// The page had no next-page link
    DoneNoNext,

    /// The cursor passed the upper bound
    DoneAtLimit,

    /// An external cancellation was observed
    Cancelled,
}

impl CycleState {
    /// Returns true if the crawl is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DoneNoNext | Self::DoneAtLimit | Self::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CycleState) -> bool {
        use CycleState::*;

        matches!(
            (self, next),
            (Idle, Fetching)
                | (Idle, DoneAtLimit)
                | (Idle, Cancelled)
                | (Fetching, ParsedOk)
                | (Fetching, Failed)
                | (Fetching, Cancelled)
                | (ParsedOk, Written)
                | (Written, Advanced)
                | (Written, DoneNoNext)
                | (Failed, Retrying)
                | (Failed, Skipped)
                | (Retrying, Fetching)
                | (Retrying, Cancelled)
                | (Skipped, Advanced)
                | (Advanced, Fetching)
                | (Advanced, DoneAtLimit)
                | (Advanced, Cancelled)
        )
    }

    /// Stable lowercase label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::ParsedOk => "parsed_ok",
            Self::Written => "written",
            Self::Advanced => "advanced",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Skipped => "skipped",
            Self::DoneNoNext => "done_no_next",
            Self::DoneAtLimit => "done_at_limit",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Why a crawl run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The last fetched page had no next-page link
    NoNextPage,

    /// The next page number would exceed the upper bound
    AtLimit { upper_bound: u32 },

    /// Stopped by an external cancellation signal
    Cancelled,
}

impl Termination {
    /// The terminal cycle state this reason corresponds to
    pub fn state(&self) -> CycleState {
        match self {
            Self::NoNextPage => CycleState::DoneNoNext,
            Self::AtLimit { .. } => CycleState::DoneAtLimit,
            Self::Cancelled => CycleState::Cancelled,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNextPage => write!(f, "no next-page link found"),
            Self::AtLimit { upper_bound } => write!(f, "reached upper bound of {} pages", upper_bound),
            Self::Cancelled => write!(f, "cancelled by user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(CycleState::DoneNoNext.is_terminal());
        assert!(CycleState::DoneAtLimit.is_terminal());
        assert!(CycleState::Cancelled.is_terminal());

        assert!(!CycleState::Idle.is_terminal());
        assert!(!CycleState::Fetching.is_terminal());
        assert!(!CycleState::Skipped.is_terminal());
        assert!(!CycleState::Advanced.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            CycleState::Idle,
            CycleState::Fetching,
            CycleState::ParsedOk,
            CycleState::Written,
            CycleState::Advanced,
            CycleState::Fetching,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_retry_and_skip_transitions() {
        assert!(CycleState::Fetching.can_transition_to(CycleState::Failed));
        assert!(CycleState::Failed.can_transition_to(CycleState::Retrying));
        assert!(CycleState::Retrying.can_transition_to(CycleState::Fetching));
        assert!(CycleState::Failed.can_transition_to(CycleState::Skipped));
        assert!(CycleState::Skipped.can_transition_to(CycleState::Advanced));
    }

    #[test]
    fn test_illegal_transitions() {
        // Records must be written before the cursor moves
        assert!(!CycleState::ParsedOk.can_transition_to(CycleState::Advanced));
        assert!(!CycleState::Fetching.can_transition_to(CycleState::Written));
        assert!(!CycleState::Skipped.can_transition_to(CycleState::Written));
        assert!(!CycleState::Failed.can_transition_to(CycleState::Fetching));

        // Terminal states are final
        for terminal in [
            CycleState::DoneNoNext,
            CycleState::DoneAtLimit,
            CycleState::Cancelled,
        ] {
            assert!(!terminal.can_transition_to(CycleState::Fetching));
            assert!(!terminal.can_transition_to(CycleState::Advanced));
        }
    }

    #[test]
    fn test_termination_state_mapping() {
        assert_eq!(Termination::NoNextPage.state(), CycleState::DoneNoNext);
        assert_eq!(
            Termination::AtLimit { upper_bound: 100 }.state(),
            CycleState::DoneAtLimit
        );
        assert_eq!(Termination::Cancelled.state(), CycleState::Cancelled);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CycleState::ParsedOk), "parsed_ok");
        assert_eq!(format!("{}", CycleState::DoneAtLimit), "done_at_limit");
        assert_eq!(
            format!("{}", Termination::AtLimit { upper_bound: 100 }),
            "reached upper bound of 100 pages"
        );
    }
}

//! Operation state
//!
//! Snapshot of one remote operation's lifecycle.

/// Lifecycle phase derived from an [`OperationState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

/// `{ data, loading, error }` as seen by a view
///
/// After a settled attempt exactly one of `data` / `error` is set; both are
/// empty before the first attempt and after a reset. While a call is pending
/// the previous `data` stays visible.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> OperationState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }

    pub fn fulfilled(data: T) -> Self {
        Self {
            data: Some(data),
            loading: false,
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            data: None,
            loading: false,
            error: Some(message.into()),
        }
    }

    /// Enter the pending phase, keeping any previous data
    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Pending
        } else if self.error.is_some() {
            Phase::Rejected
        } else if self.data.is_some() {
            Phase::Fulfilled
        } else {
            Phase::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases() {
        assert_eq!(OperationState::<u32>::idle().phase(), Phase::Idle);
        assert_eq!(OperationState::fulfilled(1).phase(), Phase::Fulfilled);
        assert_eq!(OperationState::<u32>::rejected("x").phase(), Phase::Rejected);

        let mut state = OperationState::<u32>::rejected("old");
        state.begin();
        assert_eq!(state.phase(), Phase::Pending);
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_begin_keeps_previous_data() {
        let mut state = OperationState::fulfilled("cached");
        state.begin();
        assert!(state.loading);
        assert_eq!(state.data, Some("cached"));
    }
}

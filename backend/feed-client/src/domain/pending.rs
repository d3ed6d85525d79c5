/// Lifecycle of one optimistic operation
///
/// State transitions:
/// - Idle → Pending(prev): optimistic change applied locally, `prev` kept for rollback
/// - Pending → Committed: remote confirmed the change
/// - Pending → RolledBack: remote failed, `prev` handed back to the caller
///
/// Any other transition is a stale response and leaves the state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingOp<T> {
    #[default]
    Idle,
    Pending(T),
    Committed,
    RolledBack,
}

impl<T> PendingOp<T> {
    pub fn begin(&mut self, prev: T) -> bool {
        match self {
            PendingOp::Idle => {
                *self = PendingOp::Pending(prev);
                true
            }
            _ => false,
        }
    }

    pub fn commit(&mut self) -> bool {
        match self {
            PendingOp::Pending(_) => {
                *self = PendingOp::Committed;
                true
            }
            _ => false,
        }
    }

    /// Returns the pre-operation value when the operation was still pending
    pub fn roll_back(&mut self) -> Option<T> {
        match std::mem::replace(self, PendingOp::RolledBack) {
            PendingOp::Pending(prev) => Some(prev),
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PendingOp::Pending(_))
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, PendingOp::Committed | PendingOp::RolledBack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut op = PendingOp::Idle;
        assert!(op.begin(3));
        assert!(op.is_pending());
        assert!(op.commit());
        assert_eq!(op, PendingOp::Committed);
    }

    #[test]
    fn test_rollback_returns_previous_value_once() {
        let mut op = PendingOp::Idle;
        op.begin(3);
        assert_eq!(op.roll_back(), Some(3));
        assert_eq!(op.roll_back(), None);
        assert_eq!(op, PendingOp::RolledBack);
    }

    #[test]
    fn test_stale_transitions_are_ignored() {
        let mut op: PendingOp<u32> = PendingOp::Idle;
        assert!(!op.commit());
        assert_eq!(op.roll_back(), None);
        assert_eq!(op, PendingOp::Idle);

        op.begin(1);
        op.commit();
        assert!(!op.begin(2));
        assert_eq!(op.roll_back(), None);
        assert_eq!(op, PendingOp::Committed);
        assert!(op.is_settled());
    }
}

use evlog_types::LogId;

use crate::error::{StoreError, StoreResult};

/// Pick the identifier for the next record.
///
/// Starts after `latest`, wraps from `u16::MAX` to 1, and skips identifiers
/// for which `in_use` returns `true`.
pub fn next_free_id(latest: LogId, in_use: impl Fn(LogId) -> bool) -> StoreResult<LogId> {
    let mut candidate = latest.next_wrapping();
    for _ in 0..u16::MAX {
        if !in_use(candidate) {
            return Ok(candidate);
        }
        candidate = candidate.next_wrapping();
    }
    Err(StoreError::IdsExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn first_id_is_one() {
        assert_eq!(next_free_id(LogId::UNASSIGNED, |_| false).unwrap(), LogId::new(1));
    }

    #[test]
    fn follows_latest() {
        assert_eq!(next_free_id(LogId::new(9), |_| false).unwrap(), LogId::new(10));
    }

    #[test]
    fn wraps_and_skips_live_ids() {
        let live: BTreeSet<LogId> = [1, 2].into_iter().map(LogId::new).collect();
        let id = next_free_id(LogId::new(u16::MAX), |id| live.contains(&id)).unwrap();
        assert_eq!(id, LogId::new(3));
    }

    #[test]
    fn exhausted_when_everything_is_live() {
        let err = next_free_id(LogId::new(5), |_| true).unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted));
    }
}

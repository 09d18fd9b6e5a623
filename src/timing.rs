//! Pacing and next-wakeup arithmetic for the event loop.
//!
//! All timestamps are monotonic [`Instant`]s, so the underflow handling a
//! wall-clock implementation would need simply cannot arise here;
//! `saturating_duration_since` covers the remaining edge.

use std::time::Duration;
use tokio::time::Instant;

/// Minimum gap between two serial writes to the same receiver. The receiver
/// drops commands that arrive faster than it can process them.
pub const COMMAND_WAIT: Duration = Duration::from_millis(80);

/// Interval between countdown broadcasts for an active zone sleep timer.
pub const SLEEP_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of a pacing check against [`COMMAND_WAIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Enough time has passed since the last write; send now.
    Ready,
    /// Too soon; the next write becomes possible at this instant.
    WaitUntil(Instant),
}

/// Check whether a command may be written to a receiver whose most recent
/// write happened at `last_cmd` (`None` if it has never been written to).
pub fn pace(last_cmd: Option<Instant>, now: Instant) -> Pace {
    match last_cmd {
        None => Pace::Ready,
        Some(last) => {
            let gate = last + COMMAND_WAIT;
            if now >= gate {
                Pace::Ready
            } else {
                Pace::WaitUntil(gate)
            }
        }
    }
}

/// Fold a candidate deadline into the accumulated next-wakeup time.
///
/// `None` means "no timeout set"; otherwise the earlier instant wins. The
/// event loop folds every pacing gate, sleep deadline and countdown tick
/// through this to get its single select timeout.
pub fn fold_deadline(acc: Option<Instant>, candidate: Instant) -> Option<Instant> {
    match acc {
        None => Some(candidate),
        Some(current) => Some(current.min(candidate)),
    }
}

/// Whole minutes until `deadline`, rounded up; 0 once it has passed.
pub fn minutes_remaining(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    let mut secs = left.as_secs();
    if left.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.div_ceil(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_written_is_ready() {
        assert_eq!(pace(None, Instant::now()), Pace::Ready);
    }

    #[test]
    fn recent_write_must_wait() {
        let now = Instant::now();
        match pace(Some(now), now + Duration::from_millis(30)) {
            Pace::WaitUntil(gate) => assert_eq!(gate, now + COMMAND_WAIT),
            Pace::Ready => panic!("30 ms after a write is too soon"),
        }
    }

    #[test]
    fn old_write_is_ready() {
        let now = Instant::now();
        assert_eq!(pace(Some(now), now + COMMAND_WAIT), Pace::Ready);
        assert_eq!(pace(Some(now), now + Duration::from_secs(1)), Pace::Ready);
    }

    #[test]
    fn fold_prefers_earlier() {
        let now = Instant::now();
        let soon = now + Duration::from_millis(10);
        let later = now + Duration::from_secs(5);
        assert_eq!(fold_deadline(None, later), Some(later));
        assert_eq!(fold_deadline(Some(later), soon), Some(soon));
        assert_eq!(fold_deadline(Some(soon), later), Some(soon));
    }

    #[test]
    fn minutes_round_up() {
        let now = Instant::now();
        assert_eq!(minutes_remaining(now, now), 0);
        assert_eq!(minutes_remaining(now + Duration::from_secs(1), now), 1);
        assert_eq!(minutes_remaining(now + Duration::from_secs(60), now), 1);
        assert_eq!(minutes_remaining(now + Duration::from_secs(61), now), 2);
        assert_eq!(minutes_remaining(now + Duration::from_secs(300), now), 5);
        assert_eq!(
            minutes_remaining(now + Duration::from_millis(240_500), now),
            5
        );
    }
}

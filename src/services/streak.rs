//! Win/loss streaks over a chronological sequence of trade outcomes.

use crate::types::TradeOutcome;

/// Current and longest streak. Positive values are win runs, negative values
/// loss runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streaks {
    pub current: i32,
    pub longest: i32,
}

/// Compute streaks from outcomes ordered oldest first.
///
/// A breakeven resets the running counter. The longest run is compared by
/// magnitude; on a tie the earlier run keeps its sign.
pub fn compute_streaks<I>(outcomes: I) -> Streaks
where
    I: IntoIterator<Item = TradeOutcome>,
{
    let mut current = 0i32;
    let mut longest = 0i32;

    for outcome in outcomes {
        current = match outcome {
            TradeOutcome::Win if current > 0 => current + 1,
            TradeOutcome::Win => 1,
            TradeOutcome::Loss if current < 0 => current - 1,
            TradeOutcome::Loss => -1,
            TradeOutcome::Breakeven => 0,
        };

        if current.abs() > longest.abs() {
            longest = current;
        }
    }

    Streaks { current, longest }
}

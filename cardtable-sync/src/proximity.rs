//! Merge-target lookup for dropped stacks.
//!
//! Linear scan over the visible stacks. Tables hold at most a few dozen
//! stacks, so a spatial index would cost more than it saves.

use crate::protocol::Position;
use crate::stack::Stack;

/// Squared distance under which a dropped stack merges into its neighbour.
pub const MERGE_THRESHOLD_SQUARED: i64 = 5000;

/// Nearest stack to `position` strictly within [`MERGE_THRESHOLD_SQUARED`].
///
/// Skips `dragged` itself and every stack that is mid-drag. Equidistant
/// candidates resolve to the one enumerated first.
pub fn resolve<'a, I>(dragged: &str, position: Position, stacks: I) -> Option<&'a Stack>
where
    I: IntoIterator<Item = &'a Stack>,
{
    let mut best: Option<(&Stack, i64)> = None;
    for stack in stacks {
        if stack.id() == dragged || stack.is_moving() {
            continue;
        }
        let d = stack.position().distance_squared(&position);
        if d >= MERGE_THRESHOLD_SQUARED {
            continue;
        }
        // strict `<` keeps the earliest of equal candidates
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((stack, d));
        }
    }
    best.map(|(stack, _)| stack)
}

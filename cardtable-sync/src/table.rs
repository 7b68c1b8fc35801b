//! The client's view of the table and the snapshot merge.
//!
//! Stacks are kept in render order: index 0 is drawn first, the last stack
//! is on top. The same order is the enumeration order used for proximity
//! tie-breaks, so it must stay deterministic.
//!
//! ## Merge rules
//!
//! ```text
//! cause == ping            → drop every non-moving stack first
//! entry id is moving       → ignore entry (zero count defers removal)
//! entry id known           → zero count removes, else overwrite + confirm
//! entry id tombstoned      → skip until the server echoes our drop
//! entry id new, self pop/  → adopt a provisional local stack
//!   drop/put snapshot
//! entry id new             → create confirmed
//! confirmed, not listed    → remove
//! local, not listed        → keep (in-flight intent)
//! ```
//!
//! Every rule depends only on the current view and the entry, so applying a
//! snapshot twice gives the same view as applying it once.

use std::collections::HashSet;

use crate::protocol::{CauseAction, StackId, StackState};
use crate::stack::Stack;

/// Counters describing what one snapshot did to the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Stacks dropped up front by a ping-caused refresh.
    pub cleared: usize,
    pub created: usize,
    /// Confirmed stacks whose fields changed.
    pub updated: usize,
    /// Local stacks the snapshot confirmed.
    pub confirmed: usize,
    pub removed: usize,
    /// Provisional stacks renamed to a server id.
    pub adopted: usize,
    /// Entries ignored because their stack is mid-drag.
    pub deferred: usize,
    /// Entries ignored because the stack was merged away locally.
    pub skipped: usize,
}

/// Where a snapshot came from, as far as the merge cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotCause {
    pub action: Option<CauseAction>,
    /// Whether this client's own action provoked the snapshot.
    pub by_self: bool,
}

impl SnapshotCause {
    fn is_refresh(&self) -> bool {
        self.action == Some(CauseAction::Ping)
    }

    /// Our own pop/drop/put just landed: new server stacks may be the
    /// provisional ones we already show.
    fn adoption(&self) -> Option<CauseAction> {
        self.action.filter(|action| {
            self.by_self
                && matches!(
                    action,
                    CauseAction::PopCard | CauseAction::DropStack | CauseAction::PutCard
                )
        })
    }

    /// Our own drop/move just landed: stacks merged away locally are now
    /// reflected by the server.
    fn releases_tombstones(&self) -> bool {
        self.by_self
            && matches!(
                self.action,
                Some(CauseAction::DropStack | CauseAction::MoveStack)
            )
    }
}

/// Ordered collection of visible stacks.
#[derive(Debug, Default, Clone)]
pub struct TableView {
    stacks: Vec<Stack>,
    /// Ids merged away locally whose removal the server has not echoed.
    tombstones: HashSet<StackId>,
    /// `(provisional id, server id)` pairs renamed by the last snapshot.
    adoptions: Vec<(StackId, StackId)>,
}

impl TableView {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────── queries ─────────────────────

    /// Stacks in render order, bottom first.
    pub fn iter(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.iter()
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Stack> {
        self.stacks.iter_mut().find(|s| s.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    /// Stacks still awaiting an authoritative echo.
    pub fn local_stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.iter().filter(|s| s.is_local())
    }

    /// Renames performed by the most recent [`TableView::apply_snapshot`].
    pub fn last_adoptions(&self) -> &[(StackId, StackId)] {
        &self.adoptions
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.contains(id)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.stacks.iter().position(|s| s.id() == id)
    }

    // ───────────────────── local mutation ─────────────────────

    /// Add a stack on top of the render order.
    pub fn insert(&mut self, stack: Stack) {
        if let Some(i) = self.index_of(stack.id()) {
            self.stacks.remove(i);
        }
        self.stacks.push(stack);
    }

    pub fn remove(&mut self, id: &str) -> Option<Stack> {
        self.index_of(id).map(|i| self.stacks.remove(i))
    }

    /// Move a stack to the top of the render order.
    pub fn raise(&mut self, id: &str) {
        if let Some(i) = self.index_of(id) {
            self.raise_index(i);
        }
    }

    fn raise_index(&mut self, i: usize) {
        if i + 1 < self.stacks.len() {
            let stack = self.stacks.remove(i);
            self.stacks.push(stack);
        }
    }

    /// Remember that `id` was merged away locally, so stale snapshots
    /// do not resurrect it.
    pub fn tombstone(&mut self, id: &str) {
        self.tombstones.insert(id.to_owned());
    }

    /// Position of the first stack matching `pred`, in enumeration order.
    fn find_index(&self, pred: impl Fn(&Stack) -> bool) -> Option<usize> {
        self.stacks.iter().position(pred)
    }

    // ───────────────────── snapshot merge ─────────────────────

    /// Merge a full authoritative snapshot into the view.
    pub fn apply_snapshot(&mut self, entries: &[StackState], cause: SnapshotCause) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome::default();
        self.adoptions.clear();

        if cause.is_refresh() {
            let before = self.stacks.len();
            self.stacks.retain(Stack::is_moving);
            outcome.cleared = before - self.stacks.len();
            self.tombstones.clear();
        }
        if cause.releases_tombstones() {
            self.tombstones.clear();
        }
        self.tombstones
            .retain(|id| entries.iter().any(|e| &e.stack_id == id));

        for entry in entries {
            self.merge_entry(entry, entries, cause, &mut outcome);
        }

        let listed: HashSet<&str> = entries.iter().map(|e| e.stack_id.as_str()).collect();
        let before = self.stacks.len();
        self.stacks
            .retain(|s| s.is_local() || listed.contains(s.id()));
        outcome.removed += before - self.stacks.len();

        outcome
    }

    fn merge_entry(
        &mut self,
        entry: &StackState,
        entries: &[StackState],
        cause: SnapshotCause,
        outcome: &mut SnapshotOutcome,
    ) {
        if let Some(i) = self.index_of(&entry.stack_id) {
            self.merge_known(i, entry, outcome);
            return;
        }

        if entry.remaining_cards == 0 {
            return;
        }
        if self.tombstones.contains(&entry.stack_id) {
            outcome.skipped += 1;
            return;
        }

        if let Some(action) = cause.adoption() {
            if let Some(i) = self.adoption_candidate(action, entry, entries) {
                let stack = &mut self.stacks[i];
                log::debug!("Adopting {} as {}", stack.id(), entry.stack_id);
                self.adoptions
                    .push((stack.id().to_owned(), entry.stack_id.clone()));
                stack.rename(entry.stack_id.clone());
                outcome.adopted += 1;
                if !stack.is_moving() {
                    stack.apply_state(entry);
                    stack.confirm();
                }
                return;
            }
        }

        self.stacks.push(Stack::from_state(entry));
        outcome.created += 1;
    }

    fn merge_known(&mut self, i: usize, entry: &StackState, outcome: &mut SnapshotOutcome) {
        let stack = &mut self.stacks[i];

        if stack.is_moving() {
            if entry.remaining_cards == 0 {
                stack.defer_removal();
            }
            outcome.deferred += 1;
            return;
        }

        if entry.remaining_cards == 0 {
            self.stacks.remove(i);
            outcome.removed += 1;
            return;
        }

        let was_local = stack.is_local();
        let changed = !stack.matches(entry);
        let moved = stack.apply_state(entry);
        stack.confirm();

        if was_local {
            outcome.confirmed += 1;
        } else if changed {
            outcome.updated += 1;
        }
        if moved {
            self.raise_index(i);
        }
    }

    /// Provisional stack the server most likely created as `entry`.
    ///
    /// Pops and drops only adopt splits, puts only adopt hand cards. Among
    /// those, a stack at the entry's position wins, then a split whose
    /// source the snapshot lists, then the oldest one.
    fn adoption_candidate(
        &self,
        action: CauseAction,
        entry: &StackState,
        entries: &[StackState],
    ) -> Option<usize> {
        let eligible = |s: &Stack| {
            s.is_provisional()
                && match action {
                    CauseAction::PutCard => s.is_from_hand(),
                    _ => s.is_split(),
                }
        };
        let source_listed = |s: &Stack| {
            s.split_source()
                .is_some_and(|source| entries.iter().any(|e| e.stack_id == source))
        };

        self.find_index(|s| eligible(s) && s.position() == entry.position)
            .or_else(|| self.find_index(|s| eligible(s) && source_listed(s)))
            .or_else(|| self.find_index(eligible))
    }
}

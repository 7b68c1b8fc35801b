//! Reconciliation engine: gestures, optimistic mutations and the outbox.
//!
//! The engine owns the [`TableView`] and the local hand. Input arrives as
//! touch gestures and table intents, which mutate the view immediately and
//! queue [`Action`]s for the server. Server [`Event`]s are merged back in
//! with [`Engine::apply_event`].
//!
//! ## Gesture lifecycle
//!
//! ```text
//! touch_down ──► pending ──touch_move──► dragging ──touch_up──► drop
//!                   │                                          (merge or place)
//!                   └──────────touch_up──────────► tap
//!                                                  (flip or take)
//! ```
//!
//! The engine performs no I/O. Whoever drives it drains the outbox into the
//! connection and feeds received events back, all from one task, so a
//! snapshot never lands halfway through a drop.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::card::Card;
use crate::protocol::{Action, CauseAction, Event, GameId, PlayerId, Position, StackId, StackState};
use crate::proximity;
use crate::stack::Stack;
use crate::table::{SnapshotCause, SnapshotOutcome, TableView};

/// Identifier of one finger, as reported by the input layer.
pub type TouchId = u64;

/// Squared distance a finger must travel before a press becomes a drag.
pub const DRAG_START_SQUARED: i64 = 1;

/// Things the UI should tell the player about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server rejected an action. The session continues.
    ServerError { code: String, message: String },
    /// The owner closed the game.
    GameClosed,
}

/// Fingers on one stack.
#[derive(Debug, Clone)]
struct Gesture {
    /// Stack the fingers went down on.
    touched: StackId,
    /// First finger. Only its movement drives the drag.
    primary: TouchId,
    fingers: usize,
    start: Position,
    last: Position,
    /// Stack under the fingers once dragging started.
    dragged: Option<StackId>,
}

impl Gesture {
    fn is_dragging(&self) -> bool {
        self.dragged.is_some()
    }

    /// The stack this gesture currently holds on to.
    fn held(&self) -> &str {
        self.dragged.as_deref().unwrap_or(&self.touched)
    }
}

/// Client-side game state.
#[derive(Debug)]
pub struct Engine {
    table: TableView,
    hand: Vec<Card>,
    player_id: Option<PlayerId>,
    game_id: Option<GameId>,
    owner: Option<PlayerId>,
    players: Vec<PlayerId>,

    gestures: BTreeMap<u64, Gesture>,
    next_gesture: u64,
    /// Finger → gesture it belongs to.
    touches: BTreeMap<TouchId, u64>,

    outbox: VecDeque<Action>,
    notices: VecDeque<Notice>,

    move_interval: Duration,
    last_tick: Option<Instant>,
    /// Last position sent in a `MoveStack`, per dragged stack.
    reported: HashMap<StackId, Position>,

    closed: bool,
}

impl Engine {
    /// `player_id` decides which snapshots count as caused by this client.
    /// When unknown, every snapshot with a cause player is treated as ours.
    pub fn new(player_id: Option<PlayerId>, move_interval: Duration) -> Self {
        Self {
            table: TableView::new(),
            hand: Vec::new(),
            player_id,
            game_id: None,
            owner: None,
            players: Vec::new(),
            gestures: BTreeMap::new(),
            next_gesture: 0,
            touches: BTreeMap::new(),
            outbox: VecDeque::new(),
            notices: VecDeque::new(),
            move_interval,
            last_tick: None,
            reported: HashMap::new(),
            closed: false,
        }
    }

    // ───────────────────── accessors ─────────────────────

    pub fn table(&self) -> &TableView {
        &self.table
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of fingers currently down.
    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }

    pub fn is_touch_active(&self, touch: TouchId) -> bool {
        self.touches.contains_key(&touch)
    }

    /// Id of the stack `touch` is dragging, if it is.
    pub fn dragged_by(&self, touch: TouchId) -> Option<&str> {
        let key = self.touches.get(&touch)?;
        self.gestures.get(key)?.dragged.as_deref()
    }

    pub fn pending_actions(&self) -> usize {
        self.outbox.len()
    }

    /// Queued actions in FIFO order.
    pub fn drain_outbox(&mut self) -> Vec<Action> {
        self.outbox.drain(..).collect()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn enqueue(&mut self, action: Action) {
        log::trace!("Queued {}", action.tag());
        self.outbox.push_back(action);
    }

    // ───────────────────── gestures ─────────────────────

    /// A finger went down on `stack`. Returns whether the touch was taken.
    pub fn touch_down(&mut self, touch: TouchId, stack: &str, position: Position) -> bool {
        if self.closed || self.touches.contains_key(&touch) {
            return false;
        }
        let Some(target) = self.table.get(stack) else {
            log::debug!("Touch {touch} on unknown stack {stack}");
            return false;
        };
        if target.is_moving() {
            return false;
        }

        let pending = self
            .gestures
            .iter_mut()
            .find(|(_, g)| g.touched == stack && !g.is_dragging());
        let key = match pending {
            Some((_, gesture)) if gesture.fingers >= 2 => return false,
            Some((&key, gesture)) => {
                gesture.fingers += 1;
                key
            }
            None => {
                let key = self.next_gesture;
                self.next_gesture += 1;
                self.gestures.insert(
                    key,
                    Gesture {
                        touched: stack.to_owned(),
                        primary: touch,
                        fingers: 1,
                        start: position,
                        last: position,
                        dragged: None,
                    },
                );
                key
            }
        };
        self.touches.insert(touch, key);
        true
    }

    /// A finger moved. Starts the drag on first real movement.
    pub fn touch_move(&mut self, touch: TouchId, position: Position) {
        let Some(&key) = self.touches.get(&touch) else {
            return;
        };
        let Some(gesture) = self.gestures.get(&key) else {
            return;
        };
        if gesture.primary != touch {
            return;
        }

        if gesture.is_dragging() {
            self.drag_to(key, position);
        } else if gesture.start.distance_squared(&position) >= DRAG_START_SQUARED
            && !self.start_drag(key, position)
        {
            self.end_gesture(key);
        }
    }

    /// A finger lifted. Ends the whole gesture it belongs to.
    pub fn touch_up(&mut self, touch: TouchId, position: Position) {
        let Some(&key) = self.touches.get(&touch) else {
            return;
        };
        if let Some(gesture) = self.gestures.get(&key) {
            if gesture.primary == touch && gesture.is_dragging() {
                self.drag_to(key, position);
            }
        }

        let Some(gesture) = self.end_gesture(key) else {
            return;
        };
        match gesture.dragged {
            Some(dragged) => self.drop_stack(&dragged),
            None if gesture.fingers >= 2 => self.take_card(&gesture.touched),
            None => self.flip_card(&gesture.touched),
        }
    }

    fn end_gesture(&mut self, key: u64) -> Option<Gesture> {
        let gesture = self.gestures.remove(&key)?;
        self.touches.retain(|_, k| *k != key);
        if let Some(dragged) = &gesture.dragged {
            self.reported.remove(dragged);
        }
        Some(gesture)
    }

    /// Returns false if the touched stack is gone.
    fn start_drag(&mut self, key: u64, position: Position) -> bool {
        let Some(gesture) = self.gestures.get(&key) else {
            return false;
        };
        let touched = gesture.touched.clone();
        let fingers = gesture.fingers;
        let start = gesture.start;

        let Some(source) = self.table.get_mut(&touched) else {
            log::debug!("Stack {touched} vanished before the drag started");
            return false;
        };

        // a provisional source cannot be popped on the server, drag it whole
        let split = fingers == 1 && source.remaining_cards() > 1 && !source.is_provisional();
        let dragged = if split {
            let Some(card) = source.pop_card() else {
                return false;
            };
            source.mark_local();

            let mut popped = Stack::split_from(&touched, position, card);
            popped.begin_move();
            let id = popped.id().to_owned();
            self.table.insert(popped);
            self.enqueue(Action::PopCard {
                stack: touched.clone(),
            });
            log::debug!("Split {id} off {touched}");
            id
        } else {
            source.begin_move();
            source.set_position(source.position().translated(start, position));
            self.table.raise(&touched);
            touched
        };

        if let Some(gesture) = self.gestures.get_mut(&key) {
            gesture.dragged = Some(dragged);
            gesture.last = position;
        }
        true
    }

    fn drag_to(&mut self, key: u64, position: Position) {
        let Some(gesture) = self.gestures.get_mut(&key) else {
            return;
        };
        let last = std::mem::replace(&mut gesture.last, position);
        let Some(dragged) = gesture.dragged.as_deref() else {
            return;
        };
        if let Some(stack) = self.table.get_mut(dragged) {
            stack.set_position(stack.position().translated(last, position));
        }
    }

    fn drop_stack(&mut self, dragged: &str) {
        let Some(stack) = self.table.get_mut(dragged) else {
            return;
        };
        stack.end_move();

        if stack.removal_deferred() {
            log::debug!("Stack {dragged} was removed by the server during the drag");
            self.table.remove(dragged);
            return;
        }

        let position = stack.position();
        let wire_id = match stack.take_origin() {
            Some(origin) => Some(origin),
            None if stack.is_provisional() => None,
            None => Some(stack.id().to_owned()),
        };

        let target = proximity::resolve(dragged, position, self.table.iter())
            .map(|t| (t.id().to_owned(), t.position()));

        let drop_at = match target {
            Some((target_id, target_position)) => {
                let Some(removed) = self.table.remove(dragged) else {
                    return;
                };
                if let Some(target) = self.table.get_mut(&target_id) {
                    target.push_cards(removed.remaining_cards(), removed.visible_card());
                    target.mark_local();
                }
                self.table.raise(&target_id);
                if !removed.is_provisional() {
                    self.table.tombstone(removed.id());
                }
                log::debug!("Merged {dragged} into {target_id}");
                target_position
            }
            None => position,
        };

        match wire_id {
            Some(stack) => self.enqueue(Action::DropStack {
                stack,
                position: drop_at,
            }),
            None => log::debug!("Drop of {dragged} not sent, server id unknown"),
        }
    }

    /// One-finger tap.
    fn flip_card(&mut self, id: &str) {
        let Some(stack) = self.table.get_mut(id) else {
            return;
        };
        if stack.is_provisional() {
            log::debug!("Flip of {id} ignored, server id unknown");
            return;
        }
        stack.flip_top();
        stack.mark_local();
        self.enqueue(Action::FlipCard { stack: id.to_owned() });
    }

    /// Two-finger tap.
    fn take_card(&mut self, id: &str) {
        let Some(stack) = self.table.get_mut(id) else {
            return;
        };
        if stack.is_provisional() {
            log::debug!("Take from {id} ignored, server id unknown");
            return;
        }
        let Some(card) = stack.pop_card() else {
            return;
        };
        stack.mark_local();
        if stack.is_empty() {
            self.table.remove(id);
            self.table.tombstone(id);
        }
        self.hand.push(card);
        self.enqueue(Action::TakeCard { stack: id.to_owned() });
    }

    // ───────────────────── move ticker ─────────────────────

    /// Report positions of in-place drags. Rate-limited by the move
    /// interval; returns how many `MoveStack` actions were queued.
    ///
    /// Only stacks still under a finger are reported. A released stack is
    /// settled by its `DropStack`, so sending its position again would race
    /// the drop.
    pub fn tick(&mut self, now: Instant) -> usize {
        if let Some(last) = self.last_tick {
            if now.saturating_duration_since(last) < self.move_interval {
                return 0;
            }
        }
        self.last_tick = Some(now);

        let mut moves = Vec::new();
        for gesture in self.gestures.values() {
            let Some(dragged) = gesture.dragged.as_deref() else {
                continue;
            };
            let Some(stack) = self.table.get(dragged) else {
                continue;
            };
            if !stack.is_moving() || stack.is_provisional() {
                continue;
            }
            if self.reported.get(dragged) == Some(&stack.position()) {
                continue;
            }
            moves.push((dragged.to_owned(), stack.position()));
        }

        let count = moves.len();
        for (stack, position) in moves {
            self.reported.insert(stack.clone(), position);
            self.enqueue(Action::MoveStack { stack, position });
        }
        count
    }

    // ───────────────────── hand & table intents ─────────────────────

    /// Play a hand card onto the table.
    pub fn put_card(&mut self, hand_index: usize, position: Position, face_down: bool) -> bool {
        if hand_index >= self.hand.len() {
            log::debug!("No hand card at index {hand_index}");
            return false;
        }
        let card = self.hand.remove(hand_index);
        let shown = if face_down { card.face_down() } else { card };
        self.table.insert(Stack::create_local(position, shown));
        self.enqueue(Action::PutCard {
            hand_index,
            position,
            face_down,
        });
        true
    }

    /// Hand a card to another player.
    pub fn give_player(&mut self, hand_index: usize, trade_to: &str) -> bool {
        if hand_index >= self.hand.len() {
            log::debug!("No hand card at index {hand_index}");
            return false;
        }
        self.hand.remove(hand_index);
        self.enqueue(Action::GivePlayer {
            hand_index,
            trade_to: trade_to.to_owned(),
        });
        true
    }

    pub fn flip_stack(&mut self, stack: &str) -> bool {
        self.stack_intent(stack, |stack| Action::FlipStack { stack })
    }

    pub fn shuffle(&mut self, stack: &str) -> bool {
        self.stack_intent(stack, |stack| Action::Shuffle { stack })
    }

    pub fn deal(&mut self, stack: &str) -> bool {
        self.stack_intent(stack, |stack| Action::Deal { stack })
    }

    pub fn reset(&mut self) {
        self.enqueue(Action::Reset);
    }

    pub fn leave(&mut self) {
        self.enqueue(Action::LeaveGame);
    }

    fn stack_intent(&mut self, id: &str, make: impl FnOnce(StackId) -> Action) -> bool {
        match self.table.get(id).map(Stack::is_provisional) {
            Some(false) => {
                self.enqueue(make(id.to_owned()));
                true
            }
            Some(true) => {
                log::debug!("Stack {id} has no server id yet");
                false
            }
            None => {
                log::debug!("Unknown stack {id}");
                false
            }
        }
    }

    // ───────────────────── server events ─────────────────────

    /// Merge one server event. Returns the snapshot outcome for
    /// `game-state` events that carried stacks.
    pub fn apply_event(&mut self, event: Event) -> Option<SnapshotOutcome> {
        match event {
            Event::GameState {
                game_id,
                cause_action,
                cause_player,
                owner,
                players,
                stacks,
            } => {
                self.game_id = Some(game_id);
                if owner.is_some() {
                    self.owner = owner;
                }
                if let Some(players) = players {
                    self.players = players;
                }
                let stacks = stacks?;
                Some(self.apply_snapshot(&stacks, cause_action, cause_player.as_deref()))
            }
            Event::PlayerState { game_id, hand } => {
                self.game_id = Some(game_id);
                self.hand = hand;
                None
            }
            Event::Error { error, message } => {
                log::warn!("Server rejected an action: {error}: {message}");
                self.notices.push_back(Notice::ServerError {
                    code: error,
                    message,
                });
                None
            }
            Event::CloseGame => {
                log::info!("Game closed by the owner");
                self.closed = true;
                self.gestures.clear();
                self.touches.clear();
                self.notices.push_back(Notice::GameClosed);
                None
            }
            Event::Success | Event::Pong => None,
        }
    }

    fn apply_snapshot(
        &mut self,
        stacks: &[StackState],
        action: Option<CauseAction>,
        cause_player: Option<&str>,
    ) -> SnapshotOutcome {
        let by_self = match (cause_player, self.player_id.as_deref()) {
            (Some(cause), Some(me)) => cause == me,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let outcome = self
            .table
            .apply_snapshot(stacks, SnapshotCause { action, by_self });
        log::debug!("Applied snapshot ({action:?}, self: {by_self}): {outcome:?}");

        for (old, new) in self.table.last_adoptions() {
            for gesture in self.gestures.values_mut() {
                if gesture.touched == *old {
                    gesture.touched = new.clone();
                }
                if gesture.dragged.as_ref() == Some(old) {
                    gesture.dragged = Some(new.clone());
                }
            }
        }

        // pending gestures whose stack the snapshot removed
        let table = &self.table;
        let stale: Vec<u64> = self
            .gestures
            .iter()
            .filter(|(_, g)| !table.contains(g.held()))
            .map(|(&key, _)| key)
            .collect();
        for key in stale {
            self.end_gesture(key);
        }

        let table = &self.table;
        self.reported.retain(|id, _| table.contains(id));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    const ME: &str = "me";

    fn seven() -> Card {
        Card::numerical(7, Suit::Spades).unwrap()
    }

    fn state(id: &str, x: i32, y: i32, count: u32) -> StackState {
        StackState {
            stack_id: id.into(),
            position: Position::new(x, y),
            visible_card: seven(),
            remaining_cards: count,
        }
    }

    fn snapshot(cause: Option<CauseAction>, player: Option<&str>, stacks: Vec<StackState>) -> Event {
        Event::GameState {
            game_id: "g".into(),
            cause_action: cause,
            cause_player: player.map(str::to_owned),
            owner: Some(ME.into()),
            players: Some(vec![ME.into(), "bob".into()]),
            stacks: Some(stacks),
        }
    }

    fn engine_with(stacks: Vec<StackState>) -> Engine {
        let mut engine = Engine::new(Some(ME.into()), Duration::from_millis(100));
        engine.apply_event(snapshot(Some(CauseAction::JoinGame), Some(ME), stacks));
        engine
    }

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_split_then_merge() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3), state("D", 300, 0, 1)]);

        assert!(engine.touch_down(1, "S", p(0, 0)));
        engine.touch_move(1, p(100, 0));

        let source = engine.table().get("S").unwrap();
        assert_eq!(source.remaining_cards(), 2);
        assert_eq!(source.visible_card(), Card::HIDDEN);
        assert!(source.is_local());

        let split_id = engine.dragged_by(1).unwrap().to_owned();
        let split = engine.table().get(&split_id).unwrap();
        assert!(split.is_moving());
        assert_eq!(split.remaining_cards(), 1);
        assert_eq!(split.position(), p(100, 0));
        assert_eq!(split.origin(), Some("S"));

        engine.touch_move(1, p(299, 0));
        engine.touch_up(1, p(300, 0));

        let target = engine.table().get("D").unwrap();
        assert_eq!(target.remaining_cards(), 2);
        assert_eq!(target.visible_card(), seven());
        assert!(target.is_local());
        assert!(!engine.table().contains(&split_id));
        assert_eq!(engine.table().stacks().last().unwrap().id(), "D");

        let outbox = engine.drain_outbox();
        assert_eq!(
            outbox,
            vec![
                Action::PopCard { stack: "S".into() },
                Action::DropStack {
                    stack: "S".into(),
                    position: p(300, 0),
                },
            ]
        );
        assert_eq!(engine.active_touches(), 0);
    }

    #[test]
    fn test_single_card_drags_in_place() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);

        engine.touch_down(1, "S", p(5, 5));
        engine.touch_move(1, p(55, 5));
        let stack = engine.table().get("S").unwrap();
        assert!(stack.is_moving());
        assert_eq!(stack.position(), p(50, 0));
        assert_eq!(engine.pending_actions(), 0);

        engine.touch_up(1, p(1000, 5));
        let stack = engine.table().get("S").unwrap();
        assert!(!stack.is_moving());
        assert!(stack.is_local());
        assert_eq!(stack.position(), p(995, 0));
        assert_eq!(
            engine.drain_outbox(),
            vec![Action::DropStack {
                stack: "S".into(),
                position: p(995, 0),
            }]
        );
    }

    #[test]
    fn test_two_finger_drag_moves_whole_stack() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);

        assert!(engine.touch_down(1, "S", p(0, 0)));
        assert!(engine.touch_down(2, "S", p(10, 0)));
        engine.touch_move(1, p(500, 0));

        assert_eq!(engine.table().len(), 1);
        assert_eq!(engine.table().get("S").unwrap().remaining_cards(), 3);

        engine.touch_up(2, p(10, 0));
        assert_eq!(engine.active_touches(), 0);
        assert_eq!(
            engine.drain_outbox(),
            vec![Action::DropStack {
                stack: "S".into(),
                position: p(500, 0),
            }]
        );
    }

    #[test]
    fn test_touch_activity_follows_fingers() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        assert!(!engine.is_touch_active(4));
        assert!(engine.touch_down(4, "S", p(0, 0)));
        assert!(engine.is_touch_active(4));
        assert!(!engine.touch_down(4, "S", p(0, 0)));
        engine.touch_up(4, p(0, 0));
        assert!(!engine.is_touch_active(4));
    }

    #[test]
    fn test_third_touch_is_ignored() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        assert!(engine.touch_down(1, "S", p(0, 0)));
        assert!(engine.touch_down(2, "S", p(0, 0)));
        assert!(!engine.touch_down(3, "S", p(0, 0)));
        assert!(!engine.touch_down(1, "S", p(0, 0)));
        assert!(!engine.touch_down(4, "missing", p(0, 0)));
        assert_eq!(engine.active_touches(), 2);
    }

    #[test]
    fn test_tap_flips_top_card() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_up(1, p(0, 0));

        let stack = engine.table().get("S").unwrap();
        assert!(stack.visible_card().is_face_down());
        assert!(stack.is_local());
        assert_eq!(engine.drain_outbox(), vec![Action::FlipCard { stack: "S".into() }]);
    }

    #[test]
    fn test_two_finger_tap_takes_card() {
        let mut engine = engine_with(vec![state("S", 0, 0, 2)]);
        for _ in 0..2 {
            engine.touch_down(1, "S", p(0, 0));
            engine.touch_down(2, "S", p(0, 0));
            engine.touch_up(2, p(0, 0));
        }

        assert_eq!(engine.hand(), &[seven(), Card::HIDDEN]);
        assert!(!engine.table().contains("S"));
        assert!(engine.table().is_tombstoned("S"));
        assert_eq!(
            engine.drain_outbox(),
            vec![
                Action::TakeCard { stack: "S".into() },
                Action::TakeCard { stack: "S".into() },
            ]
        );
    }

    #[test]
    fn test_moving_stack_ignores_snapshots_until_drop() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(40, 0));

        let stale = snapshot(Some(CauseAction::FlipCard), Some("bob"), vec![state("S", 7, 7, 4)]);
        for _ in 0..3 {
            let outcome = engine.apply_event(stale.clone()).unwrap();
            assert_eq!(outcome.deferred, 1);
        }
        let stack = engine.table().get("S").unwrap();
        assert_eq!(stack.position(), p(40, 0));
        assert_eq!(stack.remaining_cards(), 1);

        engine.touch_up(1, p(40, 0));
        engine.apply_event(stale);
        let stack = engine.table().get("S").unwrap();
        assert_eq!(stack.position(), p(7, 7));
        assert_eq!(stack.remaining_cards(), 4);
        assert!(!stack.is_local());
    }

    #[test]
    fn test_removal_during_drag_is_deferred_to_drop() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(40, 0));

        engine.apply_event(snapshot(Some(CauseAction::TakeCard), Some("bob"), vec![state("S", 0, 0, 0)]));
        assert!(engine.table().get("S").unwrap().removal_deferred());

        engine.touch_up(1, p(80, 0));
        assert!(!engine.table().contains("S"));
        assert!(engine.drain_outbox().is_empty());
    }

    #[test]
    fn test_move_ticker_is_rate_limited() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        let t0 = Instant::now();

        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(10, 0));
        assert_eq!(engine.tick(t0), 1);

        engine.touch_move(1, p(20, 0));
        assert_eq!(engine.tick(t0 + Duration::from_millis(10)), 0);
        assert_eq!(engine.tick(t0 + Duration::from_millis(100)), 1);
        assert_eq!(engine.tick(t0 + Duration::from_millis(200)), 0);

        assert_eq!(
            engine.drain_outbox(),
            vec![
                Action::MoveStack {
                    stack: "S".into(),
                    position: p(10, 0),
                },
                Action::MoveStack {
                    stack: "S".into(),
                    position: p(20, 0),
                },
            ]
        );
    }

    #[test]
    fn test_split_drags_are_not_reported() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(10, 0));
        engine.drain_outbox();
        assert_eq!(engine.tick(Instant::now()), 0);
    }

    #[test]
    fn test_adoption_during_drag_renames_gesture() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(100, 0));

        let outcome = engine
            .apply_event(snapshot(
                Some(CauseAction::PopCard),
                Some(ME),
                vec![state("S", 0, 0, 2), state("n", 0, 0, 1)],
            ))
            .unwrap();
        assert_eq!(outcome.adopted, 1);
        assert_eq!(engine.dragged_by(1), Some("n"));
        let adopted = engine.table().get("n").unwrap();
        assert!(adopted.is_moving());
        assert_eq!(adopted.position(), p(100, 0));

        engine.touch_up(1, p(400, 0));
        assert_eq!(
            engine.drain_outbox(),
            vec![
                Action::PopCard { stack: "S".into() },
                Action::DropStack {
                    stack: "n".into(),
                    position: p(400, 0),
                },
            ]
        );
    }

    #[test]
    fn test_rejected_put_is_not_adopted_by_split() {
        let ace = Card::numerical(1, Suit::Hearts).unwrap();
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        engine.apply_event(Event::PlayerState {
            game_id: "g".into(),
            hand: vec![ace],
        });
        assert!(engine.put_card(0, p(500, 500), false));
        engine.apply_event(Event::Error {
            error: "bad-put".into(),
            message: "rejected".into(),
        });

        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(100, 0));
        engine.apply_event(snapshot(
            Some(CauseAction::PopCard),
            Some(ME),
            vec![state("S", 0, 0, 2), state("n", 0, 0, 1)],
        ));

        assert_eq!(engine.dragged_by(1), Some("n"));
        assert_eq!(engine.table().get("n").unwrap().position(), p(100, 0));
        let placed = engine.table().local_stacks().find(|s| s.is_from_hand()).unwrap();
        assert_eq!(placed.visible_card(), ace);
        assert_eq!(placed.position(), p(500, 500));
    }

    #[test]
    fn test_adoption_after_drop() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(100, 0));
        engine.touch_up(1, p(400, 0));

        engine.apply_event(snapshot(
            Some(CauseAction::DropStack),
            Some(ME),
            vec![state("S", 0, 0, 2), state("n", 400, 0, 1)],
        ));
        assert_eq!(engine.table().len(), 2);
        assert_eq!(engine.table().local_stacks().count(), 0);
    }

    #[test]
    fn test_foreign_snapshot_does_not_adopt() {
        let mut engine = engine_with(vec![state("S", 0, 0, 3)]);
        engine.touch_down(1, "S", p(0, 0));
        engine.touch_move(1, p(100, 0));
        engine.touch_up(1, p(400, 0));

        engine.apply_event(snapshot(
            Some(CauseAction::DropStack),
            Some("bob"),
            vec![state("S", 0, 0, 2), state("n", 400, 0, 1)],
        ));
        assert_eq!(engine.table().len(), 3);
        assert_eq!(engine.table().local_stacks().count(), 1);
    }

    #[test]
    fn test_local_stacks_survive_until_refresh() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        engine.apply_event(Event::PlayerState {
            game_id: "g".into(),
            hand: vec![seven()],
        });
        assert!(engine.put_card(0, p(50, 50), false));

        // a reconnect delivers a snapshot that predates our put-card
        engine.apply_event(snapshot(Some(CauseAction::JoinGame), Some(ME), vec![state("S", 0, 0, 1)]));
        assert_eq!(engine.table().local_stacks().count(), 1);

        engine.apply_event(snapshot(Some(CauseAction::Ping), Some(ME), vec![state("S", 0, 0, 1)]));
        assert_eq!(engine.table().local_stacks().count(), 0);
        assert_eq!(engine.table().len(), 1);
    }

    #[test]
    fn test_pong_and_success_change_nothing() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1), state("T", 90, 0, 2)]);
        let before = engine.table().stacks().to_vec();

        assert!(engine.apply_event(Event::Pong).is_none());
        assert!(engine.apply_event(Event::Success).is_none());

        assert_eq!(engine.table().stacks(), before.as_slice());
        assert_eq!(engine.pending_actions(), 0);
        assert!(engine.drain_notices().is_empty());
    }

    #[test]
    fn test_snapshot_without_stacks_keeps_table() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        let outcome = engine.apply_event(Event::GameState {
            game_id: "g".into(),
            cause_action: None,
            cause_player: None,
            owner: Some("bob".into()),
            players: None,
            stacks: None,
        });
        assert!(outcome.is_none());
        assert_eq!(engine.table().len(), 1);
        assert_eq!(engine.owner(), Some("bob"));
        assert_eq!(engine.players().len(), 2);
    }

    #[test]
    fn test_error_and_close_notices() {
        let mut engine = engine_with(vec![state("S", 0, 0, 1)]);
        engine.touch_down(1, "S", p(0, 0));

        engine.apply_event(Event::Error {
            error: "not-owner".into(),
            message: "Only the owner can reset".into(),
        });
        assert!(!engine.is_closed());

        engine.apply_event(Event::CloseGame);
        assert!(engine.is_closed());
        assert_eq!(engine.active_touches(), 0);
        assert!(!engine.touch_down(2, "S", p(0, 0)));
        assert_eq!(
            engine.drain_notices(),
            vec![
                Notice::ServerError {
                    code: "not-owner".into(),
                    message: "Only the owner can reset".into(),
                },
                Notice::GameClosed,
            ]
        );
    }

    #[test]
    fn test_hand_operations() {
        let ace = Card::numerical(1, Suit::Hearts).unwrap();
        let mut engine = engine_with(vec![]);
        engine.apply_event(Event::PlayerState {
            game_id: "g".into(),
            hand: vec![ace, seven()],
        });

        assert!(engine.put_card(1, p(10, 20), true));
        assert_eq!(engine.hand(), &[ace]);
        let placed = engine.table().local_stacks().next().unwrap();
        assert!(placed.visible_card().is_face_down());
        assert_eq!(placed.position(), p(10, 20));

        assert!(!engine.put_card(5, p(0, 0), false));
        assert!(!engine.give_player(1, "bob"));
        assert!(engine.give_player(0, "bob"));
        assert!(engine.hand().is_empty());

        assert_eq!(
            engine.drain_outbox(),
            vec![
                Action::PutCard {
                    hand_index: 1,
                    position: p(10, 20),
                    face_down: true,
                },
                Action::GivePlayer {
                    hand_index: 0,
                    trade_to: "bob".into(),
                },
            ]
        );
    }

    #[test]
    fn test_table_intents() {
        let mut engine = engine_with(vec![state("S", 0, 0, 52)]);
        assert!(!engine.shuffle("missing"));
        assert!(engine.shuffle("S"));
        assert!(engine.deal("S"));
        assert!(engine.flip_stack("S"));
        engine.reset();
        engine.leave();

        let tags: Vec<&str> = engine.drain_outbox().iter().map(Action::tag).collect();
        assert_eq!(tags, vec!["shuffle", "deal", "flip-stack", "reset", "leave-game"]);
    }

    #[test]
    fn test_provisional_stacks_are_not_addressed() {
        let mut engine = engine_with(vec![]);
        engine.apply_event(Event::PlayerState {
            game_id: "g".into(),
            hand: vec![seven()],
        });
        engine.put_card(0, p(0, 0), false);
        engine.drain_outbox();
        let id = engine.table().local_stacks().next().unwrap().id().to_owned();

        assert!(!engine.shuffle(&id));
        engine.touch_down(1, &id, p(0, 0));
        engine.touch_up(1, p(0, 0));
        assert!(engine.drain_outbox().is_empty());
    }
}

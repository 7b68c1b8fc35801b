//! Cardtable CLI — drive a table session from the terminal.
//!
//! Reads line commands from stdin and feeds them to the engine as touch
//! gestures and table intents. Connection settings come from `CARDTABLE_*`
//! environment variables; log verbosity from `RUST_LOG`.

mod command;

use std::time::Instant;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use cardtable_sync::{ClientConfig, Engine, GameSession, Notice, Position, SessionEvent, TouchId};
use command::Command;

const HELP: &str = "\
commands:
  down <touch> <stack> <x> <y>   finger down on a stack
  move <touch> <x> <y>           finger moved
  up <touch> <x> <y>             finger lifted
  drag <stack> <x0> <y0> <x1> <y1>
  tap <stack>                    flip the top card
  take <stack>                   take the top card into the hand
  put <index> <x> <y> [down]     play a hand card
  give <index> <player>          hand a card to another player
  flip|shuffle|deal <stack>      whole-stack intents
  reset | show | hand | quit";

fn print_table(engine: &Engine) {
    let table = engine.table();
    println!("{} stacks:", table.len());
    for stack in table.iter() {
        let tag = if stack.is_moving() {
            " (moving)"
        } else if stack.is_local() {
            " (local)"
        } else {
            ""
        };
        println!(
            "  {:<40} {:>12} x{:<3} {}{}",
            stack.id(),
            stack.position().to_string(),
            stack.remaining_cards(),
            stack.visible_card(),
            tag
        );
    }
}

fn print_hand(engine: &Engine) {
    if engine.hand().is_empty() {
        println!("hand is empty");
        return;
    }
    for (i, card) in engine.hand().iter().enumerate() {
        println!("  [{i}] {card}");
    }
}

/// Two touch ids no finger is using, for the one-shot gesture shortcuts.
fn free_touches(engine: &Engine) -> [TouchId; 2] {
    let mut free = (0..).filter(|&touch| !engine.is_touch_active(touch));
    let first = free.next().unwrap_or_default();
    let second = free.next().unwrap_or_default();
    [first, second]
}

fn stack_position(engine: &Engine, stack: &str) -> Option<Position> {
    let position = engine.table().get(stack).map(|s| s.position());
    if position.is_none() {
        warn!("No stack {stack}");
    }
    position
}

fn apply(engine: &mut Engine, command: Command) {
    match command {
        Command::Down { touch, stack, at } => {
            if !engine.touch_down(touch, &stack, at) {
                warn!("Touch {touch} on {stack} ignored");
            }
        }
        Command::Move { touch, at } => engine.touch_move(touch, at),
        Command::Up { touch, at } => engine.touch_up(touch, at),
        Command::Drag { stack, from, to } => {
            let [touch, _] = free_touches(engine);
            if !engine.touch_down(touch, &stack, from) {
                warn!("Drag of {stack} ignored");
                return;
            }
            engine.touch_move(touch, to);
            engine.touch_up(touch, to);
        }
        Command::Tap { stack } => {
            let Some(at) = stack_position(engine, &stack) else {
                return;
            };
            let [touch, _] = free_touches(engine);
            if !engine.touch_down(touch, &stack, at) {
                warn!("Tap on {stack} ignored");
                return;
            }
            engine.touch_up(touch, at);
        }
        Command::Take { stack } => {
            let Some(at) = stack_position(engine, &stack) else {
                return;
            };
            let [first, second] = free_touches(engine);
            if !(engine.touch_down(first, &stack, at) && engine.touch_down(second, &stack, at)) {
                warn!("Take from {stack} ignored");
            }
            engine.touch_up(first, at);
        }
        Command::Put { index, at, face_down } => {
            engine.put_card(index, at, face_down);
        }
        Command::Give { index, player } => {
            engine.give_player(index, &player);
        }
        Command::FlipStack { stack } => {
            engine.flip_stack(&stack);
        }
        Command::Shuffle { stack } => {
            engine.shuffle(&stack);
        }
        Command::Deal { stack } => {
            engine.deal(&stack);
        }
        Command::Reset => engine.reset(),
        Command::Show => print_table(engine),
        Command::Hand => print_hand(engine),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    info!("Joining table at {}", config.url);
    let move_interval = config.move_interval;

    let mut session = match GameSession::new(config) {
        Ok(session) => session,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = session.start() {
        error!("{e}");
        std::process::exit(1);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(move_interval);

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::StateChanged(state) => println!("connection {state}"),
                    SessionEvent::Received(event) => log::debug!("Applied {}", event.tag()),
                }
                for notice in session.engine_mut().drain_notices() {
                    match notice {
                        Notice::ServerError { code, message } => println!("server: {code}: {message}"),
                        Notice::GameClosed => println!("the game was closed"),
                    }
                }
                if session.is_closed() {
                    break;
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("stdin: {e}");
                        break;
                    }
                };
                match Command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => apply(session.engine_mut(), command),
                    Err(e) => println!("{e}"),
                }
                if let Err(e) = session.flush() {
                    error!("{e}");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = session.tick(Instant::now()) {
                    error!("{e}");
                    break;
                }
            }
        }
    }

    session.close().await;
    info!("Bye");
}

//! Line commands typed at the prompt.

use cardtable_sync::{Position, StackId, TouchId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Down { touch: TouchId, stack: StackId, at: Position },
    Move { touch: TouchId, at: Position },
    Up { touch: TouchId, at: Position },
    Drag { stack: StackId, from: Position, to: Position },
    Tap { stack: StackId },
    Take { stack: StackId },
    Put { index: usize, at: Position, face_down: bool },
    Give { index: usize, player: String },
    FlipStack { stack: StackId },
    Shuffle { stack: StackId },
    Deal { stack: StackId },
    Reset,
    Show,
    Hand,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (verb, args) {
            ("down", [touch, stack, x, y]) => Command::Down {
                touch: number(touch)?,
                stack: stack.to_string(),
                at: position(x, y)?,
            },
            ("move", [touch, x, y]) => Command::Move {
                touch: number(touch)?,
                at: position(x, y)?,
            },
            ("up", [touch, x, y]) => Command::Up {
                touch: number(touch)?,
                at: position(x, y)?,
            },
            ("drag", [stack, x0, y0, x1, y1]) => Command::Drag {
                stack: stack.to_string(),
                from: position(x0, y0)?,
                to: position(x1, y1)?,
            },
            ("tap", [stack]) => Command::Tap {
                stack: stack.to_string(),
            },
            ("take", [stack]) => Command::Take {
                stack: stack.to_string(),
            },
            ("put", [index, x, y]) => Command::Put {
                index: number(index)?,
                at: position(x, y)?,
                face_down: false,
            },
            ("put", [index, x, y, "down"]) => Command::Put {
                index: number(index)?,
                at: position(x, y)?,
                face_down: true,
            },
            ("give", [index, player]) => Command::Give {
                index: number(index)?,
                player: player.to_string(),
            },
            ("flip", [stack]) => Command::FlipStack {
                stack: stack.to_string(),
            },
            ("shuffle", [stack]) => Command::Shuffle {
                stack: stack.to_string(),
            },
            ("deal", [stack]) => Command::Deal {
                stack: stack.to_string(),
            },
            ("reset", []) => Command::Reset,
            ("show", []) => Command::Show,
            ("hand", []) => Command::Hand,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            _ => return Err(format!("unrecognised command '{}', try 'help'", line.trim())),
        };
        Ok(Some(command))
    }
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, String> {
    word.parse().map_err(|_| format!("'{word}' is not a number"))
}

fn position(x: &str, y: &str) -> Result<Position, String> {
    Ok(Position::new(number(x)?, number(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gestures() {
        assert_eq!(
            Command::parse("down 3 g:1 10 -20").unwrap(),
            Some(Command::Down {
                touch: 3,
                stack: "g:1".into(),
                at: Position::new(10, -20),
            })
        );
        assert_eq!(
            Command::parse("  up 3 0 0 ").unwrap(),
            Some(Command::Up {
                touch: 3,
                at: Position::ORIGIN,
            })
        );
    }

    #[test]
    fn test_parse_put_face_down() {
        assert_eq!(
            Command::parse("put 0 5 5 down").unwrap(),
            Some(Command::Put {
                index: 0,
                at: Position::new(5, 5),
                face_down: true,
            })
        );
    }

    #[test]
    fn test_parse_blank_and_errors() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert!(Command::parse("down x g 1 1").is_err());
        assert!(Command::parse("fly away").is_err());
        assert!(Command::parse("reset now").is_err());
    }
}

//! Keyboard/command token parsing for the play loop.

use super::types::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Pulse,
    /// Retry completion while standing on the exit.
    Complete,
    Restart,
}

/// Map one input token to a command. Tokens are case-insensitive; unknown tokens are `None`.
/// A token made only of spaces is the space bar and means pulse.
pub fn parse_token(raw: &str) -> Option<Command> {
    if !raw.is_empty() && raw.chars().all(|c| c == ' ') {
        return Some(Command::Pulse);
    }
    let token = raw.trim().to_ascii_lowercase();
    let cmd = match token.as_str() {
        "w" | "up" | "k" | "arrowup" => Command::Move(Direction::Up),
        "s" | "down" | "j" | "arrowdown" => Command::Move(Direction::Down),
        "a" | "left" | "h" | "arrowleft" => Command::Move(Direction::Left),
        "d" | "right" | "l" | "arrowright" => Command::Move(Direction::Right),
        "p" | "pulse" | "space" => Command::Pulse,
        "c" | "complete" => Command::Complete,
        "r" | "restart" => Command::Restart,
        _ => return None,
    };
    Some(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_aliases() {
        assert_eq!(parse_token("w"), Some(Command::Move(Direction::Up)));
        assert_eq!(parse_token("K"), Some(Command::Move(Direction::Up)));
        assert_eq!(parse_token("ArrowUp"), Some(Command::Move(Direction::Up)));
        assert_eq!(parse_token(" down "), Some(Command::Move(Direction::Down)));
        assert_eq!(parse_token("h"), Some(Command::Move(Direction::Left)));
        assert_eq!(parse_token("d"), Some(Command::Move(Direction::Right)));
    }

    #[test]
    fn pulse_and_meta_commands() {
        assert_eq!(parse_token(" "), Some(Command::Pulse));
        assert_eq!(parse_token("pulse"), Some(Command::Pulse));
        assert_eq!(parse_token("c"), Some(Command::Complete));
        assert_eq!(parse_token("restart"), Some(Command::Restart));
    }

    #[test]
    fn unknown_and_empty_are_ignored() {
        assert_eq!(parse_token(""), None);
        assert_eq!(parse_token("x"), None);
        assert_eq!(parse_token("\t"), None);
    }
}

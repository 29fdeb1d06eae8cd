//! Input line parsing.

pub const HELP: &str = "\
/join <room>   switch to a room by id or name
/leave         leave the current room
/rooms         list rooms
/who           list users in the room
/quit          exit
anything else is sent to the current room";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Leave,
    Rooms,
    Who,
    Help,
    Quit,
    Say(String),
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        match (name, argument) {
            ("join" | "j", room) if !room.is_empty() => Command::Join(room.to_string()),
            ("leave", _) => Command::Leave,
            ("rooms", _) => Command::Rooms,
            ("who", _) => Command::Who,
            ("help" | "?", _) => Command::Help,
            ("quit" | "q", _) => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

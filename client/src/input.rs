//! Typed terminal commands
//!
//! Choices are numbered from 1 on screen and converted to the zero-based
//! index the server expects.

use shared::Packet;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  join <nickname> [room code]   join the lobby
  start                         start the game
  answer <n> [points]           pick choice n (points only count in scoring mode)
  next                          close the current round (moderator mode)
  reset                         discard the session and open a new lobby
  code                          show the room code
  verify <code>                 check a room code
  players                       list joined players
  status                        show who and where you are
  help                          show this text
  quit                          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Send(Packet),
    Help,
    Status,
    Quit,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("type a command, or `help`")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
    #[error("choices are numbered from 1")]
    ZeroChoice,
}

/// Parses one line of user input
pub fn parse_line(line: &str) -> Result<InputCommand, InputError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err(InputError::Empty);
    };

    let packet = match command.to_lowercase().as_str() {
        "join" => {
            let nickname = words.next().ok_or(InputError::MissingArgument("nickname"))?;
            Packet::Join {
                nickname: nickname.to_string(),
                room_code: words.next().map(str::to_string),
            }
        }
        "start" => Packet::Start,
        "answer" | "a" => {
            let choice = words.next().ok_or(InputError::MissingArgument("choice"))?;
            let choice = parse_number(choice)?;
            if choice == 0 {
                return Err(InputError::ZeroChoice);
            }
            let score_delta = words.next().map(parse_number).transpose()?;
            Packet::Answer {
                choice: choice - 1,
                score_delta: score_delta.map(|points| points as u32),
            }
        }
        "next" => Packet::Next,
        "reset" => Packet::ResetGame,
        "code" => Packet::GetCode,
        "verify" => {
            let code = words.next().ok_or(InputError::MissingArgument("room code"))?;
            Packet::VerifyCode {
                code: code.to_string(),
            }
        }
        "players" => Packet::GetPlayerList,
        "help" | "?" => return Ok(InputCommand::Help),
        "status" => return Ok(InputCommand::Status),
        "quit" | "exit" => return Ok(InputCommand::Quit),
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };

    Ok(InputCommand::Send(packet))
}

fn parse_number(word: &str) -> Result<usize, InputError> {
    word.parse::<u32>()
        .map(|n| n as usize)
        .map_err(|_| InputError::InvalidNumber(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(line: &str) -> Packet {
        match parse_line(line) {
            Ok(InputCommand::Send(packet)) => packet,
            other => panic!("expected a packet for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn test_join_with_and_without_code() {
        assert_eq!(
            sent("join Ana"),
            Packet::Join {
                nickname: "Ana".to_string(),
                room_code: None
            }
        );
        assert_eq!(
            sent("  JOIN Bo  ab12 "),
            Packet::Join {
                nickname: "Bo".to_string(),
                room_code: Some("ab12".to_string())
            }
        );
        assert_eq!(
            parse_line("join"),
            Err(InputError::MissingArgument("nickname"))
        );
    }

    #[test]
    fn test_answer_is_one_based() {
        assert_eq!(
            sent("answer 1"),
            Packet::Answer {
                choice: 0,
                score_delta: None
            }
        );
        assert_eq!(
            sent("a 3 250"),
            Packet::Answer {
                choice: 2,
                score_delta: Some(250)
            }
        );
        assert_eq!(parse_line("answer 0"), Err(InputError::ZeroChoice));
        assert_eq!(
            parse_line("answer two"),
            Err(InputError::InvalidNumber("two".to_string()))
        );
        assert_eq!(
            parse_line("answer 2 -5"),
            Err(InputError::InvalidNumber("-5".to_string()))
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(sent("start"), Packet::Start);
        assert_eq!(sent("next"), Packet::Next);
        assert_eq!(sent("reset"), Packet::ResetGame);
        assert_eq!(sent("code"), Packet::GetCode);
        assert_eq!(sent("players"), Packet::GetPlayerList);
        assert_eq!(
            sent("verify x9y8"),
            Packet::VerifyCode {
                code: "x9y8".to_string()
            }
        );
        assert_eq!(parse_line("quit"), Ok(InputCommand::Quit));
        assert_eq!(parse_line("help"), Ok(InputCommand::Help));
        assert_eq!(parse_line("STATUS"), Ok(InputCommand::Status));
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(parse_line("   "), Err(InputError::Empty));
        assert_eq!(
            parse_line("dance"),
            Err(InputError::UnknownCommand("dance".to_string()))
        );
        assert_eq!(
            parse_line("verify"),
            Err(InputError::MissingArgument("room code"))
        );
    }
}

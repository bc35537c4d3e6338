//! Text rendering of server events

use shared::{Packet, QuestionView, RankedEntry, Winners};

/// Human-readable description of a server packet, or `None` for packets
/// that need no output.
pub fn describe(packet: &Packet) -> Option<String> {
    let text = match packet {
        Packet::Connected { client_id, .. } => format!("Connected as client {}", client_id),
        Packet::Disconnected { reason } => format!("Disconnected by server: {}", reason),
        Packet::Code { room_code } => format!("Room code: {}", room_code),
        Packet::CodeVerified { valid: true } => "Room code is valid".to_string(),
        Packet::CodeVerified { valid: false } => "Room code is not valid".to_string(),
        Packet::PlayerList { nicknames } if nicknames.is_empty() => "No players yet".to_string(),
        Packet::PlayerList { nicknames } => {
            format!("Players ({}): {}", nicknames.len(), nicknames.join(", "))
        }
        Packet::Reject { reason } => format!("Rejected: {}", reason),
        Packet::StartGame { countdown_ms } => {
            format!("Game starting in {} seconds!", countdown_ms / 1000)
        }
        Packet::Question(view) => question(view),
        Packet::AnswerResult { correct: true } => "Correct!".to_string(),
        Packet::AnswerResult { correct: false } => "Wrong answer.".to_string(),
        Packet::Eliminated => "You have been eliminated.".to_string(),
        Packet::PlayerUpdate { players } => {
            let lines: Vec<String> = players
                .iter()
                .map(|p| {
                    let status = if p.eliminated { " (out)" } else { "" };
                    format!("  {:<24} {:>5}{}", p.nickname, p.score, status)
                })
                .collect();
            format!("Scores:\n{}", lines.join("\n"))
        }
        Packet::Winner(winners) => winner(winners),
        Packet::FinalResult { standings } => leaderboard(standings),
        Packet::GameReset => "The game was reset. Join again to play.".to_string(),
        Packet::Rejoined {
            nickname,
            score,
            eliminated,
        } => {
            let status = if *eliminated { ", eliminated" } else { "" };
            format!("Welcome back {} (score {}{})", nickname, score, status)
        }
        _ => return None,
    };
    Some(text)
}

fn question(view: &QuestionView) -> String {
    let mut text = format!("Question {}/{}: {}", view.number, view.total, view.prompt);
    for (i, choice) in view.choices.iter().enumerate() {
        text.push_str(&format!("\n  {}) {}", i + 1, choice));
    }
    if let Some(ms) = view.time_limit_ms {
        text.push_str(&format!("\n  ({} seconds to answer)", ms / 1000));
    }
    text
}

fn winner(winners: &Winners) -> String {
    match winners {
        Winners::Single(name) => format!("Winner: {}!", name),
        Winners::Multiple(names) => format!("Winners: {}!", names.join(", ")),
        Winners::AllSurvived => "Everyone survived!".to_string(),
        Winners::NoWinner => "No winner this time.".to_string(),
    }
}

fn leaderboard(standings: &[RankedEntry]) -> String {
    let lines: Vec<String> = standings
        .iter()
        .map(|e| format!("  {:>3}. {:<24} {:>5}", e.rank, e.nickname, e.score))
        .collect();
    format!("Final results:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlayerScore;

    #[test]
    fn test_question_lists_numbered_choices() {
        let view = QuestionView {
            number: 2,
            total: 5,
            prompt: "Capital of France?".to_string(),
            choices: vec!["Lyon".to_string(), "Paris".to_string()],
            time_limit_ms: Some(10_000),
        };
        let text = describe(&Packet::Question(view)).unwrap();
        assert_eq!(
            text,
            "Question 2/5: Capital of France?\n  1) Lyon\n  2) Paris\n  (10 seconds to answer)"
        );
    }

    #[test]
    fn test_winners() {
        let multi = Packet::Winner(Winners::Multiple(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(describe(&multi).unwrap(), "Winners: A, B!");
        assert_eq!(
            describe(&Packet::Winner(Winners::NoWinner)).unwrap(),
            "No winner this time."
        );
    }

    #[test]
    fn test_leaderboard_shows_ranks() {
        let packet = Packet::FinalResult {
            standings: vec![
                RankedEntry {
                    rank: 1,
                    nickname: "A".to_string(),
                    score: 3,
                },
                RankedEntry {
                    rank: 1,
                    nickname: "B".to_string(),
                    score: 3,
                },
                RankedEntry {
                    rank: 3,
                    nickname: "C".to_string(),
                    score: 0,
                },
            ],
        };
        let text = describe(&packet).unwrap();
        let ranks: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.trim_start().split('.').next().unwrap_or(""))
            .collect();
        assert_eq!(ranks, vec!["1", "1", "3"]);
    }

    #[test]
    fn test_scores_mark_eliminated_players() {
        let packet = Packet::PlayerUpdate {
            players: vec![PlayerScore {
                nickname: "Out".to_string(),
                score: 0,
                eliminated: true,
            }],
        };
        assert!(describe(&packet).unwrap().ends_with("(out)"));
    }

    #[test]
    fn test_transport_packets_are_silent() {
        assert_eq!(describe(&Packet::Heartbeat), None);
        assert_eq!(describe(&Packet::Start), None);
    }
}

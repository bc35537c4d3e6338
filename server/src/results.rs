//! Final outcome of a session: survivors or a ranked leaderboard

use crate::config::RankingStyle;
use crate::ledger::PlayerLedger;
use shared::{RankedEntry, Winners};

/// Winners of an elimination game.
///
/// Ties are never broken arbitrarily: every survivor is reported, in join
/// order. When nobody was eliminated at all the outcome is `AllSurvived`.
pub fn elimination_winners(ledger: &PlayerLedger) -> Winners {
    let mut survivors: Vec<String> = ledger
        .iter()
        .filter(|p| p.is_alive())
        .map(|p| p.nickname.clone())
        .collect();

    match survivors.len() {
        0 => Winners::NoWinner,
        1 => Winners::Single(survivors.remove(0)),
        _ if !ledger.any_eliminated() => Winners::AllSurvived,
        _ => Winners::Multiple(survivors),
    }
}

/// Leaderboard of a scoring game.
///
/// Players are stably sorted by score (descending), so equal scores keep
/// their join order. Equal scores always share a rank; `style` decides
/// whether the following rank skips (`1,1,3`) or not (`1,1,2`).
pub fn ranked_standings(ledger: &PlayerLedger, style: RankingStyle) -> Vec<RankedEntry> {
    let mut players: Vec<_> = ledger.iter().collect();
    players.sort_by(|a, b| b.score.cmp(&a.score));

    let mut standings = Vec::with_capacity(players.len());
    let mut rank = 0u32;
    let mut previous_score = None;

    for (position, player) in players.into_iter().enumerate() {
        if previous_score != Some(player.score) {
            rank = match style {
                RankingStyle::Competition => position as u32 + 1,
                RankingStyle::Dense => rank + 1,
            };
            previous_score = Some(player.score);
        }
        standings.push(RankedEntry {
            rank,
            nickname: player.nickname.clone(),
            score: player.score,
        });
    }

    standings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameMode;
    use crate::ledger::JoinPolicy;
    use crate::questions::Question;
    use std::collections::BTreeSet;

    fn ledger_with(names: &[&str]) -> PlayerLedger {
        let mut ledger = PlayerLedger::new();
        let policy = JoinPolicy {
            lobby_open: true,
            room_code: "ABCD",
            code_required: false,
        };
        for (i, name) in names.iter().enumerate() {
            ledger.join(i as u32 + 1, name, None, policy).unwrap();
        }
        ledger
    }

    fn question() -> Question {
        Question {
            text: "?".to_string(),
            choices: vec!["right".to_string(), "wrong".to_string()],
            correct_index: 0,
        }
    }

    /// Plays one scoring round where each player earns `points[i]` (0 = wrong answer)
    fn score(ledger: &mut PlayerLedger, points: &[u32]) {
        for (i, p) in points.iter().enumerate() {
            let choice = if *p > 0 { 0 } else { 1 };
            ledger
                .record_answer(i as u32 + 1, choice, Some(*p), &question(), GameMode::Scoring)
                .unwrap();
        }
        ledger.clear_round();
    }

    fn eliminate(ledger: &mut PlayerLedger, ids: &[u32]) {
        for id in ids {
            ledger
                .record_answer(*id, 1, None, &question(), GameMode::Elimination)
                .unwrap();
        }
        ledger.clear_round();
    }

    #[test]
    fn test_single_survivor() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        eliminate(&mut ledger, &[1, 3]);
        assert_eq!(elimination_winners(&ledger), Winners::Single("B".to_string()));
    }

    #[test]
    fn test_multiple_survivors_reported_in_join_order() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        eliminate(&mut ledger, &[3]);
        assert_eq!(
            elimination_winners(&ledger),
            Winners::Multiple(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_nobody_eliminated_is_all_survived() {
        let ledger = ledger_with(&["A", "B"]);
        assert_eq!(elimination_winners(&ledger), Winners::AllSurvived);
    }

    #[test]
    fn test_survivors_reported_after_eliminated_player_left() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        eliminate(&mut ledger, &[3]);
        ledger.remove(3);
        assert_eq!(
            elimination_winners(&ledger),
            Winners::Multiple(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_everyone_eliminated_is_no_winner() {
        let mut ledger = ledger_with(&["A", "B"]);
        eliminate(&mut ledger, &[1, 2]);
        assert_eq!(elimination_winners(&ledger), Winners::NoWinner);
    }

    #[test]
    fn test_competition_ranking_skips_after_tie() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        score(&mut ledger, &[1, 1, 0]);

        let standings = ranked_standings(&ledger, RankingStyle::Competition);
        let ranks: Vec<(u32, &str, u32)> = standings
            .iter()
            .map(|e| (e.rank, e.nickname.as_str(), e.score))
            .collect();
        assert_eq!(ranks, vec![(1, "A", 1), (1, "B", 1), (3, "C", 0)]);
    }

    #[test]
    fn test_dense_ranking_does_not_skip() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        score(&mut ledger, &[1, 1, 0]);

        let ranks: Vec<u32> = ranked_standings(&ledger, RankingStyle::Dense)
            .iter()
            .map(|e| e.rank)
            .collect();
        assert_eq!(ranks, vec![1, 1, 2]);
    }

    #[test]
    fn test_ties_keep_join_order() {
        let mut ledger = ledger_with(&["Late", "Early", "Mid", "Top"]);
        score(&mut ledger, &[2, 0, 2, 5]);

        let names: Vec<String> = ranked_standings(&ledger, RankingStyle::Competition)
            .into_iter()
            .map(|e| e.nickname)
            .collect();
        assert_eq!(names, vec!["Top", "Late", "Mid", "Early"]);
    }

    #[test]
    fn test_distinct_ranks_never_exceed_distinct_scores() {
        let mut ledger = ledger_with(&["A", "B", "C", "D", "E", "F"]);
        score(&mut ledger, &[3, 0, 3, 7, 0, 1]);

        for style in [RankingStyle::Competition, RankingStyle::Dense] {
            let standings = ranked_standings(&ledger, style);
            let ranks: BTreeSet<u32> = standings.iter().map(|e| e.rank).collect();
            let scores: BTreeSet<u32> = standings.iter().map(|e| e.score).collect();
            assert!(ranks.len() <= scores.len());

            for pair in standings.windows(2) {
                if pair[0].score == pair[1].score {
                    assert_eq!(pair[0].rank, pair[1].rank);
                } else {
                    assert!(pair[0].rank < pair[1].rank);
                }
            }
        }
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = PlayerLedger::new();
        assert!(ranked_standings(&ledger, RankingStyle::Competition).is_empty());
        assert_eq!(elimination_winners(&ledger), Winners::NoWinner);
    }
}

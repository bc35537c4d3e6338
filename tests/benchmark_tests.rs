//! Performance benchmarks for critical game systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{AdvancePolicy, GameConfig, GameMode, RankingStyle};
use server::game::{Command, RoundCoordinator};
use server::ledger::{JoinPolicy, PlayerLedger};
use server::questions::{Question, QuestionBank};
use server::results::{elimination_winners, ranked_standings};
use server::session::{generate_room_code, SessionRegistry};
use server::timers::{TimerKey, TimerKind};
use shared::framing::encode_frame;
use shared::{Packet, PlayerScore};
use std::time::Instant;

const OPEN_LOBBY: JoinPolicy<'static> = JoinPolicy {
    lobby_open: true,
    room_code: "ABCD",
    code_required: false,
};

fn question() -> Question {
    Question {
        text: "?".to_string(),
        choices: vec!["right".to_string(), "wrong".to_string()],
        correct_index: 0,
    }
}

fn ledger(players: u32) -> PlayerLedger {
    let mut ledger = PlayerLedger::new();
    for id in 1..=players {
        ledger
            .join(id, &format!("player{}", id), None, OPEN_LOBBY)
            .unwrap();
    }
    ledger
}

/// Benchmarks answer grading for a large lobby
#[test]
fn benchmark_answer_recording() {
    let players = 10_000;
    let mut ledger = ledger(players);
    let question = question();

    let start = Instant::now();
    for id in 1..=players {
        let choice = (id % 2) as usize;
        ledger
            .record_answer(id, choice, Some(id % 7), &question, GameMode::Scoring)
            .unwrap();
    }
    let duration = start.elapsed();

    println!(
        "Answer recording: {} answers in {:?} ({:.2} ns/answer)",
        players,
        duration,
        duration.as_nanos() as f64 / players as f64
    );

    assert!(ledger.all_answered());
    // Should complete in under 100ms for 10k answers
    assert!(duration.as_millis() < 100);
}

/// Benchmarks leaderboard compilation with many ties
#[test]
fn benchmark_ranking() {
    let players = 10_000;
    let mut ledger = ledger(players);
    let question = question();
    for id in 1..=players {
        ledger
            .record_answer(id, 0, Some(id % 50), &question, GameMode::Scoring)
            .unwrap();
    }

    let start = Instant::now();
    let standings = ranked_standings(&ledger, RankingStyle::Competition);
    let dense = ranked_standings(&ledger, RankingStyle::Dense);
    let winners = elimination_winners(&ledger);
    let duration = start.elapsed();

    println!("Ranking: {} players in {:?}", players, duration);

    assert_eq!(standings.len(), players as usize);
    assert_eq!(dense.last().map(|e| e.rank), Some(50));
    assert!(standings.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(matches!(winners, shared::Winners::AllSurvived));
    // Should complete in under 200ms
    assert!(duration.as_millis() < 200);
}

/// Benchmarks room code generation
#[test]
fn benchmark_room_codes() {
    let mut rng = StdRng::seed_from_u64(1);
    let iterations = 100_000;

    let start = Instant::now();
    for _ in 0..iterations {
        let code = generate_room_code(&mut rng);
        assert_eq!(code.len(), 4);
    }
    let duration = start.elapsed();

    println!(
        "Room codes: {} codes in {:?} ({:.2} ns/code)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 500ms
    assert!(duration.as_millis() < 500);
}

/// Benchmarks encoding of the largest regular broadcast
#[test]
fn benchmark_score_update_encoding() {
    let players: Vec<PlayerScore> = (0..1000)
        .map(|i| PlayerScore {
            nickname: format!("player{}", i),
            score: i,
            eliminated: i % 3 == 0,
        })
        .collect();
    let packet = Packet::PlayerUpdate { players };

    let iterations = 1000;
    let start = Instant::now();
    let mut bytes = 0;
    for _ in 0..iterations {
        bytes += encode_frame(&packet).unwrap().len();
    }
    let duration = start.elapsed();

    println!(
        "Score update encoding: {} frames ({} bytes) in {:?}",
        iterations, bytes, duration
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a full coordinator game with many players
#[test]
fn benchmark_full_game() {
    let questions: Vec<String> = (0..20)
        .map(|i| {
            format!(
                r#"{{"question": "Q{}", "choices": ["a", "b", "c", "d"], "answer": {}}}"#,
                i,
                i % 4
            )
        })
        .collect();
    let bank = QuestionBank::from_json(&format!("[{}]", questions.join(","))).unwrap();
    let config = GameConfig {
        mode: GameMode::Scoring,
        advance: AdvancePolicy::AllAnswered,
        ..GameConfig::default()
    };
    let mut coordinator =
        RoundCoordinator::with_registry(config, SessionRegistry::with_seed(bank, false, 5));

    let players = 500;
    let start = Instant::now();

    for id in 1..=players {
        coordinator.handle(
            id,
            Command::Join {
                nickname: format!("p{}", id),
                room_code: None,
            },
        );
    }
    coordinator.handle(1, Command::Start);
    let epoch = coordinator.session().epoch;
    coordinator.on_timer(TimerKey::new(epoch, TimerKind::Countdown));

    for round in 0..20 {
        for id in 1..=players {
            coordinator.handle(
                id,
                Command::Answer {
                    choice: (id as usize + round) % 4,
                    score_delta: None,
                },
            );
        }
        if round < 19 {
            coordinator.on_timer(TimerKey::new(epoch, TimerKind::GradingPause { round }));
        }
    }
    let duration = start.elapsed();

    println!("Full game: {} players, 20 rounds in {:?}", players, duration);

    assert_eq!(coordinator.session().current_question_index, 19);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks raw packet serialization without the frame header
#[test]
fn benchmark_question_serialization() {
    use bincode::{deserialize, serialize};
    use shared::QuestionView;

    let packet = Packet::Question(QuestionView {
        number: 3,
        total: 20,
        prompt: "Which planet has the most moons?".to_string(),
        choices: vec![
            "Mars".to_string(),
            "Jupiter".to_string(),
            "Saturn".to_string(),
            "Neptune".to_string(),
        ],
        time_limit_ms: Some(10_000),
    });

    let iterations = 10_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let bytes = serialize(&packet).unwrap();
        let decoded: Packet = deserialize(&bytes).unwrap();
        assert!(matches!(decoded, Packet::Question(_)));
    }
    let duration = start.elapsed();

    println!(
        "Question serialization: {} round trips in {:?} ({:.2} ns/op)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 500ms
    assert!(duration.as_millis() < 500);
}

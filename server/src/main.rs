use clap::Parser;
use log::{error, info};
use server::config::{AdvancePolicy, GameConfig, GameMode, RankingStyle, ServerOptions};
use server::network::Server;
use server::questions::QuestionBank;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// JSON question bank
    #[arg(short, long, default_value = "questions.json")]
    questions: PathBuf,

    #[arg(long, value_enum, default_value_t = GameMode::Elimination)]
    mode: GameMode,

    /// What closes a round
    #[arg(long, value_enum, default_value_t = AdvancePolicy::Timed)]
    advance: AdvancePolicy,

    /// Rank numbering after ties (scoring mode)
    #[arg(long, value_enum, default_value_t = RankingStyle::Competition)]
    ranking: RankingStyle,

    #[arg(long, default_value = "4")]
    countdown_secs: u64,

    /// Answer window per question (timed rounds)
    #[arg(long, default_value = "10")]
    question_secs: u64,

    /// Pause between grading and the next question
    #[arg(long, default_value = "2")]
    grading_pause_secs: u64,

    /// Hard limit on a running game
    #[arg(long, default_value = "100")]
    session_timeout_secs: u64,

    /// How long a disconnected player keeps their place (0 removes at once)
    #[arg(long, default_value = "10")]
    grace_secs: u64,

    /// Drop connections silent for this long
    #[arg(long, default_value = "15")]
    idle_timeout_secs: u64,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Reject joins that do not carry the room code
    #[arg(long)]
    require_room_code: bool,

    /// Shuffle the question order for every session
    #[arg(long)]
    shuffle: bool,

    /// Eliminate players who stay silent for a round (elimination mode)
    #[arg(long)]
    eliminate_unanswered: bool,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            mode: self.mode,
            advance: self.advance,
            ranking: self.ranking,
            countdown: Duration::from_secs(self.countdown_secs),
            question_time: Duration::from_secs(self.question_secs),
            grading_pause: Duration::from_secs(self.grading_pause_secs),
            session_timeout: Duration::from_secs(self.session_timeout_secs),
            grace_period: Duration::from_secs(self.grace_secs),
            require_room_code: self.require_room_code,
            shuffle_questions: self.shuffle,
            eliminate_unanswered: self.eliminate_unanswered,
        }
    }

    fn server_options(&self) -> ServerOptions {
        ServerOptions {
            address: format!("{}:{}", self.host, self.port),
            max_clients: self.max_clients,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let bank = match QuestionBank::load(&args.questions) {
        Ok(bank) => bank,
        Err(e) => {
            error!("Cannot start without a valid question bank: {}", e);
            return Err(e.into());
        }
    };

    let config = args.game_config();
    info!(
        "Mode {:?}, advance {:?}, {} questions",
        config.mode,
        config.advance,
        bank.len()
    );

    let mut server = Server::bind(&args.server_options(), config, bank).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

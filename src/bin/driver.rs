//! Bot analyzer session driver
//!
//! Starts one analysis session against a running bot analyzer server, prints
//! the conversation as it arrives and the analysis report at the end.

use bot_analyzer::config::DriverConfig;
use bot_analyzer::driver::{
    Credentials, DriverCommand, HttpConversationApi, SessionConfig, SessionDriver, Stage,
    TokioScheduler, UserTone,
};
use bot_analyzer::store::Actor;
use clap::Parser;
use std::process::ExitCode;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bot-analyzer-driver")]
#[command(about = "Run an analysis session against a bot analyzer server", long_about = None)]
struct Cli {
    /// Identifier of the bot under test
    #[arg(long, env = "ANALYZER_BOT_ID", default_value = "")]
    bot_id: String,

    /// Bearer token for the bot's webhook
    #[arg(long, env = "ANALYZER_BEARER_TOKEN", default_value = "", hide_env_values = true)]
    bearer_token: String,

    /// Webhook URL of the bot under test
    #[arg(long, env = "ANALYZER_WEBHOOK_URL", default_value = "")]
    webhook_url: String,

    /// Who the simulated user is
    #[arg(long, default_value = "")]
    human_description: String,

    /// What the bot under test does
    #[arg(long, default_value = "")]
    bot_description: String,

    /// Simulated-user tone; repeat for several (at most 4 distinct)
    #[arg(long = "tone")]
    tones: Vec<UserTone>,

    /// What the simulated user is trying to achieve
    #[arg(long, default_value = "")]
    goal: String,

    /// Intent the bot should recognise; repeat for several
    #[arg(long = "intent")]
    intents: Vec<String>,

    /// Server base URL (overrides ANALYZER_SERVER_URL)
    #[arg(long)]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bot_analyzer=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the analysis finished
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut driver_config = DriverConfig::from_env();
    if let Some(url) = cli.server_url {
        driver_config.server_url = url;
    }

    let mut session = SessionConfig {
        credentials: Credentials {
            bot_id: cli.bot_id,
            bearer_token: cli.bearer_token,
            webhook_url: cli.webhook_url,
        },
        human_description: cli.human_description,
        bot_description: cli.bot_description,
        user_tones: Vec::new(),
        goal: cli.goal,
        intents: cli.intents,
    };
    for tone in cli.tones {
        session.select_tone(tone)?;
    }

    let missing = session.credentials.missing_fields();
    if !missing.is_empty() {
        return Err(format!("Please fill in the {} before starting", missing.join(", ")).into());
    }

    let api = HttpConversationApi::new(&driver_config.server_url, driver_config.request_timeout)?;
    let (scheduler, ticks) = TokioScheduler::new();
    let driver = SessionDriver::new(api, scheduler, driver_config.poll, session);
    println!("Conversation {}", driver.state().conversation_id);

    let (command_tx, command_rx) = mpsc::channel(4);
    let (snapshot_tx, mut snapshots) = watch::channel(driver.state().clone());
    let handle = tokio::spawn(driver.run(command_rx, ticks, snapshot_tx));
    command_tx.send(DriverCommand::Start).await?;

    let mut printed = 0;
    let finished = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break false;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
                break false;
            }
        }

        let state = snapshots.borrow_and_update().clone();
        // The mirror is replaced wholesale on each poll
        if state.conversation.len() < printed {
            printed = 0;
        }
        for message in &state.conversation[printed..] {
            let who = match message.actor {
                Actor::Bot => "bot ",
                Actor::User => "user",
            };
            println!("[{who}] {}", message.text);
        }
        printed = state.conversation.len();

        match state.stage {
            Stage::Finished => {
                println!("\n{}", state.analysis_result);
                break true;
            }
            Stage::Error { message } => {
                eprintln!("error: {message}");
                break false;
            }
            Stage::Initial | Stage::Processing { .. } => {}
        }
    };

    let _ = command_tx.send(DriverCommand::Shutdown).await;
    handle.await?;
    Ok(finished)
}

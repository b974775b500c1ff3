//! End-to-end tests of the console bot.

use chatgate_bot::{load_config, ChatGateBot, RunSummary};
use chatgate_commands::testing::RecordingMessenger;
use chatgate_commands::{DispatchOutcome, SessionOutcome};
use chatgate_common::test_utils::chat_fixtures::{event, group, jid, reply, user};
use chatgate_common::test_utils::config_fixtures::minimal_config_toml;
use chatgate_config::Config;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

fn bot(config: Config) -> (ChatGateBot, Arc<RecordingMessenger>) {
    let messenger = Arc::new(RecordingMessenger::new());
    let bot = ChatGateBot::new(config, messenger.clone(), user()).unwrap();
    (bot, messenger)
}

#[tokio::test(start_paused = true)]
async fn test_guess_game_keeps_state_between_turns() {
    let (bot, messenger) = bot(Config::default());
    let dispatcher = Arc::clone(bot.dispatcher());
    let chat = group();

    let outcome = dispatcher.dispatch(event(&chat, &user(), "!quiz 2")).await;
    assert!(matches!(outcome, DispatchOutcome::Executed { ref command, .. } if command == "guess"));
    assert!(messenger.texts()[0].starts_with("I'm thinking of a number between 1 and 2."));

    let outcome = dispatcher.dispatch(reply(&chat, &user(), "m1", "1")).await;
    match outcome {
        DispatchOutcome::Session(SessionOutcome::Terminal { .. }) => {
            assert_eq!(messenger.texts()[1], "Correct! 1 it was, in 1 try.");
        }
        DispatchOutcome::Session(SessionOutcome::Chained { next, .. }) => {
            assert_eq!(next.message().as_str(), "m2");
            assert_eq!(messenger.texts()[1], "Higher than 1.");

            let outcome = dispatcher.dispatch(reply(&chat, &user(), "m2", "2")).await;
            assert!(matches!(outcome, DispatchOutcome::Session(SessionOutcome::Terminal { .. })));
            assert_eq!(messenger.texts()[2], "Correct! 2 it was, in 2 tries.");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(dispatcher.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_guess_stop_reveals_number() {
    let (bot, messenger) = bot(Config::default());
    let dispatcher = Arc::clone(bot.dispatcher());

    dispatcher.dispatch(event(&user(), &user(), "!guess")).await;
    let outcome = dispatcher.dispatch(reply(&user(), &user(), "m1", "stop")).await;

    assert!(matches!(outcome, DispatchOutcome::Session(SessionOutcome::Terminal { .. })));
    assert!(messenger.texts()[1].starts_with("Game over. The number was "));
}

#[tokio::test(start_paused = true)]
async fn test_guess_rejects_bad_range() {
    let (bot, messenger) = bot(Config::default());
    let outcome = bot.dispatcher().dispatch(event(&user(), &user(), "!guess 1")).await;

    assert!(matches!(outcome, DispatchOutcome::Executed { ref outcome, .. } if !outcome.is_success()));
    assert_eq!(
        messenger.texts(),
        vec!["Something went wrong while running guess. Please try again later."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_help_lists_and_describes() {
    let (bot, messenger) = bot(Config::default());
    let dispatcher = Arc::clone(bot.dispatcher());

    dispatcher.dispatch(event(&user(), &user(), "!help")).await;
    let overview = &messenger.texts()[0];
    assert!(overview.starts_with("Available commands:"));
    assert!(overview.contains("games\n  !guess - Guess the number I'm thinking of"));
    assert!(overview.contains("misc\n  !help - List commands or show details of one"));

    dispatcher.dispatch(event(&user(), &user(), ".menu quiz")).await;
    assert_eq!(
        messenger.texts()[1],
        ".guess: Guess the number I'm thinking of\nUsage: .guess [max]\nAliases: quiz"
    );
}

#[tokio::test(start_paused = true)]
async fn test_console_purge_needs_group_admin() {
    let (bot, messenger) = bot(Config::default());
    let input = tokio_test::io::Builder::new()
        .read(b"111@42 !purge 5\n")
        .wait(Duration::from_millis(10))
        .read(b"/admin 111@42\n")
        .wait(Duration::from_millis(10))
        .read(b"111@42 !purge 5\n")
        .wait(Duration::from_millis(10))
        .read(b"222@42 >m2 yes\n")
        .wait(Duration::from_millis(10))
        .read(b"111@42 >m2 yes\n")
        .wait(Duration::from_millis(10))
        .build();

    let summary = bot.run(BufReader::new(input), CancellationToken::new()).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            dispatched: 4,
            directives: 1,
            rejected_lines: 0,
            failed_tasks: 0,
        }
    );
    assert_eq!(
        messenger.texts(),
        vec![
            "Only group admins can use this command.",
            "Delete the last 5 messages? Reply 'yes' within a minute to confirm.",
            "This conversation belongs to someone else.",
            "Purged the last 5 messages.",
        ]
    );
    let sent = messenger.sent();
    assert_eq!(sent[3].chat, jid("42@g.us"));
    assert_eq!(sent[3].message.quoted.as_ref().map(|id| id.as_str()), Some("in-4"));
}

#[tokio::test(start_paused = true)]
async fn test_console_counts_bad_lines_and_stops_on_eof() {
    let (bot, messenger) = bot(Config::default());
    let input = tokio_test::io::Builder::new()
        .read(b"/frobnicate 111\n\n")
        .wait(Duration::from_millis(10))
        .read(b"!ping\n")
        .wait(Duration::from_millis(10))
        .build();

    let summary = bot.run(BufReader::new(input), CancellationToken::new()).await.unwrap();

    assert_eq!(summary.rejected_lines, 1);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(messenger.texts(), vec!["pong"]);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let (bot, _messenger) = bot(Config::default());
    let (client, _server) = tokio::io::duplex(64);
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(bot.run(BufReader::new(client), shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.cancel();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary, RunSummary::default());
}

#[tokio::test]
async fn test_load_config_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(minimal_config_toml().as_bytes()).unwrap();

    let config = load_config(Some(file.path())).await.unwrap();
    assert_eq!(config.bot.prefixes, vec!["!".to_string()]);
    assert!(config.bot.is_owner(&jid("100@s.whatsapp.net")));
}

#[tokio::test]
async fn test_load_config_rejects_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_config(Some(&dir.path().join("absent.toml"))).await.is_err());
}

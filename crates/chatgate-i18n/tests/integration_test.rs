//! Integration tests for chatgate-i18n crate.

use chatgate_common::test_utils::init_test_logging;
use chatgate_i18n::{Notice, Notices};

#[test]
fn test_every_notice_renders() {
    init_test_logging();
    let notices = Notices::new("en-US").unwrap();

    let all = [
        Notice::Banned,
        Notice::Muted,
        Notice::NotOwner,
        Notice::NotPremium,
        Notice::WhitelistBlocked,
        Notice::NotGroup,
        Notice::NotAdmin,
        Notice::BotNotAdmin,
        Notice::RateLimited { seconds: 3 },
        Notice::TooFewArgs { min: 1, usage: None },
        Notice::TooManyArgs { max: 2, usage: None },
        Notice::ExecutionFailed { command: "quiz".into() },
        Notice::UnknownCommand { name: "foo".into(), prefix: "!".into() },
        Notice::SessionNotYours,
        Notice::SessionFailed,
    ];

    for notice in &all {
        let text = notices.render(notice);
        assert_ne!(text, notice.message_id(), "{} has no translation", notice.message_id());
        assert!(!text.contains('{'), "{} left a placeable unformatted: {text}", notice.message_id());
    }
}

#[test]
fn test_unknown_command_mentions_prefix() {
    let notices = Notices::default();
    let text = notices.render(&Notice::UnknownCommand {
        name: "foo".into(),
        prefix: ".".into(),
    });
    assert_eq!(text, "Unknown command \"foo\". Send .help to see what I can do.");
}

#[test]
fn test_too_few_args_singular() {
    let notices = Notices::default();
    let text = notices.render(&Notice::TooFewArgs {
        min: 1,
        usage: Some("!search <query>".into()),
    });
    assert_eq!(text, "This command needs at least 1 argument.\nUsage: !search <query>");
}

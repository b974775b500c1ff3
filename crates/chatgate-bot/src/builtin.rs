//! Built-in commands of the console bot.

use async_trait::async_trait;
use chatgate_commands::{
    ArgBounds, Command, CommandContext, CommandError, CommandRegistry, ReplyContext, ReplyHandler, Role, SessionTtl,
};
use chatgate_common::Capability;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Late-bound handle to the registry so `help` can list the commands registered next to it.
pub type HelpIndex = Arc<OnceCell<Arc<CommandRegistry>>>;

/// Largest number `guess` accepts as its range.
pub const MAX_GUESS_RANGE: u32 = 1_000_000;

/// All built-in commands. Fill `index` once the dispatcher is built.
pub fn commands(index: &HelpIndex) -> Vec<Command> {
    vec![ping(), help(Arc::clone(index)), guess(), purge()]
}

/// `ping`: liveness check.
pub fn ping() -> Command {
    Command::from_fn("ping", |ctx: CommandContext| async move {
        ctx.reply("pong").await?;
        Ok(())
    })
    .category("misc")
    .description("Check that the bot is alive")
    .args(ArgBounds::exactly(0))
    .cooldown(Duration::from_secs(1))
}

/// `help [command]`: lists visible commands, or details one.
pub fn help(index: HelpIndex) -> Command {
    Command::from_fn("help", move |ctx: CommandContext| {
        let index = Arc::clone(&index);
        async move {
            let registry = index
                .get()
                .ok_or_else(|| CommandError::other("command index not initialized"))?;
            let text = match ctx.arg(0) {
                Some(name) => describe(registry, ctx.prefix(), name),
                None => overview(registry, ctx.prefix()),
            };
            ctx.reply(text).await?;
            Ok(())
        }
    })
    .alias("menu")
    .category("misc")
    .description("List commands or show details of one")
    .usage("help [command]")
    .max_args(1)
    .cooldown(Duration::ZERO)
}

fn overview(registry: &CommandRegistry, prefix: &str) -> String {
    let mut text = String::from("Available commands:");
    for (category, commands) in registry.by_category() {
        let _ = write!(text, "\n\n{category}");
        for command in commands {
            let _ = write!(text, "\n  {prefix}{} - {}", command.name(), command.description_text());
        }
    }
    let _ = write!(text, "\n\nSend {prefix}help <command> for details.");
    text
}

fn describe(registry: &CommandRegistry, prefix: &str, name: &str) -> String {
    let name = name.trim_start_matches(prefix);
    let Some(command) = registry.resolve(name).filter(|c| !c.flags().hidden) else {
        return format!("No command named \"{name}\".");
    };

    let mut text = format!("{prefix}{}: {}", command.name(), command.description_text());
    if let Some(usage) = command.usage_text() {
        let _ = write!(text, "\nUsage: {prefix}{usage}");
    }
    if !command.aliases().is_empty() {
        let _ = write!(text, "\nAliases: {}", command.aliases().join(", "));
    }
    if command.flags().group_only {
        text.push_str("\nGroups only.");
    }
    text
}

/// Quiz state carried in session metadata between turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct GuessState {
    secret: u32,
    max: u32,
    attempts: u32,
}

/// `guess [max]`: number-guessing loop; each hint is a new reply session.
pub fn guess() -> Command {
    Command::from_fn("guess", |ctx: CommandContext| async move {
        let max = match ctx.arg(0) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|max| (2..=MAX_GUESS_RANGE).contains(max))
                .ok_or_else(|| CommandError::InvalidInput(format!("range must be 2..={MAX_GUESS_RANGE}")))?,
            None => 100,
        };
        let state = GuessState {
            secret: pick_secret(max),
            max,
            attempts: 0,
        };
        debug!(max, "Starting guessing game");

        let session = ctx.session(GuessTurn).metadata(to_metadata(state)?);
        ctx.ask(
            format!("I'm thinking of a number between 1 and {max}. Reply to this message with your guess, or 'stop' to give up."),
            session,
        )
        .await?;
        Ok(())
    })
    .alias("quiz")
    .category("games")
    .description("Guess the number I'm thinking of")
    .usage("guess [max]")
    .max_args(1)
    .capability(Capability::Reply)
}

fn pick_secret(max: u32) -> u32 {
    fastrand::u32(1..=max)
}

fn to_metadata(state: GuessState) -> Result<serde_json::Value, CommandError> {
    serde_json::to_value(state).map_err(|e| CommandError::other(e.to_string()))
}

/// One turn of the guessing game.
#[derive(Debug, Clone, Copy)]
pub struct GuessTurn;

#[async_trait]
impl ReplyHandler for GuessTurn {
    async fn on_reply(&self, ctx: ReplyContext) -> Result<(), CommandError> {
        let mut state: GuessState = ctx.metadata_as()?;

        if ctx.is_terminal() {
            ctx.reply(format!("Game over. The number was {}.", state.secret)).await?;
            return Ok(());
        }

        let hint = match ctx.text().parse::<u32>() {
            Ok(n) if n == state.secret => {
                state.attempts += 1;
                let tries = if state.attempts == 1 { "try" } else { "tries" };
                ctx.reply(format!("Correct! {} it was, in {} {tries}.", state.secret, state.attempts))
                    .await?;
                return Ok(());
            }
            Ok(n) if (1..=state.max).contains(&n) => {
                state.attempts += 1;
                if n < state.secret {
                    format!("Higher than {n}.")
                } else {
                    format!("Lower than {n}.")
                }
            }
            _ => format!("Send a number between 1 and {}, or 'stop'.", state.max),
        };

        let next = ctx.session(*self).metadata(to_metadata(state)?);
        ctx.ask(hint, next).await?;
        Ok(())
    }
}

/// `purge <count>`: asks for confirmation on a short-lived session before acting.
pub fn purge() -> Command {
    Command::from_fn("purge", |ctx: CommandContext| async move {
        let count = ctx
            .arg(0)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|n| (1..=100).contains(n))
            .ok_or_else(|| CommandError::InvalidInput("count must be 1..=100".to_string()))?;

        let session = ctx
            .session(move |reply: ReplyContext| async move {
                if reply.text().eq_ignore_ascii_case("yes") {
                    reply.reply(format!("Purged the last {count} messages.")).await?;
                } else {
                    reply.reply("Purge cancelled.").await?;
                }
                Ok::<(), CommandError>(())
            })
            .ttl(SessionTtl::Short);
        ctx.ask(
            format!("Delete the last {count} messages? Reply 'yes' within a minute to confirm."),
            session,
        )
        .await?;
        Ok(())
    })
    .alias("clear")
    .category("moderation")
    .description("Delete recent messages after confirmation")
    .usage("purge <count>")
    .args(ArgBounds::exactly(1))
    .requires(Role::GroupAdmin)
    .group_only()
    .admin_only()
    .capability(Capability::Reply)
}

//! Command registry: name/alias resolution and prefix parsing.

use crate::command::Command;
use crate::error::RegistrationError;
use chatgate_common::{split_args, Capability};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// A parsed `<prefix><token> <args...>` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The prefix that matched.
    pub prefix: String,
    /// Command token as typed, lowercased.
    pub token: String,
    /// Whitespace-separated arguments.
    pub args: Vec<String>,
}

/// Splits a message into prefix, command token and arguments.
///
/// Returns `None` when the text does not start with a prefix immediately
/// followed by a token. The longest matching prefix wins.
pub fn parse_invocation(text: &str, prefixes: &[String]) -> Option<Invocation> {
    let text = text.trim_start();
    let prefix = prefixes
        .iter()
        .filter(|p| !p.is_empty() && text.starts_with(p.as_str()))
        .max_by_key(|p| p.len())?;

    let rest = &text[prefix.len()..];
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (token, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if token.is_empty() {
        return None;
    }

    Some(Invocation {
        prefix: prefix.clone(),
        token: token.to_lowercase(),
        args: split_args(args),
    })
}

/// All registered commands plus the token index built from them.
#[derive(Debug)]
pub struct CommandRegistry {
    commands: Vec<Arc<Command>>,
    tokens: HashMap<String, usize>,
    supported: BTreeSet<Capability>,
}

impl CommandRegistry {
    /// Creates an empty registry for a platform supporting `supported` capabilities.
    pub fn new(supported: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            commands: Vec::new(),
            tokens: HashMap::new(),
            supported: supported.into_iter().collect(),
        }
    }

    /// Registers a command, rejecting it whole if any of its tokens is already claimed.
    pub fn register(&mut self, command: Command) -> Result<(), RegistrationError> {
        let name = command.name().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RegistrationError::InvalidName(name));
        }
        if let Some(alias) = command
            .aliases()
            .iter()
            .find(|a| a.is_empty() || a.chars().any(char::is_whitespace))
        {
            return Err(RegistrationError::InvalidName(alias.clone()));
        }

        let bounds = command.arg_bounds();
        if let (Some(max), min) = (bounds.max, bounds.effective_min()) {
            if min > max {
                return Err(RegistrationError::InvalidArgBounds { command: name, min, max });
            }
        }

        if let Some(capability) = command
            .capabilities()
            .iter()
            .find(|c| !self.supported.contains(c))
        {
            return Err(RegistrationError::UnsupportedCapability {
                command: name,
                capability: *capability,
            });
        }

        let mut claimed: Vec<&str> = Vec::new();
        for token in command.tokens() {
            let existing = if claimed.contains(&token) {
                Some(name.clone())
            } else {
                self.tokens
                    .get(token)
                    .map(|&idx| self.commands[idx].name().to_string())
            };
            if let Some(existing) = existing {
                return Err(RegistrationError::DuplicateToken {
                    token: token.to_string(),
                    command: name,
                    existing,
                });
            }
            claimed.push(token);
        }

        let idx = self.commands.len();
        for token in command.tokens() {
            self.tokens.insert(token.to_string(), idx);
        }
        debug!(command = %name, aliases = ?command.aliases(), "Registered command");
        self.commands.push(Arc::new(command));
        Ok(())
    }

    /// Registers every command, stopping at the first failure.
    pub fn register_all(&mut self, commands: impl IntoIterator<Item = Command>) -> Result<(), RegistrationError> {
        for command in commands {
            self.register(command)?;
        }
        info!(count = self.commands.len(), tokens = self.tokens.len(), "Command registry ready");
        Ok(())
    }

    /// Resolves a name or alias, ignoring case.
    pub fn resolve(&self, token: &str) -> Option<Arc<Command>> {
        let token = token.to_lowercase();
        self.tokens.get(&token).map(|&idx| Arc::clone(&self.commands[idx]))
    }

    /// Looks a command up by primary name only.
    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.resolve(name).filter(|command| command.name() == name.to_lowercase())
    }

    /// All commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }

    /// Commands not marked hidden.
    pub fn visible(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter().filter(|command| !command.flags().hidden)
    }

    /// Visible commands grouped by category, sorted by category name.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&Arc<Command>>> {
        let mut grouped: BTreeMap<&str, Vec<&Arc<Command>>> = BTreeMap::new();
        for command in self.visible() {
            grouped.entry(command.category_name()).or_default().push(command);
        }
        grouped
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new(Capability::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::ArgBounds;
    use crate::context::CommandContext;
    use proptest::prelude::*;

    fn noop(name: &str) -> Command {
        Command::from_fn(name, |_ctx: CommandContext| async { Ok(()) })
    }

    fn prefixes() -> Vec<String> {
        vec!["!".to_string(), ".".to_string(), "!!".to_string()]
    }

    #[test]
    fn test_resolve_name_and_alias_case_insensitive() {
        let mut registry = CommandRegistry::default();
        registry.register(noop("ping").alias("p")).unwrap();
        registry.register(noop("help").alias("menu").alias("h")).unwrap();

        assert_eq!(registry.resolve("PING").unwrap().name(), "ping");
        assert_eq!(registry.resolve("p").unwrap().name(), "ping");
        assert_eq!(registry.resolve("Menu").unwrap().name(), "help");
        assert!(registry.resolve("pong").is_none());
        assert!(registry.get("p").is_none());
        assert_eq!(registry.get("help").unwrap().name(), "help");
    }

    #[test]
    fn test_duplicate_tokens_rejected() {
        let mut registry = CommandRegistry::default();
        registry.register(noop("ping").alias("p")).unwrap();

        let err = registry.register(noop("pong").alias("P")).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateToken {
                token: "p".into(),
                command: "pong".into(),
                existing: "ping".into(),
            }
        );
        // rejected command leaves no partial tokens behind
        assert!(registry.resolve("pong").is_none());

        let err = registry.register(noop("alias").alias("ping")).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateToken { .. }));

        let err = registry.register(noop("echo").alias("echo")).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateToken { ref existing, .. } if existing == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let mut registry = CommandRegistry::new([Capability::Reply]);
        assert!(matches!(
            registry.register(noop("two words")),
            Err(RegistrationError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register(noop("x").args(ArgBounds::between(3, 1))),
            Err(RegistrationError::InvalidArgBounds { min: 3, max: 1, .. })
        ));
        assert!(matches!(
            registry.register(noop("menu").capability(Capability::Buttons)),
            Err(RegistrationError::UnsupportedCapability { capability: Capability::Buttons, .. })
        ));
        assert!(registry.register(noop("quiz").capability(Capability::Reply)).is_ok());
    }

    #[test]
    fn test_visible_and_categories() {
        let mut registry = CommandRegistry::default();
        registry
            .register_all([
                noop("ping").category("misc"),
                noop("quiz").category("games"),
                noop("debug").category("misc").hidden(),
            ])
            .unwrap();

        assert_eq!(registry.visible().count(), 2);
        let grouped = registry.by_category();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec!["games", "misc"]);
        assert_eq!(grouped["misc"].len(), 1);
    }

    #[test]
    fn test_parse_invocation() {
        let inv = parse_invocation("  !Quiz  easy   10", &prefixes()).unwrap();
        assert_eq!(inv.prefix, "!");
        assert_eq!(inv.token, "quiz");
        assert_eq!(inv.args, vec!["easy", "10"]);

        let inv = parse_invocation("!!ping", &prefixes()).unwrap();
        assert_eq!(inv.prefix, "!!");
        assert_eq!(inv.token, "ping");

        assert!(parse_invocation("hello there", &prefixes()).is_none());
        assert!(parse_invocation("!", &prefixes()).is_none());
        assert!(parse_invocation("! ping", &prefixes()).is_none());
        assert_eq!(parse_invocation(".menu", &prefixes()).unwrap().args.len(), 0);
    }

    proptest! {
        #[test]
        fn prop_every_token_resolves_to_its_command(
            names in proptest::collection::btree_set("[a-z]{3,8}", 1..12)
        ) {
            let mut registry = CommandRegistry::default();
            for name in &names {
                let alias = format!("{name}x9");
                registry.register(noop(name).alias(alias)).unwrap();
            }
            for name in &names {
                let resolved = registry.resolve(name).unwrap();
                prop_assert_eq!(resolved.name(), name.as_str());
                let alias = format!("{name}x9");
                let resolved = registry.resolve(&alias).unwrap();
                prop_assert_eq!(resolved.name(), name.as_str());
                let missing = format!("{name}zz");
                prop_assert!(registry.resolve(&missing).is_none());
            }
        }
    }
}

//! Command descriptors and the handler contract.

use crate::arguments::ArgBounds;
use crate::context::CommandContext;
use crate::error::CommandError;
use crate::permissions::Role;
use async_trait::async_trait;
use chatgate_common::Capability;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Body of a command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the command. All user-visible output is the handler's own responsibility.
    async fn execute(&self, ctx: CommandContext) -> Result<(), CommandError>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
{
    async fn execute(&self, ctx: CommandContext) -> Result<(), CommandError> {
        (self)(ctx).await
    }
}

/// Boolean restrictions a command can declare.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFlags {
    /// Only usable in group chats.
    pub group_only: bool,
    /// Only usable by admins of the group.
    pub admin_only: bool,
    /// The bot must be admin of the group.
    pub bot_admin_required: bool,
    /// Only usable by bot owners.
    pub owner_only: bool,
    /// Only usable by premium users (owners and sudo are exempt).
    pub premium: bool,
    /// Left out of help listings.
    pub hidden: bool,
}

/// A registered command: its metadata, restrictions and body.
#[derive(Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    category: String,
    description: String,
    usage: Option<String>,
    permission: Role,
    cooldown: Option<Duration>,
    args: ArgBounds,
    flags: CommandFlags,
    capabilities: BTreeSet<Capability>,
    handler: Arc<dyn CommandHandler>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .field("permission", &self.permission)
            .field("cooldown", &self.cooldown)
            .field("args", &self.args)
            .field("flags", &self.flags)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Command {
    /// Creates a command with no restrictions, the default cooldown and unbounded arguments.
    pub fn new(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            aliases: Vec::new(),
            category: "general".to_string(),
            description: String::new(),
            usage: None,
            permission: Role::User,
            cooldown: None,
            args: ArgBounds::default(),
            flags: CommandFlags::default(),
            capabilities: BTreeSet::new(),
            handler,
        }
    }

    /// Creates a command whose body is an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        Self::new(name, Arc::new(body))
    }

    /// Adds an alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    /// Sets the help category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the one-line description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the usage line shown when arguments are wrong.
    #[must_use]
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Sets the minimum role.
    #[must_use]
    pub fn requires(mut self, role: Role) -> Self {
        self.permission = role;
        self
    }

    /// Sets the per-(user, command) cooldown; zero disables it.
    #[must_use]
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Sets the argument bounds.
    #[must_use]
    pub fn args(mut self, bounds: ArgBounds) -> Self {
        self.args = bounds;
        self
    }

    /// Sets an explicit minimum argument count.
    #[must_use]
    pub fn min_args(mut self, min: usize) -> Self {
        self.args.min = Some(min);
        self
    }

    /// Sets an explicit maximum argument count.
    #[must_use]
    pub fn max_args(mut self, max: usize) -> Self {
        self.args.max = Some(max);
        self
    }

    /// Declares that arguments are required; without an explicit minimum this means at least one.
    #[must_use]
    pub fn args_required(mut self) -> Self {
        self.args.required = true;
        self
    }

    /// Restricts the command to group chats.
    #[must_use]
    pub fn group_only(mut self) -> Self {
        self.flags.group_only = true;
        self
    }

    /// Restricts the command to group admins.
    #[must_use]
    pub fn admin_only(mut self) -> Self {
        self.flags.admin_only = true;
        self
    }

    /// Requires the bot to be admin of the group.
    #[must_use]
    pub fn bot_admin_required(mut self) -> Self {
        self.flags.bot_admin_required = true;
        self
    }

    /// Restricts the command to bot owners.
    #[must_use]
    pub fn owner_only(mut self) -> Self {
        self.flags.owner_only = true;
        self
    }

    /// Restricts the command to premium users.
    #[must_use]
    pub fn premium(mut self) -> Self {
        self.flags.premium = true;
        self
    }

    /// Hides the command from help listings.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.flags.hidden = true;
        self
    }

    /// Declares a capability.
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Primary name, lowercase.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Aliases, lowercase.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Help category.
    pub fn category_name(&self) -> &str {
        &self.category
    }

    /// One-line description.
    pub fn description_text(&self) -> &str {
        &self.description
    }

    /// Usage line, if declared.
    pub fn usage_text(&self) -> Option<&str> {
        self.usage.as_deref()
    }

    /// Minimum role.
    pub const fn permission(&self) -> Role {
        self.permission
    }

    /// Declared cooldown, or `None` to use the configured default.
    pub const fn declared_cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    /// Argument bounds.
    pub const fn arg_bounds(&self) -> ArgBounds {
        self.args
    }

    /// Restriction flags.
    pub const fn flags(&self) -> &CommandFlags {
        &self.flags
    }

    /// Declared capabilities.
    pub const fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Whether the command declared `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Name followed by aliases.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// The body.
    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }
}

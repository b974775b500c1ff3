//! Authorization gate: the ordered predicate chain evaluated before execution.

use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Effective role of a requester, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Any user.
    #[default]
    User = 0,
    /// Admin of the group the command was sent in.
    GroupAdmin = 1,
    /// Sudo user configured on the bot.
    Sudo = 2,
    /// Bot owner.
    Owner = 3,
}

impl Role {
    /// Get the role name as a string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::GroupAdmin => "group_admin",
            Self::Sudo => "sudo",
            Self::Owner => "owner",
        }
    }

    /// Highest role the flags grant. Group-admin only counts inside a group.
    pub const fn effective(flags: &RoleFlags, is_group: bool) -> Self {
        if flags.owner {
            Self::Owner
        } else if flags.sudo {
            Self::Sudo
        } else if flags.group_admin && is_group {
            Self::GroupAdmin
        } else {
            Self::User
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-message role and status flags of the requester.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    /// Configured bot owner.
    pub owner: bool,
    /// Configured sudo user.
    pub sudo: bool,
    /// Admin of the current group.
    pub group_admin: bool,
    /// The bot itself is admin of the current group.
    pub bot_admin: bool,
    /// Banned from the bot.
    pub banned: bool,
    /// Muted in the current group.
    pub muted: bool,
    /// Holds premium status.
    pub premium: bool,
    /// On the global whitelist.
    pub whitelisted: bool,
}

/// Closed set of reasons the gate can deny a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// Group-only command outside a group.
    NotGroup,
    /// Requester is not a group admin.
    NotAdmin,
    /// Bot lacks admin rights in the chat.
    BotNotAdmin,
    /// Requester is banned.
    Banned,
    /// Requester is muted in the group.
    Muted,
    /// Owner-only command, or the requester's role is below sudo.
    NotOwner,
    /// Requester lacks premium status.
    NotPremium,
    /// Whitelist mode is on and the requester is not whitelisted.
    WhitelistBlocked,
}

impl DenialReason {
    /// Stable uppercase code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotGroup => "NOT_GROUP",
            Self::NotAdmin => "NOT_ADMIN",
            Self::BotNotAdmin => "BOT_NOT_ADMIN",
            Self::Banned => "BANNED",
            Self::Muted => "MUTED",
            Self::NotOwner => "NOT_OWNER",
            Self::NotPremium => "NOT_PREMIUM",
            Self::WhitelistBlocked => "WHITELIST_BLOCKED",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The command may proceed.
    Allowed,
    /// The command must not run.
    Denied(DenialReason),
}

/// Facts about a single invocation the gate decides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateInput {
    /// Requester flags.
    pub roles: RoleFlags,
    /// Whether the invocation happened in a group chat.
    pub is_group: bool,
}

/// Ordered, side-effect-free authorization checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGate {
    whitelist_mode: bool,
}

impl AuthorizationGate {
    /// Creates a gate; `whitelist_mode` restricts the bot to whitelisted, owner and sudo users.
    pub const fn new(whitelist_mode: bool) -> Self {
        Self { whitelist_mode }
    }

    /// Evaluates every check in order and stops at the first denial.
    pub fn evaluate(&self, command: &Command, input: &GateInput) -> Decision {
        let decision = self.check(command, input).map_or(Decision::Allowed, Decision::Denied);
        if let Decision::Denied(reason) = decision {
            debug!(command = command.name(), %reason, "Authorization denied");
        }
        decision
    }

    fn check(&self, command: &Command, input: &GateInput) -> Option<DenialReason> {
        let flags = &input.roles;
        let role = Role::effective(flags, input.is_group);
        let flags_privileged = flags.owner || flags.sudo;

        if flags.banned && !flags.owner {
            return Some(DenialReason::Banned);
        }
        if flags.muted && input.is_group && !flags.owner {
            return Some(DenialReason::Muted);
        }
        if self.whitelist_mode && !(flags.whitelisted || flags_privileged) {
            return Some(DenialReason::WhitelistBlocked);
        }
        if command.flags().owner_only && !flags.owner {
            return Some(DenialReason::NotOwner);
        }
        if role < command.permission() {
            return Some(match command.permission() {
                Role::GroupAdmin => DenialReason::NotAdmin,
                Role::User | Role::Sudo | Role::Owner => DenialReason::NotOwner,
            });
        }
        if command.flags().group_only && !input.is_group {
            return Some(DenialReason::NotGroup);
        }
        if command.flags().admin_only && !(input.is_group && flags.group_admin) {
            return Some(DenialReason::NotAdmin);
        }
        if command.flags().bot_admin_required && !flags.bot_admin {
            return Some(DenialReason::BotNotAdmin);
        }
        if command.flags().premium && !(flags.premium || flags_privileged) {
            return Some(DenialReason::NotPremium);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::context::CommandContext;
    use crate::error::CommandError;

    fn command(name: &str) -> Command {
        Command::from_fn(name, |_ctx: CommandContext| async { Ok::<(), CommandError>(()) })
    }

    fn input(roles: RoleFlags, is_group: bool) -> GateInput {
        GateInput { roles, is_group }
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Owner > Role::Sudo);
        assert!(Role::Sudo > Role::GroupAdmin);
        assert!(Role::GroupAdmin > Role::User);
    }

    #[test]
    fn test_group_admin_only_counts_in_groups() {
        let flags = RoleFlags {
            group_admin: true,
            ..RoleFlags::default()
        };
        assert_eq!(Role::effective(&flags, true), Role::GroupAdmin);
        assert_eq!(Role::effective(&flags, false), Role::User);
    }

    #[test]
    fn test_banned_beats_everything_but_owner() {
        let gate = AuthorizationGate::new(true);
        let cmd = command("ping").premium().group_only();
        let banned = RoleFlags {
            banned: true,
            sudo: true,
            premium: true,
            whitelisted: true,
            ..RoleFlags::default()
        };
        assert_eq!(
            gate.evaluate(&cmd, &input(banned, true)),
            Decision::Denied(DenialReason::Banned)
        );

        let owner = RoleFlags {
            banned: true,
            owner: true,
            ..RoleFlags::default()
        };
        assert_eq!(gate.evaluate(&cmd, &input(owner, true)), Decision::Allowed);
    }

    #[test]
    fn test_muted_only_applies_in_groups() {
        let gate = AuthorizationGate::default();
        let muted = RoleFlags {
            muted: true,
            ..RoleFlags::default()
        };
        assert_eq!(
            gate.evaluate(&command("ping"), &input(muted, true)),
            Decision::Denied(DenialReason::Muted)
        );
        assert_eq!(gate.evaluate(&command("ping"), &input(muted, false)), Decision::Allowed);
    }

    #[test]
    fn test_whitelist_mode() {
        let gate = AuthorizationGate::new(true);
        let cmd = command("ping");
        assert_eq!(
            gate.evaluate(&cmd, &input(RoleFlags::default(), false)),
            Decision::Denied(DenialReason::WhitelistBlocked)
        );
        let whitelisted = RoleFlags {
            whitelisted: true,
            ..RoleFlags::default()
        };
        assert_eq!(gate.evaluate(&cmd, &input(whitelisted, false)), Decision::Allowed);
        let sudo = RoleFlags {
            sudo: true,
            ..RoleFlags::default()
        };
        assert_eq!(gate.evaluate(&cmd, &input(sudo, false)), Decision::Allowed);
    }

    #[test]
    fn test_owner_only() {
        let gate = AuthorizationGate::default();
        let cmd = command("eval").owner_only();
        let sudo = RoleFlags {
            sudo: true,
            ..RoleFlags::default()
        };
        assert_eq!(
            gate.evaluate(&cmd, &input(sudo, false)),
            Decision::Denied(DenialReason::NotOwner)
        );
    }

    #[test]
    fn test_minimum_role() {
        let gate = AuthorizationGate::default();
        let admin_cmd = command("kick").requires(Role::GroupAdmin);
        let sudo_cmd = command("broadcast").requires(Role::Sudo);
        let admin = RoleFlags {
            group_admin: true,
            ..RoleFlags::default()
        };

        assert_eq!(
            gate.evaluate(&admin_cmd, &input(RoleFlags::default(), true)),
            Decision::Denied(DenialReason::NotAdmin)
        );
        assert_eq!(gate.evaluate(&admin_cmd, &input(admin, true)), Decision::Allowed);
        assert_eq!(
            gate.evaluate(&sudo_cmd, &input(admin, true)),
            Decision::Denied(DenialReason::NotOwner)
        );
    }

    #[test]
    fn test_group_context_checks_in_order() {
        let gate = AuthorizationGate::default();
        let cmd = command("purge").group_only().admin_only().bot_admin_required();

        assert_eq!(
            gate.evaluate(&cmd, &input(RoleFlags::default(), false)),
            Decision::Denied(DenialReason::NotGroup)
        );
        assert_eq!(
            gate.evaluate(&cmd, &input(RoleFlags::default(), true)),
            Decision::Denied(DenialReason::NotAdmin)
        );
        let admin = RoleFlags {
            group_admin: true,
            ..RoleFlags::default()
        };
        assert_eq!(
            gate.evaluate(&cmd, &input(admin, true)),
            Decision::Denied(DenialReason::BotNotAdmin)
        );
        let both = RoleFlags {
            group_admin: true,
            bot_admin: true,
            ..RoleFlags::default()
        };
        assert_eq!(gate.evaluate(&cmd, &input(both, true)), Decision::Allowed);
    }

    #[test]
    fn test_premium_exempts_owner_and_sudo() {
        let gate = AuthorizationGate::default();
        let cmd = command("hd").premium();
        assert_eq!(
            gate.evaluate(&cmd, &input(RoleFlags::default(), false)),
            Decision::Denied(DenialReason::NotPremium)
        );
        for flags in [
            RoleFlags { premium: true, ..RoleFlags::default() },
            RoleFlags { sudo: true, ..RoleFlags::default() },
            RoleFlags { owner: true, ..RoleFlags::default() },
        ] {
            assert_eq!(gate.evaluate(&cmd, &input(flags, false)), Decision::Allowed);
        }
    }

    #[test]
    fn test_denial_reason_codes() {
        assert_eq!(DenialReason::WhitelistBlocked.to_string(), "WHITELIST_BLOCKED");
        let json = serde_json::to_string(&DenialReason::BotNotAdmin).unwrap();
        assert_eq!(json, "\"BOT_NOT_ADMIN\"");
    }
}

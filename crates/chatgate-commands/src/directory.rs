//! In-memory [`RoleDirectory`].

use crate::context::RoleDirectory;
use crate::permissions::RoleFlags;
use async_trait::async_trait;
use chatgate_common::{InboundEvent, Jid};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Role directory backed by in-memory sets, for the console bot and tests.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    banned: RwLock<HashSet<Jid>>,
    premium: RwLock<HashSet<Jid>>,
    whitelisted: RwLock<HashSet<Jid>>,
    /// chat -> muted users
    muted: RwLock<HashMap<Jid, HashSet<Jid>>>,
    /// chat -> admins
    group_admins: RwLock<HashMap<Jid, HashSet<Jid>>>,
    bot_admin_in: RwLock<HashSet<Jid>>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bans or unbans a user.
    pub fn set_banned(&self, user: &Jid, banned: bool) {
        toggle(&mut self.banned.write(), user, banned);
        debug!(user = %user, banned, "Updated ban status");
    }

    /// Grants or revokes premium.
    pub fn set_premium(&self, user: &Jid, premium: bool) {
        toggle(&mut self.premium.write(), user, premium);
    }

    /// Adds or removes a user from the whitelist.
    pub fn set_whitelisted(&self, user: &Jid, whitelisted: bool) {
        toggle(&mut self.whitelisted.write(), user, whitelisted);
    }

    /// Mutes or unmutes a user in one chat.
    pub fn set_muted(&self, chat: &Jid, user: &Jid, muted: bool) {
        toggle(self.muted.write().entry(chat.clone()).or_default(), user, muted);
        debug!(chat = %chat, user = %user, muted, "Updated mute status");
    }

    /// Promotes or demotes a group admin.
    pub fn set_group_admin(&self, chat: &Jid, user: &Jid, admin: bool) {
        toggle(self.group_admins.write().entry(chat.clone()).or_default(), user, admin);
    }

    /// Records whether the bot itself is admin of `chat`.
    pub fn set_bot_admin(&self, chat: &Jid, admin: bool) {
        toggle(&mut self.bot_admin_in.write(), chat, admin);
    }

    fn in_chat(map: &RwLock<HashMap<Jid, HashSet<Jid>>>, chat: &Jid, user: &Jid) -> bool {
        map.read().get(chat).is_some_and(|users| users.contains(user))
    }
}

fn toggle(set: &mut HashSet<Jid>, jid: &Jid, on: bool) {
    if on {
        set.insert(jid.clone());
    } else {
        set.remove(jid);
    }
}

#[async_trait]
impl RoleDirectory for StaticDirectory {
    async fn lookup(&self, event: &InboundEvent) -> chatgate_common::Result<RoleFlags> {
        let (chat, sender) = (&event.chat_id, &event.sender_id);
        let in_group = event.is_group_chat;
        Ok(RoleFlags {
            banned: self.banned.read().contains(sender),
            premium: self.premium.read().contains(sender),
            whitelisted: self.whitelisted.read().contains(sender),
            muted: in_group && Self::in_chat(&self.muted, chat, sender),
            group_admin: in_group && Self::in_chat(&self.group_admins, chat, sender),
            bot_admin: in_group && self.bot_admin_in.read().contains(chat),
            ..RoleFlags::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_common::test_utils::chat_fixtures::{event, group, jid, other_user, user};

    #[tokio::test]
    async fn test_lookup_reflects_sets() {
        let directory = StaticDirectory::new();
        directory.set_banned(&user(), true);
        directory.set_group_admin(&group(), &other_user(), true);
        directory.set_bot_admin(&group(), true);
        directory.set_muted(&group(), &user(), true);

        let flags = directory.lookup(&event(&group(), &user(), "!ping")).await.unwrap();
        assert!(flags.banned && flags.muted && flags.bot_admin);
        assert!(!flags.group_admin && !flags.owner);

        let flags = directory.lookup(&event(&group(), &other_user(), "!ping")).await.unwrap();
        assert!(flags.group_admin && !flags.banned);

        directory.set_banned(&user(), false);
        let flags = directory.lookup(&event(&group(), &user(), "!ping")).await.unwrap();
        assert!(!flags.banned);
    }

    #[tokio::test]
    async fn test_group_flags_ignored_in_private_chat() {
        let directory = StaticDirectory::new();
        let private = jid("111@s.whatsapp.net");
        directory.set_group_admin(&private, &user(), true);
        directory.set_bot_admin(&private, true);

        let flags = directory.lookup(&event(&private, &user(), "!ping")).await.unwrap();
        assert!(!flags.group_admin && !flags.bot_admin && !flags.muted);
    }
}

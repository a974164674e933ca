//! The chat and messaging service.
//!
//! Channels are session-scoped. The main channel mirrors session
//! participation and always includes the DM; ad hoc channels are
//! created by any participant naming a subset of session members.
//! Messages are immutable, ordered by creation with an id tie-break,
//! and a roll command in ordinary content is parsed and evaluated
//! server-side.

use std::collections::BTreeSet;
use std::sync::Arc;

use loretable_protocol::{
    ChannelId, ChannelSummary, ChatMessage, MessageId, MessageKind,
    SessionId, UserId,
};
use loretable_store::{
    ChannelRecord, MessagePage, NewMessage, RecordStore, now_ms,
};

use crate::dice::parse_roll_command;
use crate::ChatError;

/// Page size when the caller doesn't ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Hard ceiling on page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// The outcome of a channel-creation request.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    /// The channel, freshly created or reused.
    pub channel: ChannelRecord,
    /// False when an existing two-party channel was reused.
    pub created: bool,
}

/// The chat service. Cheap to clone; state lives in the store.
pub struct ChatService<S> {
    store: Arc<S>,
}

impl<S> Clone for ChatService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> ChatService<S> {
    /// Creates a chat service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // -- Channels ----------------------------------------------------------

    /// The channels `user` belongs to, each with that user's unread
    /// count.
    pub async fn list_channels(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<Vec<ChannelSummary>, ChatError> {
        let mut summaries = Vec::new();
        for channel in
            self.store.channels_in_session(session_id).await?
        {
            if channel.members.contains_key(&user_id) {
                summaries.push(self.summarize(&channel, user_id).await?);
            }
        }
        Ok(summaries)
    }

    /// One channel as seen by one member (unread count included).
    pub async fn summarize(
        &self,
        channel: &ChannelRecord,
        for_user: UserId,
    ) -> Result<ChannelSummary, ChatError> {
        let cursor =
            channel.members.get(&for_user).copied().unwrap_or(0);
        let unread = self
            .store
            .count_messages_newer(channel.id, cursor, for_user)
            .await?;
        Ok(ChannelSummary {
            id: channel.id,
            name: channel.name.clone(),
            is_main: channel.is_main,
            member_ids: channel.member_ids(),
            unread,
        })
    }

    /// Creates a channel for `creator` plus `participant_ids`.
    ///
    /// The creator is always a member, whether or not they named
    /// themselves. A resulting two-person set reuses an existing
    /// non-main two-party channel instead of duplicating it; a set
    /// that is only the creator is rejected. Three or more members
    /// with no name get one derived from display names.
    pub async fn create_channel(
        &self,
        session_id: SessionId,
        creator: UserId,
        participant_ids: Vec<UserId>,
        name: Option<String>,
    ) -> Result<ChannelOutcome, ChatError> {
        // Normalize: include the creator, drop duplicates, keep a
        // stable order.
        let mut members: BTreeSet<UserId> =
            participant_ids.into_iter().collect();
        members.insert(creator);
        if members.len() < 2 {
            return Err(ChatError::EmptyChannel);
        }

        // Everyone named must actually be part of the session.
        let participants = self.store.participants(session_id).await?;
        for member in &members {
            if !participants.iter().any(|p| p.user_id == *member) {
                return Err(ChatError::NotInSession(*member));
            }
        }
        let members: Vec<UserId> = members.into_iter().collect();

        if let [a, b] = members[..] {
            let existing = self
                .store
                .channels_in_session(session_id)
                .await?
                .into_iter()
                .find(|c| c.is_direct_between(a, b));
            if let Some(channel) = existing {
                return Ok(ChannelOutcome {
                    channel,
                    created: false,
                });
            }
        }

        let name = match name {
            Some(n) if !n.trim().is_empty() => Some(n.trim().to_owned()),
            _ if members.len() >= 3 => {
                // Derive "Asha, Bram, Corwin" from display names.
                let names: Vec<&str> = members
                    .iter()
                    .filter_map(|m| {
                        participants
                            .iter()
                            .find(|p| p.user_id == *m)
                            .map(|p| p.display_name.as_str())
                    })
                    .collect();
                Some(names.join(", "))
            }
            _ => None,
        };

        let channel = self
            .store
            .create_channel(session_id, name, false, members)
            .await?;
        tracing::debug!(
            %session_id, channel_id = %channel.id,
            members = channel.members.len(), "channel created"
        );
        Ok(ChannelOutcome {
            channel,
            created: true,
        })
    }

    /// Adds a user to the session's main channel (idempotent).
    pub async fn add_to_main(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<ChannelRecord, ChatError> {
        let main = self.store.main_channel(session_id).await?;
        self.store.add_channel_member(main.id, user_id).await?;
        Ok(main)
    }

    /// Removes a user from the session's main channel.
    pub async fn remove_from_main(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<ChannelRecord, ChatError> {
        let main = self.store.main_channel(session_id).await?;
        self.store.remove_channel_member(main.id, user_id).await?;
        Ok(main)
    }

    // -- Messages ----------------------------------------------------------

    /// Sends a message as `sender`, who must be a channel member.
    ///
    /// Content starting with a roll command is parsed and evaluated;
    /// an invalid expression degrades to a plain text message rather
    /// than rejecting the send.
    pub async fn send_message(
        &self,
        channel_id: ChannelId,
        sender: UserId,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let channel = self.member_channel(channel_id, sender).await?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (kind, dice) = match parse_roll_command(content) {
            Some(Ok(expr)) => (MessageKind::Roll, Some(expr.eval())),
            // A roll command with a bad expression, or no command at
            // all: store the literal text.
            Some(Err(_)) | None => (MessageKind::Text, None),
        };

        let message = self
            .store
            .append_message(NewMessage {
                channel_id: channel.id,
                sender_id: sender,
                kind,
                content: content.to_owned(),
                dice,
            })
            .await?;
        Ok(message)
    }

    /// Appends a `system` message attributed to `actor`.
    ///
    /// Membership is not required: the engine writes "left" notices
    /// for players it has just removed.
    pub async fn send_system_message(
        &self,
        channel_id: ChannelId,
        actor: UserId,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let message = self
            .store
            .append_message(NewMessage {
                channel_id,
                sender_id: actor,
                kind: MessageKind::System,
                content: content.to_owned(),
                dice: None,
            })
            .await?;
        Ok(message)
    }

    /// A page of history for a member: up to `limit` (clamped to
    /// [`MAX_PAGE_SIZE`], defaulting to [`DEFAULT_PAGE_SIZE`])
    /// messages strictly older than `before`, oldest first.
    pub async fn messages(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        before: Option<MessageId>,
        limit: Option<usize>,
    ) -> Result<MessagePage, ChatError> {
        self.member_channel(channel_id, user_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Ok(self.store.messages_before(channel_id, before, limit).await?)
    }

    /// Advances the member's read cursor to now. Idempotent, and the
    /// cursor never moves backward.
    pub async fn mark_read(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), ChatError> {
        self.mark_read_at(channel_id, user_id, now_ms()).await
    }

    /// [`Self::mark_read`] with an explicit timestamp.
    pub async fn mark_read_at(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        at_ms: u64,
    ) -> Result<(), ChatError> {
        let channel = self.member_channel(channel_id, user_id).await?;
        let current =
            channel.members.get(&user_id).copied().unwrap_or(0);
        if at_ms > current {
            self.store.set_last_read(channel_id, user_id, at_ms).await?;
        }
        Ok(())
    }

    /// Loads a channel and verifies membership. A channel the user
    /// doesn't belong to — including one in another session — reads
    /// as not-found.
    async fn member_channel(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<ChannelRecord, ChatError> {
        match self.store.channel(channel_id).await? {
            Some(channel) if channel.members.contains_key(&user_id) => {
                Ok(channel)
            }
            _ => Err(ChatError::ChannelNotFound(channel_id)),
        }
    }
}

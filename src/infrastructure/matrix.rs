//! # Matrix Service Adapter
//!
//! Implements `Transport` and `Publisher` for the Matrix protocol using the `matrix_sdk`.
//! Matrix has no inline keyboards, so controls are rendered as `.do <token>` hint lines
//! which the router decodes back into button presses.

use crate::domain::events::{ACTION_PREFIX, Control, InboundEvent};
use crate::domain::traits::{Publisher, Transport};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use matrix_sdk::Client;
use matrix_sdk::room::Room;
use matrix_sdk::ruma::events::relation::Replacement;
use matrix_sdk::ruma::events::room::message::{
    MessageType, OriginalSyncRoomMessageEvent, Relation, RoomMessageEventContent,
    RoomMessageEventContentWithoutRelation,
};
use matrix_sdk::ruma::{EventId, RoomId, UserId};
use std::convert::TryFrom;

#[derive(Clone)]
pub struct MatrixService {
    client: Client,
}

impl MatrixService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Room ids (`!…`) are used as-is; user ids (`@…`) map to a direct-message room,
    /// created on first contact.
    async fn resolve_room(&self, target: &str) -> Result<Room> {
        if target.starts_with('!') {
            let room_id = RoomId::parse(target)?;
            return self
                .client
                .get_room(&room_id)
                .ok_or_else(|| anyhow!("Not joined to room {target}"));
        }

        let user_id = UserId::parse(target)?;
        if let Some(room) = self.client.get_dm_room(&user_id) {
            return Ok(room);
        }
        tracing::info!("Opening direct room with {}", target);
        Ok(self.client.create_dm(&user_id).await?)
    }

    async fn send_markdown(&self, target: &str, body: &str) -> Result<String> {
        let room = self.resolve_room(target).await?;
        let resp = room
            .send(RoomMessageEventContent::text_markdown(body))
            .await?;
        Ok(resp.event_id.to_string())
    }

    /// Helper to send markdown edits
    async fn internal_edit(&self, room: &Room, event_id: &str, new_content: &str) -> Result<()> {
        let event_id = <&EventId>::try_from(event_id)?;
        let mut content = RoomMessageEventContent::text_markdown(new_content);
        let replacement_content = RoomMessageEventContentWithoutRelation::from(content.clone());

        content.relates_to = Some(Relation::Replacement(Replacement::new(
            event_id.to_owned(),
            replacement_content,
        )));

        room.send(content).await?;
        Ok(())
    }
}

/// Appends controls to a message body as hint lines.
pub fn render_with_controls(text: &str, controls: &[Control]) -> String {
    if controls.is_empty() {
        return text.to_string();
    }
    let hints: Vec<String> = controls
        .iter()
        .map(|c| format!("- {}: `{} {}`", c.label, ACTION_PREFIX, c.action))
        .collect();
    format!("{}\n\n{}", text, hints.join("\n"))
}

/// Turns a text message event into an inbound event. Non-text messages are ignored, and so
/// is anything the room filter in `admit` drops.
pub async fn decode_message(
    ev: &OriginalSyncRoomMessageEvent,
    room: &Room,
    channel: &str,
) -> Option<InboundEvent> {
    let MessageType::Text(text_content) = &ev.content.msgtype else {
        return None;
    };
    let room_id = room.room_id().as_str();
    let event = InboundEvent::decode(
        &text_content.body,
        ev.sender.as_str(),
        room_id,
        Some(ev.event_id.to_string()),
    );
    admit(event, room_id, channel, is_direct_room(room).await)
}

/// Nothing from the broadcast channel is handled. In shared rooms only commands and
/// button presses are; free text there is conversation, not a submission.
pub fn admit(event: InboundEvent, room_id: &str, channel: &str, direct: bool) -> Option<InboundEvent> {
    if room_id == channel {
        return None;
    }
    if !direct && matches!(event, InboundEvent::FreeText { .. }) {
        tracing::debug!("Ignoring free text in shared room {}", room_id);
        return None;
    }
    Some(event)
}

async fn is_direct_room(room: &Room) -> bool {
    match room.is_direct().await {
        Ok(true) => true,
        Ok(false) => room.joined_members_count() <= 2,
        Err(e) => {
            tracing::warn!("Failed to read direct flag of {}: {}", room.room_id(), e);
            room.joined_members_count() <= 2
        }
    }
}

#[async_trait]
impl Transport for MatrixService {
    async fn send(&self, recipient: &str, text: &str, controls: &[Control]) -> Result<(), String> {
        let body = render_with_controls(text, controls);
        tracing::debug!("Bot sending message to {}", recipient);
        self.send_markdown(recipient, &body)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Publisher for MatrixService {
    async fn post(&self, channel: &str, text: &str, controls: &[Control]) -> Result<String, String> {
        let body = render_with_controls(text, controls);
        self.send_markdown(channel, &body)
            .await
            .map_err(|e| e.to_string())
    }

    async fn update_controls(
        &self,
        channel: &str,
        message_ref: &str,
        text: &str,
        controls: &[Control],
    ) -> Result<(), String> {
        let room = self.resolve_room(channel).await.map_err(|e| e.to_string())?;
        let body = render_with_controls(text, controls);
        self.internal_edit(&room, message_ref, &body)
            .await
            .map_err(|e| e.to_string())
    }
}

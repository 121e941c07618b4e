//! Gateway events delivered by a session

use adapt_plugin_api::{
    Channel, Interaction, LogRecord, Member, Message, MessageRef, Reaction, Tenant, User,
    VoiceState,
};
use serde::{Deserialize, Serialize};

/// One upstream event.
///
/// Serialized adjacently tagged, one object per line when replayed:
/// `{"event": "message_received", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The session is connected (sent again after every reconnect)
    Ready,
    Log(LogRecord),
    MessageReceived(Message),
    MessageDeleted(MessageRef),
    UserJoined(Member),
    UserLeft {
        tenant: Tenant,
        user: User,
    },
    ChannelCreated(Channel),
    ChannelDestroyed(Channel),
    ChannelUpdated {
        before: Channel,
        after: Channel,
    },
    VoiceStateUpdated {
        user: User,
        before: VoiceState,
        after: VoiceState,
    },
    ReactionAdded(Reaction),
    ReactionRemoved(Reaction),
    ReactionsCleared(MessageRef),
    UserUpdated {
        before: User,
        after: User,
    },
    MemberUpdated {
        #[serde(default)]
        before: Option<Member>,
        after: Member,
    },
    TenantJoined(Tenant),
    TenantLeft(Tenant),
    InteractionCreated(Interaction),
}

impl GatewayEvent {
    /// Event name as used in the serialized form
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Log(_) => "log",
            Self::MessageReceived(_) => "message_received",
            Self::MessageDeleted(_) => "message_deleted",
            Self::UserJoined(_) => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::ChannelCreated(_) => "channel_created",
            Self::ChannelDestroyed(_) => "channel_destroyed",
            Self::ChannelUpdated { .. } => "channel_updated",
            Self::VoiceStateUpdated { .. } => "voice_state_updated",
            Self::ReactionAdded(_) => "reaction_added",
            Self::ReactionRemoved(_) => "reaction_removed",
            Self::ReactionsCleared(_) => "reactions_cleared",
            Self::UserUpdated { .. } => "user_updated",
            Self::MemberUpdated { .. } => "member_updated",
            Self::TenantJoined(_) => "tenant_joined",
            Self::TenantLeft(_) => "tenant_left",
            Self::InteractionCreated(_) => "interaction_created",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_json() {
        let json = serde_json::to_string(&GatewayEvent::Ready).unwrap();
        assert_eq!(json, r#"{"event":"ready"}"#);
        let parsed: GatewayEvent = serde_json::from_str(r#"{"event":"ready"}"#).unwrap();
        assert_eq!(parsed, GatewayEvent::Ready);
    }

    #[test]
    fn test_tenant_joined_json() {
        let parsed: GatewayEvent =
            serde_json::from_str(r#"{"event":"tenant_joined","data":{"id":42,"name":"Guild"}}"#)
                .unwrap();
        assert_eq!(
            parsed,
            GatewayEvent::TenantJoined(Tenant {
                id: 42,
                name: "Guild".into()
            })
        );
        assert_eq!(parsed.name(), "tenant_joined");
    }

    #[test]
    fn test_member_updated_without_before() {
        let parsed: GatewayEvent = serde_json::from_str(
            r#"{"event":"member_updated","data":{"after":{"tenant_id":1,"user":{"id":2,"name":"n"}}}}"#,
        )
        .unwrap();
        match parsed {
            GatewayEvent::MemberUpdated { before, after } => {
                assert!(before.is_none());
                assert_eq!(after.user.id, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_name_matches_serialized_tag() {
        let event = GatewayEvent::ReactionsCleared(MessageRef {
            message_id: 1,
            channel_id: 2,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
    }
}

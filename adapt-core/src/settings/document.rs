//! The global settings document

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Connection settings for the platform session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordSettings {
    /// Bot credential; an empty token disables the connection
    #[serde(rename = "BotToken", default)]
    pub bot_token: String,
}

impl DiscordSettings {
    /// Whether a usable token is configured
    pub fn has_token(&self) -> bool {
        !self.bot_token.trim().is_empty()
    }
}

/// The single global settings document (`Settings.json`).
///
/// Holds the host's own settings plus one block per plugin key. Blocks are
/// kept as raw JSON here; they are typed when their plugin registers them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalDocument {
    #[serde(rename = "Discord", default)]
    pub discord: DiscordSettings,

    #[serde(rename = "DiscordComponents", default)]
    pub components: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_minimal_document() {
        let doc: GlobalDocument = serde_json::from_str(r#"{"Discord":{"BotToken":""}}"#).unwrap();
        assert!(!doc.discord.has_token());
        assert!(doc.components.is_empty());
    }

    #[test]
    fn test_whitespace_token_is_missing() {
        let settings = DiscordSettings {
            bot_token: "   ".into(),
        };
        assert!(!settings.has_token());
    }

    #[test]
    fn test_document_json_layout() {
        let mut doc = GlobalDocument::default();
        doc.discord.bot_token = "abc".into();
        doc.components
            .insert("status".into(), serde_json::json!({"StatusMessage": "hi"}));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["Discord"]["BotToken"], "abc");
        assert_eq!(json["DiscordComponents"]["status"]["StatusMessage"], "hi");
        assert!(json.get("Components").is_none());
    }

    #[test]
    fn test_reads_existing_settings_file() {
        let doc: GlobalDocument = serde_json::from_str(
            r#"{
                "Discord": {"BotToken": "abc"},
                "DiscordComponents": {
                    "Discord.StatusMessage": {"StatusMessage": "hi", "StatusType": "Watching"}
                }
            }"#,
        )
        .unwrap();
        assert!(doc.discord.has_token());
        assert_eq!(
            doc.components["Discord.StatusMessage"]["StatusType"],
            "Watching"
        );
    }
}

//! adapt-status - sets the bot's presence from a settings block
//!
//! The plugin keeps one global block in the settings document:
//!
//! ```json
//! "adapt_status": {
//!   "StatusMessage": "with plugins",
//!   "StreamUrl": null,
//!   "StatusType": "Playing"
//! }
//! ```
//!
//! Every time the session becomes ready the presence is set from that block.

use adapt_plugin_api::{
    Activity, ActivityKind, GlobalSettings, HookResult, Plugin, PluginContext, PluginError,
    PluginManifest, async_trait,
};
use serde::{Deserialize, Serialize};

/// Global settings of the status plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSettings {
    #[serde(rename = "StatusMessage")]
    pub status_message: String,

    /// Only used with `Streaming`
    #[serde(rename = "StreamUrl", default)]
    pub stream_url: Option<String>,

    #[serde(rename = "StatusType", default)]
    pub status_type: ActivityKind,
}

impl StatusSettings {
    /// The presence this block describes
    pub fn activity(&self) -> Activity {
        Activity {
            kind: self.status_type,
            text: self.status_message.clone(),
            url: self.stream_url.clone(),
        }
    }
}

/// Sets the bot status to the configured message on every `Ready`
#[derive(Default)]
pub struct StatusMessage {
    settings: Option<GlobalSettings<StatusSettings>>,
}

impl StatusMessage {
    fn settings(&self) -> Result<&GlobalSettings<StatusSettings>, PluginError> {
        self.settings
            .as_ref()
            .ok_or_else(|| PluginError::Config("status settings were never registered".into()))
    }
}

#[async_trait]
impl Plugin for StatusMessage {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: "StatusMessage".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Sets the Bot status to the config value.".to_string(),
            ..Default::default()
        }
    }

    fn initialize(&mut self, ctx: &PluginContext) -> Result<(), PluginError> {
        self.settings = Some(ctx.register_global(StatusSettings::default())?);
        Ok(())
    }

    async fn on_ready(&mut self, ctx: &PluginContext) -> HookResult {
        let activity = self.settings()?.get().activity();
        ctx.session().set_activity(activity.clone()).await?;

        ctx.log_info(&format!(
            "Set the Bot status to '{:?} {}'!",
            activity.kind, activity.text
        ));
        Ok(())
    }
}

adapt_plugin_api::export_plugin!(StatusMessage);

#[cfg(test)]
mod tests {
    use super::*;
    use adapt_core::{LocalSession, SettingsRegistry};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context(dir: &TempDir, session: Arc<LocalSession>) -> (Arc<SettingsRegistry>, PluginContext) {
        let settings = Arc::new(SettingsRegistry::load_dir(dir.path()));
        let ctx = PluginContext::new("adapt_status", settings.clone(), session);
        (settings, ctx)
    }

    #[test]
    fn test_settings_json_names() {
        let settings: StatusSettings = serde_json::from_str(
            r#"{"StatusMessage": "live", "StreamUrl": "https://example.com/live", "StatusType": "Streaming"}"#,
        )
        .unwrap();
        assert_eq!(settings.status_type, ActivityKind::Streaming);
        assert_eq!(settings.stream_url.as_deref(), Some("https://example.com/live"));

        let minimal: StatusSettings =
            serde_json::from_str(r#"{"StatusMessage": "hi"}"#).unwrap();
        assert_eq!(minimal.status_type, ActivityKind::Playing);
        assert!(minimal.stream_url.is_none());
    }

    #[test]
    fn test_missing_message_is_rejected() {
        let result = serde_json::from_str::<StatusSettings>(r#"{"StatusType": "Watching"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_initialize_registers_default_block() {
        let dir = TempDir::new().unwrap();
        let (settings, ctx) = context(&dir, Arc::new(LocalSession::new()));

        let mut plugin = StatusMessage::default();
        plugin.initialize(&ctx).unwrap();

        let value = settings.global_value("adapt_status").unwrap();
        assert_eq!(value["StatusMessage"], "");
        assert_eq!(value["StatusType"], "Playing");
    }

    #[tokio::test]
    async fn test_on_ready_sets_activity() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(LocalSession::new());
        let (_settings, ctx) = context(&dir, session.clone());

        let mut plugin = StatusMessage::default();
        plugin.initialize(&ctx).unwrap();
        plugin.settings().unwrap().update(|block| {
            block.status_message = "with plugins".into();
            block.status_type = ActivityKind::Watching;
        });

        plugin.on_ready(&ctx).await.unwrap();

        let activity = session.activity().unwrap();
        assert_eq!(activity.kind, ActivityKind::Watching);
        assert_eq!(activity.text, "with plugins");
        assert!(activity.url.is_none());
    }

    #[tokio::test]
    async fn test_on_ready_without_initialize_fails() {
        let dir = TempDir::new().unwrap();
        let (_settings, ctx) = context(&dir, Arc::new(LocalSession::new()));

        let mut plugin = StatusMessage::default();
        let err = plugin.on_ready(&ctx).await.unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }
}

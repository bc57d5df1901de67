//! Editor configuration.

use crate::error::ConfigError;
use crate::model::{EventType, Position};
use std::time::Duration;

/// Environment variable overriding the content-save debounce window.
pub const ENV_CONTENT_DEBOUNCE_MS: &str = "STORYWORLD_CONTENT_DEBOUNCE_MS";

/// Environment variable overriding the type of newly added events.
pub const ENV_DEFAULT_EVENT_TYPE: &str = "STORYWORLD_DEFAULT_EVENT_TYPE";

/// Configuration for a [`StoryEditor`](crate::StoryEditor).
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Title given to new folders.
    pub folder_title: String,

    /// Title given to new scenes.
    pub scene_title: String,

    /// Title given to new events.
    pub event_title: String,

    /// Title given to new jumps.
    pub jump_title: String,

    /// Title given to new choices.
    pub choice_title: String,

    /// Type of events created from the outline.
    pub default_event_type: EventType,

    /// Offset between consecutive new nodes on the canvas.
    pub node_spacing: Position,

    /// Quiet period before buffered content edits are written.
    pub content_debounce: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            folder_title: "New Folder".to_string(),
            scene_title: "Untitled Scene".to_string(),
            event_title: "Untitled Event".to_string(),
            jump_title: "Jump".to_string(),
            choice_title: "Choice".to_string(),
            default_event_type: EventType::Choice,
            node_spacing: Position::new(40.0, 120.0),
            content_debounce: Duration::from_millis(500),
        }
    }
}

impl EditorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `STORYWORLD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ENV_CONTENT_DEBOUNCE_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: ENV_CONTENT_DEBOUNCE_MS,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            config.content_debounce = Duration::from_millis(millis);
        }

        if let Ok(raw) = std::env::var(ENV_DEFAULT_EVENT_TYPE) {
            config.default_event_type =
                raw.parse()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: ENV_DEFAULT_EVENT_TYPE,
                        value: raw.clone(),
                        reason,
                    })?;
        }

        Ok(config)
    }

    /// Set the title of new folders.
    pub fn with_folder_title(mut self, title: impl Into<String>) -> Self {
        self.folder_title = title.into();
        self
    }

    /// Set the title of new scenes.
    pub fn with_scene_title(mut self, title: impl Into<String>) -> Self {
        self.scene_title = title.into();
        self
    }

    /// Set the title of new events.
    pub fn with_event_title(mut self, title: impl Into<String>) -> Self {
        self.event_title = title.into();
        self
    }

    /// Set the title of new jumps.
    pub fn with_jump_title(mut self, title: impl Into<String>) -> Self {
        self.jump_title = title.into();
        self
    }

    /// Set the title of new choices.
    pub fn with_choice_title(mut self, title: impl Into<String>) -> Self {
        self.choice_title = title.into();
        self
    }

    /// Set the type of events created from the outline.
    pub fn with_default_event_type(mut self, event_type: EventType) -> Self {
        self.default_event_type = event_type;
        self
    }

    /// Set the spacing between new canvas nodes.
    pub fn with_node_spacing(mut self, spacing: Position) -> Self {
        self.node_spacing = spacing;
        self
    }

    /// Set the content-save debounce window.
    pub fn with_content_debounce(mut self, debounce: Duration) -> Self {
        self.content_debounce = debounce;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = EditorConfig::new()
            .with_scene_title("Chapter")
            .with_default_event_type(EventType::Input)
            .with_content_debounce(Duration::from_millis(50));

        assert_eq!(config.scene_title, "Chapter");
        assert_eq!(config.folder_title, "New Folder");
        assert_eq!(config.default_event_type, EventType::Input);
        assert_eq!(config.content_debounce, Duration::from_millis(50));
    }
}

use serde::Serialize;

/// VK message keyboard payload, serialized into the `keyboard` request
/// parameter of `messages.send`.
#[derive(Debug, Clone, Serialize)]
pub struct VkKeyboard {
    pub one_time: bool,
    pub inline: bool,
    pub buttons: Vec<Vec<VkButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VkButton {
    pub action: VkButtonAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VkButtonAction {
    Text { label: String },
}

impl VkKeyboard {
    /// The single-button keyboard shipped with every in-game reply.
    pub fn finish_game() -> Self {
        Self {
            one_time: true,
            inline: false,
            buttons: vec![vec![VkButton {
                action: VkButtonAction::Text {
                    label: "Завершить игру".to_string(),
                },
                color: Some("negative".to_string()),
            }]],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

//! Wire types for the control channel between foreground instances and the
//! background runtime.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Promote a freshly installed background version over the one serving traffic.
    ActivateNow,
    CredentialsUpdate { endpoint: String, key: String },
    /// Blank every foreground instance, then deregister the background runtime.
    TerminateApp,
    ShowNotification(NotificationRequest),
    /// The user interacted with a rendered notification.
    NotificationAction {
        action: ActionTag,
        #[serde(default)]
        target: Option<String>,
    },
}

impl ControlMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ActivateNow => "ActivateNow",
            Self::CredentialsUpdate { .. } => "CredentialsUpdate",
            Self::TerminateApp => "TerminateApp",
            Self::ShowNotification(_) => "ShowNotification",
            Self::NotificationAction { .. } => "NotificationAction",
        }
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTag {
    Primary,
    Dismiss,
}

impl ActionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Dismiss => "dismiss",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    /// Role of the signed-in user; selects the default landing route.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Route opened when the user activates the notification.
    pub fn routing_target(&self) -> String {
        if let Some(target) = self.target.as_deref().filter(|t| !t.is_empty()) {
            return target.to_string();
        }
        match self.role.as_deref().filter(|r| !r.is_empty()) {
            Some(role) => format!("/{role}"),
            None => "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub action: ActionTag,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub target: String,
}

/// Everything the host notification surface needs to render one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub vibrate: Vec<u32>,
    pub tag: Option<String>,
    pub data: NotificationData,
    pub actions: Vec<ActionButton>,
}

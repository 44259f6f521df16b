use serde::Deserialize;

use crate::domain::{GameRecord, SlotLabel, ToolSlot};

/// One row of the spreadsheet catalog. The upstream sheet stores the game
/// prompt under an empty-string column header, and any column may be
/// missing from a given row, so every field defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetRow {
    #[serde(rename = "")]
    pub title: String,
    pub link_a_tool: String,
    pub link_a_website: String,
    pub link_b_tool: String,
    pub link_b_website: String,
    pub link_c_tool: String,
    pub link_c_website: String,
    pub link_d_tool: String,
    pub link_d_website: String,
    pub id: Option<i64>,
}

fn website(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl SheetRow {
    pub fn into_record(self) -> GameRecord {
        GameRecord {
            id: self.id,
            title: self.title,
            slots: [
                ToolSlot::new(SlotLabel::A, self.link_a_tool, website(self.link_a_website)),
                ToolSlot::new(SlotLabel::B, self.link_b_tool, website(self.link_b_website)),
                ToolSlot::new(SlotLabel::C, self.link_c_tool, website(self.link_c_website)),
                ToolSlot::new(SlotLabel::D, self.link_d_tool, website(self.link_d_website)),
            ],
        }
    }
}

/// Successful response from the hosted auth service's password-grant and
/// signup endpoints. Signup without a session (email confirmation still
/// pending) carries a user but no access token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionPayload {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub user: Option<UserPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPayload {
    pub id: Option<String>,
    pub email: Option<String>,
    pub confirmed_at: Option<String>,
}

/// Error body returned by the hosted auth service. The service is not
/// consistent about which field carries the message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthErrorPayload {
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub msg: Option<String>,
}

impl AuthErrorPayload {
    pub fn message(&self) -> String {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.error.as_deref())
            .unwrap_or("unknown auth error")
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowlistRow {
    pub email: String,
}

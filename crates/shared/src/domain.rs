use std::fmt;

use serde::{Deserialize, Serialize};

/// An authenticated identity as reported by the identity collaborator.
/// The email may be absent (e.g. phone-only or anonymous sessions); an
/// identity without an email can never pass the allowlist gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: Option<String>,
}

impl Identity {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotLabel {
    A,
    B,
    C,
    D,
}

impl SlotLabel {
    pub const ALL: [SlotLabel; 4] = [SlotLabel::A, SlotLabel::B, SlotLabel::C, SlotLabel::D];
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotLabel::A => "A",
            SlotLabel::B => "B",
            SlotLabel::C => "C",
            SlotLabel::D => "D",
        };
        f.write_str(s)
    }
}

/// One competing submission within a game: the tool that built it and the
/// URL it was deployed to. An empty or absent URL means the submission was
/// never deployed and must be rendered as an unavailable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSlot {
    pub label: SlotLabel,
    pub tool: String,
    pub website: Option<String>,
}

impl ToolSlot {
    pub fn new(label: SlotLabel, tool: impl Into<String>, website: Option<String>) -> Self {
        Self {
            label,
            tool: tool.into(),
            website,
        }
    }

    /// The deployed URL, if any. Whitespace-only URLs count as undeployed.
    pub fn website_url(&self) -> Option<&str> {
        self.website
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn deployed(&self) -> bool {
        self.website_url().is_some()
    }
}

/// One navigable unit of the showcase: a prompt plus exactly four competing
/// submissions labeled A through D. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: Option<i64>,
    pub title: String,
    pub slots: [ToolSlot; 4],
}

impl GameRecord {
    pub fn deployed_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.deployed()).count()
    }
}

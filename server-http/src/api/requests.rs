use pipedoc::PipefyId;
use serde::Deserialize;

// === Pipefy card.move webhook ===

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseInfo {
    pub id: PipefyId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardInfo {
    pub id: PipefyId,
    #[serde(default)]
    pub title: Option<String>,
    pub pipe_id: PipefyId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: PipefyId,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardMoveData {
    pub action: String,
    #[serde(rename = "from")]
    pub from_phase: PhaseInfo,
    #[serde(rename = "to")]
    pub to_phase: PhaseInfo,
    pub moved_by: UserInfo,
    pub card: CardInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipefyWebhookInput {
    pub data: CardMoveData,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub webhook_id: Option<PipefyId>,
}

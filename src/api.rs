//! Battle backend client. Plain request/response JSON; the server is
//! authoritative for all combat resolution, this client only mirrors the
//! snapshots it returns.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::battle::{BattleSnapshot, PlayerAction};
use crate::quiz::Question;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("response decode error: {0}")]
    Decode(String),
}

/// Answer result. The backend may piggyback the post-answer snapshot so
/// the client does not need a follow-up fetch.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub is_correct: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub snapshot: Option<BattleSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueSpeaker {
    pub name: String,
    #[serde(default)]
    pub portrait: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    pub id: String,
    pub content: String,
    pub speaker: DialogueSpeaker,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBattleRequest<'a> {
    monster_id: &'a str,
    difficulty: u8,
    character_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PerformActionRequest<'a> {
    battle_id: &'a str,
    action: PlayerAction,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAnswerRequest<'a> {
    battle_id: &'a str,
    question_id: &'a str,
    selected_index: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveProgressRequest<'a> {
    battle_id: &'a str,
    character_id: &'a str,
    snapshot: &'a BattleSnapshot,
}

pub async fn start_battle(
    base: &str,
    monster_id: &str,
    difficulty: u8,
    character_id: &str,
) -> Result<BattleSnapshot, ApiError> {
    post_json(
        &format!("{base}/battles"),
        &StartBattleRequest {
            monster_id,
            difficulty,
            character_id,
        },
    )
    .await
}

pub async fn perform_action(
    base: &str,
    battle_id: &str,
    action: PlayerAction,
) -> Result<BattleSnapshot, ApiError> {
    post_json(
        &format!("{base}/battles/{battle_id}/action"),
        &PerformActionRequest { battle_id, action },
    )
    .await
}

/// Ask the server to resolve the monster's committed turn.
pub async fn request_monster_turn(
    base: &str,
    battle_id: &str,
) -> Result<BattleSnapshot, ApiError> {
    post_json(
        &format!("{base}/battles/{battle_id}/monster-turn"),
        &serde_json::json!({}),
    )
    .await
}

pub async fn request_random_question(
    base: &str,
    difficulty: u8,
    player_level: u8,
) -> Result<Question, ApiError> {
    get_json(&format!(
        "{base}/questions/random?difficulty={difficulty}&playerLevel={player_level}"
    ))
    .await
}

pub async fn submit_answer(
    base: &str,
    battle_id: &str,
    question_id: &str,
    selected_index: usize,
) -> Result<AnswerOutcome, ApiError> {
    post_json(
        &format!("{base}/battles/{battle_id}/answer"),
        &SubmitAnswerRequest {
            battle_id,
            question_id,
            selected_index,
        },
    )
    .await
}

/// Fire-and-forget checkpoint after each applied snapshot.
pub async fn save_battle_progress(
    base: &str,
    battle_id: &str,
    character_id: &str,
    snapshot: &BattleSnapshot,
) -> Result<(), ApiError> {
    let url = format!("{base}/battles/{battle_id}/progress");
    let response = http_client()
        .post(&url)
        .json(&SaveProgressRequest {
            battle_id,
            character_id,
            snapshot,
        })
        .send()
        .await?;
    check_status(&response)?;
    Ok(())
}

pub async fn get_tutorial_dialogue(base: &str, dialogue_id: &str) -> Result<DialogueLine, ApiError> {
    get_json(&format!("{base}/dialogues/{dialogue_id}")).await
}

fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

fn check_status(response: &reqwest::Response) -> Result<(), ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    Ok(())
}

async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, ApiError> {
    let response = http_client().get(url).send().await?;
    check_status(&response)?;
    decode(response).await
}

async fn post_json<T, B>(url: &str, body: &B) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned,
    B: serde::Serialize,
{
    let response = http_client().post(url).json(body).send().await?;
    check_status(&response)?;
    decode(response).await
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

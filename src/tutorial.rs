//! Scripted first-battle tutorial: which actions are selectable per step,
//! when the step cursor advances, and how the visible dialogue line is
//! kept in sync with it.
//!
//! Scripts are fixed, ordered configuration. The built-in script covers
//! the standard onboarding; a RON file can replace it for content updates
//! without a rebuild.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::battle::PlayerAction;

/// Reserved id of the terminal step. Reaching it ends battle-tutorial mode
/// and hands control back to the generic dialogue flow.
pub const TERMINAL_STEP_ID: &str = "END";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BattleStepConfig {
    pub id: String,
    /// Dialogue line shown while this step is current. Looked up by id in
    /// the cutscene's line list, never by position.
    pub dialogue_id: String,
    #[serde(default)]
    pub allowed_actions: Vec<PlayerAction>,
    /// Which action advances the cursor. Only meaningful when
    /// `wait_for_action` is true; when unset, a single allowed action is
    /// taken as the expectation.
    #[serde(default)]
    pub expected_action: Option<PlayerAction>,
    #[serde(default)]
    pub wait_for_action: bool,
    /// UI target to highlight while this step is current.
    #[serde(default)]
    pub highlight: Option<String>,
}

impl BattleStepConfig {
    fn expectation(&self) -> Option<PlayerAction> {
        self.expected_action.or_else(|| {
            if self.allowed_actions.len() == 1 {
                Some(self.allowed_actions[0])
            } else {
                None
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TutorialScript {
    pub id: String,
    pub steps: Vec<BattleStepConfig>,
}

impl TutorialScript {
    /// The standard onboarding script: attack, quiz, answer, defend, skill,
    /// then the terminal marker.
    pub fn builtin() -> Self {
        let step = |id: &str, dialogue_id: &str, allowed: &[PlayerAction], wait: bool| {
            BattleStepConfig {
                id: id.to_string(),
                dialogue_id: dialogue_id.to_string(),
                allowed_actions: allowed.to_vec(),
                expected_action: None,
                wait_for_action: wait,
                highlight: None,
            }
        };
        Self {
            id: "first-battle".to_string(),
            steps: vec![
                step("WELCOME", "dlg-welcome", &[], false),
                BattleStepConfig {
                    highlight: Some("action-attack".to_string()),
                    ..step(
                        "ATTACK_INTRO",
                        "dlg-attack",
                        &[PlayerAction::Attack],
                        true,
                    )
                },
                step("MONSTER_TURN", "dlg-monster-turn", &[], false),
                BattleStepConfig {
                    highlight: Some("action-quiz".to_string()),
                    ..step("QUIZ_INTRO", "dlg-quiz", &[PlayerAction::Quiz], true)
                },
                step("ANSWER_INTRO", "dlg-answer", &[PlayerAction::Answer], true),
                BattleStepConfig {
                    highlight: Some("action-defend".to_string()),
                    ..step(
                        "DEFEND_INTRO",
                        "dlg-defend",
                        &[PlayerAction::Defend],
                        true,
                    )
                },
                BattleStepConfig {
                    highlight: Some("action-skill".to_string()),
                    ..step("SKILL_INTRO", "dlg-skill", &[PlayerAction::Skill], true)
                },
                step(TERMINAL_STEP_ID, "dlg-end", &[], false),
            ],
        }
    }
}

/// Load a script override from a RON file.
pub async fn load_script(path: &Path) -> Result<TutorialScript, String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let script: TutorialScript =
        ron::de::from_str(&text).map_err(|e| format!("Failed to parse tutorial script: {}", e))?;
    if script.steps.is_empty() {
        return Err("Tutorial script has no steps".to_string());
    }
    Ok(script)
}

/// Outcome of feeding an action or timer into the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateAdvance {
    /// Cursor moved to a regular step.
    Stepped,
    /// Cursor reached the terminal step; tutorial battle mode is over.
    Finished,
    /// Nothing moved.
    Held,
}

/// Cursor into a fixed tutorial script. Only moves forward, and only on
/// the exact expected action (or an auto step's timer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TutorialGate {
    pub script: TutorialScript,
    pub cursor: usize,
    pub active: bool,
    /// Guards `wait_for_action = false` steps against advancing twice when
    /// both the timer and a UI affordance fire.
    auto_advanced_from: Option<usize>,
}

impl TutorialGate {
    pub fn new(script: TutorialScript) -> Self {
        Self {
            script,
            cursor: 0,
            active: true,
            auto_advanced_from: None,
        }
    }

    pub fn current_step(&self) -> Option<&BattleStepConfig> {
        if !self.active {
            return None;
        }
        self.script.steps.get(self.cursor)
    }

    /// True iff the gate is inactive or the step's allowed set contains
    /// the action. A disabled tutorial never restricts anything.
    pub fn is_action_allowed(&self, action: PlayerAction) -> bool {
        match self.current_step() {
            Some(step) => step.allowed_actions.contains(&action),
            None => true,
        }
    }

    /// True iff the current step waits for exactly this action.
    pub fn expects(&self, action: PlayerAction) -> bool {
        self.current_step()
            .and_then(BattleStepConfig::expectation)
            == Some(action)
    }

    /// Called after an action has been dispatched and confirmed by the
    /// server, never before. An allowed-but-unexpected action holds the
    /// step.
    pub fn register_player_action(&mut self, action: PlayerAction) -> GateAdvance {
        let Some(step) = self.current_step() else {
            return GateAdvance::Held;
        };
        if !step.wait_for_action {
            return GateAdvance::Held;
        }
        if step.expectation() != Some(action) {
            return GateAdvance::Held;
        }
        self.advance()
    }

    /// Timer/UI advance for steps that do not wait for an action. Firing
    /// twice from the same step is a no-op.
    pub fn advance_auto(&mut self) -> GateAdvance {
        let Some(step) = self.current_step() else {
            return GateAdvance::Held;
        };
        if step.wait_for_action {
            return GateAdvance::Held;
        }
        if self.auto_advanced_from == Some(self.cursor) {
            return GateAdvance::Held;
        }
        self.auto_advanced_from = Some(self.cursor);
        self.advance()
    }

    fn advance(&mut self) -> GateAdvance {
        if self.cursor + 1 >= self.script.steps.len() {
            self.active = false;
            return GateAdvance::Finished;
        }
        self.cursor += 1;
        self.auto_advanced_from = None;
        if self
            .current_step()
            .is_some_and(|step| step.id == TERMINAL_STEP_ID)
        {
            self.active = false;
            return GateAdvance::Finished;
        }
        GateAdvance::Stepped
    }
}

/// Map the current step's dialogue id to an index into the cutscene's
/// line list. `None` means the id is missing there: the caller keeps the
/// currently displayed line and records the desync.
pub fn sync_dialogue_index(step: &BattleStepConfig, dialogue_ids: &[String]) -> Option<usize> {
    dialogue_ids
        .iter()
        .position(|id| *id == step.dialogue_id)
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::battle::{BattleSnapshot, PlayerAction};
use crate::quiz::Question;
use crate::state::DialogueEntry;

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[action(infer_categories)]
pub enum Action {
    Init,
    UiTerminalResize(u16, u16),

    // Main menu
    MenuSelect(usize),
    MenuConfirm,

    // Hub
    HubSelect(usize),
    HubCycleDifficulty,
    HubConfirm,

    // Battle lifecycle
    BattleDidStart(Box<BattleSnapshot>),
    BattleDidError(String),
    BattleExit,

    // Battle action menu
    BattleMenuNext,
    BattleMenuPrev,
    BattleConfirm,

    // Player action round trip
    ActionDidResolve {
        battle_id: String,
        action: PlayerAction,
        snapshot: Box<BattleSnapshot>,
    },
    ActionDidError {
        battle_id: String,
        error: String,
    },

    // Monster turn scheduling
    MonsterTurnDue {
        battle_id: String,
    },
    MonsterTurnDidResolve {
        battle_id: String,
        snapshot: Box<BattleSnapshot>,
    },
    MonsterTurnDidError {
        battle_id: String,
        error: String,
    },
    /// Manual retry after a failed monster-turn request.
    MonsterTurnRetry,

    // Quiz round trip
    QuestionDidLoad {
        battle_id: String,
        question: Box<Question>,
    },
    QuestionDidError {
        battle_id: String,
        error: String,
    },
    QuizSelect(usize),
    QuizSubmit,
    QuizCancel,
    AnswerDidResolve {
        battle_id: String,
        is_correct: bool,
        message: String,
        snapshot: Option<Box<BattleSnapshot>>,
    },
    AnswerDidError {
        battle_id: String,
        error: String,
    },

    // Tutorial dialogue
    TutorialAdvance,
    DialogueDidLoad(Box<DialogueEntry>),
    DialogueDidError {
        dialogue_id: String,
        error: String,
    },

    // Progress checkpoint (ack-only; failures just get logged)
    ProgressSaveDidComplete,
    ProgressSaveDidError(String),

    Quit,
}

/// The player action behind each battle-menu slot, in display order.
pub const BATTLE_MENU: [PlayerAction; 4] = [
    PlayerAction::Attack,
    PlayerAction::Defend,
    PlayerAction::Skill,
    PlayerAction::Quiz,
];

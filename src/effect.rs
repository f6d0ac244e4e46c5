use crate::battle::{BattleSnapshot, PlayerAction};

#[derive(Clone, Debug)]
pub enum Effect {
    StartBattle {
        monster_id: String,
        difficulty: u8,
        character_id: String,
    },
    PerformAction {
        battle_id: String,
        action: PlayerAction,
    },
    /// Arm the one monster-turn timer for this battle.
    ScheduleMonsterTurn {
        battle_id: String,
    },
    RequestMonsterTurn {
        battle_id: String,
    },
    /// Cancel any pending timer/request tasks for a torn-down battle.
    CancelBattleTasks {
        battle_id: String,
    },
    FetchQuestion {
        battle_id: String,
        difficulty: u8,
        player_level: u8,
    },
    SubmitAnswer {
        battle_id: String,
        question_id: String,
        selected_index: usize,
    },
    SaveProgress {
        battle_id: String,
        character_id: String,
        snapshot: Box<BattleSnapshot>,
    },
    FetchDialogue {
        dialogue_id: String,
    },
}

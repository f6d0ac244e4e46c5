//! Battle session: the client-side mirror of one active battle and the
//! single authority for validating actions before they reach the network.
//!
//! The server resolves all damage and outcomes. The session only replaces
//! its snapshot wholesale from server responses, checks preconditions, and
//! tracks the two orchestration flags the reducer needs (one dispatch in
//! flight at a time, one scheduled monster turn at a time).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::effects::{self, ActiveEffect};

/// Stamina cost per action. One table; UI asks, never re-derives.
pub const ATTACK_COST: u16 = 2;
pub const DEFEND_COST: u16 = 1;
pub const SKILL_COST: u16 = 3;
pub const QUIZ_COST: u16 = 1;

/// Delay before the monster's committed turn is requested from the server.
/// Shared by the tutorial and regular battles on purpose.
pub const MONSTER_TURN_DELAY_MS: u64 = 1500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerAction {
    Attack,
    Defend,
    Skill,
    Quiz,
    /// Answering an open question. Tutorial scripts gate it like any other
    /// action; it has no stamina cost and no network precondition beyond
    /// an open question.
    Answer,
}

impl PlayerAction {
    pub fn label(self) -> &'static str {
        match self {
            PlayerAction::Attack => "Attack",
            PlayerAction::Defend => "Defend",
            PlayerAction::Skill => "Skill",
            PlayerAction::Quiz => "Quiz",
            PlayerAction::Answer => "Answer",
        }
    }

    pub fn stamina_cost(self) -> u16 {
        match self {
            PlayerAction::Attack => ATTACK_COST,
            PlayerAction::Defend => DEFEND_COST,
            PlayerAction::Skill => SKILL_COST,
            PlayerAction::Quiz => QUIZ_COST,
            PlayerAction::Answer => 0,
        }
    }

    /// Whether this action is sent through `perform_action`. Quiz and
    /// Answer go through the question endpoints instead.
    pub fn is_combat_action(self) -> bool {
        matches!(
            self,
            PlayerAction::Attack | PlayerAction::Defend | PlayerAction::Skill
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Character,
    Monster,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CombatantView {
    pub name: String,
    pub level: u8,
    pub hp: u16,
    pub max_hp: u16,
    pub stamina: u16,
    pub max_stamina: u16,
}

/// Full authoritative state of one battle, replaced wholesale on every
/// server response. Never patched client-side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BattleSnapshot {
    pub battle_id: String,
    pub character: CombatantView,
    pub monster: CombatantView,
    pub is_player_turn: bool,
    #[serde(default)]
    pub waiting_for_monster_turn: bool,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub winner: Option<Side>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub character_active_effects: Vec<ActiveEffect>,
    #[serde(default)]
    pub monster_active_effects: Vec<ActiveEffect>,
    #[serde(default)]
    pub monster_guaranteed_attacks: u8,
}

impl BattleSnapshot {
    pub fn active_effects(&self, side: Side) -> &[ActiveEffect] {
        match side {
            Side::Character => &self.character_active_effects,
            Side::Monster => &self.monster_active_effects,
        }
    }
}

/// Why a dispatch was refused before any network call. Local, synchronous
/// and non-retryable; the UI shows these as disabled entries or hints.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchRejection {
    #[error("the battle is already over")]
    BattleFinished,
    #[error("another action is still resolving")]
    DispatchInProgress,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("an active effect blocks that action")]
    ActionBlocked,
    #[error("not enough energy")]
    InsufficientEnergy,
}

/// A snapshot arrived for a battle the session is not mirroring. Logged
/// and discarded; merging it would corrupt the wrong battle's state.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("stale snapshot for battle {got} (current {current})")]
pub struct StaleSnapshot {
    pub current: String,
    pub got: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BattleSession {
    pub snapshot: BattleSnapshot,
    /// Set while a player action or answer is awaiting the server.
    pub dispatch_in_flight: bool,
    /// Set between scheduling the monster-turn timer and applying (or
    /// failing) its response. Keeps the timer uniquely owned.
    pub monster_turn_scheduled: bool,
    /// Last precondition rejection, surfaced as a hint line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rejection: Option<String>,
}

impl BattleSession {
    pub fn new(mut snapshot: BattleSnapshot) -> Self {
        effects::retain_live(&mut snapshot.character_active_effects);
        effects::retain_live(&mut snapshot.monster_active_effects);
        Self {
            snapshot,
            dispatch_in_flight: false,
            monster_turn_scheduled: false,
            last_rejection: None,
        }
    }

    pub fn battle_id(&self) -> &str {
        &self.snapshot.battle_id
    }

    /// Precondition check for a player action. Order matters: a finished
    /// battle wins over everything, then in-flight, turn, effects, energy.
    pub fn validate(&self, action: PlayerAction) -> Result<(), DispatchRejection> {
        if self.snapshot.is_finished {
            return Err(DispatchRejection::BattleFinished);
        }
        if self.dispatch_in_flight {
            return Err(DispatchRejection::DispatchInProgress);
        }
        if !self.snapshot.is_player_turn || self.snapshot.waiting_for_monster_turn {
            return Err(DispatchRejection::NotYourTurn);
        }
        if effects::any_blocks(&self.snapshot.character_active_effects, action) {
            return Err(DispatchRejection::ActionBlocked);
        }
        if self.snapshot.character.stamina < action.stamina_cost() {
            return Err(DispatchRejection::InsufficientEnergy);
        }
        Ok(())
    }

    /// Replace the snapshot wholesale. Rejects snapshots for a different
    /// battle id; the caller decides how to report the desync.
    pub fn apply(&mut self, mut snapshot: BattleSnapshot) -> Result<(), StaleSnapshot> {
        if snapshot.battle_id != self.snapshot.battle_id {
            return Err(StaleSnapshot {
                current: self.snapshot.battle_id.clone(),
                got: snapshot.battle_id,
            });
        }
        effects::retain_live(&mut snapshot.character_active_effects);
        effects::retain_live(&mut snapshot.monster_active_effects);
        if !snapshot.waiting_for_monster_turn {
            self.monster_turn_scheduled = false;
        }
        self.snapshot = snapshot;
        Ok(())
    }

    /// Whether the monster-turn timer should be armed for this snapshot.
    pub fn needs_monster_turn(&self) -> bool {
        self.snapshot.waiting_for_monster_turn
            && !self.snapshot.is_finished
            && !self.monster_turn_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;

    fn snapshot(battle_id: &str) -> BattleSnapshot {
        BattleSnapshot {
            battle_id: battle_id.to_string(),
            character: CombatantView {
                name: "Aria".into(),
                level: 3,
                hp: 20,
                max_hp: 20,
                stamina: 6,
                max_stamina: 8,
            },
            monster: CombatantView {
                name: "Glitch Imp".into(),
                level: 2,
                hp: 14,
                max_hp: 14,
                stamina: 5,
                max_stamina: 5,
            },
            is_player_turn: true,
            waiting_for_monster_turn: false,
            is_finished: false,
            winner: None,
            message: String::new(),
            character_active_effects: Vec::new(),
            monster_active_effects: Vec::new(),
            monster_guaranteed_attacks: 0,
        }
    }

    #[test]
    fn validate_passes_on_clean_turn() {
        let session = BattleSession::new(snapshot("b1"));
        assert_eq!(session.validate(PlayerAction::Attack), Ok(()));
        assert_eq!(session.validate(PlayerAction::Skill), Ok(()));
    }

    #[test]
    fn rejects_out_of_turn() {
        let mut snap = snapshot("b1");
        snap.is_player_turn = false;
        let session = BattleSession::new(snap);
        assert_eq!(
            session.validate(PlayerAction::Attack),
            Err(DispatchRejection::NotYourTurn)
        );
    }

    #[test]
    fn rejects_while_waiting_for_monster() {
        let mut snap = snapshot("b1");
        snap.waiting_for_monster_turn = true;
        let session = BattleSession::new(snap);
        assert_eq!(
            session.validate(PlayerAction::Defend),
            Err(DispatchRejection::NotYourTurn)
        );
    }

    #[test]
    fn rejects_insufficient_energy() {
        let mut snap = snapshot("b1");
        snap.character.stamina = 1;
        let session = BattleSession::new(snap);
        assert_eq!(
            session.validate(PlayerAction::Attack),
            Err(DispatchRejection::InsufficientEnergy)
        );
        // Defend costs 1 and still fits.
        assert_eq!(session.validate(PlayerAction::Defend), Ok(()));
    }

    #[test]
    fn rejects_second_dispatch_in_flight() {
        let mut session = BattleSession::new(snapshot("b1"));
        session.dispatch_in_flight = true;
        assert_eq!(
            session.validate(PlayerAction::Defend),
            Err(DispatchRejection::DispatchInProgress)
        );
    }

    #[test]
    fn rejects_finished_battle_first() {
        let mut snap = snapshot("b1");
        snap.is_finished = true;
        snap.is_player_turn = false;
        let mut session = BattleSession::new(snap);
        session.dispatch_in_flight = true;
        assert_eq!(
            session.validate(PlayerAction::Attack),
            Err(DispatchRejection::BattleFinished)
        );
    }

    #[test]
    fn stun_blocks_all_disable_skill_blocks_skill() {
        let mut snap = snapshot("b1");
        snap.character_active_effects = vec![ActiveEffect {
            kind: EffectKind::DisableSkill,
            duration: 2,
            description: String::new(),
        }];
        let session = BattleSession::new(snap);
        assert_eq!(
            session.validate(PlayerAction::Skill),
            Err(DispatchRejection::ActionBlocked)
        );
        assert_eq!(session.validate(PlayerAction::Attack), Ok(()));

        let mut snap = snapshot("b1");
        snap.character_active_effects = vec![ActiveEffect {
            kind: EffectKind::Stun,
            duration: 1,
            description: String::new(),
        }];
        let session = BattleSession::new(snap);
        for action in [PlayerAction::Attack, PlayerAction::Defend, PlayerAction::Quiz] {
            assert_eq!(
                session.validate(action),
                Err(DispatchRejection::ActionBlocked)
            );
        }
    }

    #[test]
    fn apply_discards_foreign_battle_id() {
        let mut session = BattleSession::new(snapshot("b42"));
        let err = session.apply(snapshot("b41")).unwrap_err();
        assert_eq!(err.current, "b42");
        assert_eq!(err.got, "b41");
        assert_eq!(session.battle_id(), "b42");
    }

    #[test]
    fn apply_drops_expired_effects() {
        let mut session = BattleSession::new(snapshot("b1"));
        let mut next = snapshot("b1");
        next.character_active_effects = vec![
            ActiveEffect {
                kind: EffectKind::Stun,
                duration: 0,
                description: String::new(),
            },
            ActiveEffect {
                kind: EffectKind::DamageBuff,
                duration: 1,
                description: String::new(),
            },
        ];
        session.apply(next).unwrap();
        assert_eq!(session.snapshot.character_active_effects.len(), 1);
    }

    #[test]
    fn monster_turn_armed_once() {
        let mut session = BattleSession::new(snapshot("b1"));
        let mut waiting = snapshot("b1");
        waiting.is_player_turn = false;
        waiting.waiting_for_monster_turn = true;
        session.apply(waiting).unwrap();
        assert!(session.needs_monster_turn());
        session.monster_turn_scheduled = true;
        assert!(!session.needs_monster_turn());

        // Resolved monster turn clears the scheduling latch.
        session.apply(snapshot("b1")).unwrap();
        assert!(!session.monster_turn_scheduled);
    }
}

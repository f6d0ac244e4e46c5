use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tui_dispatch_debug::debug::{ron_string, DebugSection, DebugState};

use crate::battle::{BattleSession, PlayerAction};
use crate::quiz::QuizState;
use crate::tutorial::{TutorialGate, TutorialScript};

/// Kept small; the overlay only needs recent entries.
const DEBUG_LOG_CAP: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum GameMode {
    MainMenu,
    Hub,
    Battle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MenuState {
    pub selected: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonsterEntry {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HubState {
    pub monsters: Vec<MonsterEntry>,
    pub selected: usize,
    pub difficulty: u8,
    /// Once true, later battles skip the scripted tutorial.
    pub tutorial_done: bool,
}

impl HubState {
    pub fn new() -> Self {
        Self {
            monsters: default_monsters(),
            selected: 0,
            difficulty: 1,
            tutorial_done: false,
        }
    }
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

/// One fetched tutorial dialogue line, keyed by id in the runtime cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DialogueEntry {
    pub id: String,
    pub speaker: String,
    pub content: String,
}

/// Tutorial runtime for the first battle: the step gate plus the cutscene
/// dialogue it is coupled to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TutorialState {
    pub gate: TutorialGate,
    /// Dialogue ids owned by the cutscene, in display order.
    pub dialogue_ids: Vec<String>,
    /// Index into `dialogue_ids` currently shown. Kept when a step's id
    /// cannot be found (desync degrades, never blanks the box).
    pub shown_dialogue: usize,
    /// Fetched line content by id.
    pub lines: HashMap<String, DialogueEntry>,
}

impl TutorialState {
    pub fn new(script: TutorialScript) -> Self {
        let mut dialogue_ids = Vec::new();
        for step in &script.steps {
            if !dialogue_ids.contains(&step.dialogue_id) {
                dialogue_ids.push(step.dialogue_id.clone());
            }
        }
        Self {
            gate: TutorialGate::new(script),
            dialogue_ids,
            shown_dialogue: 0,
            lines: HashMap::new(),
        }
    }

    pub fn shown_dialogue_id(&self) -> Option<&String> {
        self.dialogue_ids.get(self.shown_dialogue)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppState {
    pub terminal_size: (u16, u16),
    pub mode: GameMode,
    pub character_id: String,
    pub player_level: u8,
    pub menu: MenuState,
    pub hub: HubState,
    /// The active battle mirror, if any. Single owner of snapshot state.
    pub battle: Option<BattleSession>,
    /// Cursor in the battle action menu.
    pub battle_menu_index: usize,
    /// Set while the start-battle request is out.
    pub starting_battle: bool,
    pub quiz: QuizState,
    pub tutorial: Option<TutorialState>,
    /// Tutorial script used for the next first battle.
    pub tutorial_script: TutorialScript,
    pub message: Option<String>,
    /// Desyncs and discarded responses, shown in the debug overlay.
    pub debug_log: VecDeque<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new("student".to_string(), TutorialScript::builtin())
    }
}

impl AppState {
    pub fn new(character_id: String, tutorial_script: TutorialScript) -> Self {
        Self {
            terminal_size: (80, 24),
            mode: GameMode::MainMenu,
            character_id,
            player_level: 1,
            menu: MenuState { selected: 0 },
            hub: HubState::new(),
            battle: None,
            battle_menu_index: 0,
            starting_battle: false,
            quiz: QuizState::default(),
            tutorial: None,
            tutorial_script,
            message: None,
            debug_log: VecDeque::new(),
        }
    }

    pub fn push_debug(&mut self, entry: impl Into<String>) {
        if self.debug_log.len() >= DEBUG_LOG_CAP {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(entry.into());
    }

    pub fn selected_monster(&self) -> Option<&MonsterEntry> {
        self.hub.monsters.get(self.hub.selected)
    }

    pub fn tutorial_active(&self) -> bool {
        self.tutorial
            .as_ref()
            .is_some_and(|tutorial| tutorial.gate.active)
    }

    /// Tutorial permission for an action. An answer step whose question
    /// was lost (cancelled or failed) would strand the script, so Quiz is
    /// re-allowed there until a question is open again.
    pub fn gate_allows(&self, action: PlayerAction) -> bool {
        let Some(tutorial) = self.tutorial.as_ref() else {
            return true;
        };
        if !tutorial.gate.active {
            return true;
        }
        if tutorial.gate.is_action_allowed(action) {
            return true;
        }
        action == PlayerAction::Quiz
            && !self.quiz.is_open()
            && tutorial.gate.expects(PlayerAction::Answer)
    }
}

impl DebugState for AppState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut sections = vec![DebugSection::new("Mode")
            .entry("mode", ron_string(&self.mode))
            .entry("message", ron_string(&self.message))];

        if let Some(battle) = &self.battle {
            sections.push(
                DebugSection::new("Battle")
                    .entry("id", ron_string(&battle.snapshot.battle_id))
                    .entry("player_turn", ron_string(&battle.snapshot.is_player_turn))
                    .entry(
                        "waiting_monster",
                        ron_string(&battle.snapshot.waiting_for_monster_turn),
                    )
                    .entry("in_flight", ron_string(&battle.dispatch_in_flight))
                    .entry("finished", ron_string(&battle.snapshot.is_finished)),
            );
        }

        if let Some(tutorial) = &self.tutorial {
            sections.push(
                DebugSection::new("Tutorial")
                    .entry("cursor", ron_string(&tutorial.gate.cursor))
                    .entry("active", ron_string(&tutorial.gate.active))
                    .entry("dialogue", ron_string(&tutorial.shown_dialogue)),
            );
        }

        if !self.debug_log.is_empty() {
            let mut section = DebugSection::new("Log");
            for (index, entry) in self.debug_log.iter().rev().take(6).enumerate() {
                section = section.entry(format!("{index}"), entry.clone());
            }
            sections.push(section);
        }

        sections
    }
}

fn default_monsters() -> Vec<MonsterEntry> {
    let entry = |id: &str, name: &str, description: &str| MonsterEntry {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
    };
    vec![
        entry(
            "glitch-imp",
            "Glitch Imp",
            "A flickering nuisance. Good first opponent.",
        ),
        entry(
            "rust-golem",
            "Rust Golem",
            "Slow, heavily armored, hits hard.",
        ),
        entry(
            "null-wraith",
            "Null Wraith",
            "Loves to stun. Bring spare energy.",
        ),
        entry(
            "query-sphinx",
            "Query Sphinx",
            "Scrambles questions. Read twice.",
        ),
    ]
}

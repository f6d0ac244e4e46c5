use tui_dispatch::DispatchResult;

use crate::action::{Action, BATTLE_MENU};
use crate::battle::{BattleSession, BattleSnapshot, PlayerAction};
use crate::effect::Effect;
use crate::state::{AppState, GameMode, TutorialState};
use crate::tutorial::GateAdvance;

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::Init => {
            state.mode = GameMode::MainMenu;
            state.menu.selected = 0;
            DispatchResult::changed()
        }
        Action::UiTerminalResize(width, height) => {
            if state.terminal_size != (width, height) {
                state.terminal_size = (width, height);
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }

        // Main menu
        Action::MenuSelect(index) => {
            state.menu.selected = index;
            DispatchResult::changed()
        }
        Action::MenuConfirm => {
            if state.menu.selected == 0 {
                state.mode = GameMode::Hub;
                state.message = None;
            }
            DispatchResult::changed()
        }

        // Hub
        Action::HubSelect(index) => {
            if index < state.hub.monsters.len() {
                state.hub.selected = index;
            }
            DispatchResult::changed()
        }
        Action::HubCycleDifficulty => {
            state.hub.difficulty = state.hub.difficulty % 3 + 1;
            DispatchResult::changed()
        }
        Action::HubConfirm => hub_confirm(state),

        // Battle lifecycle
        Action::BattleDidStart(snapshot) => battle_did_start(state, *snapshot),
        Action::BattleDidError(error) => {
            state.starting_battle = false;
            state.message = Some(format!("Could not start battle: {error}"));
            DispatchResult::changed()
        }
        Action::BattleExit => battle_exit(state),

        // Battle action menu
        Action::BattleMenuNext => battle_menu_change(state, 1),
        Action::BattleMenuPrev => battle_menu_change(state, -1),
        Action::BattleConfirm => battle_confirm(state),

        // Player action round trip
        Action::ActionDidResolve {
            battle_id,
            action,
            snapshot,
        } => action_did_resolve(state, battle_id, action, *snapshot),
        Action::ActionDidError { battle_id, error } => {
            let Some(session) = session_for(state, &battle_id, "action response") else {
                return DispatchResult::changed();
            };
            session.dispatch_in_flight = false;
            state.message = Some(format!("Action failed: {error}"));
            DispatchResult::changed()
        }

        // Monster turn
        Action::MonsterTurnDue { battle_id } => monster_turn_due(state, battle_id),
        Action::MonsterTurnDidResolve {
            battle_id,
            snapshot,
        } => monster_turn_did_resolve(state, battle_id, *snapshot),
        Action::MonsterTurnDidError { battle_id, error } => {
            let Some(session) = session_for(state, &battle_id, "monster-turn response") else {
                return DispatchResult::changed();
            };
            // The waiting flag stays set: the stuck state is visible and
            // the retry key can rearm the timer.
            session.monster_turn_scheduled = false;
            state.message = Some(format!("The monster hesitates... ({error})"));
            DispatchResult::changed()
        }
        Action::MonsterTurnRetry => {
            let Some(session) = state.battle.as_mut() else {
                return DispatchResult::unchanged();
            };
            if !session.needs_monster_turn() {
                return DispatchResult::unchanged();
            }
            session.monster_turn_scheduled = true;
            let battle_id = session.battle_id().to_string();
            DispatchResult::changed_with(Effect::ScheduleMonsterTurn { battle_id })
        }

        // Quiz round trip
        Action::QuestionDidLoad {
            battle_id,
            question,
        } => {
            let Some(session) = session_for(state, &battle_id, "question") else {
                return DispatchResult::changed();
            };
            session.dispatch_in_flight = false;
            state.quiz.open(*question);
            register_tutorial_action(state, PlayerAction::Quiz);
            DispatchResult::changed()
        }
        Action::QuestionDidError { battle_id, error } => {
            if let Some(session) = session_for(state, &battle_id, "question error") {
                session.dispatch_in_flight = false;
            }
            state.quiz.loading = false;
            state.message = Some(format!("No question available: {error}"));
            DispatchResult::changed()
        }
        Action::QuizSelect(index) => {
            state.quiz.select(index);
            DispatchResult::changed()
        }
        Action::QuizSubmit => quiz_submit(state),
        Action::QuizCancel => {
            if state.quiz.close().is_some() {
                state.message = Some("You set the question aside.".to_string());
            }
            DispatchResult::changed()
        }
        Action::AnswerDidResolve {
            battle_id,
            is_correct,
            message,
            snapshot,
        } => answer_did_resolve(state, battle_id, is_correct, message, snapshot),
        Action::AnswerDidError { battle_id, error } => {
            if let Some(session) = session_for(state, &battle_id, "answer error") {
                session.dispatch_in_flight = false;
            }
            state.quiz.close();
            state.message = Some(format!("Answer was lost: {error}"));
            DispatchResult::changed()
        }

        // Tutorial dialogue
        Action::TutorialAdvance => tutorial_advance(state),
        Action::DialogueDidLoad(entry) => {
            let Some(tutorial) = state.tutorial.as_mut() else {
                return DispatchResult::unchanged();
            };
            tutorial.lines.insert(entry.id.clone(), *entry);
            // Prefetch chain: keep pulling lines until the cutscene is
            // fully cached.
            match next_missing_dialogue(tutorial) {
                Some(dialogue_id) => {
                    DispatchResult::changed_with(Effect::FetchDialogue { dialogue_id })
                }
                None => DispatchResult::changed(),
            }
        }
        Action::DialogueDidError { dialogue_id, error } => {
            state.push_debug(format!("dialogue {dialogue_id} failed: {error}"));
            DispatchResult::changed()
        }

        Action::ProgressSaveDidComplete => DispatchResult::unchanged(),
        Action::ProgressSaveDidError(error) => {
            state.push_debug(format!("progress save failed: {error}"));
            DispatchResult::changed()
        }

        Action::Quit => DispatchResult::unchanged(),
    }
}

fn hub_confirm(state: &mut AppState) -> DispatchResult<Effect> {
    if state.starting_battle {
        return DispatchResult::unchanged();
    }
    let Some(monster) = state.selected_monster() else {
        return DispatchResult::unchanged();
    };
    let monster_id = monster.id.clone();
    let monster_name = monster.name.clone();
    state.starting_battle = true;
    state.message = Some(format!("Challenging the {monster_name}..."));
    DispatchResult::changed_with(Effect::StartBattle {
        monster_id,
        difficulty: state.hub.difficulty,
        character_id: state.character_id.clone(),
    })
}

fn battle_did_start(state: &mut AppState, snapshot: BattleSnapshot) -> DispatchResult<Effect> {
    state.starting_battle = false;
    state.mode = GameMode::Battle;
    state.battle_menu_index = 0;
    state.quiz = Default::default();
    state.message = None;
    state.battle = Some(BattleSession::new(snapshot));

    if state.hub.tutorial_done {
        state.tutorial = None;
        return DispatchResult::changed();
    }

    // First battle: arm the scripted tutorial and start prefetching its
    // dialogue lines one by one.
    let tutorial = TutorialState::new(state.tutorial_script.clone());
    let first = tutorial.dialogue_ids.first().cloned();
    state.tutorial = Some(tutorial);
    match first {
        Some(dialogue_id) => DispatchResult::changed_with(Effect::FetchDialogue { dialogue_id }),
        None => DispatchResult::changed(),
    }
}

fn battle_exit(state: &mut AppState) -> DispatchResult<Effect> {
    let Some(session) = state.battle.take() else {
        return DispatchResult::unchanged();
    };
    // Late responses for this battle id will find no session and get
    // discarded; the cancel below also stops the pending timer.
    state.quiz.close();
    state.tutorial = None;
    state.battle_menu_index = 0;
    state.mode = GameMode::Hub;
    if session.snapshot.is_finished {
        state.message = Some(match session.snapshot.winner {
            Some(crate::battle::Side::Character) => "Victory! Back to the hub.".to_string(),
            _ => "Defeated. The hub awaits.".to_string(),
        });
    } else {
        state.message = Some("You withdraw from the battle.".to_string());
    }
    DispatchResult::changed_with(Effect::CancelBattleTasks {
        battle_id: session.snapshot.battle_id,
    })
}

fn battle_menu_change(state: &mut AppState, delta: i16) -> DispatchResult<Effect> {
    if state.battle.is_none() || state.quiz.is_open() {
        return DispatchResult::unchanged();
    }
    let len = BATTLE_MENU.len() as i16;
    let mut next = state.battle_menu_index as i16 + delta;
    if next < 0 {
        next = len - 1;
    }
    if next >= len {
        next = 0;
    }
    state.battle_menu_index = next as usize;
    DispatchResult::changed()
}

/// The dispatch path: tutorial gate, then session preconditions, then the
/// network effect. Rejections never reach the network layer.
fn battle_confirm(state: &mut AppState) -> DispatchResult<Effect> {
    let Some(session) = state.battle.as_ref() else {
        return DispatchResult::unchanged();
    };
    if session.snapshot.is_finished {
        // Acknowledging the outcome leaves the battle.
        return battle_exit(state);
    }
    if state.quiz.is_open() {
        return DispatchResult::unchanged();
    }

    let action = BATTLE_MENU[state.battle_menu_index % BATTLE_MENU.len()];

    let gate_blocks = !state.gate_allows(action);

    let Some(session) = state.battle.as_mut() else {
        return DispatchResult::unchanged();
    };
    if gate_blocks {
        session.last_rejection = Some("Follow the tutor's instruction.".to_string());
        return DispatchResult::changed();
    }
    if let Err(rejection) = session.validate(action) {
        session.last_rejection = Some(rejection.to_string());
        return DispatchResult::changed();
    }

    session.dispatch_in_flight = true;
    session.last_rejection = None;
    let battle_id = session.battle_id().to_string();

    if action == PlayerAction::Quiz {
        state.quiz.loading = true;
        return DispatchResult::changed_with(Effect::FetchQuestion {
            battle_id,
            difficulty: state.hub.difficulty,
            player_level: state.player_level,
        });
    }

    DispatchResult::changed_with(Effect::PerformAction { battle_id, action })
}

fn action_did_resolve(
    state: &mut AppState,
    battle_id: String,
    action: PlayerAction,
    snapshot: BattleSnapshot,
) -> DispatchResult<Effect> {
    let Some(session) = session_for(state, &battle_id, "action response") else {
        return DispatchResult::changed();
    };
    session.dispatch_in_flight = false;
    if let Err(stale) = session.apply(snapshot) {
        state.push_debug(stale.to_string());
        return DispatchResult::changed();
    }
    register_tutorial_action(state, action);
    after_snapshot(state)
}

fn monster_turn_due(state: &mut AppState, battle_id: String) -> DispatchResult<Effect> {
    let Some(session) = session_for(state, &battle_id, "monster-turn timer") else {
        return DispatchResult::changed();
    };
    // A timer that outlived its snapshot (battle finished, monster turn
    // already resolved) must not fire a request.
    if !session.snapshot.waiting_for_monster_turn || session.snapshot.is_finished {
        state.push_debug("stale monster-turn timer ignored");
        return DispatchResult::changed();
    }
    DispatchResult::changed_with(Effect::RequestMonsterTurn { battle_id })
}

fn monster_turn_did_resolve(
    state: &mut AppState,
    battle_id: String,
    snapshot: BattleSnapshot,
) -> DispatchResult<Effect> {
    let Some(session) = session_for(state, &battle_id, "monster-turn response") else {
        return DispatchResult::changed();
    };
    if let Err(stale) = session.apply(snapshot) {
        state.push_debug(stale.to_string());
        return DispatchResult::changed();
    }
    after_snapshot(state)
}

fn quiz_submit(state: &mut AppState) -> DispatchResult<Effect> {
    if state.battle.is_none() {
        return DispatchResult::unchanged();
    }
    if !state.gate_allows(PlayerAction::Answer) {
        state.message = Some("Follow the tutor's instruction.".to_string());
        return DispatchResult::changed();
    }
    let Some(session) = state.battle.as_mut() else {
        return DispatchResult::unchanged();
    };
    match state.quiz.begin_submit() {
        Ok((question_id, selected_index)) => {
            session.dispatch_in_flight = true;
            let battle_id = session.battle_id().to_string();
            DispatchResult::changed_with(Effect::SubmitAnswer {
                battle_id,
                question_id,
                selected_index,
            })
        }
        Err(error) => {
            state.message = Some(error.to_string());
            DispatchResult::changed()
        }
    }
}

fn answer_did_resolve(
    state: &mut AppState,
    battle_id: String,
    is_correct: bool,
    message: String,
    snapshot: Option<Box<BattleSnapshot>>,
) -> DispatchResult<Effect> {
    let Some(session) = session_for(state, &battle_id, "answer response") else {
        return DispatchResult::changed();
    };
    session.dispatch_in_flight = false;
    // Win or lose, the question is spent.
    state.quiz.close();
    if message.is_empty() {
        state.message = Some(if is_correct {
            "Correct! Energy surges back.".to_string()
        } else {
            "Not quite. The monster grins.".to_string()
        });
    } else {
        state.message = Some(message);
    }
    if let Some(snapshot) = snapshot {
        if let Some(session) = state.battle.as_mut() {
            if let Err(stale) = session.apply(*snapshot) {
                state.push_debug(stale.to_string());
                return DispatchResult::changed();
            }
        }
    }
    register_tutorial_action(state, PlayerAction::Answer);
    after_snapshot(state)
}

fn tutorial_advance(state: &mut AppState) -> DispatchResult<Effect> {
    let Some(tutorial) = state.tutorial.as_mut() else {
        return DispatchResult::unchanged();
    };
    match tutorial.gate.advance_auto() {
        GateAdvance::Stepped => {
            sync_tutorial_dialogue(state);
            DispatchResult::changed()
        }
        GateAdvance::Finished => {
            state.hub.tutorial_done = true;
            sync_tutorial_dialogue(state);
            DispatchResult::changed()
        }
        GateAdvance::Held => DispatchResult::unchanged(),
    }
}

/// Post-dispatch gate registration. The gate only moves once the server
/// has confirmed the action.
fn register_tutorial_action(state: &mut AppState, action: PlayerAction) {
    let Some(tutorial) = state.tutorial.as_mut() else {
        return;
    };
    match tutorial.gate.register_player_action(action) {
        GateAdvance::Stepped => sync_tutorial_dialogue(state),
        GateAdvance::Finished => {
            state.hub.tutorial_done = true;
            sync_tutorial_dialogue(state);
        }
        GateAdvance::Held => {}
    }
}

/// Common tail after a snapshot was applied: arm the monster-turn timer
/// if the server committed one, otherwise checkpoint the settled round.
fn after_snapshot(state: &mut AppState) -> DispatchResult<Effect> {
    let Some(session) = state.battle.as_mut() else {
        return DispatchResult::changed();
    };
    if session.needs_monster_turn() {
        session.monster_turn_scheduled = true;
        let battle_id = session.battle_id().to_string();
        return DispatchResult::changed_with(Effect::ScheduleMonsterTurn { battle_id });
    }
    let snapshot = session.snapshot.clone();
    DispatchResult::changed_with(Effect::SaveProgress {
        battle_id: snapshot.battle_id.clone(),
        character_id: state.character_id.clone(),
        snapshot: Box::new(snapshot),
    })
}

/// Re-map the shown dialogue line to the cursor's step by id lookup. A
/// missing id keeps the previous line and records the desync. Reads the
/// step straight off the script so the terminal step's closing line still
/// syncs after the gate deactivates.
fn sync_tutorial_dialogue(state: &mut AppState) {
    let Some(tutorial) = state.tutorial.as_mut() else {
        return;
    };
    let Some(step) = tutorial.gate.script.steps.get(tutorial.gate.cursor) else {
        return;
    };
    let dialogue_id = step.dialogue_id.clone();
    match crate::tutorial::sync_dialogue_index(step, &tutorial.dialogue_ids) {
        Some(index) => {
            if index != tutorial.shown_dialogue {
                tutorial.shown_dialogue = index;
            }
        }
        None => {
            state.push_debug(format!("dialogue {dialogue_id} not in cutscene"));
        }
    }
}

/// Look up the session a response belongs to. A missing session or a
/// foreign battle id means the response is stale: it is logged and must
/// never touch the store.
fn session_for<'a>(
    state: &'a mut AppState,
    battle_id: &str,
    what: &str,
) -> Option<&'a mut BattleSession> {
    let matches = state
        .battle
        .as_ref()
        .is_some_and(|session| session.battle_id() == battle_id);
    if !matches {
        state.push_debug(format!("discarded {what} for battle {battle_id}"));
        return None;
    }
    state.battle.as_mut()
}

fn next_missing_dialogue(tutorial: &TutorialState) -> Option<String> {
    tutorial
        .dialogue_ids
        .iter()
        .find(|id| !tutorial.lines.contains_key(*id))
        .cloned()
}

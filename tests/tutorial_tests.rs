//! First-battle tutorial tests: the step gate, dialogue prefetch and sync,
//! and the scripted battle walked end to end through the reducer.

use pretty_assertions::assert_eq;
use tui_dispatch::EffectStore;

use lorebound::action::Action;
use lorebound::battle::{BattleSession, BattleSnapshot, CombatantView, PlayerAction};
use lorebound::effect::Effect;
use lorebound::quiz::Question;
use lorebound::reducer::reducer;
use lorebound::state::{AppState, DialogueEntry, GameMode, TutorialState};
use lorebound::tutorial::TutorialScript;

fn snapshot(battle_id: &str) -> BattleSnapshot {
    BattleSnapshot {
        battle_id: battle_id.to_string(),
        character: CombatantView {
            name: "Aria".into(),
            level: 1,
            hp: 20,
            max_hp: 20,
            stamina: 10,
            max_stamina: 10,
        },
        monster: CombatantView {
            name: "Glitch Imp".into(),
            level: 1,
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

fn question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: "What does HP stand for?".into(),
        options: vec!["Hit Points".into(), "High Power".into()],
        correct_answer: 0,
        difficulty: 1,
        category: "basics".into(),
        points: 5,
    }
}

fn waiting_snapshot(battle_id: &str) -> BattleSnapshot {
    let mut snap = snapshot(battle_id);
    snap.is_player_turn = false;
    snap.waiting_for_monster_turn = true;
    snap
}

/// Store with a first battle running, so the built-in tutorial is armed.
fn tutorial_store() -> EffectStore<AppState, Action, Effect> {
    let mut store = EffectStore::new(AppState::default(), reducer);
    let result = store.dispatch(Action::BattleDidStart(Box::new(snapshot("b1"))));
    assert!(store.state().tutorial.is_some());
    // Dialogue prefetch starts with the first line of the cutscene.
    assert!(matches!(
        &result.effects[0],
        Effect::FetchDialogue { dialogue_id } if dialogue_id == "dlg-welcome"
    ));
    store
}

fn select_slot(store: &mut EffectStore<AppState, Action, Effect>, target: usize) {
    while store.state().battle_menu_index != target {
        store.dispatch(Action::BattleMenuNext);
    }
}

fn resolve(
    store: &mut EffectStore<AppState, Action, Effect>,
    action: PlayerAction,
    snap: BattleSnapshot,
) -> Vec<Effect> {
    store
        .dispatch(Action::ActionDidResolve {
            battle_id: "b1".into(),
            action,
            snapshot: Box::new(snap),
        })
        .effects
}

fn cursor(store: &EffectStore<AppState, Action, Effect>) -> usize {
    store.state().tutorial.as_ref().unwrap().gate.cursor
}

#[test]
fn second_battle_skips_the_tutorial() {
    let mut state = AppState::default();
    state.hub.tutorial_done = true;
    let mut store = EffectStore::new(state, reducer);
    let result = store.dispatch(Action::BattleDidStart(Box::new(snapshot("b2"))));
    assert!(store.state().tutorial.is_none());
    assert!(result.effects.is_empty());
}

#[test]
fn dialogue_lines_are_prefetched_in_order() {
    let mut store = tutorial_store();

    let ids: Vec<String> = store
        .state()
        .tutorial
        .as_ref()
        .unwrap()
        .dialogue_ids
        .clone();
    assert_eq!(ids.first().map(String::as_str), Some("dlg-welcome"));

    // Each loaded line pulls the next missing one until all are cached.
    for (index, id) in ids.iter().enumerate() {
        let result = store.dispatch(Action::DialogueDidLoad(Box::new(DialogueEntry {
            id: id.clone(),
            speaker: "Tutor".into(),
            content: format!("line for {id}"),
        })));
        if index + 1 < ids.len() {
            assert!(matches!(
                &result.effects[0],
                Effect::FetchDialogue { dialogue_id } if *dialogue_id == ids[index + 1]
            ));
        } else {
            assert!(result.effects.is_empty());
        }
    }
    assert_eq!(
        store.state().tutorial.as_ref().unwrap().lines.len(),
        ids.len()
    );
}

#[test]
fn failed_dialogue_fetch_is_logged_not_fatal() {
    let mut store = tutorial_store();
    store.dispatch(Action::DialogueDidError {
        dialogue_id: "dlg-welcome".into(),
        error: "404".into(),
    });
    assert!(store.state().tutorial.is_some());
    assert!(store
        .state()
        .debug_log
        .iter()
        .any(|entry| entry.contains("dlg-welcome")));
}

#[test]
fn welcome_step_blocks_all_actions_until_advanced() {
    let mut store = tutorial_store();

    let result = store.dispatch(Action::BattleConfirm);
    assert!(result.effects.is_empty());
    let session = store.state().battle.as_ref().unwrap();
    assert_eq!(
        session.last_rejection.as_deref(),
        Some("Follow the tutor's instruction.")
    );

    // Enter advances the intro step, then only Attack is dispatchable.
    store.dispatch(Action::TutorialAdvance);
    assert_eq!(cursor(&store), 1);
    let result = store.dispatch(Action::BattleConfirm);
    assert!(matches!(
        &result.effects[0],
        Effect::PerformAction {
            action: PlayerAction::Attack,
            ..
        }
    ));
}

#[test]
fn gate_blocks_off_script_actions() {
    let mut store = tutorial_store();
    store.dispatch(Action::TutorialAdvance); // onto ATTACK_INTRO

    select_slot(&mut store, 1); // defend
    let result = store.dispatch(Action::BattleConfirm);
    assert!(result.effects.is_empty());
    assert_eq!(cursor(&store), 1);
}

#[test]
fn cursor_advances_only_on_confirmed_actions() {
    let mut store = tutorial_store();
    store.dispatch(Action::TutorialAdvance); // onto ATTACK_INTRO

    // Dispatch goes out but the server rejects it: the cursor holds.
    store.dispatch(Action::BattleConfirm);
    assert_eq!(cursor(&store), 1);
    store.dispatch(Action::ActionDidError {
        battle_id: "b1".into(),
        error: "500".into(),
    });
    assert_eq!(cursor(&store), 1);
    assert!(!store.state().battle.as_ref().unwrap().dispatch_in_flight);

    // Retried and confirmed: now it steps.
    store.dispatch(Action::BattleConfirm);
    resolve(&mut store, PlayerAction::Attack, waiting_snapshot("b1"));
    assert_eq!(cursor(&store), 2);
}

#[test]
fn dialogue_follows_the_step_cursor() {
    let mut store = tutorial_store();
    assert_eq!(store.state().tutorial.as_ref().unwrap().shown_dialogue, 0);

    store.dispatch(Action::TutorialAdvance);
    let tutorial = store.state().tutorial.as_ref().unwrap();
    assert_eq!(
        tutorial.shown_dialogue_id().map(String::as_str),
        Some("dlg-attack")
    );
}

#[test]
fn scripted_first_battle_runs_end_to_end() {
    let mut store = tutorial_store();

    // WELCOME -> ATTACK_INTRO
    store.dispatch(Action::TutorialAdvance);

    // Attack, committed monster turn, timer, monster resolves.
    store.dispatch(Action::BattleConfirm);
    let effects = resolve(&mut store, PlayerAction::Attack, waiting_snapshot("b1"));
    assert!(matches!(&effects[0], Effect::ScheduleMonsterTurn { .. }));
    assert_eq!(cursor(&store), 2); // MONSTER_TURN

    store.dispatch(Action::MonsterTurnDue {
        battle_id: "b1".into(),
    });
    store.dispatch(Action::MonsterTurnDidResolve {
        battle_id: "b1".into(),
        snapshot: Box::new(snapshot("b1")),
    });
    store.dispatch(Action::TutorialAdvance);
    assert_eq!(cursor(&store), 3); // QUIZ_INTRO

    // Quiz step: fetch, load, answer.
    select_slot(&mut store, 3);
    let result = store.dispatch(Action::BattleConfirm);
    assert!(matches!(&result.effects[0], Effect::FetchQuestion { .. }));
    store.dispatch(Action::QuestionDidLoad {
        battle_id: "b1".into(),
        question: Box::new(question("q1")),
    });
    assert_eq!(cursor(&store), 4); // ANSWER_INTRO
    assert!(store.state().quiz.is_open());

    store.dispatch(Action::QuizSubmit);
    store.dispatch(Action::AnswerDidResolve {
        battle_id: "b1".into(),
        is_correct: true,
        message: String::new(),
        snapshot: Some(Box::new(snapshot("b1"))),
    });
    assert_eq!(cursor(&store), 5); // DEFEND_INTRO
    assert!(!store.state().quiz.is_open());

    // Defend, then skill, which closes out the script.
    select_slot(&mut store, 1);
    store.dispatch(Action::BattleConfirm);
    resolve(&mut store, PlayerAction::Defend, snapshot("b1"));
    assert_eq!(cursor(&store), 6); // SKILL_INTRO

    select_slot(&mut store, 2);
    store.dispatch(Action::BattleConfirm);
    resolve(&mut store, PlayerAction::Skill, snapshot("b1"));

    assert!(store.state().hub.tutorial_done);
    assert!(!store.state().tutorial_active());
    // The band shows the script's closing line, not the skill one.
    assert_eq!(
        store
            .state()
            .tutorial
            .as_ref()
            .unwrap()
            .shown_dialogue_id()
            .map(String::as_str),
        Some("dlg-end")
    );

    // With the gate down, everything is selectable again.
    select_slot(&mut store, 0);
    let result = store.dispatch(Action::BattleConfirm);
    assert!(matches!(&result.effects[0], Effect::PerformAction { .. }));
    assert_eq!(store.state().mode, GameMode::Battle);
}

#[test]
fn cancelled_question_on_the_answer_step_can_be_refetched() {
    let mut store = tutorial_store();
    store.dispatch(Action::TutorialAdvance);
    store.dispatch(Action::BattleConfirm);
    resolve(&mut store, PlayerAction::Attack, waiting_snapshot("b1"));
    store.dispatch(Action::MonsterTurnDue {
        battle_id: "b1".into(),
    });
    store.dispatch(Action::MonsterTurnDidResolve {
        battle_id: "b1".into(),
        snapshot: Box::new(snapshot("b1")),
    });
    store.dispatch(Action::TutorialAdvance);
    select_slot(&mut store, 3);
    store.dispatch(Action::BattleConfirm);
    store.dispatch(Action::QuestionDidLoad {
        battle_id: "b1".into(),
        question: Box::new(question("q1")),
    });
    assert_eq!(cursor(&store), 4); // answer step, question open

    // Setting the question aside must not strand the script.
    store.dispatch(Action::QuizCancel);
    assert!(!store.state().quiz.is_open());

    let result = store.dispatch(Action::BattleConfirm);
    assert!(matches!(&result.effects[0], Effect::FetchQuestion { .. }));
    store.dispatch(Action::QuestionDidLoad {
        battle_id: "b1".into(),
        question: Box::new(question("q2")),
    });
    assert_eq!(cursor(&store), 4);

    store.dispatch(Action::QuizSubmit);
    store.dispatch(Action::AnswerDidResolve {
        battle_id: "b1".into(),
        is_correct: true,
        message: String::new(),
        snapshot: None,
    });
    assert_eq!(cursor(&store), 5);
}

#[test]
fn answer_submit_respects_the_gate() {
    // Quiz forced open while the gate still sits on the welcome step.
    let mut state = AppState::default();
    state.battle = Some(BattleSession::new(snapshot("b1")));
    state.tutorial = Some(TutorialState::new(TutorialScript::builtin()));
    state.quiz.open(question("q1"));
    let mut store = EffectStore::new(state, reducer);

    let result = store.dispatch(Action::QuizSubmit);
    assert!(result.effects.is_empty());
    assert!(!store.state().quiz.submitting);
}

#[test]
fn leaving_the_battle_tears_the_tutorial_down() {
    let mut store = tutorial_store();
    store.dispatch(Action::BattleExit);
    assert!(store.state().tutorial.is_none());
    assert!(!store.state().hub.tutorial_done);
}

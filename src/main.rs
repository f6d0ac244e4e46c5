use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tui_dispatch::{
    EffectContext, EffectStoreLike, EffectStoreWithMiddleware, EventOutcome, RenderContext, TaskKey,
};
use tui_dispatch_debug::debug::DebugLayer;
use tui_dispatch_debug::{
    DebugCliArgs, DebugRunOutput, DebugSession, DebugSessionError, ReplayItem,
};

use lorebound::action::Action;
use lorebound::api;
use lorebound::battle::MONSTER_TURN_DELAY_MS;
use lorebound::effect::Effect;
use lorebound::reducer::reducer;
use lorebound::state::{AppState, DialogueEntry};
use lorebound::tutorial::{self, TutorialScript};
use lorebound::ui;

#[derive(Parser, Debug)]
#[command(name = "lorebound")]
#[command(about = "Quiz-gated battle client for the Lorebound backend")]
struct Args {
    /// Base URL of the battle backend
    #[arg(long, default_value = "http://localhost:4000/api")]
    server: String,

    /// Character id to fight as
    #[arg(long, default_value = "student")]
    character: String,

    /// RON file overriding the built-in tutorial script
    #[arg(long)]
    tutorial_script: Option<PathBuf>,

    /// Monster turn delay in milliseconds (mainly a test hook)
    #[arg(long, default_value_t = MONSTER_TURN_DELAY_MS)]
    monster_delay_ms: u64,

    #[command(flatten)]
    debug: DebugCliArgs,
}

#[derive(Clone)]
struct Backend {
    base: String,
    monster_delay: Duration,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let Args {
        server,
        character,
        tutorial_script,
        monster_delay_ms,
        debug: debug_args,
    } = Args::parse();

    let debug = DebugSession::new(debug_args);
    debug.save_state_schema::<AppState>().map_err(debug_error)?;
    debug.save_actions_schema::<Action>().map_err(debug_error)?;

    let state = debug
        .load_state_or_else_async(move || async move {
            let script = match &tutorial_script {
                Some(path) => match tutorial::load_script(path).await {
                    Ok(script) => script,
                    Err(error) => {
                        eprintln!("Error: {error}");
                        std::process::exit(1);
                    }
                },
                None => TutorialScript::builtin(),
            };
            Ok::<AppState, io::Error>(AppState::new(character, script))
        })
        .await
        .map_err(debug_error)?;
    let replay_actions = debug.load_replay_items().map_err(debug_error)?;
    let (middleware, recorder) = debug.middleware_with_recorder();
    let store = EffectStoreWithMiddleware::new(state, reducer, middleware);

    let backend = Backend {
        base: server,
        monster_delay: Duration::from_millis(monster_delay_ms),
    };

    let use_alt_screen = debug.use_alt_screen();
    let mut stdout = io::stdout();
    if use_alt_screen {
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    }
    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    let result = run_app(&mut terminal, &debug, store, backend, replay_actions).await;

    if use_alt_screen {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
    }

    let run_output = result?;
    run_output.write_render_output()?;
    debug.save_actions(recorder.as_ref()).map_err(debug_error)?;
    Ok(())
}

fn debug_error(error: DebugSessionError) -> io::Error {
    io::Error::other(format!("debug session error: {error}"))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    debug: &DebugSession,
    store: impl EffectStoreLike<AppState, Action, Effect>,
    backend: Backend,
    replay_actions: Vec<ReplayItem<Action>>,
) -> io::Result<DebugRunOutput<AppState>> {
    debug
        .run_effect_app(
            terminal,
            store,
            DebugLayer::simple(),
            replay_actions,
            Some(Action::Init),
            Some(Action::Quit),
            |_runtime| {},
            |frame, area, state, render_ctx: RenderContext| {
                ui::render(frame, area, state, render_ctx);
            },
            |event, state| -> EventOutcome<Action> { ui::handle_event(event, state) },
            |action| matches!(action, Action::Quit),
            move |effect, ctx| handle_effect(effect, ctx, &backend),
        )
        .await
}

fn handle_effect(effect: Effect, ctx: &mut EffectContext<Action>, backend: &Backend) {
    match effect {
        Effect::StartBattle {
            monster_id,
            difficulty,
            character_id,
        } => {
            let base = backend.base.clone();
            ctx.tasks().spawn(TaskKey::new("start_battle"), async move {
                match api::start_battle(&base, &monster_id, difficulty, &character_id).await {
                    Ok(snapshot) => Action::BattleDidStart(Box::new(snapshot)),
                    Err(error) => Action::BattleDidError(error.to_string()),
                }
            });
        }
        Effect::PerformAction { battle_id, action } => {
            let base = backend.base.clone();
            let key = format!("action_{battle_id}");
            ctx.tasks().spawn(TaskKey::new(key), async move {
                match api::perform_action(&base, &battle_id, action).await {
                    Ok(snapshot) => Action::ActionDidResolve {
                        battle_id,
                        action,
                        snapshot: Box::new(snapshot),
                    },
                    Err(error) => Action::ActionDidError {
                        battle_id,
                        error: error.to_string(),
                    },
                }
            });
        }
        Effect::ScheduleMonsterTurn { battle_id } => {
            // One timer per battle: spawning on the same key replaces any
            // pending one instead of racing it.
            let delay = backend.monster_delay;
            let key = format!("monster_turn_{battle_id}");
            ctx.tasks().spawn(TaskKey::new(key), async move {
                tokio::time::sleep(delay).await;
                Action::MonsterTurnDue { battle_id }
            });
        }
        Effect::RequestMonsterTurn { battle_id } => {
            let base = backend.base.clone();
            let key = format!("monster_turn_{battle_id}");
            ctx.tasks().spawn(TaskKey::new(key), async move {
                match api::request_monster_turn(&base, &battle_id).await {
                    Ok(snapshot) => Action::MonsterTurnDidResolve {
                        battle_id,
                        snapshot: Box::new(snapshot),
                    },
                    Err(error) => Action::MonsterTurnDidError {
                        battle_id,
                        error: error.to_string(),
                    },
                }
            });
        }
        Effect::CancelBattleTasks { battle_id } => {
            ctx.tasks()
                .cancel(&TaskKey::new(format!("monster_turn_{battle_id}")));
            ctx.tasks()
                .cancel(&TaskKey::new(format!("action_{battle_id}")));
            ctx.tasks()
                .cancel(&TaskKey::new(format!("question_{battle_id}")));
            ctx.tasks()
                .cancel(&TaskKey::new(format!("answer_{battle_id}")));
        }
        Effect::FetchQuestion {
            battle_id,
            difficulty,
            player_level,
        } => {
            let base = backend.base.clone();
            let key = format!("question_{battle_id}");
            ctx.tasks().spawn(TaskKey::new(key), async move {
                match api::request_random_question(&base, difficulty, player_level).await {
                    Ok(question) => Action::QuestionDidLoad {
                        battle_id,
                        question: Box::new(question),
                    },
                    Err(error) => Action::QuestionDidError {
                        battle_id,
                        error: error.to_string(),
                    },
                }
            });
        }
        Effect::SubmitAnswer {
            battle_id,
            question_id,
            selected_index,
        } => {
            let base = backend.base.clone();
            let key = format!("answer_{battle_id}");
            ctx.tasks().spawn(TaskKey::new(key), async move {
                match api::submit_answer(&base, &battle_id, &question_id, selected_index).await {
                    Ok(outcome) => Action::AnswerDidResolve {
                        battle_id,
                        is_correct: outcome.is_correct,
                        message: outcome.message,
                        snapshot: outcome.snapshot.map(Box::new),
                    },
                    Err(error) => Action::AnswerDidError {
                        battle_id,
                        error: error.to_string(),
                    },
                }
            });
        }
        Effect::SaveProgress {
            battle_id,
            character_id,
            snapshot,
        } => {
            let base = backend.base.clone();
            ctx.tasks().spawn(TaskKey::new("save_progress"), async move {
                match api::save_battle_progress(&base, &battle_id, &character_id, &snapshot).await {
                    // The ack carries nothing the reducer needs.
                    Ok(()) => Action::ProgressSaveDidComplete,
                    Err(error) => Action::ProgressSaveDidError(error.to_string()),
                }
            });
        }
        Effect::FetchDialogue { dialogue_id } => {
            let base = backend.base.clone();
            ctx.tasks().spawn(TaskKey::new("dialogue"), async move {
                match api::get_tutorial_dialogue(&base, &dialogue_id).await {
                    Ok(line) => Action::DialogueDidLoad(Box::new(DialogueEntry {
                        id: line.id,
                        speaker: line.speaker.name,
                        content: line.content,
                    })),
                    Err(error) => Action::DialogueDidError {
                        dialogue_id,
                        error: error.to_string(),
                    },
                }
            });
        }
    }
}

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use tui_dispatch::{EventKind, EventOutcome, RenderContext};
use tui_dispatch_components::centered_rect;

use crate::action::{Action, BATTLE_MENU};
use crate::battle::{BattleSession, PlayerAction, Side};
use crate::state::{AppState, GameMode};

const BG_BASE: Color = Color::Rgb(18, 22, 34);
const BG_PANEL: Color = Color::Rgb(28, 34, 52);
const BG_PANEL_ALT: Color = Color::Rgb(24, 30, 46);
const TEXT_MAIN: Color = Color::Rgb(222, 228, 240);
const TEXT_DIM: Color = Color::Rgb(150, 160, 182);
const ACCENT_BLUE: Color = Color::Rgb(110, 168, 236);
const ACCENT_GOLD: Color = Color::Rgb(226, 200, 122);
const ACCENT_RED: Color = Color::Rgb(224, 102, 102);
const ACCENT_GREEN: Color = Color::Rgb(120, 208, 132);
const HIGHLIGHT_BG: Color = ACCENT_BLUE;
const HIGHLIGHT_TEXT: Color = Color::Rgb(14, 18, 28);
const BORDER_ACCENT: Color = Color::Rgb(70, 84, 112);

pub fn render(frame: &mut Frame, area: Rect, state: &AppState, _ctx: RenderContext) {
    frame.render_widget(Block::default().style(Style::default().bg(BG_BASE)), area);
    match state.mode {
        GameMode::MainMenu => render_main_menu(frame, area, state),
        GameMode::Hub => render_hub(frame, area, state),
        GameMode::Battle => {
            render_battle(frame, area, state);
            if state.quiz.is_open() {
                render_quiz_overlay(frame, area, state);
            }
        }
    }
}

pub fn handle_event(event: &EventKind, state: &AppState) -> EventOutcome<Action> {
    match event {
        EventKind::Resize(width, height) => {
            EventOutcome::action(Action::UiTerminalResize(*width, *height)).with_render()
        }
        EventKind::Key(key) => handle_key(*key, state),
        _ => EventOutcome::ignored(),
    }
}

fn handle_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    match state.mode {
        GameMode::MainMenu => handle_menu_key(key, state),
        GameMode::Hub => handle_hub_key(key, state),
        GameMode::Battle => handle_battle_key(key, state),
    }
}

fn handle_menu_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    match key.code {
        KeyCode::Up | KeyCode::Char('w') => {
            let new_idx = if state.menu.selected == 0 { 1 } else { 0 };
            EventOutcome::action(Action::MenuSelect(new_idx))
        }
        KeyCode::Down | KeyCode::Char('s') => {
            let new_idx = if state.menu.selected >= 1 { 0 } else { 1 };
            EventOutcome::action(Action::MenuSelect(new_idx))
        }
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z') => {
            if state.menu.selected == 1 {
                return EventOutcome::action(Action::Quit);
            }
            EventOutcome::action(Action::MenuConfirm)
        }
        _ => EventOutcome::ignored(),
    }
}

fn handle_hub_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    let count = state.hub.monsters.len();
    match key.code {
        KeyCode::Up | KeyCode::Char('w') => {
            let new_idx = if state.hub.selected == 0 {
                count.saturating_sub(1)
            } else {
                state.hub.selected - 1
            };
            EventOutcome::action(Action::HubSelect(new_idx))
        }
        KeyCode::Down | KeyCode::Char('s') => {
            let new_idx = if state.hub.selected + 1 >= count {
                0
            } else {
                state.hub.selected + 1
            };
            EventOutcome::action(Action::HubSelect(new_idx))
        }
        KeyCode::Left | KeyCode::Right | KeyCode::Char('d') => {
            EventOutcome::action(Action::HubCycleDifficulty)
        }
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z') => {
            EventOutcome::action(Action::HubConfirm)
        }
        KeyCode::Esc => EventOutcome::action(Action::Init),
        _ => EventOutcome::ignored(),
    }
}

fn handle_battle_key(key: KeyEvent, state: &AppState) -> EventOutcome<Action> {
    let Some(session) = state.battle.as_ref() else {
        return EventOutcome::ignored();
    };

    if state.quiz.is_open() {
        let option_count = state
            .quiz
            .question
            .as_ref()
            .map(|question| question.options.len())
            .unwrap_or(0);
        let action = match key.code {
            KeyCode::Esc => Some(Action::QuizCancel),
            KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z') => Some(Action::QuizSubmit),
            KeyCode::Up | KeyCode::Char('w') => Some(Action::QuizSelect(
                state
                    .quiz
                    .selected
                    .checked_sub(1)
                    .unwrap_or(option_count.saturating_sub(1)),
            )),
            KeyCode::Down | KeyCode::Char('s') => {
                let next = state.quiz.selected + 1;
                Some(Action::QuizSelect(if next >= option_count { 0 } else { next }))
            }
            _ => None,
        };
        return EventOutcome::from(action);
    }

    if matches!(key.code, KeyCode::Esc) {
        return EventOutcome::action(Action::BattleExit);
    }

    // Retry a failed monster turn by hand; the stuck state is deliberate.
    if matches!(key.code, KeyCode::Char('r') | KeyCode::Char('R')) {
        return EventOutcome::action(Action::MonsterTurnRetry);
    }

    if matches!(
        key.code,
        KeyCode::Enter | KeyCode::Char('z') | KeyCode::Char('Z')
    ) {
        // On a non-waiting tutorial step, confirm advances the dialogue
        // instead of dispatching an action.
        if tutorial_wants_advance(state) {
            return EventOutcome::action(Action::TutorialAdvance);
        }
        return EventOutcome::action(Action::BattleConfirm);
    }

    if session.snapshot.is_finished {
        return EventOutcome::ignored();
    }
    let action = match key.code {
        KeyCode::Up | KeyCode::Left => Some(Action::BattleMenuPrev),
        KeyCode::Down | KeyCode::Right => Some(Action::BattleMenuNext),
        _ => None,
    };
    EventOutcome::from(action)
}

fn tutorial_wants_advance(state: &AppState) -> bool {
    state
        .tutorial
        .as_ref()
        .and_then(|tutorial| tutorial.gate.current_step())
        .is_some_and(|step| !step.wait_for_action)
}

fn render_main_menu(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" LOREBOUND ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "A scholar's battle awaits",
            Style::default().fg(TEXT_DIM),
        )),
        Line::from(""),
        menu_line("Enter the Hub", state.menu.selected == 0),
        menu_line("Quit", state.menu.selected == 1),
        Line::from(""),
        Line::from(Span::styled(
            "W/S: Move  Z/Enter: Select",
            Style::default().fg(TEXT_DIM),
        )),
    ];
    if let Some(message) = &state.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(ACCENT_GOLD),
        )));
    }
    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_hub(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = panel_block(" THE HUB ", BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![Line::from(Span::styled(
        "Choose an opponent:",
        Style::default().fg(TEXT_DIM),
    ))];
    for (idx, monster) in state.hub.monsters.iter().enumerate() {
        lines.push(menu_line(&monster.name, idx == state.hub.selected));
    }
    if let Some(monster) = state.selected_monster() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            monster.description.clone(),
            Style::default().fg(TEXT_DIM),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Difficulty: ", Style::default().fg(TEXT_DIM)),
        Span::styled(
            "★".repeat(state.hub.difficulty as usize),
            Style::default().fg(ACCENT_GOLD),
        ),
    ]));
    if state.starting_battle {
        lines.push(Line::from(Span::styled(
            "Summoning the monster...",
            Style::default().fg(ACCENT_BLUE),
        )));
    }
    if let Some(message) = &state.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(ACCENT_GOLD),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "W/S: Move  D: Difficulty  Z/Enter: Fight  Esc: Menu",
        Style::default().fg(TEXT_DIM),
    )));
    let paragraph = Paragraph::new(Text::from(lines)).style(Style::default().fg(TEXT_MAIN));
    frame.render_widget(paragraph, inner);
}

fn render_battle(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(session) = state.battle.as_ref() else {
        return;
    };

    let has_tutorial = state.tutorial.is_some();
    let constraints: Vec<Constraint> = if has_tutorial {
        vec![
            Constraint::Length(4), // tutorial dialogue band
            Constraint::Min(6),    // combatant panels
            Constraint::Length(8), // command box
        ]
    } else {
        vec![Constraint::Min(6), Constraint::Length(8)]
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let (panel_area, command_area) = if has_tutorial {
        render_tutorial_band(frame, layout[0], state);
        (layout[1], layout[2])
    } else {
        (layout[0], layout[1])
    };

    let combatants = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(panel_area);

    render_combatant_panel(frame, combatants[0], session, Side::Monster);
    render_combatant_panel(frame, combatants[1], session, Side::Character);
    render_command_box(frame, command_area, state, session);
}

fn render_tutorial_band(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(tutorial) = state.tutorial.as_ref() else {
        return;
    };
    let block = panel_block(" TUTOR ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = tutorial
        .shown_dialogue_id()
        .and_then(|id| tutorial.lines.get(id));
    let lines = match line {
        Some(entry) => vec![
            Line::from(Span::styled(
                entry.speaker.clone(),
                Style::default().fg(ACCENT_BLUE).add_modifier(Modifier::BOLD),
            )),
            Line::from(entry.content.clone()),
        ],
        None => vec![Line::from(Span::styled(
            "...",
            Style::default().fg(TEXT_DIM),
        ))],
    };
    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn render_combatant_panel(frame: &mut Frame, area: Rect, session: &BattleSession, side: Side) {
    let combatant = match side {
        Side::Monster => &session.snapshot.monster,
        Side::Character => &session.snapshot.character,
    };
    let marker = match (side, session.snapshot.is_player_turn) {
        (Side::Character, true) | (Side::Monster, false) => " ◆",
        _ => "",
    };
    let title = format!(" {}{} ", combatant.name.to_ascii_uppercase(), marker);
    let block = panel_block(title.as_str(), BG_PANEL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        meter_line("HP", combatant.hp as u32, combatant.max_hp as u32, 14, hp_color(combatant.hp, combatant.max_hp)),
        meter_line(
            "EN",
            combatant.stamina as u32,
            combatant.max_stamina as u32,
            14,
            ACCENT_BLUE,
        ),
        Line::from(Span::styled(
            format!("Lv {}", combatant.level),
            Style::default().fg(TEXT_DIM),
        )),
    ];

    let effects = session.snapshot.active_effects(side);
    if !effects.is_empty() {
        let mut spans = Vec::new();
        for effect in effects {
            let badge = effect.kind.badge();
            spans.push(Span::styled(
                format!("{} {} ({}) ", badge.icon, badge.label, effect.duration),
                Style::default().fg(badge.color),
            ));
        }
        lines.push(Line::from(spans));
    }
    if side == Side::Monster && session.snapshot.monster_guaranteed_attacks > 0 {
        lines.push(Line::from(Span::styled(
            format!(
                "Guaranteed hits: {}",
                session.snapshot.monster_guaranteed_attacks
            ),
            Style::default().fg(ACCENT_RED),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines)).style(Style::default().fg(TEXT_MAIN));
    frame.render_widget(paragraph, inner);
}

fn render_command_box(frame: &mut Frame, area: Rect, state: &AppState, session: &BattleSession) {
    let block = panel_block(" COMMAND ", BG_PANEL_ALT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    let narration = if session.snapshot.message.is_empty() {
        state.message.clone().unwrap_or_default()
    } else {
        session.snapshot.message.clone()
    };
    lines.push(Line::from(narration));

    if session.snapshot.is_finished {
        let verdict = match session.snapshot.winner {
            Some(Side::Character) => "You won!",
            Some(Side::Monster) => "You were defeated.",
            None => "The battle is over.",
        };
        lines.push(Line::from(Span::styled(
            verdict,
            Style::default().fg(ACCENT_GOLD).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            "Z/Enter: Continue",
            Style::default().fg(TEXT_DIM),
        )));
    } else {
        lines.push(Line::from(""));
        lines.push(action_menu_line(state, session));
        if let Some(rejection) = &session.last_rejection {
            lines.push(Line::from(Span::styled(
                rejection.clone(),
                Style::default().fg(ACCENT_RED),
            )));
        }
        if session.snapshot.waiting_for_monster_turn {
            lines.push(Line::from(Span::styled(
                "The monster is winding up... (R to prod it)",
                Style::default().fg(TEXT_DIM),
            )));
        } else if session.dispatch_in_flight {
            lines.push(Line::from(Span::styled(
                "Resolving...",
                Style::default().fg(TEXT_DIM),
            )));
        }
        lines.push(Line::from(Span::styled(
            "←/→: Choose  Z/Enter: Act  Esc: Flee",
            Style::default().fg(TEXT_DIM),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

/// One entry per action slot. A dimmed entry corresponds 1:1 to the
/// rejection the dispatcher would return for it right now.
fn action_menu_line(state: &AppState, session: &BattleSession) -> Line<'static> {
    let mut spans = Vec::new();
    for (idx, action) in BATTLE_MENU.iter().enumerate() {
        let selected = idx == state.battle_menu_index;
        let usable = action_usable(state, session, *action);
        let highlighted = tutorial_highlights(state, *action);

        let mut style = if usable {
            Style::default().fg(TEXT_MAIN)
        } else {
            Style::default().fg(TEXT_DIM).add_modifier(Modifier::DIM)
        };
        if selected {
            style = style.fg(HIGHLIGHT_TEXT).bg(HIGHLIGHT_BG);
        }
        if highlighted {
            style = style.add_modifier(Modifier::BOLD).fg(ACCENT_GOLD);
        }
        let cost = action.stamina_cost();
        spans.push(Span::styled(
            format!(" {} ({}) ", action.label().to_ascii_uppercase(), cost),
            style,
        ));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn action_usable(state: &AppState, session: &BattleSession, action: PlayerAction) -> bool {
    state.gate_allows(action) && session.validate(action).is_ok()
}

fn tutorial_highlights(state: &AppState, action: PlayerAction) -> bool {
    let target = format!("action-{}", action.label().to_ascii_lowercase());
    state
        .tutorial
        .as_ref()
        .and_then(|tutorial| tutorial.gate.current_step())
        .and_then(|step| step.highlight.as_deref())
        == Some(target.as_str())
}

fn render_quiz_overlay(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(question) = state.quiz.question.as_ref() else {
        return;
    };
    let modal = centered_rect(60, 14, area);
    frame.render_widget(Clear, modal);
    let block = panel_block(" QUESTION ", BG_PANEL);
    let inner = block.inner(modal);
    frame.render_widget(block, modal);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} · {} pts", question.category, question.points),
            Style::default().fg(TEXT_DIM),
        )),
        Line::from(question.text.clone()),
        Line::from(""),
    ];
    for (idx, option) in question.options.iter().enumerate() {
        lines.push(menu_line(option, idx == state.quiz.selected));
    }
    lines.push(Line::from(""));
    let hint = if state.quiz.submitting {
        "Checking..."
    } else {
        "W/S: Choose  Z/Enter: Answer  Esc: Put aside"
    };
    lines.push(Line::from(Span::styled(
        hint,
        Style::default().fg(TEXT_DIM),
    )));

    let paragraph = Paragraph::new(Text::from(lines))
        .style(Style::default().fg(TEXT_MAIN))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

fn hp_color(current: u16, max: u16) -> Color {
    let ratio = if max == 0 {
        0.0
    } else {
        current as f32 / max as f32
    };
    if ratio > 0.5 {
        ACCENT_GREEN
    } else if ratio > 0.2 {
        ACCENT_GOLD
    } else {
        ACCENT_RED
    }
}

fn meter_line(label: &str, current: u32, max: u32, width: usize, color: Color) -> Line<'static> {
    let max = max.max(1);
    let ratio = current as f32 / max as f32;
    let filled = ((ratio * width as f32).round() as usize).min(width);
    let empty = width.saturating_sub(filled);
    let filled_bar = "█".repeat(filled);
    let empty_bar = "░".repeat(empty);
    Line::from(vec![
        Span::styled(format!("{label} "), Style::default().fg(TEXT_DIM)),
        Span::styled(
            filled_bar,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(empty_bar, Style::default().fg(TEXT_DIM)),
        Span::styled(format!(" {current}/{max}"), Style::default().fg(TEXT_DIM)),
    ])
}

fn menu_line(label: &str, selected: bool) -> Line<'static> {
    let style = if selected {
        Style::default()
            .fg(HIGHLIGHT_TEXT)
            .bg(HIGHLIGHT_BG)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_MAIN)
    };
    Line::from(Span::styled(label.to_string(), style))
}

fn panel_block<'a, T>(title: T, bg: Color) -> Block<'a>
where
    T: Into<Title<'a>>,
{
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .style(Style::default().bg(bg).fg(TEXT_MAIN))
        .border_style(Style::default().fg(BORDER_ACCENT))
}

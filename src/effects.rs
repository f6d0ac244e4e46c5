//! Status-effect ledger: the closed set of timed effects the server can
//! attach to a combatant, plus the display/blocking rules the client
//! derives from them. The server owns durations; nothing here mutates.

use ratatui::style::Color;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::battle::PlayerAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    Stun,
    DisableSkill,
    BlockEnergyRecovery,
    DamageBuff,
    DamageReduction,
    Corruption,
    ScrambleQuestion,
    ExtraQuestion,
    HideQuestion,
    /// Anything the backend sends that this client build does not know.
    /// Renders a neutral badge and blocks nothing.
    #[serde(other)]
    Unknown,
}

/// One timed effect mirrored from a battle snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEffect {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    /// Turns remaining. Zero means expired; the session drops it on apply.
    pub duration: u8,
    #[serde(default)]
    pub description: String,
}

pub struct EffectBadge {
    pub icon: &'static str,
    pub color: Color,
    pub label: &'static str,
}

impl EffectKind {
    /// Whether this effect forbids the given action on the affected side.
    /// Stun blocks every action; DisableSkill blocks only the skill slot.
    /// The question-tampering effects change how the quiz renders, not
    /// whether it may be opened.
    pub fn blocks(self, action: PlayerAction) -> bool {
        match self {
            EffectKind::Stun => true,
            EffectKind::DisableSkill => action == PlayerAction::Skill,
            _ => false,
        }
    }

    pub fn badge(self) -> EffectBadge {
        match self {
            EffectKind::Stun => EffectBadge {
                icon: "✶",
                color: Color::Rgb(222, 196, 120),
                label: "Stunned",
            },
            EffectKind::DisableSkill => EffectBadge {
                icon: "⊘",
                color: Color::Rgb(196, 120, 222),
                label: "Skill disabled",
            },
            EffectKind::BlockEnergyRecovery => EffectBadge {
                icon: "⌀",
                color: Color::Rgb(120, 160, 222),
                label: "No energy recovery",
            },
            EffectKind::DamageBuff => EffectBadge {
                icon: "▲",
                color: Color::Rgb(220, 96, 96),
                label: "Damage up",
            },
            EffectKind::DamageReduction => EffectBadge {
                icon: "▼",
                color: Color::Rgb(104, 204, 120),
                label: "Damage down",
            },
            EffectKind::Corruption => EffectBadge {
                icon: "☣",
                color: Color::Rgb(150, 128, 74),
                label: "Corrupted",
            },
            EffectKind::ScrambleQuestion => EffectBadge {
                icon: "⇄",
                color: Color::Rgb(222, 160, 96),
                label: "Questions scrambled",
            },
            EffectKind::ExtraQuestion => EffectBadge {
                icon: "+?",
                color: Color::Rgb(160, 160, 222),
                label: "Extra question",
            },
            EffectKind::HideQuestion => EffectBadge {
                icon: "◼",
                color: Color::Rgb(110, 110, 110),
                label: "Questions hidden",
            },
            EffectKind::Unknown => EffectBadge {
                icon: "?",
                color: Color::Rgb(172, 186, 160),
                label: "Unknown effect",
            },
        }
    }
}

/// True if any effect in the list forbids the action.
pub fn any_blocks(effects: &[ActiveEffect], action: PlayerAction) -> bool {
    effects.iter().any(|effect| effect.kind.blocks(action))
}

/// Drop expired entries. Durations never go negative on the wire (u8);
/// zero simply means the server already retired the effect.
pub fn retain_live(effects: &mut Vec<ActiveEffect>) {
    effects.retain(|effect| effect.duration > 0);
}

//! Engine evaluation types and the normalizer that feeds the evaluation bar.
//!
//! UCI engines report scores relative to the side to move. Everything the UI
//! sees is absolute instead: positive favours White.

use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Saturation scale for centipawn compression (cp at which tanh reaches ~0.76).
const CP_SCALE: f64 = 400.0;

/// Half-width of the centipawn fill range around 0.5. Keeps every centipawn
/// fraction inside [0.02, 0.98] even where f64 `tanh` rounds to exactly 1.
const CP_SPAN: f64 = 0.48;

/// Fill fraction for a forced mate in White's favour.
pub const MATE_WHITE_FRACTION: f64 = 0.99;

/// Fill fraction for a forced mate in Black's favour.
pub const MATE_BLACK_FRACTION: f64 = 0.01;

/// Engine score as reported on an `info` line.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// negative N = side-to-move gets mated in N moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeScore {
    Centipawns(i32),
    Mate(i32),
}

/// Absolute evaluation, positive favours White.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Evaluation {
    #[serde(rename = "cp")]
    Centipawns(i32),
    #[serde(rename = "mate")]
    Mate(i32),
}

/// Extract the score from an engine output line.
///
/// Only `info` lines are considered. A mate score wins over a centipawn
/// score on the same line. A pattern whose value is not an integer does not
/// match, and `score mate 0` (the side to move is already mated) carries no
/// orientation, so it does not match either.
pub fn parse_score(line: &str) -> Option<RelativeScore> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"info") {
        return None;
    }

    find_score(&tokens, "mate")
        .filter(|moves| *moves != 0)
        .map(RelativeScore::Mate)
        .or_else(|| find_score(&tokens, "cp").map(RelativeScore::Centipawns))
}

fn find_score(tokens: &[&str], kind: &str) -> Option<i32> {
    tokens.windows(3).find_map(|window| match window {
        ["score", k, value] if *k == kind => value.parse().ok(),
        _ => None,
    })
}

/// Reorient a side-to-move relative score so that positive favours White.
pub fn normalize(score: RelativeScore, side_to_move: Side) -> Evaluation {
    let sign = side_to_move.sign();
    match score {
        RelativeScore::Centipawns(cp) => Evaluation::Centipawns(cp.saturating_mul(sign)),
        RelativeScore::Mate(moves) => Evaluation::Mate(moves.saturating_mul(sign)),
    }
}

/// Parse and normalize in one step.
pub fn parse_evaluation(line: &str, side_to_move: Side) -> Option<Evaluation> {
    parse_score(line).map(|score| normalize(score, side_to_move))
}

impl Evaluation {
    /// Portion of the bar filled for White, in (0.01, 0.99) for centipawns
    /// and exactly at the bounds for mates.
    pub fn fraction(&self) -> f64 {
        match *self {
            Self::Centipawns(cp) => 0.5 + CP_SPAN * (f64::from(cp) / CP_SCALE).tanh(),
            Self::Mate(moves) => {
                if moves > 0 {
                    MATE_WHITE_FRACTION
                } else {
                    MATE_BLACK_FRACTION
                }
            }
        }
    }

    /// Short label: signed pawns with one decimal (half away from zero),
    /// or `M<n>` / `-M<n>` for mates.
    pub fn label(&self) -> String {
        match *self {
            Self::Centipawns(cp) => {
                let cp = i64::from(cp);
                let tenths = (cp.abs() + 5) / 10;
                if tenths == 0 {
                    return "0.0".to_string();
                }
                let sign = if cp > 0 { '+' } else { '-' };
                format!("{}{}.{}", sign, tenths / 10, tenths % 10)
            }
            Self::Mate(moves) => {
                if moves >= 0 {
                    format!("M{}", moves)
                } else {
                    format!("-M{}", moves.unsigned_abs())
                }
            }
        }
    }
}

impl std::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

//! Chess-side helpers for the evaluation bar: who is to move in a position,
//! and how raw engine scores turn into an absolute, displayable evaluation.

pub mod eval;
pub mod fen;
pub mod types;

pub use eval::{normalize, parse_evaluation, parse_score, Evaluation, RelativeScore};
pub use fen::{parse_fen, side_to_move, FenError};
pub use types::Side;

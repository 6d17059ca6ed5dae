use cozy_chess::Board;

use crate::types::Side;

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.is_empty() {
        return Err(FenError::InvalidFormat);
    }

    fen.parse().map_err(|_| FenError::InvalidFormat)
}

/// Determine the side to move of a position identifier.
///
/// Full FENs are validated through cozy-chess. FEN-like strings that
/// cozy-chess rejects (missing move counters, setups it considers illegal)
/// still carry the active colour in their second field, and that is enough
/// to orient an engine score.
pub fn side_to_move(fen: &str) -> Result<Side, FenError> {
    if let Ok(board) = parse_fen(fen) {
        return Ok(board.side_to_move().into());
    }

    match fen.split_whitespace().nth(1) {
        Some("w") => Ok(Side::White),
        Some("b") => Ok(Side::Black),
        Some(other) => Err(FenError::InvalidSideToMove(other.to_string())),
        None => Err(FenError::InvalidFormat),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid side to move: {0}")]
    InvalidSideToMove(String),
}

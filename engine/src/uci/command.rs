use std::fmt;

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    SetOption { name: String, value: Option<String> },
    Position { fen: String },
    Go(GoParams),
    Stop,
    Quit,
}

/// Parameters for the "go" command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub movetime: Option<u64>, // Move time in milliseconds
    pub depth: Option<u8>,     // Search depth
    pub infinite: bool,        // Search until "stop"
}

impl GoParams {
    pub fn movetime(ms: u64) -> Self {
        Self {
            movetime: Some(ms),
            ..Default::default()
        }
    }
}

impl UciCommand {
    pub fn threads(threads: u32) -> Self {
        Self::SetOption {
            name: "Threads".to_string(),
            value: Some(threads.to_string()),
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uci => write!(f, "uci"),
            Self::IsReady => write!(f, "isready"),
            Self::SetOption { name, value } => match value {
                Some(value) => write!(f, "setoption name {} value {}", name, value),
                None => write!(f, "setoption name {}", name),
            },
            Self::Position { fen } => write!(f, "position fen {}", fen),
            Self::Go(params) => {
                write!(f, "go")?;
                if let Some(movetime) = params.movetime {
                    write!(f, " movetime {}", movetime)
                } else if let Some(depth) = params.depth {
                    write!(f, " depth {}", depth)
                } else if params.infinite {
                    write!(f, " infinite")
                } else {
                    write!(f, " movetime 1000") // Default 1 second
                }
            }
            Self::Stop => write!(f, "stop"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

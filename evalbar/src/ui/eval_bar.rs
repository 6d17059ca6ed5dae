use chess::Evaluation;
use engine::EvalSnapshot;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};

const WHITE_FILL: &str = "█";
const BLACK_FILL: &str = "░";
const THINKING_MARKER: &str = "…";
const NO_EVALUATION: &str = "--";

/// What the bar shows. Keeps the last known evaluation while the engine is
/// unavailable so the bar does not flicker back to even.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalBarState {
    pub evaluation: Option<Evaluation>,
    pub thinking: bool,
    pub available: bool,
}

impl EvalBarState {
    pub fn update(&mut self, snapshot: &EvalSnapshot) {
        match snapshot.evaluation {
            Some(evaluation) => self.evaluation = Some(evaluation),
            // An explicit clear with a working engine empties the bar.
            None if snapshot.available && !snapshot.thinking => self.evaluation = None,
            None => {}
        }
        self.thinking = snapshot.thinking;
        self.available = snapshot.available;
    }
}

/// Vertical evaluation bar: White's share fills from the bottom, the label
/// sits on the last row.
pub struct EvalBar {
    evaluation: Option<Evaluation>,
    thinking: bool,
}

impl EvalBar {
    pub fn new(evaluation: Option<Evaluation>, thinking: bool) -> Self {
        Self {
            evaluation,
            thinking,
        }
    }

    pub fn from_state(state: &EvalBarState) -> Self {
        Self::new(state.evaluation, state.thinking)
    }

    fn fraction(&self) -> f64 {
        self.evaluation.map_or(0.5, |e| e.fraction())
    }

    fn label(&self) -> String {
        let mut label = self
            .evaluation
            .map(|e| e.label())
            .unwrap_or_else(|| NO_EVALUATION.to_string());
        if self.thinking {
            label.push_str(THINKING_MARKER);
        }
        label
    }
}

impl Widget for EvalBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Bar above, label row below when there is room for both.
        let bar_height = if area.height > 1 { area.height - 1 } else { area.height };
        let white_rows = ((self.fraction() * f64::from(bar_height)).round() as u16).min(bar_height);
        let first_white_row = area.y + bar_height - white_rows;

        let white = Style::default().fg(Color::White);
        let black = Style::default().fg(Color::DarkGray);

        for y in area.y..area.y + bar_height {
            let (symbol, style) = if y >= first_white_row {
                (WHITE_FILL, white)
            } else {
                (BLACK_FILL, black)
            };
            for x in area.x..area.x + area.width {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol(symbol).set_style(style);
                }
            }
        }

        if area.height > 1 {
            let label = self.label();
            let mut style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
            if self.thinking {
                style = style.add_modifier(Modifier::DIM);
            }
            let width = label.chars().count() as u16;
            let x = area.x + area.width.saturating_sub(width) / 2;
            buf.set_stringn(
                x,
                area.y + area.height - 1,
                &label,
                usize::from(area.width),
                style,
            );
        }
    }
}

use padloop::shared::{DisplayState, PadView};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Paragraph};
use ratatui::Frame;

use super::mode::TuiState;

const PAD_KEYS: [&str; 16] = [
    "1", "2", "3", "4",
    "Q", "W", "E", "R",
    "A", "S", "D", "F",
    "Z", "X", "C", "V",
];

// draws the pads and remembers where each one went, for mouse hit testing
pub fn draw_pad_grid(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &mut TuiState) {
    ts.pad_rects.clear();
    if state.rows == 0 || state.cols == 0 {
        return;
    }
    let row_constraints = vec![Constraint::Ratio(1, state.rows as u32); state.rows];
    let col_constraints = vec![Constraint::Ratio(1, state.cols as u32); state.cols];

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints.clone())
            .split(*row_area);

        for (col_idx, cell_area) in cols.iter().enumerate() {
            let Some(pad) = state.pads.get(row_idx * state.cols + col_idx) else {
                continue;
            };
            let on_playhead = state.playing_step == Some(pad.id.0);
            draw_pad(frame, *cell_area, pad, on_playhead);
            ts.pad_rects.push((pad.id, *cell_area));
        }
    }
}

fn draw_pad(frame: &mut Frame, area: Rect, pad: &PadView, on_playhead: bool) {
    let fill = pad.color.as_deref().and_then(hex_color).unwrap_or(Color::DarkGray);
    let style = match (pad.active, pad.layers > 0) {
        (true, true) => Style::default().fg(Color::Black).bg(fill),
        (true, false) => Style::default().fg(Color::White).bg(Color::Gray),
        (false, true) => Style::default().fg(fill),
        (false, false) => Style::default().fg(Color::DarkGray),
    };
    let border = if on_playhead {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        style
    };

    let key = PAD_KEYS.get(pad.id.0).copied().unwrap_or("");
    let mut lines = vec![Line::from(pad.label.clone().unwrap_or_default())];
    if pad.layers > 1 {
        lines.push(Line::from(format!("{}/{}", pad.current + 1, pad.layers)));
    }
    let block = Block::bordered()
        .border_type(if on_playhead { BorderType::Thick } else { BorderType::Rounded })
        .border_style(border)
        .title(key);
    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(style)
        .block(block);
    frame.render_widget(body, area);
}

// "#rrggbb" -> Color::Rgb
pub fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_palette_colors() {
        assert_eq!(hex_color("#ff8000"), Some(Color::Rgb(255, 128, 0)));
        assert_eq!(hex_color("ff8000"), None);
        assert_eq!(hex_color("#fff"), None);
        assert_eq!(hex_color("#gg0000"), None);
        assert_eq!(hex_color(""), None);
    }
}

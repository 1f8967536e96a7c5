use padloop::shared::DisplayState;
use ratatui::layout::{Constraint, Direction, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph};
use ratatui::Frame;

use super::grid::{draw_pad_grid, hex_color};
use super::mode::{Overlay, SHEET_PAGE, TuiState};

const HELP: &str =
    "space play  m mute  [ ] tempo  b set bpm  / sounds  , . cycle  bksp clear  esc quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &mut TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // lcd screen
            Constraint::Min(8),    // pad grid
            Constraint::Length(1), // keys
        ])
        .split(area);

    draw_screen(frame, sections[0], state);
    draw_pad_grid(frame, sections[1], state, ts);
    frame.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        sections[2],
    );

    match &ts.overlay {
        Overlay::None => {}
        Overlay::TempoEntry(text) => draw_tempo_entry(frame, area, text),
        Overlay::SoundSheet { pad, page } => {
            draw_sound_sheet(frame, area, ts, pad.0, *page);
        }
    }
}

fn draw_screen(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let transport = if state.playing {
        let step = state.playing_step.map_or(0, |s| s + 1);
        Span::styled(format!("▶ {step:>2}"), Style::default().fg(Color::Green))
    } else {
        Span::styled("■   ", Style::default().fg(Color::DarkGray))
    };
    let mute = if state.muted {
        Span::styled("  muted", Style::default().fg(Color::Red))
    } else {
        Span::raw("")
    };
    let line = Line::from(vec![
        transport,
        Span::raw(format!("  {:>5.1} bpm", state.bpm)),
        mute,
        Span::raw("  "),
        Span::styled(state.display_text.clone(), Style::default().add_modifier(Modifier::ITALIC)),
    ]);
    frame.render_widget(Paragraph::new(line).block(Block::bordered().title("padloop")), area);
}

fn draw_tempo_entry(frame: &mut Frame, area: Rect, text: &str) {
    let popup = centered(area, 30, 3);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(format!("{text}_")).block(Block::bordered().title("bpm (enter to set)")),
        popup,
    );
}

fn draw_sound_sheet(frame: &mut Frame, area: Rect, ts: &TuiState, pad: usize, page: usize) {
    let popup = centered(area, 44, SHEET_PAGE as u16 + 2);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line> = ts
        .sheet_entries
        .iter()
        .skip(page * SHEET_PAGE)
        .take(SHEET_PAGE)
        .enumerate()
        .map(|(i, entry)| {
            let on = ts.sheet_on_pad.contains(&entry.sound_id);
            let swatch = entry.color.as_deref().and_then(hex_color).unwrap_or(Color::DarkGray);
            Line::from(vec![
                Span::raw(format!("{} ", (i + 1) % 10)),
                Span::styled("■ ", Style::default().fg(swatch)),
                Span::raw(if on { "[x] " } else { "[ ] " }),
                Span::raw(entry.name.clone()),
            ])
        })
        .collect();
    let title = format!("pad {} sounds  {}/{}", pad + 1, page + 1, ts.sheet_pages());
    let body = if lines.is_empty() {
        Paragraph::new("no sounds in the catalog")
    } else {
        Paragraph::new(lines)
    };
    frame.render_widget(body.block(Block::bordered().title(title)), popup);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)]).flex(Flex::Center).areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width)]).flex(Flex::Center).areas(row);
    cell
}

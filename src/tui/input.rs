use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use padloop::shared::{CycleDirection, InputEvent, PadId, PointerId};

use super::mode::{Overlay, TuiState};

const MOUSE: PointerId = PointerId(0);
const NUDGE_BPM: f32 = 5.0;

// poll for input from tui, tracks overlay and drag state in tuistate,
// resolves keys and mouse into input events for the session to handle
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(handle_key(key, ts)),
        Event::Mouse(mouse) => Ok(handle_mouse(mouse, ts)),
        _ => Ok(vec![]),
    }
}

pub fn handle_key(key: KeyEvent, ts: &mut TuiState) -> Vec<InputEvent> {
    let pages = ts.sheet_pages();
    match &mut ts.overlay {
        Overlay::TempoEntry(text) => {
            match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => text.push(c),
                KeyCode::Backspace => {
                    text.pop();
                }
                KeyCode::Enter => {
                    let text = std::mem::take(text);
                    ts.overlay = Overlay::None;
                    return vec![InputEvent::SetTempo(text)];
                }
                KeyCode::Esc => ts.overlay = Overlay::None,
                _ => {}
            }
            vec![]
        }
        Overlay::SoundSheet { pad, page } => {
            let pad = *pad;
            match key.code {
                KeyCode::Esc => ts.overlay = Overlay::None,
                KeyCode::Left => *page = page.saturating_sub(1),
                KeyCode::Right => *page = (*page + 1).min(pages - 1),
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    // 1..9 then 0, like the number row
                    let digit = c.to_digit(10).map_or(0, |d| (d as usize + 9) % 10);
                    if let Some(entry) = ts.sheet_pick(digit) {
                        return vec![InputEvent::ToggleSound { pad, sound_id: entry.sound_id.clone() }];
                    }
                }
                _ => {}
            }
            vec![]
        }
        Overlay::None => handle_grid_key(key.code, ts),
    }
}

fn handle_grid_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::TogglePlay],
        KeyCode::Char('m') => vec![InputEvent::ToggleMute],
        KeyCode::Char('[') => vec![InputEvent::NudgeTempo(-NUDGE_BPM)],
        KeyCode::Char(']') => vec![InputEvent::NudgeTempo(NUDGE_BPM)],
        KeyCode::Char('b') => {
            ts.overlay = Overlay::TempoEntry(String::new());
            vec![]
        }

        // any keys on the 4x4 grid pad
        KeyCode::Char(c @ ('1' | '2' | '3' | '4'
            | 'q' | 'w' | 'e' | 'r'
            | 'a' | 's' | 'd' | 'f'
            | 'z' | 'x' | 'c' | 'v')) => match char_to_pad(c) {
            Some(pad) => {
                ts.last_pad = pad;
                vec![InputEvent::TapPad(pad)]
            }
            None => vec![],
        },

        // the rest act on whichever pad was touched last
        KeyCode::Char('/') | KeyCode::Enter => {
            ts.overlay = Overlay::SoundSheet { pad: ts.last_pad, page: 0 };
            vec![]
        }
        KeyCode::Char(',') => vec![InputEvent::CyclePad(ts.last_pad, CycleDirection::Backward)],
        KeyCode::Char('.') => vec![InputEvent::CyclePad(ts.last_pad, CycleDirection::Forward)],
        KeyCode::Backspace => vec![InputEvent::ClearPad(ts.last_pad)],

        _ => vec![],
    }
}

// left button is the one pointer. x is scaled to pixels so the swipe
// threshold means the same thing as on a touch screen
pub fn handle_mouse(mouse: MouseEvent, ts: &mut TuiState) -> Vec<InputEvent> {
    if ts.overlay != Overlay::None {
        return vec![];
    }
    let x = mouse.column as f32 * ts.cell_width_px;
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => match ts.pad_at(mouse.column, mouse.row) {
            Some(pad) => {
                ts.dragging = Some(pad);
                ts.last_pad = pad;
                vec![InputEvent::PointerDown { pointer: MOUSE, pad, x }]
            }
            None => vec![],
        },
        MouseEventKind::Drag(MouseButton::Left) => {
            let Some(pad) = ts.dragging else {
                return vec![];
            };
            if ts.pad_at(mouse.column, mouse.row) == Some(pad) {
                vec![InputEvent::PointerMove { pointer: MOUSE, x }]
            } else {
                // left the pad mid-contact
                ts.dragging = None;
                vec![InputEvent::PointerCancel { pointer: MOUSE }]
            }
        }
        MouseEventKind::Up(MouseButton::Left) => match ts.dragging.take() {
            Some(_) => vec![InputEvent::PointerUp { pointer: MOUSE }],
            None => vec![],
        },
        _ => vec![],
    }
}

// convert char to pad index
fn char_to_pad(c: char) -> Option<PadId> {
    let idx = match c {
        '1' => 0, '2' => 1, '3' => 2, '4' => 3,
        'q' => 4, 'w' => 5, 'e' => 6, 'r' => 7,
        'a' => 8, 's' => 9, 'd' => 10, 'f' => 11,
        'z' => 12, 'x' => 13, 'c' => 14, 'v' => 15,
        _ => return None,
    };
    Some(PadId(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::mode::SheetEntry;
    use crossterm::event::KeyModifiers;
    use ratatui::layout::Rect;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent { kind, column, row, modifiers: KeyModifiers::NONE }
    }

    fn with_pads() -> TuiState {
        let mut ts = TuiState::new(8.0);
        ts.pad_rects = vec![(PadId(0), Rect::new(0, 0, 10, 4)), (PadId(1), Rect::new(10, 0, 10, 4))];
        ts
    }

    #[test]
    fn grid_keys_tap_pads() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(key(KeyCode::Char('w')), &mut ts), vec![InputEvent::TapPad(PadId(5))]);
        assert_eq!(ts.last_pad, PadId(5));
        assert_eq!(handle_key(key(KeyCode::Esc), &mut ts), vec![InputEvent::Quit]);
    }

    #[test]
    fn tempo_entry_collects_text() {
        let mut ts = TuiState::default();
        assert!(handle_key(key(KeyCode::Char('b')), &mut ts).is_empty());
        for c in ['9', 'x', '5'] {
            handle_key(key(KeyCode::Char(c)), &mut ts);
        }
        assert_eq!(ts.overlay, Overlay::TempoEntry("95".into()));
        assert_eq!(handle_key(key(KeyCode::Enter), &mut ts), vec![InputEvent::SetTempo("95".into())]);
        assert_eq!(ts.overlay, Overlay::None);
    }

    #[test]
    fn sheet_digits_toggle_sounds() {
        let mut ts = TuiState::default();
        ts.sheet_entries = (0..3)
            .map(|i| SheetEntry { sound_id: format!("s{i}"), name: String::new(), color: None })
            .collect();
        ts.overlay = Overlay::SoundSheet { pad: PadId(7), page: 0 };
        assert_eq!(
            handle_key(key(KeyCode::Char('2')), &mut ts),
            vec![InputEvent::ToggleSound { pad: PadId(7), sound_id: "s1".into() }]
        );
        assert!(handle_key(key(KeyCode::Char('9')), &mut ts).is_empty());
        handle_key(key(KeyCode::Esc), &mut ts);
        assert_eq!(ts.overlay, Overlay::None);
    }

    #[test]
    fn drag_within_pad_moves_and_leaving_cancels() {
        let mut ts = with_pads();
        let down = handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 1), &mut ts);
        assert_eq!(down, vec![InputEvent::PointerDown { pointer: MOUSE, pad: PadId(0), x: 40.0 }]);
        let moved = handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 2, 1), &mut ts);
        assert_eq!(moved, vec![InputEvent::PointerMove { pointer: MOUSE, x: 16.0 }]);
        let left = handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 12, 1), &mut ts);
        assert_eq!(left, vec![InputEvent::PointerCancel { pointer: MOUSE }]);
        assert!(handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 12, 1), &mut ts).is_empty());
    }

    #[test]
    fn click_off_the_grid_does_nothing() {
        let mut ts = with_pads();
        assert!(handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 50, 50), &mut ts).is_empty());
        assert!(handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 50, 50), &mut ts).is_empty());
    }
}

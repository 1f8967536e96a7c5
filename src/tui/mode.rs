use padloop::shared::PadId;
use ratatui::layout::Rect;

pub const SHEET_PAGE: usize = 10; // digit keys 1..9, 0

// what's drawn over the grid, if anything
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Overlay {
    #[default]
    None,
    SoundSheet { pad: PadId, page: usize },
    TempoEntry(String),
}

// one row of the sound sheet
#[derive(Clone, Debug, PartialEq)]
pub struct SheetEntry {
    pub sound_id: String,
    pub name: String,
    pub color: Option<String>,
}

// state local to tui: which overlay is up, where the pads were drawn last
// frame (for mouse hit testing), and the contact being dragged.
// sheet_* fields are synced from the session each loop
#[derive(Clone, Debug)]
pub struct TuiState {
    pub overlay: Overlay,
    pub pad_rects: Vec<(PadId, Rect)>,
    pub dragging: Option<PadId>,
    pub last_pad: PadId,
    pub cell_width_px: f32,
    pub sheet_entries: Vec<SheetEntry>,
    pub sheet_on_pad: Vec<String>,
}

impl TuiState {
    pub fn new(cell_width_px: f32) -> Self {
        Self {
            overlay: Overlay::None,
            pad_rects: Vec::new(),
            dragging: None,
            last_pad: PadId(0),
            cell_width_px,
            sheet_entries: Vec::new(),
            sheet_on_pad: Vec::new(),
        }
    }

    pub fn pad_at(&self, col: u16, row: u16) -> Option<PadId> {
        self.pad_rects
            .iter()
            .find(|(_, rect)| rect.contains((col, row).into()))
            .map(|(id, _)| *id)
    }

    pub fn sheet_pad(&self) -> Option<PadId> {
        match self.overlay {
            Overlay::SoundSheet { pad, .. } => Some(pad),
            _ => None,
        }
    }

    pub fn sheet_pages(&self) -> usize {
        self.sheet_entries.len().div_ceil(SHEET_PAGE).max(1)
    }

    // the entry a digit key picks on the current page
    pub fn sheet_pick(&self, digit: usize) -> Option<&SheetEntry> {
        let Overlay::SoundSheet { page, .. } = self.overlay else {
            return None;
        };
        self.sheet_entries.get(page * SHEET_PAGE + digit)
    }
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new(8.0)
    }
}

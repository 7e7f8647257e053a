//! Diffed rendering of the time and body panes.
//!
//! The cache remembers the strings last drawn into each pane. A pane is only
//! touched when its candidate text differs: the old text is erased by
//! redrawing it in the background ink, then the new text is drawn in the
//! foreground ink. Time and body are independent, so a clock that changes
//! every minute never causes the weather block to flicker.

use crate::config::DisplayConfig;
use crate::display::{DisplayError, DisplayPort, Ink, TextSize};
use crate::state::DisplayState;

/// Where a pane lives on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub row: u16,
    pub col: u16,
    pub size: TextSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneLayout {
    pub time: Slot,
    pub body: Slot,
}

impl PaneLayout {
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            time: Slot {
                row: config.time_row,
                col: config.time_col,
                size: config.time_size,
            },
            body: Slot {
                row: config.body_row,
                col: config.body_col,
                size: config.body_size,
            },
        }
    }
}

impl Default for PaneLayout {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}

/// Strings currently on the glass. `None` means the pane is blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPane {
    pub time_text: Option<String>,
    pub body_text: Option<String>,
}

/// Which panes an [`RenderCache::apply`] call redrew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaneUpdate {
    pub time: bool,
    pub body: bool,
}

#[derive(Debug, Clone)]
pub struct RenderCache {
    layout: PaneLayout,
    pane: RenderedPane,
}

/// Replace the text in one slot. The stored value only changes once the new
/// text has been drawn.
fn update_slot<D: DisplayPort + ?Sized>(
    display: &mut D,
    slot: Slot,
    stored: &mut Option<String>,
    candidate: &str,
) -> Result<bool, DisplayError> {
    if stored.as_deref() == Some(candidate) {
        return Ok(false);
    }
    if let Some(old) = stored.as_deref() {
        display.draw_text(slot.row, slot.col, old, slot.size, Ink::Background)?;
    }
    display.draw_text(slot.row, slot.col, candidate, slot.size, Ink::Foreground)?;
    *stored = Some(candidate.to_string());
    Ok(true)
}

fn erase_slot<D: DisplayPort + ?Sized>(
    display: &mut D,
    slot: Slot,
    stored: &mut Option<String>,
) -> Result<(), DisplayError> {
    match stored.take() {
        Some(old) => display.draw_text(slot.row, slot.col, &old, slot.size, Ink::Background),
        None => Ok(()),
    }
}

impl RenderCache {
    pub fn new(layout: PaneLayout) -> Self {
        Self {
            layout,
            pane: RenderedPane::default(),
        }
    }

    pub fn pane(&self) -> &RenderedPane {
        &self.pane
    }

    /// Bring the panes up to date with the candidate strings.
    ///
    /// Does nothing while the display is off. Both panes are attempted even
    /// if the first one fails; the first error is returned.
    pub fn apply<D: DisplayPort + ?Sized>(
        &mut self,
        display: &mut D,
        state: &DisplayState,
        time: &str,
        body: &str,
    ) -> Result<PaneUpdate, DisplayError> {
        if !state.on {
            return Ok(PaneUpdate::default());
        }

        let time_result = update_slot(display, self.layout.time, &mut self.pane.time_text, time);
        let body_result = update_slot(display, self.layout.body, &mut self.pane.body_text, body);

        Ok(PaneUpdate {
            time: time_result?,
            body: body_result?,
        })
    }

    /// Erase whatever is on screen and forget it.
    ///
    /// The cache is empty afterwards even if an erase failed.
    pub fn clear<D: DisplayPort + ?Sized>(&mut self, display: &mut D) -> Result<(), DisplayError> {
        let time_result = erase_slot(display, self.layout.time, &mut self.pane.time_text);
        let body_result = erase_slot(display, self.layout.body, &mut self.pane.body_text);
        time_result.and(body_result)
    }
}

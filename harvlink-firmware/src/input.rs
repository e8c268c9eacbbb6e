//! Front-panel buttons
//!
//! Debouncing happens on the board. Only the reconnect button concerns the
//! link; the other two belong to the display layer.

use crate::channels::LinkCommand;

/// A debounced button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    /// Button 1: next page
    View,
    /// Button 2: backlight level
    Brightness,
    /// Button 3: reconnect
    Reconnect,
}

impl Button {
    /// Link request triggered by this button, if any
    pub fn link_command(self) -> Option<LinkCommand> {
        match self {
            Button::Reconnect => Some(LinkCommand::Reconnect),
            Button::View | Button::Brightness => None,
        }
    }
}

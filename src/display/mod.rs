//! Display sink: the surface that shows the counter
//!
//! The tracker decides everything and issues simple commands. Failures are
//! reported back as errors, which the tracker logs and otherwise ignores.

pub mod x11;

use anyhow::Result;
use tracing::debug;

use crate::color::Color;
use crate::constants::palette;
use crate::position::Placement;
use crate::types::Point;

pub use x11::X11Overlay;

pub trait DisplaySink {
    fn set_text(&mut self, text: &str) -> Result<()>;

    fn set_text_color(&mut self, color: Color) -> Result<()>;

    fn set_background_color(&mut self, color: Color) -> Result<()>;

    fn set_font_size(&mut self, size: u32) -> Result<()>;

    /// Named-anchor gravity or an absolute top-left offset
    fn set_placement(&mut self, placement: Placement) -> Result<()>;

    fn set_visible(&mut self, visible: bool) -> Result<()>;

    /// Current top-left corner of the overlay, when known
    fn origin(&self) -> Option<Point> {
        None
    }

    /// Whether the overlay may be shown at all
    fn is_permitted(&self) -> bool {
        true
    }

    /// Repaint after the surface was exposed
    fn redraw(&mut self) -> Result<()> {
        Ok(())
    }

    /// Tear the surface down; later commands may fail
    fn detach(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn set_text(&mut self, text: &str) -> Result<()> {
        (**self).set_text(text)
    }

    fn set_text_color(&mut self, color: Color) -> Result<()> {
        (**self).set_text_color(color)
    }

    fn set_background_color(&mut self, color: Color) -> Result<()> {
        (**self).set_background_color(color)
    }

    fn set_font_size(&mut self, size: u32) -> Result<()> {
        (**self).set_font_size(size)
    }

    fn set_placement(&mut self, placement: Placement) -> Result<()> {
        (**self).set_placement(placement)
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        (**self).set_visible(visible)
    }

    fn origin(&self) -> Option<Point> {
        (**self).origin()
    }

    fn is_permitted(&self) -> bool {
        (**self).is_permitted()
    }

    fn redraw(&mut self) -> Result<()> {
        (**self).redraw()
    }

    fn detach(&mut self) -> Result<()> {
        (**self).detach()
    }
}

/// Last state pushed to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub text: String,
    pub text_color: Color,
    pub background: Color,
    pub font_size: u32,
    pub placement: Option<Placement>,
    pub visible: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            text: String::new(),
            text_color: Color::WHITE,
            background: palette::OVERLAY_BACKGROUND,
            font_size: 0,
            placement: None,
            visible: false,
        }
    }
}

/// Headless sink: remembers the state and logs changes at debug level
#[derive(Debug, Default)]
pub struct LogDisplay {
    state: DisplayState,
    updates: usize,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Number of commands received
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl DisplaySink for LogDisplay {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.updates += 1;
        if self.state.text != text {
            self.state.text = text.to_string();
            debug!(text = %text, "Overlay text");
        }
        Ok(())
    }

    fn set_text_color(&mut self, color: Color) -> Result<()> {
        self.updates += 1;
        self.state.text_color = color;
        Ok(())
    }

    fn set_background_color(&mut self, color: Color) -> Result<()> {
        self.updates += 1;
        self.state.background = color;
        Ok(())
    }

    fn set_font_size(&mut self, size: u32) -> Result<()> {
        self.updates += 1;
        self.state.font_size = size;
        Ok(())
    }

    fn set_placement(&mut self, placement: Placement) -> Result<()> {
        self.updates += 1;
        if self.state.placement != Some(placement) {
            debug!(?placement, "Overlay placement");
            self.state.placement = Some(placement);
        }
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.updates += 1;
        if self.state.visible != visible {
            debug!(visible, "Overlay visibility");
            self.state.visible = visible;
        }
        Ok(())
    }

    fn origin(&self) -> Option<Point> {
        match self.state.placement {
            Some(Placement::Offset(point)) => Some(point),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_display_tracks_state() {
        let mut display: Box<dyn DisplaySink> = Box::new(LogDisplay::new());
        display.set_text("00:00:01").unwrap();
        display.set_placement(Placement::Offset(Point::new(3, 4))).unwrap();
        display.set_visible(true).unwrap();

        assert_eq!(display.origin(), Some(Point::new(3, 4)));
        assert!(display.is_permitted());
    }
}

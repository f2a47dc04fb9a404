//! X11 overlay window
//!
//! An unmanaged (override-redirect) window kept above other windows. Text is
//! drawn with a core font; the translucency of the background comes from the
//! window opacity property, not from the color alpha.

use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event as X11Event;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::color::Color;
use crate::config::{HorizontalAlign, VerticalAlign};
use crate::constants::{gesture, overlay, palette};
use crate::display::DisplaySink;
use crate::event::{Event, PointerEvent};
use crate::position::Placement;
use crate::types::Point;

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
    let label = String::from_utf8_lossy(name);
    Ok(conn
        .intern_atom(false, name)
        .context(format!("Failed to intern {label} atom"))?
        .reply()
        .context(format!("Failed to get reply for {label} atom"))?
        .atom)
}

/// Core font name for a pixel size
fn font_name(size: u32) -> String {
    format!("-*-*-bold-r-normal--{size}-*-*-*-*-*-iso8859-1")
}

pub struct X11Overlay {
    conn: Arc<RustConnection>,
    window: Window,
    gc: Gcontext,
    font: Font,
    screen_width: u16,
    screen_height: u16,

    text: String,
    text_color: Color,
    background: Color,
    font_size: u32,
    placement: Placement,
    visible: bool,
    mapped: bool,
    detached: bool,

    origin: Point,
    size: (u16, u16),
    ascent: i16,
}

impl X11Overlay {
    /// Connect to the X server, create the (unmapped) overlay window and
    /// start forwarding its pointer and expose events to `events`
    pub fn connect(events: Sender<Event>) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to the X server")?;
        let conn = Arc::new(conn);
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .context(format!("X server has no screen {screen_num}"))?
            .clone();
        info!(
            screen = screen_num,
            width = screen.width_in_pixels,
            height = screen.height_in_pixels,
            "Connected to X11"
        );

        let window = conn
            .generate_id()
            .context("Failed to generate X11 window ID")?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new()
                .override_redirect(overlay::OVERRIDE_REDIRECT)
                .background_pixel(palette::OVERLAY_BACKGROUND.rgb24())
                .event_mask(
                    EventMask::EXPOSURE
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON1_MOTION,
                ),
        )
        .context("Failed to create overlay window")?;

        Self::setup_window_properties(&conn, window)?;

        let font = conn.generate_id().context("Failed to generate font ID")?;
        let gc = conn.generate_id().context("Failed to generate GC ID")?;
        Self::open_font(&conn, font, 0)?;
        conn.create_gc(gc, window, &CreateGCAux::new().font(font))
            .context("Failed to create overlay graphics context")?;
        conn.flush().context("Failed to flush X11 connection")?;

        Self::spawn_event_pump(Arc::clone(&conn), window, events);

        Ok(Self {
            conn,
            window,
            gc,
            font,
            screen_width: screen.width_in_pixels,
            screen_height: screen.height_in_pixels,
            text: String::new(),
            text_color: Color::WHITE,
            background: palette::OVERLAY_BACKGROUND,
            font_size: 0,
            placement: Placement::Anchored(crate::config::Anchor::TopRight),
            visible: false,
            mapped: false,
            detached: false,
            origin: Point::default(),
            size: (1, 1),
            ascent: 0,
        })
    }

    /// Opacity, WM_CLASS and always-on-top
    fn setup_window_properties(conn: &RustConnection, window: Window) -> Result<()> {
        let opacity = intern(conn, b"_NET_WM_WINDOW_OPACITY")?;
        conn.change_property32(
            PropMode::REPLACE,
            window,
            opacity,
            AtomEnum::CARDINAL,
            &[overlay::WINDOW_OPACITY],
        )
        .context("Failed to set overlay opacity")?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            overlay::WM_CLASS,
        )
        .context("Failed to set overlay WM_CLASS")?;

        let net_wm_state = intern(conn, b"_NET_WM_STATE")?;
        let above = intern(conn, b"_NET_WM_STATE_ABOVE")?;
        conn.change_property32(
            PropMode::REPLACE,
            window,
            net_wm_state,
            AtomEnum::ATOM,
            &[above],
        )
        .context("Failed to set overlay always-on-top")?;
        Ok(())
    }

    /// Open a core font of `size` pixels into `font`, or the fallback font
    fn open_font(conn: &RustConnection, font: Font, size: u32) -> Result<()> {
        if size > 0 {
            let name = font_name(size);
            match conn
                .open_font(font, name.as_bytes())
                .context("Failed to send OpenFont request")?
                .check()
            {
                Ok(()) => {
                    debug!(font = %name, "Opened overlay font");
                    return Ok(());
                }
                Err(e) => {
                    warn!(font = %name, error = %e, "No core font for size, using fallback");
                }
            }
        }
        conn.open_font(font, overlay::FALLBACK_FONT)
            .context("Failed to send OpenFont request")?
            .check()
            .context("Failed to open fallback font")?;
        Ok(())
    }

    fn spawn_event_pump(conn: Arc<RustConnection>, window: Window, events: Sender<Event>) {
        thread::spawn(move || {
            info!(window, "Overlay event pump started");
            loop {
                let event = match conn.wait_for_event() {
                    Ok(event) => event,
                    Err(e) => {
                        error!(error = %e, "X11 connection lost, stopping overlay event pump");
                        break;
                    }
                };
                let forwarded = match event {
                    X11Event::ButtonPress(e)
                        if e.event == window && e.detail == gesture::BUTTON_PRIMARY =>
                    {
                        Some(Event::Pointer(PointerEvent::Down(Point::new(
                            e.root_x.into(),
                            e.root_y.into(),
                        ))))
                    }
                    X11Event::MotionNotify(e) if e.event == window => Some(Event::Pointer(
                        PointerEvent::Move(Point::new(e.root_x.into(), e.root_y.into())),
                    )),
                    X11Event::ButtonRelease(e)
                        if e.event == window && e.detail == gesture::BUTTON_PRIMARY =>
                    {
                        Some(Event::Pointer(PointerEvent::Up(Point::new(
                            e.root_x.into(),
                            e.root_y.into(),
                        ))))
                    }
                    X11Event::Expose(e) if e.window == window && e.count == 0 => {
                        Some(Event::Redraw)
                    }
                    X11Event::Error(e) => {
                        warn!(error = ?e, "X11 error");
                        None
                    }
                    _ => None,
                };
                if let Some(event) = forwarded {
                    if events.send(event).is_err() {
                        debug!("Router gone, stopping overlay event pump");
                        break;
                    }
                }
            }
        });
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.detached {
            bail!("Overlay window {} was detached", self.window);
        }
        Ok(())
    }

    /// Recompute size and origin from the text and placement, then move the window
    fn relayout(&mut self) -> Result<()> {
        let chars: Vec<Char2b> = self
            .text
            .bytes()
            .map(|byte| Char2b { byte1: 0, byte2: byte })
            .collect();
        let extents = self
            .conn
            .query_text_extents(self.font, &chars)
            .context("Failed to query text extents")?
            .reply()
            .context("Failed to get text extents reply")?;

        let pad = overlay::TEXT_PADDING;
        let text_width = u16::try_from(extents.overall_width.max(1)).unwrap_or(u16::MAX);
        let text_height = u16::try_from(i32::from(extents.font_ascent) + i32::from(extents.font_descent))
            .unwrap_or(1)
            .max(1);
        let width = text_width.saturating_add(2 * pad);
        let height = text_height.saturating_add(2 * pad);
        self.size = (width, height);
        self.ascent = extents.font_ascent;
        self.origin = self.place(width, height);

        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .x(self.origin.x)
                    .y(self.origin.y)
                    .width(u32::from(width))
                    .height(u32::from(height))
                    .stack_mode(StackMode::ABOVE),
            )
            .context("Failed to configure overlay window")?;
        Ok(())
    }

    fn place(&self, width: u16, height: u16) -> Point {
        let anchor = match self.placement {
            Placement::Offset(point) => return point,
            Placement::Anchored(anchor) => anchor,
        };
        let margin = overlay::EDGE_MARGIN;
        let free_x = i32::from(self.screen_width) - i32::from(width);
        let free_y = i32::from(self.screen_height) - i32::from(height);
        let (vertical, horizontal) = anchor.align();
        let x = match horizontal {
            HorizontalAlign::Left => margin,
            HorizontalAlign::Center => free_x / 2,
            HorizontalAlign::Right => free_x - margin,
        };
        let y = match vertical {
            VerticalAlign::Top => margin,
            VerticalAlign::Middle => free_y / 2,
            VerticalAlign::Bottom => free_y - margin,
        };
        Point::new(x, y)
    }

    fn draw(&self) -> Result<()> {
        if !self.mapped {
            return Ok(());
        }
        let (width, height) = self.size;
        self.conn
            .change_gc(
                self.gc,
                &ChangeGCAux::new().foreground(self.background.rgb24()),
            )
            .context("Failed to set background color")?;
        self.conn
            .poly_fill_rectangle(
                self.window,
                self.gc,
                &[Rectangle {
                    x: 0,
                    y: 0,
                    width,
                    height,
                }],
            )
            .context("Failed to fill overlay background")?;
        self.conn
            .change_gc(
                self.gc,
                &ChangeGCAux::new()
                    .foreground(self.text_color.rgb24())
                    .background(self.background.rgb24()),
            )
            .context("Failed to set text color")?;
        let pad = overlay::TEXT_PADDING as i16;
        self.conn
            .image_text8(
                self.window,
                self.gc,
                pad,
                pad.saturating_add(self.ascent),
                self.text.as_bytes(),
            )
            .context("Failed to draw overlay text")?;
        self.conn.flush().context("Failed to flush X11 connection")?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.ensure_attached()?;
        self.relayout()?;
        self.draw()
    }
}

impl DisplaySink for X11Overlay {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.ensure_attached()?;
        if self.text == text {
            return Ok(());
        }
        let resized = self.text.len() != text.len();
        self.text = text.to_string();
        if resized {
            self.relayout()?;
        }
        self.draw()
    }

    fn set_text_color(&mut self, color: Color) -> Result<()> {
        self.ensure_attached()?;
        if self.text_color != color {
            self.text_color = color;
            self.draw()?;
        }
        Ok(())
    }

    fn set_background_color(&mut self, color: Color) -> Result<()> {
        self.ensure_attached()?;
        if self.background != color {
            self.background = color;
            self.draw()?;
        }
        Ok(())
    }

    fn set_font_size(&mut self, size: u32) -> Result<()> {
        self.ensure_attached()?;
        if self.font_size == size {
            return Ok(());
        }
        self.conn
            .close_font(self.font)
            .context("Failed to close overlay font")?;
        Self::open_font(&self.conn, self.font, size)?;
        self.conn
            .change_gc(self.gc, &ChangeGCAux::new().font(self.font))
            .context("Failed to switch overlay font")?;
        self.font_size = size;
        self.refresh()
    }

    fn set_placement(&mut self, placement: Placement) -> Result<()> {
        self.ensure_attached()?;
        if self.placement == placement {
            return Ok(());
        }
        self.placement = placement;
        self.refresh()
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.ensure_attached()?;
        self.visible = visible;
        if visible && !self.mapped {
            self.relayout()?;
            self.conn
                .map_window(self.window)
                .context("Failed to map overlay window")?;
            self.mapped = true;
            debug!(window = self.window, "Mapped overlay window");
            self.draw()?;
        } else if !visible && self.mapped {
            self.conn
                .unmap_window(self.window)
                .context("Failed to unmap overlay window")?;
            self.mapped = false;
            self.conn.flush().context("Failed to flush X11 connection")?;
            debug!(window = self.window, "Unmapped overlay window");
        }
        Ok(())
    }

    fn origin(&self) -> Option<Point> {
        (!self.detached).then_some(self.origin)
    }

    fn is_permitted(&self) -> bool {
        !self.detached
    }

    fn redraw(&mut self) -> Result<()> {
        self.ensure_attached()?;
        self.draw()
    }

    fn detach(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        self.detached = true;
        self.conn
            .free_gc(self.gc)
            .context("Failed to free overlay graphics context")?;
        self.conn
            .close_font(self.font)
            .context("Failed to close overlay font")?;
        self.conn
            .destroy_window(self.window)
            .context("Failed to destroy overlay window")?;
        self.conn.flush().context("Failed to flush X11 connection")?;
        info!(window = self.window, "Destroyed overlay window");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_name_carries_pixel_size() {
        assert_eq!(font_name(24), "-*-*-bold-r-normal--24-*-*-*-*-*-iso8859-1");
    }
}

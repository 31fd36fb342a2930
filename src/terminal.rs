// SPDX-License-Identifier: GPL-3.0-only

//! Terminal depth viewer
//!
//! Renders annotated frames to the terminal using Unicode half-block
//! characters for improved vertical resolution. The region of interest is
//! picked with the mouse: drag over the image, Enter confirms, Esc skips.

use crate::constants::display;
use crate::depth::Roi;
use crate::display::DisplaySurface;
use crate::errors::AppResult;
use crate::render::DisplayFrame;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use std::io::{self, Stdout, stdout};
use tracing::{debug, info, warn};

const SELECTION_COLOR: [u8; 3] = [0, 255, 0];
const SELECT_HELP: &str = "Drag to select region | Enter confirm | Esc skip | q quit";

/// Placement of an image inside a terminal area
///
/// Each cell shows two vertically stacked pixels of the scaled image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Cells covered by the image
    pub cells: Rect,
    pub image_width: u32,
    pub image_height: u32,
}

impl Viewport {
    /// Fit an image into `area` keeping its aspect ratio, centered
    pub fn fit(image_width: u32, image_height: u32, area: Rect) -> Option<Self> {
        if image_width == 0 || image_height == 0 || area.width == 0 || area.height == 0 {
            return None;
        }

        let frame_aspect = image_width as f64 / image_height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height as f64) * 2.0;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let w = term_height * frame_aspect;
            (w as u16, (term_height / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let h = term_width / frame_aspect;
            (term_width as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return None;
        }

        Some(Self {
            cells: Rect {
                x: area.x + (area.width - display_width) / 2,
                y: area.y + (area.height - display_height) / 2,
                width: display_width,
                height: display_height,
            },
            image_width,
            image_height,
        })
    }

    fn x_scale(&self) -> f64 {
        self.image_width as f64 / self.cells.width as f64
    }

    fn y_scale(&self) -> f64 {
        self.image_height as f64 / (self.cells.height as f64 * 2.0)
    }

    /// Pixels sampled for the upper and lower half of a cell
    fn sample_points(&self, tx: u16, ty: u16) -> (u32, u32, u32) {
        let x = ((tx as f64 * self.x_scale()) as u32).min(self.image_width - 1);
        let top = ((ty as f64 * 2.0 * self.y_scale()) as u32).min(self.image_height - 1);
        let bottom = (((ty as f64 * 2.0 + 1.0) * self.y_scale()) as u32).min(self.image_height - 1);
        (x, top, bottom)
    }

    /// Image pixels covered by a terminal cell, `None` outside the image
    pub fn cell_span(&self, column: u16, row: u16) -> Option<Roi> {
        if column < self.cells.x
            || row < self.cells.y
            || column >= self.cells.x + self.cells.width
            || row >= self.cells.y + self.cells.height
        {
            return None;
        }

        let tx = (column - self.cells.x) as f64;
        let ty = (row - self.cells.y) as f64;
        let x0 = (tx * self.x_scale()) as u32;
        let x1 = (((tx + 1.0) * self.x_scale()) as u32).clamp(x0 + 1, self.image_width);
        let y0 = (ty * 2.0 * self.y_scale()) as u32;
        let y1 = (((ty + 1.0) * 2.0 * self.y_scale()) as u32).clamp(y0 + 1, self.image_height);
        Some(Roi::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Nearest cell for an image pixel
    pub fn pixel_to_cell(&self, x: u32, y: u32) -> (u16, u16) {
        let tx = ((x as f64 / self.x_scale()) as u16).min(self.cells.width - 1);
        let ty = ((y as f64 / (2.0 * self.y_scale())) as u16).min(self.cells.height - 1);
        (self.cells.x + tx, self.cells.y + ty)
    }

    /// Pixel rectangle spanned by a drag between two cells (both included)
    pub fn selection(&self, anchor: (u16, u16), current: (u16, u16)) -> Option<Roi> {
        let a = self.cell_span(anchor.0, anchor.1)?;
        let b = self.cell_span(current.0, current.1)?;
        Some(Roi::from_corners(
            (a.x.min(b.x), a.y.min(b.y)),
            (a.right().max(b.right()), a.bottom().max(b.bottom())),
        ))
    }
}

/// Widget that renders an RGB image using half-block characters
struct FrameWidget<'a> {
    image: &'a RgbImage,
    viewport: Option<Viewport>,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(viewport) = self.viewport else {
            let msg = "Waiting for depth frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..viewport.cells.height {
            for tx in 0..viewport.cells.width {
                let (x, top, bottom) = viewport.sample_points(tx, ty);
                let Some(cell) = buf.cell_mut((viewport.cells.x + tx, viewport.cells.y + ty))
                else {
                    continue;
                };
                cell.set_char('▀');
                cell.set_fg(rgb(self.image.get_pixel(x, top)));
                cell.set_bg(rgb(self.image.get_pixel(x, bottom)));
            }
        }
    }
}

fn rgb(pixel: &Rgb<u8>) -> Color {
    let [r, g, b] = pixel.0;
    Color::Rgb(r, g, b)
}

/// Index labels and frame counter for frames without burned-in text
struct LabelOverlay<'a> {
    frame: &'a DisplayFrame,
    viewport: Viewport,
}

impl Widget for LabelOverlay<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [r, g, b] = display::LABEL_COLOR;
        let style = Style::default().fg(Color::Rgb(r, g, b)).bg(Color::Black);
        let right = area.x + area.width;

        let mut put = |column: u16, row: u16, text: &str| {
            if column < right && row < area.y + area.height {
                let room = (right - column) as usize;
                let text: String = text.chars().take(room).collect();
                buf.set_string(column, row, text, style);
            }
        };

        for (index, candidate) in self.frame.candidates.iter().enumerate() {
            let (column, row) = self.viewport.pixel_to_cell(candidate.rect.x, candidate.rect.y);
            put(column, row.saturating_sub(1).max(self.viewport.cells.y), &index.to_string());
        }
        put(
            self.viewport.cells.x,
            self.viewport.cells.y,
            &self.frame.frame_counter.to_string(),
        );
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

/// Split the screen into image area and a one-line status bar
fn split_status(area: Rect) -> (Rect, Rect) {
    let image_area = Rect {
        height: area.height.saturating_sub(1),
        ..area
    };
    let status_area = Rect {
        y: area.y + area.height.saturating_sub(1),
        height: area.height.min(1),
        ..area
    };
    (image_area, status_area)
}

fn is_quit_key(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('q')
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// First character key press in `events`
///
/// Mouse, resize, release and non-character key events are consumed and
/// skipped. A quit key sets `quit` and ends the scan.
fn next_char_key(
    events: &mut impl Iterator<Item = io::Result<Event>>,
    quit: &mut bool,
) -> io::Result<Option<char>> {
    for event in events {
        if let Event::Key(key) = event?
            && key.kind == KeyEventKind::Press
        {
            if is_quit_key(&key) {
                *quit = true;
                return Ok(None);
            }
            if let KeyCode::Char(c) = key.code {
                return Ok(Some(c));
            }
        }
    }
    Ok(None)
}

/// Enter the alternate screen and build the terminal once raw mode is on
///
/// `restore` runs if any step fails, since no surface exists yet to drop.
fn finish_setup<W: io::Write>(
    mut out: W,
    restore: impl FnOnce(),
) -> io::Result<Terminal<CrosstermBackend<W>>> {
    execute!(out, EnterAlternateScreen, EnableMouseCapture)
        .and_then(|()| Terminal::new(CrosstermBackend::new(out)))
        .inspect_err(|_| restore())
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        warn!(error = %e, "Failed to leave raw mode");
    }
    if let Err(e) = execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen) {
        warn!(error = %e, "Failed to restore terminal screen");
    }
}

/// Full-screen terminal surface
///
/// Raw mode, the alternate screen and mouse capture are restored when the
/// surface is dropped.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    quit: bool,
}

impl TerminalSurface {
    pub fn new() -> AppResult<Self> {
        enable_raw_mode()?;
        let terminal = finish_setup(stdout(), restore_terminal)?;
        info!("Terminal viewer started");

        Ok(Self {
            terminal,
            quit: false,
        })
    }

    fn draw(
        &mut self,
        frame: &DisplayFrame,
        image: &RgbImage,
        status: &str,
    ) -> io::Result<Option<Viewport>> {
        let mut viewport = None;
        self.terminal.draw(|f| {
            let (image_area, status_area) = split_status(f.area());
            viewport = Viewport::fit(image.width(), image.height(), image_area);

            f.render_widget(FrameWidget { image, viewport }, image_area);
            if let Some(viewport) = viewport
                && !frame.labels_burned
            {
                f.render_widget(LabelOverlay { frame, viewport }, image_area);
            }
            f.render_widget(StatusBar { message: status }, status_area);
        })?;
        Ok(viewport)
    }
}

impl DisplaySurface for TerminalSurface {
    fn present(&mut self, frame: &DisplayFrame, status: &str) -> AppResult<()> {
        self.draw(frame, &frame.image, status)?;
        Ok(())
    }

    fn poll_key(&mut self) -> AppResult<Option<char>> {
        let mut pending = std::iter::from_fn(|| match event::poll(display::KEY_POLL_INTERVAL) {
            Ok(true) => Some(event::read()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        });
        Ok(next_char_key(&mut pending, &mut self.quit)?)
    }

    fn select_region(&mut self, frame: &DisplayFrame) -> AppResult<Option<Roi>> {
        let mut anchor: Option<(u16, u16)> = None;
        let mut current: Option<(u16, u16)> = None;

        loop {
            let mut image = frame.image.clone();
            let viewport = Viewport::fit(image.width(), image.height(), {
                let size = self.terminal.size()?;
                split_status(Rect::new(0, 0, size.width, size.height)).0
            });
            let selection = match (viewport, anchor, current) {
                (Some(viewport), Some(a), Some(c)) => viewport.selection(a, c),
                _ => None,
            };
            if let Some(roi) = selection {
                draw_hollow_rect_mut(
                    &mut image,
                    imageproc::rect::Rect::at(roi.x as i32, roi.y as i32)
                        .of_size(roi.width, roi.height),
                    Rgb(SELECTION_COLOR),
                );
            }

            let status = match selection {
                Some(roi) => format!("{} | {}", roi, SELECT_HELP),
                None => SELECT_HELP.to_string(),
            };
            let viewport = self.draw(frame, &image, &status)?;

            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if is_quit_key(&key) {
                        self.quit = true;
                        return Ok(None);
                    }
                    match key.code {
                        KeyCode::Enter => {
                            debug!(?selection, "Region selection confirmed");
                            return Ok(selection);
                        }
                        KeyCode::Esc => {
                            debug!("Region selection skipped");
                            return Ok(None);
                        }
                        _ => {}
                    }
                }
                Event::Mouse(mouse) => {
                    let cell = (mouse.column, mouse.row);
                    let inside = viewport
                        .is_some_and(|v| v.cell_span(mouse.column, mouse.row).is_some());
                    match mouse.kind {
                        MouseEventKind::Down(MouseButton::Left) if inside => {
                            anchor = Some(cell);
                            current = Some(cell);
                        }
                        MouseEventKind::Drag(MouseButton::Left)
                        | MouseEventKind::Up(MouseButton::Left)
                            if inside && anchor.is_some() =>
                        {
                            current = Some(cell);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    fn should_quit(&self) -> bool {
        self.quit
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        restore_terminal();
        let _ = self.terminal.show_cursor();
        info!("Terminal viewer stopped");
    }
}

//! Editor state adapter.
//!
//! The engine never knows how text reaches the screen. It talks to the
//! mounted editor through [`EditorAdapter`], which normalizes both document
//! kinds to one [`EditorSnapshot`] shape:
//!
//! - [`SourceEditor`] wraps a line/column addressed [`SourceSurface`]
//!   (plain text and code)
//! - [`RichEditor`] wraps a caret-offset addressed [`RichSurface`]
//!   (structured/rich rendering of the same text)
//!
//! Restores are clamped to the current document: a cursor past the last line
//! lands on the last line, a column past the end of a line lands at its end,
//! and scroll offsets are held inside `[0, extent]`.

mod buffer;

use serde::{Deserialize, Serialize};

pub use buffer::{TextBuffer, TextBufferFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    #[default]
    Source,
    Rich,
}

impl EditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Source => "source",
            EditMode::Rich => "rich",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "source" => Some(EditMode::Source),
            "rich" => Some(EditMode::Rich),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffset {
    pub top: f64,
    pub left: f64,
}

/// Cursor, scroll and mode of an editor at one instant.
///
/// Captured fresh whenever state must survive the editor being destroyed and
/// recreated (reload, navigation, folder re-open).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub cursor_line: usize,
    pub cursor_column: usize,
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub mode: EditMode,
}

impl EditorSnapshot {
    pub fn cursor(&self) -> CursorPosition {
        CursorPosition {
            line: self.cursor_line,
            column: self.cursor_column,
        }
    }

    pub fn scroll(&self) -> ScrollOffset {
        ScrollOffset {
            top: self.scroll_top,
            left: self.scroll_left,
        }
    }
}

/// The mounted editor, whatever its kind.
pub trait EditorAdapter: Send {
    fn mode(&self) -> EditMode;

    /// False until the underlying component can be queried and mutated.
    fn is_ready(&self) -> bool;

    fn content(&self) -> String;

    fn replace_content(&mut self, content: &str);

    fn capture(&self) -> EditorSnapshot;

    /// Applies `snapshot` clamped to the current document and returns what was applied.
    fn restore(&mut self, snapshot: &EditorSnapshot) -> EditorSnapshot;

    fn focus(&mut self);

    fn destroy(&mut self);
}

/// Creates editors for freshly opened documents.
pub trait EditorFactory: Send {
    fn create(&self, mode: EditMode, content: &str) -> Box<dyn EditorAdapter>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Component contracts
// ═══════════════════════════════════════════════════════════════════════════════

/// A line/column addressed editor component.
pub trait SourceSurface: Send {
    fn is_ready(&self) -> bool {
        true
    }

    fn content(&self) -> String;

    fn set_content(&mut self, content: &str);

    fn cursor(&self) -> CursorPosition;

    fn set_cursor(&mut self, line: usize, column: usize);

    fn scroll_offset(&self) -> ScrollOffset;

    fn set_scroll_offset(&mut self, offset: ScrollOffset);

    /// Largest scroll offsets the current document allows.
    fn scroll_extent(&self) -> ScrollOffset;

    fn focus(&mut self);

    fn destroy(&mut self);
}

/// A rich-text component addressed by character offset into its text, with
/// vertical scrolling only.
pub trait RichSurface: Send {
    fn is_ready(&self) -> bool {
        true
    }

    fn content(&self) -> String;

    fn set_content(&mut self, content: &str);

    fn caret_offset(&self) -> usize;

    fn set_caret_offset(&mut self, offset: usize);

    fn scroll_top(&self) -> f64;

    fn set_scroll_top(&mut self, top: f64);

    fn max_scroll_top(&self) -> f64;

    fn focus(&mut self);

    fn destroy(&mut self);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Clamping
// ═══════════════════════════════════════════════════════════════════════════════

fn line_lengths(content: &str) -> Vec<usize> {
    content.split('\n').map(|line| line.chars().count()).collect()
}

/// Clamps a cursor into `content`. Never fails, even on empty content.
pub fn clamp_cursor(content: &str, line: usize, column: usize) -> CursorPosition {
    let lengths = line_lengths(content);
    let last_line = lengths.len().saturating_sub(1);
    let line = line.min(last_line);
    let column = column.min(lengths.get(line).copied().unwrap_or(0));
    CursorPosition { line, column }
}

pub fn clamp_scroll(value: f64, extent: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        return 0.0;
    }
    let extent = if extent.is_finite() { extent.max(0.0) } else { 0.0 };
    value.min(extent)
}

/// Character offset of a line/column position in `content`.
pub fn offset_of(content: &str, position: CursorPosition) -> usize {
    let clamped = clamp_cursor(content, position.line, position.column);
    let preceding: usize = content
        .split('\n')
        .take(clamped.line)
        .map(|line| line.chars().count() + 1)
        .sum();
    preceding + clamped.column
}

/// Line/column position of a character offset in `content`.
pub fn position_of(content: &str, offset: usize) -> CursorPosition {
    let mut remaining = offset;
    let lengths = line_lengths(content);
    for (line, len) in lengths.iter().enumerate() {
        if remaining <= *len {
            return CursorPosition {
                line,
                column: remaining,
            };
        }
        remaining -= len + 1;
    }
    let last = lengths.len().saturating_sub(1);
    CursorPosition {
        line: last,
        column: lengths.get(last).copied().unwrap_or(0),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Adapters
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SourceEditor<S> {
    surface: S,
}

impl<S: SourceSurface> SourceEditor<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S: SourceSurface> EditorAdapter for SourceEditor<S> {
    fn mode(&self) -> EditMode {
        EditMode::Source
    }

    fn is_ready(&self) -> bool {
        self.surface.is_ready()
    }

    fn content(&self) -> String {
        self.surface.content()
    }

    fn replace_content(&mut self, content: &str) {
        self.surface.set_content(content);
    }

    fn capture(&self) -> EditorSnapshot {
        let cursor = self.surface.cursor();
        let scroll = self.surface.scroll_offset();
        EditorSnapshot {
            cursor_line: cursor.line,
            cursor_column: cursor.column,
            scroll_top: scroll.top,
            scroll_left: scroll.left,
            mode: EditMode::Source,
        }
    }

    fn restore(&mut self, snapshot: &EditorSnapshot) -> EditorSnapshot {
        let content = self.surface.content();
        let cursor = clamp_cursor(&content, snapshot.cursor_line, snapshot.cursor_column);
        let extent = self.surface.scroll_extent();
        let scroll = ScrollOffset {
            top: clamp_scroll(snapshot.scroll_top, extent.top),
            left: clamp_scroll(snapshot.scroll_left, extent.left),
        };
        self.surface.set_cursor(cursor.line, cursor.column);
        self.surface.set_scroll_offset(scroll);
        EditorSnapshot {
            cursor_line: cursor.line,
            cursor_column: cursor.column,
            scroll_top: scroll.top,
            scroll_left: scroll.left,
            mode: EditMode::Source,
        }
    }

    fn focus(&mut self) {
        self.surface.focus();
    }

    fn destroy(&mut self) {
        self.surface.destroy();
    }
}

pub struct RichEditor<R> {
    surface: R,
}

impl<R: RichSurface> RichEditor<R> {
    pub fn new(surface: R) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }
}

impl<R: RichSurface> EditorAdapter for RichEditor<R> {
    fn mode(&self) -> EditMode {
        EditMode::Rich
    }

    fn is_ready(&self) -> bool {
        self.surface.is_ready()
    }

    fn content(&self) -> String {
        self.surface.content()
    }

    fn replace_content(&mut self, content: &str) {
        self.surface.set_content(content);
    }

    fn capture(&self) -> EditorSnapshot {
        let cursor = position_of(&self.surface.content(), self.surface.caret_offset());
        EditorSnapshot {
            cursor_line: cursor.line,
            cursor_column: cursor.column,
            scroll_top: self.surface.scroll_top(),
            scroll_left: 0.0,
            mode: EditMode::Rich,
        }
    }

    fn restore(&mut self, snapshot: &EditorSnapshot) -> EditorSnapshot {
        let content = self.surface.content();
        let cursor = clamp_cursor(&content, snapshot.cursor_line, snapshot.cursor_column);
        let top = clamp_scroll(snapshot.scroll_top, self.surface.max_scroll_top());
        self.surface.set_caret_offset(offset_of(&content, cursor));
        self.surface.set_scroll_top(top);
        EditorSnapshot {
            cursor_line: cursor.line,
            cursor_column: cursor.column,
            scroll_top: top,
            scroll_left: 0.0,
            mode: EditMode::Rich,
        }
    }

    fn focus(&mut self) {
        self.surface.focus();
    }

    fn destroy(&mut self) {
        self.surface.destroy();
    }
}

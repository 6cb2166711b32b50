//! Headless editor component.
//!
//! Holds text, a cursor and a scroll position without rendering anything.
//! Scroll offsets are measured in lines (vertical) and characters
//! (horizontal). Replacing the content resets cursor and scroll to the top,
//! as a real component does when its document is swapped.

use super::{
    clamp_cursor, offset_of, position_of, CursorPosition, EditMode, EditorAdapter, EditorFactory,
    RichEditor, RichSurface, ScrollOffset, SourceEditor, SourceSurface,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TextBuffer {
    content: String,
    cursor: CursorPosition,
    scroll: ScrollOffset,
    ready: bool,
    focused: bool,
    destroyed: bool,
}

impl TextBuffer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            cursor: CursorPosition::default(),
            scroll: ScrollOffset::default(),
            ready: true,
            focused: false,
            destroyed: false,
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn line_count(&self) -> usize {
        self.content.split('\n').count()
    }

    /// Inserts `text` at the cursor and moves the cursor past it.
    pub fn insert(&mut self, text: &str) {
        let offset = offset_of(&self.content, self.cursor);
        let byte_index = self
            .content
            .char_indices()
            .nth(offset)
            .map(|(index, _)| index)
            .unwrap_or(self.content.len());
        self.content.insert_str(byte_index, text);
        self.cursor = position_of(&self.content, offset + text.chars().count());
    }
}

impl SourceSurface for TextBuffer {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.cursor = CursorPosition::default();
        self.scroll = ScrollOffset::default();
    }

    fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    fn set_cursor(&mut self, line: usize, column: usize) {
        self.cursor = clamp_cursor(&self.content, line, column);
    }

    fn scroll_offset(&self) -> ScrollOffset {
        self.scroll
    }

    fn set_scroll_offset(&mut self, offset: ScrollOffset) {
        self.scroll = offset;
    }

    fn scroll_extent(&self) -> ScrollOffset {
        let widest = self
            .content
            .split('\n')
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        ScrollOffset {
            top: self.line_count().saturating_sub(1) as f64,
            left: widest as f64,
        }
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.focused = false;
    }
}

impl RichSurface for TextBuffer {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, content: &str) {
        SourceSurface::set_content(self, content);
    }

    fn caret_offset(&self) -> usize {
        offset_of(&self.content, self.cursor)
    }

    fn set_caret_offset(&mut self, offset: usize) {
        self.cursor = position_of(&self.content, offset);
    }

    fn scroll_top(&self) -> f64 {
        self.scroll.top
    }

    fn set_scroll_top(&mut self, top: f64) {
        self.scroll.top = top;
        self.scroll.left = 0.0;
    }

    fn max_scroll_top(&self) -> f64 {
        self.line_count().saturating_sub(1) as f64
    }

    fn focus(&mut self) {
        SourceSurface::focus(self);
    }

    fn destroy(&mut self) {
        SourceSurface::destroy(self);
    }
}

/// Builds [`TextBuffer`]-backed editors of either kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextBufferFactory;

impl EditorFactory for TextBufferFactory {
    fn create(&self, mode: EditMode, content: &str) -> Box<dyn EditorAdapter> {
        match mode {
            EditMode::Source => Box::new(SourceEditor::new(TextBuffer::new(content))),
            EditMode::Rich => Box::new(RichEditor::new(TextBuffer::new(content))),
        }
    }
}

/// Scroll position of the message pane, in rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    offset: u16,
    content: u16,
    viewport: u16,
}

impl ScrollState {
    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn content_height(&self) -> u16 {
        self.content
    }

    pub fn max_offset(&self) -> u16 {
        self.content.saturating_sub(self.viewport)
    }

    /// True when the last row is visible.
    pub fn is_pinned(&self) -> bool {
        self.offset >= self.max_offset()
    }

    /// Swap in new content. A pinned view stays pinned; otherwise the offset
    /// is kept (clamped to the new content), never reset to the top.
    pub fn replace_content(&mut self, content: u16) {
        let pinned = self.is_pinned();
        self.content = content;
        if pinned {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn resize_viewport(&mut self, viewport: u16) {
        let pinned = self.is_pinned();
        self.viewport = viewport;
        if pinned {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let target = (self.offset as i32 + delta).clamp(0, self.max_offset() as i32);
        self.offset = target as u16;
    }
}

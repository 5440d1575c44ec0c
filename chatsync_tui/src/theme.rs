use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    // Background colors
    pub bg_primary: Color,
    pub bg_secondary: Color,

    // Foreground colors
    pub fg_primary: Color,
    pub fg_secondary: Color,
    pub fg_own: Color,

    // Border colors
    pub border: Color,
    pub border_focused: Color,

    // Indicators
    pub online: Color,
    pub badge: Color,
    pub flash: Color,
    pub error: Color,
}

impl Theme {
    pub fn chatsync() -> Self {
        Self {
            bg_primary: Color::Rgb(30, 31, 38),
            bg_secondary: Color::Rgb(39, 40, 49),

            fg_primary: Color::Rgb(248, 248, 242),
            fg_secondary: Color::Rgb(139, 143, 150),
            fg_own: Color::Rgb(139, 233, 253),

            border: Color::Rgb(68, 71, 90),
            border_focused: Color::Rgb(139, 233, 253),

            online: Color::Rgb(80, 250, 123),
            badge: Color::Rgb(255, 85, 85),
            flash: Color::Rgb(241, 250, 140),
            error: Color::Rgb(255, 121, 198),
        }
    }

    pub fn input_style(&self) -> Style {
        Style::default().fg(self.fg_primary).bg(self.bg_secondary)
    }

    pub fn status_style(&self) -> Style {
        Style::default().fg(self.fg_secondary)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn border_focused_style(&self) -> Style {
        Style::default().fg(self.border_focused)
    }

    pub fn background_style(&self) -> Style {
        Style::default().bg(self.bg_primary)
    }

    pub fn text_style(&self) -> Style {
        Style::default().fg(self.fg_primary)
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.fg_secondary)
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.fg_primary).add_modifier(Modifier::BOLD)
    }

    pub fn heading_style(&self) -> Style {
        Style::default().fg(self.fg_secondary).add_modifier(Modifier::BOLD)
    }

    pub fn highlight_style(&self) -> Style {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    }

    pub fn presence_style(&self, online: bool) -> Style {
        if online {
            Style::default().fg(self.online)
        } else {
            Style::default().fg(self.fg_secondary)
        }
    }

    pub fn badge_style(&self) -> Style {
        Style::default()
            .fg(Color::White)
            .bg(self.badge)
            .add_modifier(Modifier::BOLD)
    }

    /// Lit phase of a flashing row.
    pub fn flash_style(&self) -> Style {
        Style::default().fg(self.bg_primary).bg(self.flash)
    }

    pub fn own_message_style(&self) -> Style {
        Style::default().fg(self.fg_own)
    }

    pub fn notice_style(&self) -> Style {
        Style::default().fg(self.flash)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }
}

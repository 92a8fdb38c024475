use ratatui::style::Color;

/// Colors used by the panes and the status bar (Oceanic Next).
pub struct Palette {
    pub background: Color,
    pub selection: Color,
    pub muted: Color,
    pub foreground: Color,
    pub heading: Color,
    pub revealed: Color,
    pub focused_border: Color,
    pub info: Color,
    pub warning: Color,
    pub error: Color,
}

static OCEANIC_NEXT: Palette = Palette {
    background: Color::Rgb(0x1B, 0x2B, 0x34),
    selection: Color::Rgb(0x4F, 0x5B, 0x66),
    muted: Color::Rgb(0x65, 0x73, 0x7E),
    foreground: Color::Rgb(0xC0, 0xC5, 0xCE),
    heading: Color::Rgb(0xFA, 0xC8, 0x63),
    revealed: Color::Rgb(0x5F, 0xB3, 0xB3),
    focused_border: Color::Rgb(0x66, 0x99, 0xCC),
    info: Color::Rgb(0x99, 0xC7, 0x94),
    warning: Color::Rgb(0xF9, 0x91, 0x57),
    error: Color::Rgb(0xEC, 0x5F, 0x67),
};

pub fn current_theme() -> &'static Palette {
    &OCEANIC_NEXT
}

use ratatui::style::{Color, Modifier, Style};

pub struct GaugeStyles {
    pub bar: Style,
    pub done: Style,
    pub error: Style,
}

impl Default for GaugeStyles {
    fn default() -> Self {
        Self {
            bar: Style::default().fg(Color::Cyan),
            done: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            error: Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::ITALIC),
        }
    }
}

use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Terminal styles keyed by what a value means in a scan report
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub warn: Style,
    pub info: Style,
    pub label: Style,
    pub used: Style,
    pub unused: Style,
    pub empty: Style,
}

impl Theme {
    pub fn detect() -> Self {
        let colors = console::Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none();
        if colors { Self::colored() } else { Self::plain() }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            label: Style::new().white().dimmed(),
            used: Style::new().green(),
            unused: Style::new().yellow(),
            empty: Style::new().bright_black(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            success: none,
            warn: none,
            info: none,
            label: none,
            used: none,
            unused: none,
            empty: none,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

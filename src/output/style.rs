//! Terminal colors for the human-readable report

use colored::*;
use std::io::IsTerminal;

/// Roles the report paints text in
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub label: Color,
    pub value: Color,
    pub separator: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            label: Color::Green,
            value: Color::Cyan,
            // xterm grayscale step 14 (palette index 246)
            separator: Color::TrueColor { r: 148, g: 148, b: 148 },
        }
    }
}

/// Applies a [`ColorScheme`], or nothing when colors are off
#[derive(Debug, Clone)]
pub struct Painter {
    enabled: bool,
    scheme: ColorScheme,
}

impl Painter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, scheme: ColorScheme::default() }
    }

    pub fn with_color_scheme(enabled: bool, scheme: ColorScheme) -> Self {
        Self { enabled, scheme }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.enabled {
            text.color(color)
        } else {
            text.normal()
        }
    }

    pub fn label(&self, text: &str) -> ColoredString {
        self.colorize(text, self.scheme.label)
    }

    pub fn value(&self, text: &str) -> ColoredString {
        self.colorize(text, self.scheme.value)
    }

    pub fn separator(&self, text: &str) -> ColoredString {
        self.colorize(text, self.scheme.separator)
    }
}

/// Whether stdout should receive ANSI colors
pub fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
        && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
        && std::io::stdout().is_terminal()
}

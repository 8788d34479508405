//! Theme and color definitions for rich output.

use crate::model::TestType;
use rich_rust::r#box::ROUNDED;
use rich_rust::prelude::*;

/// Foreground style for a named color; unknown names fall back to plain.
fn fg(name: &str) -> Style {
    Color::parse(name).map_or_else(|_| Style::new(), |color| Style::new().color(color))
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub success: Style,
    pub error: Style,
    pub warning: Style,
    pub info: Style,
    pub dimmed: Style,
    pub accent: Style,
    pub muted: Style,
    pub emphasis: Style,

    pub issue_key: Style,
    pub summary: Style,

    pub status_todo: Style,
    pub status_in_progress: Style,
    pub status_done: Style,

    pub type_manual: Style,
    pub type_generic: Style,
    pub type_cucumber: Style,

    pub table_header: Style,
    pub table_border: Style,
    pub panel_title: Style,
    pub panel_border: Style,
    pub label: Style,
    pub username: Style,

    pub box_style: &'static BoxChars,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: fg("green").bold(),
            error: fg("red").bold(),
            warning: fg("yellow").bold(),
            info: fg("blue"),
            dimmed: Style::new().dim(),
            accent: fg("cyan"),
            muted: fg("bright_black"),
            emphasis: Style::new().bold(),

            issue_key: fg("cyan").bold(),
            summary: Style::new().bold(),

            status_todo: fg("green"),
            status_in_progress: fg("yellow").bold(),
            status_done: fg("bright_black"),

            type_manual: fg("blue"),
            type_generic: fg("magenta"),
            type_cucumber: fg("green"),

            table_header: Style::new().bold(),
            table_border: fg("bright_black"),
            panel_title: Style::new().bold(),
            panel_border: fg("bright_black"),
            label: fg("cyan").dim(),
            username: fg("green"),

            box_style: &ROUNDED,
        }
    }
}

impl Theme {
    /// Jira statuses are free text; group them by common workflow names.
    #[must_use]
    pub fn status_style(&self, status: &str) -> Style {
        match status.to_ascii_lowercase().as_str() {
            "done" | "closed" | "resolved" => self.status_done.clone(),
            "in progress" | "in review" | "in test" => self.status_in_progress.clone(),
            "" => self.muted.clone(),
            _ => self.status_todo.clone(),
        }
    }

    #[must_use]
    pub fn type_style(&self, test_type: TestType) -> Style {
        match test_type {
            TestType::Manual => self.type_manual.clone(),
            TestType::Generic => self.type_generic.clone(),
            TestType::Cucumber => self.type_cucumber.clone(),
        }
    }
}

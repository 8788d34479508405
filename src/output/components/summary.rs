use crate::output::{OutputContext, Theme};
use rich_rust::prelude::*;

/// Label/value pairs rendered as a small bordered table.
pub struct SummaryPanel<'a> {
    title: String,
    entries: Vec<(String, String, Style)>,
    theme: &'a Theme,
}

impl<'a> SummaryPanel<'a> {
    pub fn new(title: impl Into<String>, theme: &'a Theme) -> Self {
        Self {
            title: title.into(),
            entries: vec![],
            theme,
        }
    }

    pub fn add(&mut self, label: impl Into<String>, value: impl ToString, style: Style) -> &mut Self {
        self.entries.push((label.into(), value.to_string(), style));
        self
    }

    /// Add an entry in the theme's label style.
    pub fn entry(&mut self, label: impl Into<String>, value: impl ToString) -> &mut Self {
        let style = self.theme.label.clone();
        self.add(label, value, style)
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, String, Style)] {
        &self.entries
    }

    #[must_use]
    pub fn build(&self) -> Table {
        let mut table = Table::new()
            .box_style(self.theme.box_style)
            .border_style(self.theme.panel_border.clone())
            .title(Text::styled(&self.title, self.theme.panel_title.clone()));

        table = table
            .with_column(Column::new("Item").min_width(18))
            .with_column(Column::new("Value").justify(JustifyMethod::Right).min_width(6));

        for (label, value, style) in &self.entries {
            table.add_row(Row::new(vec![
                Cell::new(Text::styled(label, style.clone())),
                Cell::new(Text::new(value)),
            ]));
        }

        table
    }

    /// Render as a table in rich mode, as aligned lines in plain mode.
    pub fn show(&self, ctx: &OutputContext) {
        if ctx.is_rich() {
            ctx.render(&self.build());
        } else if ctx.is_plain() {
            self.print_plain();
        }
    }

    /// Plain `label: value` lines for non-rich modes.
    pub fn print_plain(&self) {
        println!("{}", self.title);
        let width = self.entries.iter().map(|(label, _, _)| label.len()).max().unwrap_or(0);
        for (label, value, _) in &self.entries {
            println!("  {label:<width$}  {value}");
        }
    }
}

use crate::catalog::CatalogRow;
use crate::output::Theme;
use rich_rust::prelude::*;
use rich_rust::renderables::Cell;

const SUMMARY_WIDTH: usize = 60;

/// Renders catalog rows as a table.
pub struct CatalogTable<'a> {
    rows: &'a [CatalogRow],
    theme: &'a Theme,
    columns: CatalogColumns,
    title: Option<String>,
}

#[derive(Default, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct CatalogColumns {
    pub index: bool,
    pub key: bool,
    pub test_type: bool,
    pub summary: bool,
    pub status: bool,
    pub steps: bool,
    pub assignee: bool,
    pub reporter: bool,
    pub preconditions: bool,
    pub dataset: bool,
}

impl CatalogColumns {
    #[must_use]
    pub fn standard() -> Self {
        Self {
            index: true,
            key: true,
            test_type: true,
            summary: true,
            status: true,
            steps: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn full() -> Self {
        Self {
            index: true,
            key: true,
            test_type: true,
            summary: true,
            status: true,
            steps: true,
            assignee: true,
            reporter: true,
            preconditions: true,
            dataset: true,
        }
    }
}

impl<'a> CatalogTable<'a> {
    #[must_use]
    pub fn new(rows: &'a [CatalogRow], theme: &'a Theme) -> Self {
        Self {
            rows,
            theme,
            columns: CatalogColumns::standard(),
            title: None,
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: CatalogColumns) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn build(&self) -> Table {
        let mut table = Table::new()
            .box_style(self.theme.box_style)
            .border_style(self.theme.table_border.clone())
            .header_style(self.theme.table_header.clone());

        if let Some(ref title) = self.title {
            table = table.title(Text::new(title));
        }

        let c = &self.columns;
        if c.index {
            table = table.with_column(Column::new("#").justify(JustifyMethod::Right).width(5));
        }
        if c.key {
            table = table.with_column(Column::new("Key").min_width(10));
        }
        if c.test_type {
            table = table.with_column(Column::new("Type").min_width(8));
        }
        if c.summary {
            table = table.with_column(Column::new("Summary").min_width(20).max_width(SUMMARY_WIDTH));
        }
        if c.status {
            table = table.with_column(Column::new("Status").min_width(8));
        }
        if c.steps {
            table = table.with_column(Column::new("Steps").justify(JustifyMethod::Right).width(5));
        }
        if c.assignee {
            table = table.with_column(Column::new("Assignee").max_width(20));
        }
        if c.reporter {
            table = table.with_column(Column::new("Reporter").max_width(20));
        }
        if c.preconditions {
            table = table.with_column(Column::new("Pre").justify(JustifyMethod::Right).width(4));
        }
        if c.dataset {
            table = table.with_column(Column::new("Data").justify(JustifyMethod::Center).width(4));
        }

        for row in self.rows {
            let mut cells: Vec<Cell> = vec![];

            if c.index {
                cells.push(Cell::new(Text::new(row.index.to_string())).style(self.theme.muted.clone()));
            }
            if c.key {
                let key = if row.key.is_empty() { "-" } else { row.key.as_str() };
                cells.push(Cell::new(Text::new(key)).style(self.theme.issue_key.clone()));
            }
            if c.test_type {
                cells.push(
                    Cell::new(Text::new(row.test_type.as_str()))
                        .style(self.theme.type_style(row.test_type)),
                );
            }
            if c.summary {
                let summary = crate::format::truncate_text(&row.summary, SUMMARY_WIDTH);
                cells.push(Cell::new(Text::new(summary)).style(self.theme.summary.clone()));
            }
            if c.status {
                cells.push(
                    Cell::new(Text::new(&row.status)).style(self.theme.status_style(&row.status)),
                );
            }
            if c.steps {
                cells.push(Cell::new(Text::new(row.step_count.to_string())));
            }
            if c.assignee {
                cells.push(Cell::new(Text::new(&row.assignee)).style(self.theme.username.clone()));
            }
            if c.reporter {
                cells.push(Cell::new(Text::new(&row.reporter)).style(self.theme.username.clone()));
            }
            if c.preconditions {
                cells.push(Cell::new(Text::new(row.preconditions.to_string())));
            }
            if c.dataset {
                let mark = if row.has_dataset { "✓" } else { "" };
                cells.push(Cell::new(Text::new(mark)).style(self.theme.accent.clone()));
            }

            table.add_row(Row::new(cells));
        }

        table
    }
}

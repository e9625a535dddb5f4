use anyhow::Result;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use crossterm::style::Stylize;
use std::path::Path;

use crate::data::renderer::Renderer;
use crate::data::row::{column_names, CellValue, Row};
use crate::data::tabular_view::{SortOrder, ViewState};
use crate::session::{row_actions, ActorContext};

const ACTIONS_HEADER: &str = "actions";

/// Display text for one cell. Account status flags read as words.
pub fn format_cell(column: &str, value: Option<&CellValue>) -> String {
    match value {
        None => String::new(),
        Some(v) if column == "is_active" => match v.as_bool() {
            Some(true) => "Active".to_string(),
            Some(false) => "Inactive".to_string(),
            None => v.to_string(),
        },
        Some(v) => v.to_string(),
    }
}

/// Build a table for `rows`. When `actor` is given an extra column lists
/// the management actions that actor may take on each row.
pub fn build_table(rows: &[Row], actor: Option<&ActorContext>) -> Table {
    let columns = column_names(rows);

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut headers: Vec<Cell> = columns
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect();
    if actor.is_some() {
        headers.push(Cell::new(ACTIONS_HEADER).add_attribute(Attribute::Bold));
    }
    table.set_header(headers);

    for row in rows {
        let mut cells: Vec<Cell> = columns
            .iter()
            .map(|column| {
                let text = format_cell(column, row.get(column));
                match text.as_str() {
                    "Active" => Cell::new(text).fg(Color::Green),
                    "Inactive" => Cell::new(text).fg(Color::Red),
                    _ => Cell::new(text),
                }
            })
            .collect();
        if let Some(actor) = actor {
            let labels = row_actions(row, actor).labels();
            let text = if labels.is_empty() {
                "-".to_string()
            } else {
                labels.join(", ")
            };
            cells.push(Cell::new(text));
        }
        table.add_row(cells);
    }
    table
}

/// One-line summary of the view state shown under a table
pub fn describe_state(state: &ViewState) -> String {
    let mut parts = vec![format!("page {}", state.page)];
    if let Some(sort) = &state.sort {
        let arrow = match sort.order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        parts.push(format!("sorted by {} {}", sort.column, arrow));
    }
    if !state.filter.is_empty() {
        parts.push(format!(
            "filter '{}' on {}",
            state.filter.text(),
            state.filter.fields().join(",")
        ));
    }
    if let Some(scope) = &state.scope {
        parts.push(format!("scope {}", scope.keywords.join("|")));
    }
    parts.join(" | ")
}

/// Prints every update of a view to stdout
pub struct TableRenderer {
    actor: Option<ActorContext>,
}

impl TableRenderer {
    pub fn new() -> Self {
        Self { actor: None }
    }

    /// Add the per-row actions column for `actor`
    pub fn with_actions(actor: ActorContext) -> Self {
        Self { actor: Some(actor) }
    }
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TableRenderer {
    fn draw(&self, rows: &[Row], state: &ViewState) {
        if rows.is_empty() {
            println!("{}", "No matching rows.".yellow());
        } else {
            println!("{}", build_table(rows, self.actor.as_ref()));
        }
        println!("{}", describe_state(state).dark_grey());
    }
}

/// Write rows to a CSV file, returning the number of records written
pub fn export_rows_to_csv(rows: &[Row], path: &Path) -> Result<usize> {
    let columns = column_names(rows);
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(column).map(ToString::to_string).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::FilterSpec;
    use crate::data::tabular_view::SortSpec;
    use crate::session::Role;

    fn users() -> Vec<Row> {
        vec![
            Row::new("1")
                .with("id", 1)
                .with("email", "root@x.com")
                .with("role", "admin")
                .with("is_active", 1),
            Row::new("2")
                .with("id", 2)
                .with("email", "b@x.com")
                .with("role", "user")
                .with("is_active", false),
        ]
    }

    #[test]
    fn test_status_flag_as_words() {
        assert_eq!(format_cell("is_active", Some(&CellValue::from(1))), "Active");
        assert_eq!(format_cell("is_active", Some(&CellValue::from(false))), "Inactive");
        assert_eq!(format_cell("email", None), "");
    }

    #[test]
    fn test_actions_column_follows_policy() {
        let admin = ActorContext::new("1", Role::Admin);
        let rendered = build_table(&users(), Some(&admin)).to_string();
        assert!(rendered.contains("actions"));
        assert!(rendered.contains("activate, deactivate, delete"));
    }

    #[test]
    fn test_describe_state() {
        let state = ViewState {
            page: 2,
            page_size: 10,
            sort: Some(SortSpec {
                column: "email".to_string(),
                order: SortOrder::Descending,
            }),
            filter: FilterSpec::new("x.com", ["email"]),
            scope: None,
        };
        assert_eq!(
            describe_state(&state),
            "page 2 | sorted by email desc | filter 'x.com' on email"
        );
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        assert_eq!(export_rows_to_csv(&users(), &path).unwrap(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("id,email,role,is_active"));
        assert_eq!(lines.next(), Some("1,root@x.com,admin,1"));
        assert_eq!(lines.next(), Some("2,b@x.com,user,false"));
    }
}

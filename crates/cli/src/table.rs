// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text tables with colored cells.
//!
//! Widths are measured on the raw cell text; color is applied after padding
//! so escape codes never skew alignment.

use std::io::Write;

use crate::color;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    Plain,
    Muted,
    Status,
}

pub struct Column {
    name: &'static str,
    style: Style,
    max: Option<usize>,
}

impl Column {
    pub fn left(name: &'static str) -> Self {
        Self { name, style: Style::Plain, max: None }
    }

    /// Secondary column such as an id.
    pub fn muted(name: &'static str) -> Self {
        Self { name, style: Style::Muted, max: None }
    }

    /// Cells are colored by [`color::status`].
    pub fn status(name: &'static str) -> Self {
        Self { name, style: Style::Status, max: None }
    }

    /// Truncate cells longer than `max` characters.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    fn fit(&self, cell: &str) -> String {
        match self.max {
            Some(max) if cell.chars().count() > max => {
                let kept: String = cell.chars().take(max.saturating_sub(1)).collect();
                format!("{kept}…")
            }
            _ => cell.to_string(),
        }
    }

    fn paint(&self, cell: &str) -> String {
        match self.style {
            Style::Plain => cell.to_string(),
            Style::Muted => color::muted(cell),
            Style::Status => color::status(cell.trim_end()),
        }
    }
}

pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        let fitted = self
            .columns
            .iter()
            .zip(cells.iter().map(String::as_str).chain(std::iter::repeat("")))
            .map(|(col, cell)| col.fit(cell))
            .collect();
        self.rows.push(fitted);
    }

    pub fn render(&self, out: &mut (impl Write + ?Sized)) {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(col.name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let last = self.columns.len().saturating_sub(1);
        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| pad(col.name, widths[i], i == last))
            .collect();
        let _ = writeln!(out, "{}", color::header(&header.join("  ")));

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .enumerate()
                .map(|(i, col)| col.paint(&pad(&row[i], widths[i], i == last)))
                .collect();
            let _ = writeln!(out, "{}", cells.join("  "));
        }
    }
}

/// Pad to `width`; the last column is left ragged.
fn pad(text: &str, width: usize, last: bool) -> String {
    if last {
        return text.to_string();
    }
    let fill = width.saturating_sub(text.chars().count());
    format!("{}{}", text, " ".repeat(fill))
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;

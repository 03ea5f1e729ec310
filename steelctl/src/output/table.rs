use serde::Serialize;

pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

pub fn render_table<T: TableRow>(items: &[T]) -> String {
    let headers = T::headers();
    let rows: Vec<Vec<String>> = items.iter().map(TableRow::row).collect();
    let widths = column_widths(headers, &rows);

    let mut out = format_row(
        &headers.iter().map(ToString::to_string).collect::<Vec<_>>(),
        &widths,
    );
    out.push('\n');
    out.push_str(&format_separator(&widths));
    for row in rows {
        out.push('\n');
        out.push_str(&format_row(&row, &widths));
    }
    out
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(idx) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }
    widths
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (idx, cell) in row.iter().enumerate() {
        if idx > 0 {
            out.push_str("  ");
        }
        let width = widths.get(idx).copied().unwrap_or(0);
        let _ = write!(out, "{cell:<width$}");
    }
    out.trim_end().to_string()
}

fn format_separator(widths: &[usize]) -> String {
    widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ")
}

/// One database version, as listed by `steelctl versions`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionRow {
    pub index: usize,
    pub name: String,
    pub selected: bool,
}

impl VersionRow {
    pub fn from_list(versions: &[String], selected: Option<&str>) -> Vec<Self> {
        versions
            .iter()
            .enumerate()
            .map(|(idx, name)| Self {
                index: idx + 1,
                name: name.clone(),
                selected: selected == Some(name.as_str()),
            })
            .collect()
    }
}

impl TableRow for VersionRow {
    fn headers() -> &'static [&'static str] {
        &["#", "database", "selected"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.name.clone(),
            if self.selected { "*".into() } else { String::new() },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_versions() {
        let versions = vec!["SteelProcessing_A".to_string(), "B".to_string()];
        let rows = VersionRow::from_list(&versions, Some("B"));
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "#  database           selected");
        assert_eq!(lines[1], "-  -----------------  --------");
        assert_eq!(lines[2], "1  SteelProcessing_A");
        assert_eq!(lines[3], "2  B                  *");
    }
}

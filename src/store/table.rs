//! Loosely-schematised tables as they are persisted in the store.
//!
//! Columns are ordered and named; every cell is a string and an empty cell
//! means "absent". Tables loaded from different files may carry different
//! column sets, so concatenation takes the union of columns.

/// A row-oriented table with named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Cell value, or `None` if the column is missing or the cell is empty.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.table.column_index(column)?;
        let cells: &'a [String] = self.cells;
        cells
            .get(idx)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Non-empty `(column, value)` pairs in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let table: &'a Table = self.table;
        let cells: &'a [String] = self.cells;
        table
            .columns
            .iter()
            .zip(cells.iter())
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of `name`, adding an empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Append a positional row, padded or truncated to the column count.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.columns.len(), String::new());
        self.rows.push(cells);
    }

    /// Append a row given as `(column, value)` pairs, adding columns as needed.
    pub fn push_fields<'f, I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (&'f str, &'f str)>,
    {
        let mut cells = vec![String::new(); self.columns.len()];
        for (column, value) in fields {
            let idx = self.ensure_column(column);
            if idx >= cells.len() {
                cells.resize(idx + 1, String::new());
            }
            cells[idx] = value.to_string();
        }
        self.push_row(cells);
    }

    /// Set `column` to `value` on every row.
    pub fn set_column(&mut self, column: &str, value: &str) {
        let idx = self.ensure_column(column);
        for row in &mut self.rows {
            row[idx] = value.to_string();
        }
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|cells| Row { table: self, cells })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row { table: self, cells })
    }

    /// Raw positional cells, for serialisation.
    pub fn raw_rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Rows for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Row<'_>) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|cells| keep(&Row { table: self, cells }))
            .cloned()
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Concatenate tables, taking the union of their columns in first-seen order.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let mut out = Table::default();
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .map(|c| out.ensure_column(c))
                .collect();
            for cells in table.rows {
                let mut row = vec![String::new(); out.columns.len()];
                for (value, &target) in cells.into_iter().zip(mapping.iter()) {
                    row[target] = value;
                }
                out.rows.push(row);
            }
        }
        out
    }
}

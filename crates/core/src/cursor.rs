use std::fmt;

use indexmap::IndexMap;

use crate::{CursorError, Result, Row, Value};

const NO_RECORDS_TEXT: &str = "(no records)";

/// Backend-specific access to one query's rows.
///
/// `fetch_row_at` is only used to take the first position or to seek;
/// sequential reads go through `fetch_next_row`. Sources that stream rows
/// report `supports_rewind() == false` and the cursor then refuses to seek
/// backwards.
pub trait RowSource {
    fn fetch_row_at(&mut self, index: usize) -> Result<Option<Row>>;
    fn fetch_next_row(&mut self) -> Result<Option<Row>>;
    fn total_row_count(&self) -> usize;

    fn supports_rewind(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterializedRows {
    rows: Vec<Row>,
    next: usize,
}

impl MaterializedRows {
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows, next: 0 }
    }
}

impl RowSource for MaterializedRows {
    fn fetch_row_at(&mut self, index: usize) -> Result<Option<Row>> {
        let row = self.rows.get(index).cloned();
        if row.is_some() {
            self.next = index + 1;
        }
        Ok(row)
    }

    fn fetch_next_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.next).cloned();
        if row.is_some() {
            self.next += 1;
        }
        Ok(row)
    }

    fn total_row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    NotStarted,
    Positioned(usize),
    Exhausted,
}

pub struct ResultCursor {
    source: Box<dyn RowSource>,
    state: CursorState,
}

impl fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("rows", &self.source.total_row_count())
            .field("state", &self.state)
            .finish()
    }
}

impl ResultCursor {
    pub fn new(source: impl RowSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            state: CursorState::NotStarted,
        }
    }

    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(MaterializedRows::new(rows))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.source.total_row_count()
    }

    #[must_use]
    pub const fn position(&self) -> Option<usize> {
        match self.state {
            CursorState::Positioned(index) => Some(index),
            CursorState::NotStarted | CursorState::Exhausted => None,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Advances one row. Returns `Ok(None)` once the rows run out.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let (row, index) = match self.state {
            CursorState::NotStarted => (self.source.fetch_row_at(0)?, 0),
            CursorState::Positioned(position) => (self.source.fetch_next_row()?, position + 1),
            CursorState::Exhausted => return Ok(None),
        };
        Ok(self.settle(row, index))
    }

    pub fn position_at(&mut self, index: usize) -> Result<Option<Row>> {
        if index >= self.row_count() {
            self.state = CursorState::Exhausted;
            return Ok(None);
        }

        if !self.source.supports_rewind() {
            let position = match self.state {
                CursorState::NotStarted => None,
                CursorState::Positioned(position) => Some(position),
                CursorState::Exhausted => Some(self.row_count()),
            };
            if let Some(position) = position
                && index <= position
            {
                return Err(CursorError::Rewind {
                    requested: index,
                    position,
                }
                .into());
            }
        }

        let row = self.source.fetch_row_at(index)?;
        Ok(self.settle(row, index))
    }

    pub fn rows(&mut self) -> Rows<'_> {
        Rows { cursor: self }
    }

    pub fn first_column_values(&mut self) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        self.scan(|row| values.push(first_value(row)))?;
        Ok(values)
    }

    pub fn first_column_as_identity_set(&mut self) -> Result<IndexMap<Value, Value>> {
        let mut set = IndexMap::new();
        self.scan(|row| {
            let value = first_value(row);
            set.insert(value.clone(), value);
        })?;
        Ok(set)
    }

    pub fn first_two_columns_as_map(&mut self) -> Result<IndexMap<Value, Value>> {
        let mut map = IndexMap::new();
        self.scan(|row| {
            let mut values = row.into_values();
            let key = values.next().unwrap_or(Value::Null);
            let value = values.next().unwrap_or(Value::Null);
            map.insert(key, value);
        })?;
        Ok(map)
    }

    pub fn first_value_of_first_row(&mut self) -> Result<Option<Value>> {
        let row = match self.state {
            CursorState::NotStarted => self.next_row()?,
            CursorState::Positioned(_) | CursorState::Exhausted => self.position_at(0)?,
        };
        Ok(row.and_then(|row| row.into_values().next()))
    }

    pub fn render_as_table(&mut self) -> Result<TableRendering> {
        let mut header = None;
        let mut rows = Vec::new();
        self.scan(|row| {
            if header.is_none() {
                header = Some(row.keys().cloned().collect::<Vec<_>>());
            }
            rows.push(row.into_values().collect::<Vec<_>>());
        })?;

        Ok(match header {
            Some(header) => TableRendering::Table(RenderedTable { header, rows }),
            None => TableRendering::NoRecords,
        })
    }

    fn settle(&mut self, row: Option<Row>, index: usize) -> Option<Row> {
        self.state = if row.is_some() {
            CursorState::Positioned(index)
        } else {
            CursorState::Exhausted
        };
        row
    }

    // Projections always read from the first row.
    fn scan(&mut self, mut visit: impl FnMut(Row)) -> Result<()> {
        let mut next = match self.state {
            CursorState::NotStarted => self.next_row()?,
            CursorState::Positioned(_) | CursorState::Exhausted => self.position_at(0)?,
        };
        while let Some(row) = next {
            visit(row);
            next = self.next_row()?;
        }
        Ok(())
    }
}

pub struct Rows<'a> {
    cursor: &'a mut ResultCursor,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_row().transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRendering {
    NoRecords,
    Table(RenderedTable),
}

impl fmt::Display for TableRendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecords => f.write_str(NO_RECORDS_TEXT),
            Self::Table(table) => table.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl fmt::Display for RenderedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let mut widths = self.header.iter().map(String::len).collect::<Vec<_>>();
        for row in &cells {
            for (column, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(column) {
                    *width = (*width).max(cell.len());
                }
            }
        }

        write_table_line(f, &self.header, &widths)?;
        for row in &cells {
            write_table_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_table_line(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    f.write_str("|")?;
    for (column, cell) in cells.iter().enumerate() {
        let width = widths.get(column).copied().unwrap_or(cell.len());
        write!(f, " {cell:<width$} |")?;
    }
    writeln!(f)
}

fn first_value(row: Row) -> Value {
    row.into_values().next().unwrap_or(Value::Null)
}

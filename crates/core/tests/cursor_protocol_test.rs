use schemasync_core::{
    CursorError, Error, RenderedTable, Result, ResultCursor, Row, RowSource, TableRendering, Value,
};

fn row(cells: &[(&str, Value)]) -> Row {
    cells
        .iter()
        .map(|(column, value)| ((*column).to_string(), value.clone()))
        .collect()
}

fn people() -> Vec<Row> {
    vec![
        row(&[("id", Value::Integer(1)), ("name", Value::from("ada"))]),
        row(&[("id", Value::Integer(2)), ("name", Value::from("grace"))]),
        row(&[("id", Value::Integer(3)), ("name", Value::Null)]),
    ]
}

/// Forward-only source, like a driver that streams rows off the wire.
struct StreamingRows {
    rows: Vec<Row>,
    next: usize,
}

impl RowSource for StreamingRows {
    fn fetch_row_at(&mut self, index: usize) -> Result<Option<Row>> {
        self.next = index + 1;
        Ok(self.rows.get(index).cloned())
    }

    fn fetch_next_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.next).cloned();
        self.next += 1;
        Ok(row)
    }

    fn total_row_count(&self) -> usize {
        self.rows.len()
    }

    fn supports_rewind(&self) -> bool {
        false
    }
}

#[test]
fn next_row_walks_every_row_then_reports_exhaustion() {
    let mut cursor = ResultCursor::from_rows(people());
    assert_eq!(cursor.row_count(), 3);
    assert_eq!(cursor.position(), None);

    let names = cursor
        .rows()
        .map(|row| row.expect("row").get("name").cloned())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            Some(Value::from("ada")),
            Some(Value::from("grace")),
            Some(Value::Null),
        ]
    );

    assert!(cursor.is_exhausted());
    assert_eq!(cursor.next_row().expect("next after end"), None);
    assert_eq!(cursor.next_row().expect("next after end again"), None);
}

#[test]
fn position_at_seeks_and_continues_from_there() {
    let mut cursor = ResultCursor::from_rows(people());

    let second = cursor.position_at(1).expect("seek").expect("row 1");
    assert_eq!(second.get("id"), Some(&Value::Integer(2)));
    assert_eq!(cursor.position(), Some(1));

    let third = cursor.next_row().expect("next").expect("row 2");
    assert_eq!(third.get("id"), Some(&Value::Integer(3)));

    let first = cursor.position_at(0).expect("rewind").expect("row 0");
    assert_eq!(first.get("id"), Some(&Value::Integer(1)));
}

#[test]
fn position_at_out_of_range_returns_none_and_exhausts() {
    let mut cursor = ResultCursor::from_rows(people());

    assert_eq!(cursor.position_at(3).expect("seek past end"), None);
    assert!(cursor.is_exhausted());
    assert_eq!(cursor.next_row().expect("next"), None);
}

#[test]
fn empty_cursor_yields_nothing() {
    let mut cursor = ResultCursor::empty();

    assert_eq!(cursor.next_row().expect("next"), None);
    assert_eq!(cursor.first_value_of_first_row().expect("first"), None);
    assert!(cursor.first_column_values().expect("column").is_empty());
}

#[test]
fn projections_always_start_from_the_first_row() {
    let mut cursor = ResultCursor::from_rows(people());
    cursor.next_row().expect("advance");
    cursor.next_row().expect("advance");

    assert_eq!(
        cursor.first_column_values().expect("column"),
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
    assert_eq!(
        cursor.first_value_of_first_row().expect("first"),
        Some(Value::Integer(1))
    );
}

#[test]
fn first_two_columns_become_a_map_and_missing_values_are_null() {
    let mut rows = people();
    rows.push(row(&[("id", Value::Integer(4))]));
    let mut cursor = ResultCursor::from_rows(rows);

    let map = cursor.first_two_columns_as_map().expect("map");
    assert_eq!(map.len(), 4);
    assert_eq!(map.get(&Value::Integer(2)), Some(&Value::from("grace")));
    assert_eq!(map.get(&Value::Integer(4)), Some(&Value::Null));
}

#[test]
fn identity_set_deduplicates_first_column() {
    let rows = vec![
        row(&[("status", Value::from("A"))]),
        row(&[("status", Value::from("B"))]),
        row(&[("status", Value::from("A"))]),
    ];
    let mut cursor = ResultCursor::from_rows(rows);

    let set = cursor.first_column_as_identity_set().expect("set");
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(&Value::from("A")), Some(&Value::from("A")));
}

#[test]
fn render_as_table_includes_header_and_every_row() {
    let mut cursor = ResultCursor::from_rows(people());

    let rendering = cursor.render_as_table().expect("render");
    let TableRendering::Table(RenderedTable { header, rows }) = &rendering else {
        panic!("expected a table, got {rendering:?}");
    };
    assert_eq!(header, &vec!["id".to_string(), "name".to_string()]);
    assert_eq!(rows.len(), 3);

    assert_eq!(
        rendering.to_string(),
        "| id | name  |\n| 1  | ada   |\n| 2  | grace |\n| 3  | NULL  |\n"
    );
}

#[test]
fn render_as_table_reports_no_records() {
    let mut cursor = ResultCursor::empty();

    let rendering = cursor.render_as_table().expect("render");
    assert_eq!(rendering, TableRendering::NoRecords);
    assert_eq!(rendering.to_string(), "(no records)");
}

#[test]
fn forward_only_source_refuses_to_rewind() {
    let mut cursor = ResultCursor::new(StreamingRows {
        rows: people(),
        next: 0,
    });

    cursor.position_at(1).expect("forward seek").expect("row 1");
    let error = cursor.position_at(0).expect_err("rewind must fail");
    assert!(matches!(
        error,
        Error::Cursor(CursorError::Rewind {
            requested: 0,
            position: 1
        })
    ));

    let third = cursor.position_at(2).expect("forward seek").expect("row 2");
    assert_eq!(third.get("id"), Some(&Value::Integer(3)));
}

pub(crate) const SHOW_SERVER_VERSION_QUERY: &str = "SELECT sqlite_version()";

pub(crate) const TABLE_NAMES_QUERY: &str = r#"
SELECT tbl_name
FROM sqlite_master
WHERE type = 'table' AND tbl_name NOT LIKE 'sqlite_%'
ORDER BY tbl_name ASC;
"#;

pub(crate) const TABLE_DDL_QUERY: &str = r#"
SELECT sql
FROM sqlite_master
WHERE type = 'table' AND lower(tbl_name) = lower(?1);
"#;

pub(crate) const TABLE_COLUMNS_QUERY: &str = r#"
SELECT name, type, "notnull", dflt_value, pk
FROM pragma_table_info(?1)
ORDER BY cid ASC;
"#;

// Indexes backing PRIMARY KEY and UNIQUE column constraints (origin `pk` /
// `u`) belong to the column definitions, not to declared indexes.
pub(crate) const TABLE_INDEXES_QUERY: &str = r#"
SELECT name, "unique"
FROM pragma_index_list(?1)
WHERE origin = 'c'
ORDER BY name ASC;
"#;

pub(crate) const INDEX_COLUMNS_QUERY: &str = r#"
SELECT name
FROM pragma_index_info(?1)
ORDER BY seqno ASC;
"#;

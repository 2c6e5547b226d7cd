use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Select(SelectQuery),
    Count {
        table: String,
        filter: Option<String>,
    },
    Insert {
        table: String,
        values: Vec<(String, String)>,
    },
    Update {
        table: String,
        assignments: Vec<(String, String)>,
        filter: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    pub columns: Vec<String>,
    pub source: String,
    pub filter: Option<String>,
    pub group_by: Vec<String>,
    pub having: Option<String>,
    pub order_by: Vec<String>,
    pub limit: Option<Limit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: Option<u64>,
    pub count: u64,
}

/// Turns a structured query into dialect text.
pub trait QueryBuilder {
    fn quote_identifier(&self, identifier: &str) -> String;
    fn render(&self, query: &Query) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiQueryBuilder;

impl QueryBuilder for AnsiQueryBuilder {
    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn render(&self, query: &Query) -> Result<String> {
        Ok(match query {
            Query::Select(select) => self.render_select(select),
            Query::Count { table, filter } => {
                let mut sql = format!("SELECT COUNT(*) FROM {}", self.quote_identifier(table));
                push_clause(&mut sql, "WHERE", filter.as_deref());
                sql
            }
            Query::Insert { table, values } => {
                let columns = values
                    .iter()
                    .map(|(column, _)| self.quote_identifier(column))
                    .collect::<Vec<_>>();
                let expressions = values
                    .iter()
                    .map(|(_, expression)| expression.as_str())
                    .collect::<Vec<_>>();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    self.quote_identifier(table),
                    columns.join(", "),
                    expressions.join(", ")
                )
            }
            Query::Update {
                table,
                assignments,
                filter,
            } => {
                let assignments = assignments
                    .iter()
                    .map(|(column, expression)| {
                        format!("{} = {expression}", self.quote_identifier(column))
                    })
                    .collect::<Vec<_>>();
                let mut sql = format!(
                    "UPDATE {} SET {}",
                    self.quote_identifier(table),
                    assignments.join(", ")
                );
                push_clause(&mut sql, "WHERE", filter.as_deref());
                sql
            }
        })
    }
}

impl AnsiQueryBuilder {
    fn render_select(&self, select: &SelectQuery) -> String {
        let columns = if select.columns.is_empty() {
            "*".to_string()
        } else {
            select.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", select.source);
        push_clause(&mut sql, "WHERE", select.filter.as_deref());
        if !select.group_by.is_empty() {
            push_clause(&mut sql, "GROUP BY", Some(&select.group_by.join(", ")));
            push_clause(&mut sql, "HAVING", select.having.as_deref());
        }
        if !select.order_by.is_empty() {
            push_clause(&mut sql, "ORDER BY", Some(&select.order_by.join(", ")));
        }
        if let Some(limit) = select.limit {
            sql.push_str(&format!(" LIMIT {}", limit.count));
            if let Some(offset) = limit.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        sql
    }
}

/// Thin front over the backend's [`QueryBuilder`].
pub struct QueryRenderer<'a> {
    builder: &'a dyn QueryBuilder,
}

impl<'a> QueryRenderer<'a> {
    #[must_use]
    pub const fn new(builder: &'a dyn QueryBuilder) -> Self {
        Self { builder }
    }

    pub fn render(&self, query: &Query) -> Result<String> {
        self.builder.render(query)
    }

    #[must_use]
    pub fn quote_identifier(&self, identifier: &str) -> String {
        self.builder.quote_identifier(identifier)
    }

    /// `"<column>" IN ('a', 'b')`
    #[must_use]
    pub fn in_list_filter(&self, column: &str, values: &[String]) -> String {
        let literals = values
            .iter()
            .map(|value| quote_literal(value))
            .collect::<Vec<_>>();
        format!(
            "{} IN ({})",
            self.quote_identifier(column),
            literals.join(", ")
        )
    }
}

#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn push_clause(sql: &mut String, keyword: &str, body: Option<&str>) {
    if let Some(body) = body.map(str::trim).filter(|body| !body.is_empty()) {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(body);
    }
}

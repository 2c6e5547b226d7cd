use std::fmt;

use indexmap::IndexMap;

use crate::{RenderError, quote_literal};

pub const IDENTITY_FIELD: &str = "ID";

const DEFAULT_VARCHAR_LENGTH: u32 = 255;
const DEFAULT_DECIMAL_PRECISION: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Identity { auto_increment: bool },
    Integer,
    BigInt,
    SmallInt,
    Boolean,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Char { length: u32 },
    Varchar { length: u32 },
    Text,
    Date,
    DateTime,
    Timestamp,
    Time,
    Blob,
    Enum { values: Vec<String> },
    Custom(String),
}

impl FieldType {
    /// Resolves a type name plus its optional parenthesized arguments.
    /// Unknown names yield `None`.
    #[must_use]
    pub fn from_name(name: &str, args: Option<&str>) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let numbers = args.map(parse_numeric_args);
        let first = |fallback: u32| {
            numbers
                .as_ref()
                .and_then(|numbers| numbers.first().copied().flatten())
                .unwrap_or(fallback)
        };

        let field_type = match name.as_str() {
            "int" | "integer" | "mediumint" => Self::Integer,
            "bigint" => Self::BigInt,
            "smallint" | "tinyint" => Self::SmallInt,
            "bool" | "boolean" => Self::Boolean,
            "float" | "real" => Self::Float,
            "double" => Self::Double,
            "decimal" | "numeric" => Self::Decimal {
                precision: first(DEFAULT_DECIMAL_PRECISION),
                scale: numbers
                    .as_ref()
                    .and_then(|numbers| numbers.get(1).copied().flatten())
                    .unwrap_or(0),
            },
            "char" => Self::Char { length: first(1) },
            "varchar" => Self::Varchar {
                length: first(DEFAULT_VARCHAR_LENGTH),
            },
            "text" | "mediumtext" | "longtext" => Self::Text,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "timestamp" => Self::Timestamp,
            "time" => Self::Time,
            "blob" => Self::Blob,
            "enum" => Self::Enum {
                values: parse_literal_list(args?)?,
            },
            _ => return None,
        };
        Some(field_type)
    }

    #[must_use]
    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            Self::Enum { values } => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::Identity { .. })
    }

    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Identity {
                auto_increment: true,
            } => "identity auto_increment".to_string(),
            Self::Identity {
                auto_increment: false,
            } => "identity".to_string(),
            Self::Integer => "integer".to_string(),
            Self::BigInt => "bigint".to_string(),
            Self::SmallInt => "smallint".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Decimal { precision, scale } => format!("decimal({precision},{scale})"),
            Self::Char { length } => format!("char({length})"),
            Self::Varchar { length } => format!("varchar({length})"),
            Self::Text => "text".to_string(),
            Self::Date => "date".to_string(),
            Self::DateTime => "datetime".to_string(),
            Self::Timestamp => "timestamp".to_string(),
            Self::Time => "time".to_string(),
            Self::Blob => "blob".to_string(),
            Self::Enum { values } => {
                let literals = values
                    .iter()
                    .map(|value| quote_literal(value))
                    .collect::<Vec<_>>();
                format!("enum({})", literals.join(","))
            }
            Self::Custom(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    nullable: bool,
    default: Option<String>,
    collation: Option<String>,
    rendered: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let mut spec = Self {
            name: name.into(),
            field_type,
            nullable: true,
            default: None,
            collation: None,
            rendered: String::new(),
        };
        spec.refresh();
        spec
    }

    /// A structured spec whose name is injected when it is required.
    #[must_use]
    pub fn of(field_type: FieldType) -> Self {
        Self::new(String::new(), field_type)
    }

    /// Parses dialect text such as `varchar(255) not null default ''`.
    /// Type names outside the known set are kept verbatim as
    /// [`FieldType::Custom`].
    pub fn parse(name: &str, definition: &str) -> Result<Self, RenderError> {
        let malformed = |reason: &str| RenderError::MalformedField {
            field: name.to_string(),
            definition: definition.to_string(),
            reason: reason.to_string(),
        };

        let tokens = tokenize(definition).map_err(|reason| malformed(reason))?;
        let mut tokens = tokens.into_iter().peekable();
        let type_name = tokens.next().ok_or_else(|| malformed("missing type"))?;
        if type_name.starts_with('(') || type_name.starts_with('\'') {
            return Err(malformed("missing type"));
        }
        let args = tokens.next_if(|token| token.starts_with('('));
        let args_inner = args.as_deref().map(strip_parens);

        let mut nullable = true;
        let mut default = None;
        let mut collation = None;
        let mut primary_key = false;
        let mut auto_increment = false;

        while let Some(token) = tokens.next() {
            match token.to_ascii_lowercase().as_str() {
                "not" => {
                    let next = tokens.next().map(|token| token.to_ascii_lowercase());
                    if next.as_deref() != Some("null") {
                        return Err(malformed("expected NULL after NOT"));
                    }
                    nullable = false;
                }
                "null" => nullable = true,
                "default" => {
                    let expression = tokens
                        .next()
                        .ok_or_else(|| malformed("missing DEFAULT expression"))?;
                    default = Some(canonical_default(&expression));
                }
                "collate" => {
                    collation = Some(
                        tokens
                            .next()
                            .ok_or_else(|| malformed("missing COLLATE name"))?
                            .to_ascii_lowercase(),
                    );
                }
                "primary" => {
                    let next = tokens.next().map(|token| token.to_ascii_lowercase());
                    if next.as_deref() != Some("key") {
                        return Err(malformed("expected KEY after PRIMARY"));
                    }
                    primary_key = true;
                }
                "auto_increment" | "autoincrement" => auto_increment = true,
                _ => return Err(malformed(&format!("unexpected token `{token}`"))),
            }
        }

        let field_type = if primary_key || auto_increment {
            FieldType::Identity { auto_increment }
        } else {
            FieldType::from_name(&type_name, args_inner).unwrap_or_else(|| {
                let raw = match &args {
                    Some(args) => format!("{type_name}{args}"),
                    None => type_name.clone(),
                };
                FieldType::Custom(normalize_definition(&raw))
            })
        };

        let mut spec = Self::new(name, field_type).nullable(nullable);
        spec.default = default;
        spec.collation = collation;
        spec.refresh();
        Ok(spec)
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self.refresh();
        self
    }

    #[must_use]
    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    #[must_use]
    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(canonical_default(&expression.into()));
        self.refresh();
        self
    }

    #[must_use]
    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into().to_ascii_lowercase());
        self.refresh();
        self
    }

    #[must_use]
    pub fn without_collation(mut self) -> Self {
        self.collation = None;
        self.refresh();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn default_expression(&self) -> Option<&str> {
        self.default.as_deref()
    }

    #[must_use]
    pub fn collation(&self) -> Option<&str> {
        self.collation.as_deref()
    }

    #[must_use]
    pub fn enum_values(&self) -> Option<&[String]> {
        self.field_type.enum_values()
    }

    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    #[must_use]
    pub fn comparison_key(&self) -> String {
        normalize_definition(&self.rendered)
    }

    fn refresh(&mut self) {
        let mut rendered = self.field_type.render();
        if !self.field_type.is_identity() {
            if !self.nullable {
                rendered.push_str(" not null");
            }
            if let Some(default) = &self.default {
                rendered.push_str(" default ");
                rendered.push_str(default);
            }
        }
        if let Some(collation) = &self.collation {
            rendered.push_str(" collate ");
            rendered.push_str(collation);
        }
        self.rendered = rendered;
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDefinition {
    Structured(FieldSpec),
    Rendered(String),
}

impl FieldDefinition {
    pub fn resolve(&self, name: &str) -> Result<FieldSpec, RenderError> {
        match self {
            Self::Structured(spec) => Ok(spec.clone().named(name)),
            Self::Rendered(text) => FieldSpec::parse(name, text),
        }
    }
}

impl From<FieldSpec> for FieldDefinition {
    fn from(spec: FieldSpec) -> Self {
        Self::Structured(spec)
    }
}

impl From<FieldType> for FieldDefinition {
    fn from(field_type: FieldType) -> Self {
        Self::Structured(FieldSpec::of(field_type))
    }
}

impl From<&str> for FieldDefinition {
    fn from(text: &str) -> Self {
        Self::Rendered(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Single,
    Composite,
    Unique,
    Fulltext,
}

impl IndexKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Composite => "composite",
            Self::Unique => "unique",
            Self::Fulltext => "fulltext",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "single" | "index" => Some(Self::Single),
            "composite" => Some(Self::Composite),
            "unique" => Some(Self::Unique),
            "fulltext" => Some(Self::Fulltext),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexClass {
    Plain,
    Unique,
    Fulltext,
}

/// Comparable form of an index: single-column and composite indexes share
/// the plain class and differ only in their field list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSignature {
    pub class: IndexClass,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    name: String,
    kind: IndexKind,
    fields: Vec<String>,
    rendered: String,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, kind: IndexKind, fields: Vec<String>) -> Self {
        let kind = match kind {
            IndexKind::Single | IndexKind::Composite if fields.len() > 1 => IndexKind::Composite,
            IndexKind::Single | IndexKind::Composite => IndexKind::Single,
            other => other,
        };
        let keyword = match kind {
            IndexKind::Single | IndexKind::Composite => "INDEX",
            IndexKind::Unique => "UNIQUE",
            IndexKind::Fulltext => "FULLTEXT",
        };
        let rendered = format!("{keyword} ({})", fields.join(", "));
        Self {
            name: name.into(),
            kind,
            fields,
            rendered,
        }
    }

    /// Parses `UNIQUE (a, b)`, `FULLTEXT (body)`, `INDEX (a)` or a bare `(a,b)`.
    pub fn parse(name: &str, definition: &str) -> Result<Self, RenderError> {
        let malformed = |reason: &str| RenderError::MalformedIndex {
            index: name.to_string(),
            definition: definition.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = definition.trim();
        let open = trimmed
            .find('(')
            .ok_or_else(|| malformed("missing field list"))?;
        if !trimmed.ends_with(')') {
            return Err(malformed("field list must close the definition"));
        }

        // Keywords are case-folded; field names keep their declared case.
        let keywords = trimmed[..open].to_ascii_lowercase();
        let mut keywords = keywords.split_whitespace();
        let kind = match keywords.next() {
            None | Some("index" | "key") => IndexKind::Single,
            Some("unique") => IndexKind::Unique,
            Some("fulltext") => IndexKind::Fulltext,
            Some(other) => return Err(malformed(&format!("unknown index keyword `{other}`"))),
        };
        if keywords.any(|word| word != "index" && word != "key") {
            return Err(malformed("unexpected keywords before field list"));
        }

        let fields = trimmed[open + 1..trimmed.len() - 1]
            .split(',')
            .map(unquote_identifier)
            .collect::<Vec<_>>();
        if fields.iter().any(String::is_empty) {
            return Err(malformed("empty field name"));
        }

        Ok(Self::new(name, kind, fields))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    #[must_use]
    pub fn signature(&self) -> IndexSignature {
        let class = match self.kind {
            IndexKind::Single | IndexKind::Composite => IndexClass::Plain,
            IndexKind::Unique => IndexClass::Unique,
            IndexKind::Fulltext => IndexClass::Fulltext,
        };
        IndexSignature {
            class,
            fields: self
                .fields
                .iter()
                .map(|field| field.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDefinition {
    /// `true` indexes the field sharing the index name; `false` requires nothing.
    Flag(bool),
    Structured { kind: IndexKind, fields: Vec<String> },
    Rendered(String),
}

impl IndexDefinition {
    pub fn resolve(&self, name: &str) -> Result<Option<IndexSpec>, RenderError> {
        match self {
            Self::Flag(false) => Ok(None),
            Self::Flag(true) => Ok(Some(IndexSpec::new(
                name,
                IndexKind::Single,
                vec![name.to_string()],
            ))),
            Self::Structured { kind, fields } => {
                if fields.is_empty() || fields.iter().any(|field| field.trim().is_empty()) {
                    return Err(RenderError::MalformedIndex {
                        index: name.to_string(),
                        definition: format!("{kind} {fields:?}"),
                        reason: "index needs at least one named field".to_string(),
                    });
                }
                Ok(Some(IndexSpec::new(
                    name,
                    *kind,
                    fields.iter().map(|field| field.trim().to_string()).collect(),
                )))
            }
            Self::Rendered(text) => IndexSpec::parse(name, text).map(Some),
        }
    }
}

impl From<bool> for IndexDefinition {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<&str> for IndexDefinition {
    fn from(text: &str) -> Self {
        Self::Rendered(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub fields: IndexMap<String, FieldDefinition>,
    pub indexes: IndexMap<String, IndexDefinition>,
    pub auto_increment: bool,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            indexes: IndexMap::new(),
            auto_increment: true,
        }
    }

    #[must_use]
    pub const fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, definition: impl Into<FieldDefinition>) -> Self {
        self.fields.insert(name.into(), definition.into());
        self
    }

    #[must_use]
    pub fn index(mut self, name: impl Into<String>, definition: impl Into<IndexDefinition>) -> Self {
        self.indexes.insert(name.into(), definition.into());
        self
    }
}

/// Case-folds outside quoted literals, collapses whitespace, and drops
/// whitespace around parentheses and commas.
#[must_use]
pub fn normalize_definition(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut in_quote = false;
    let mut pending_space = false;

    for ch in text.trim().chars() {
        if in_quote {
            normalized.push(ch);
            if ch == '\'' {
                in_quote = false;
            }
            continue;
        }

        match ch {
            ch if ch.is_whitespace() => pending_space = true,
            '(' | ')' | ',' => {
                pending_space = false;
                normalized.push(ch);
            }
            _ => {
                if pending_space && !normalized.is_empty() && !normalized.ends_with(['(', ',']) {
                    normalized.push(' ');
                }
                pending_space = false;
                if ch == '\'' {
                    in_quote = true;
                }
                normalized.push(ch.to_ascii_lowercase());
            }
        }
    }

    normalized
}

/// Parses `'a', 'b'` into its literal values. Returns `None` when any item is
/// not a single-quoted literal.
#[must_use]
pub fn parse_literal_list(text: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut chars = text.trim().chars().peekable();

    loop {
        while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
        if chars.next()? != '\'' {
            return None;
        }

        let mut value = String::new();
        loop {
            match chars.next()? {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                '\'' => break,
                ch => value.push(ch),
            }
        }
        values.push(value);

        while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
        match chars.next() {
            None => return Some(values),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

fn parse_numeric_args(args: &str) -> Vec<Option<u32>> {
    args.split(',')
        .map(|arg| arg.trim().parse::<u32>().ok())
        .collect()
}

/// Drops one pair of parentheses enclosing the whole expression, so
/// `(datetime('now'))` and `datetime('now')` describe the same default.
#[must_use]
pub fn canonical_default(expression: &str) -> String {
    let expression = expression.trim();
    let Some(inner) = expression
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    else {
        return expression.to_string();
    };

    let mut depth = 0_usize;
    let mut in_quote = false;
    for ch in inner.chars() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return expression.to_string(),
            },
            _ => {}
        }
    }

    if depth == 0 && !in_quote {
        inner.trim().to_string()
    } else {
        expression.to_string()
    }
}

fn strip_parens(group: &str) -> &str {
    group
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(group)
}

fn unquote_identifier(raw: &str) -> String {
    raw.trim()
        .trim_matches(|ch| matches!(ch, '"' | '`' | '[' | ']'))
        .to_string()
}

fn is_word_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '(' | ')' | '\'')
}

// Splits a definition into words, quoted literals and balanced parenthesized
// groups. Literals and groups keep their delimiters.
fn tokenize(text: &str) -> Result<Vec<String>, &'static str> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        match ch {
            '(' => {
                let mut depth = 0_usize;
                let mut in_quote = false;
                for ch in chars.by_ref() {
                    token.push(ch);
                    match ch {
                        '\'' => in_quote = !in_quote,
                        '(' if !in_quote => depth += 1,
                        ')' if !in_quote => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                if depth != 0 || in_quote {
                    return Err("unbalanced parentheses");
                }
            }
            ')' => return Err("unbalanced parentheses"),
            '\'' => {
                token.push(ch);
                chars.next();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    token.push(ch);
                    if ch == '\'' {
                        if chars.peek() == Some(&'\'') {
                            token.push('\'');
                            chars.next();
                        } else {
                            closed = true;
                            break;
                        }
                    }
                }
                if !closed {
                    return Err("unterminated string literal");
                }
            }
            _ => {
                while let Some(ch) = chars.next_if(|&ch| is_word_char(ch)) {
                    token.push(ch);
                }
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

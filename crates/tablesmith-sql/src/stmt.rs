//! SQL statement AST.

/// A scalar expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A named parameter, rendered as `$n`.
    Param(String),

    /// A column reference.
    Column(String),

    /// An integer literal.
    Int(i64),

    /// Equality comparison.
    Eq { left: Box<Expr>, right: Box<Expr> },

    /// Conjunction of one or more expressions.
    And(Vec<Expr>),

    /// `NOT EXISTS (subquery)`.
    NotExists(Box<SelectStmt>),
}

impl Expr {
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq {
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

/// An equality clause over a key: `"a" = $a AND "b" = $b`.
///
/// Returns `None` for an empty key so the caller cannot accidentally build
/// an unfiltered statement.
pub fn key_equality(columns: &[&str]) -> Option<Expr> {
    if columns.is_empty() {
        return None;
    }
    Some(Expr::And(
        columns
            .iter()
            .map(|c| Expr::column(*c).eq(Expr::param(*c)))
            .collect(),
    ))
}

/// A column in a SELECT projection.
#[derive(Debug, Clone)]
pub enum SelectColumn {
    /// A simple column reference.
    Column(String),

    /// An arbitrary expression (parameter projections, literals).
    Expr(Expr),

    /// `*`
    Star,
}

/// A SELECT statement.
///
/// `from` is optional: a parameter projection (`SELECT $1, $2 WHERE …`)
/// selects from no table at all.
#[derive(Debug, Clone, Default)]
pub struct SelectStmt {
    pub columns: Vec<SelectColumn>,
    pub from: Option<String>,
    pub where_: Option<Expr>,
    pub limit: Option<u64>,
}

impl SelectStmt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(SelectColumn::Column(name.into()));
        self
    }

    pub fn columns<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.columns
            .extend(names.into_iter().map(|n| SelectColumn::Column(n.into())));
        self
    }

    pub fn expr(mut self, expr: Expr) -> Self {
        self.columns.push(SelectColumn::Expr(expr));
        self
    }

    pub fn star(mut self) -> Self {
        self.columns.push(SelectColumn::Star);
        self
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Row source of an INSERT.
#[derive(Debug, Clone)]
pub enum InsertSource {
    /// `VALUES (…)`
    Values(Vec<Expr>),

    /// An arbitrary query, e.g. a guarded parameter projection.
    Query(SelectStmt),

    /// `DEFAULT VALUES`: a row with no explicit columns.
    DefaultValues,
}

/// An INSERT statement.
#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub returning: Vec<String>,
}

impl InsertStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            source: InsertSource::DefaultValues,
            returning: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    pub fn source(mut self, source: InsertSource) -> Self {
        self.source = source;
        self
    }

    pub fn returning<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.returning.extend(names.into_iter().map(Into::into));
        self
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub where_: Option<Expr>,
}

impl UpdateStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            where_: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: Expr) -> Self {
        self.assignments.push((column.into(), value));
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }
}

/// A DELETE statement.
#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table: String,
    pub where_: Option<Expr>,
}

impl DeleteStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_: None,
        }
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }
}

/// One common-table-expression.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub body: CteBody,
}

/// The body of a CTE. Data-modifying CTEs carry inserts.
#[derive(Debug, Clone)]
pub enum CteBody {
    Select(SelectStmt),
    Insert(InsertStmt),
}

/// `WITH a AS (…), b AS (…) SELECT … UNION ALL SELECT …`.
#[derive(Debug, Clone)]
pub struct WithQuery {
    pub ctes: Vec<Cte>,
    /// Branches of the final query, joined with UNION ALL.
    pub body: Vec<SelectStmt>,
}

impl WithQuery {
    pub fn new() -> Self {
        Self {
            ctes: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn cte(mut self, name: impl Into<String>, body: CteBody) -> Self {
        self.ctes.push(Cte {
            name: name.into(),
            body,
        });
        self
    }

    pub fn branch(mut self, select: SelectStmt) -> Self {
        self.body.push(select);
        self
    }
}

impl Default for WithQuery {
    fn default() -> Self {
        Self::new()
    }
}

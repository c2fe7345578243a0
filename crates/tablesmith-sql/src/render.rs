//! Render the statement AST to SQL.

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;

use crate::stmt::*;
use crate::{Ident, RenderedSql};

/// Mutable parameter tracking state.
struct ParamState {
    /// Named parameters -> their assigned index.
    params: IndexMap<String, usize>,
    /// Next parameter index to assign.
    next_param_idx: usize,
}

impl ParamState {
    fn new() -> Self {
        Self {
            params: IndexMap::new(),
            next_param_idx: 1,
        }
    }

    /// Get or create a parameter index.
    fn get_or_insert(&mut self, name: &str) -> usize {
        *self.params.entry(name.to_string()).or_insert_with(|| {
            let idx = self.next_param_idx;
            self.next_param_idx += 1;
            idx
        })
    }
}

/// Rendering context that tracks parameters.
pub struct RenderContext {
    params: RefCell<ParamState>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            params: RefCell::new(ParamState::new()),
        }
    }

    fn param_idx(&self, name: &str) -> usize {
        self.params.borrow_mut().get_or_insert(name)
    }

    fn into_params(self) -> Vec<String> {
        self.params.into_inner().params.into_keys().collect()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for rendering a value via Display.
struct Fmt<'a, T: Render>(&'a RenderContext, &'a T);

impl<T: Render> fmt::Display for Fmt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.1.render(self.0, f)
    }
}

/// Trait for types that can be rendered to SQL.
pub trait Render {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// Render a statement, assigning parameter indices as they appear.
pub fn render(stmt: &impl Render) -> RenderedSql {
    let ctx = RenderContext::new();
    let sql = format!("{}", Fmt(&ctx, stmt));
    RenderedSql {
        sql,
        params: ctx.into_params(),
    }
}

impl Render for Expr {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Param(name) => {
                let idx = ctx.param_idx(name);
                write!(f, "${idx}")
            }
            Expr::Column(name) => write!(f, "{}", Ident(name)),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Eq { left, right } => {
                let left = Fmt(ctx, left.as_ref());
                let right = Fmt(ctx, right.as_ref());
                write!(f, "{left} = {right}")
            }
            Expr::And(exprs) => {
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{}", Fmt(ctx, expr))?;
                }
                Ok(())
            }
            Expr::NotExists(subquery) => {
                write!(f, "NOT EXISTS ({})", Fmt(ctx, subquery.as_ref()))
            }
        }
    }
}

impl Render for SelectColumn {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectColumn::Column(name) => write!(f, "{}", Ident(name)),
            SelectColumn::Expr(expr) => expr.render(ctx, f),
            SelectColumn::Star => write!(f, "*"),
        }
    }
}

impl Render for SelectStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT")?;

        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}", Fmt(ctx, col))?;
        }

        if let Some(from) = &self.from {
            write!(f, " FROM {}", Ident(from))?;
        }

        if let Some(where_) = &self.where_ {
            write!(f, " WHERE {}", Fmt(ctx, where_))?;
        }

        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }

        Ok(())
    }
}

impl Render for InsertStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {}", Ident(&self.table))?;

        if !self.columns.is_empty() {
            write!(f, " (")?;
            for (i, col) in self.columns.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", Ident(col))?;
            }
            write!(f, ")")?;
        }

        match &self.source {
            InsertSource::Values(values) => {
                write!(f, " VALUES (")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Fmt(ctx, value))?;
                }
                write!(f, ")")?;
            }
            InsertSource::Query(select) => {
                write!(f, " {}", Fmt(ctx, select))?;
            }
            InsertSource::DefaultValues => {
                write!(f, " DEFAULT VALUES")?;
            }
        }

        if !self.returning.is_empty() {
            write!(f, " RETURNING ")?;
            for (i, col) in self.returning.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", Ident(col))?;
            }
        }

        Ok(())
    }
}

impl Render for UpdateStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {} SET ", Ident(&self.table))?;
        for (i, (col, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", Ident(col), Fmt(ctx, value))?;
        }
        if let Some(where_) = &self.where_ {
            write!(f, " WHERE {}", Fmt(ctx, where_))?;
        }
        Ok(())
    }
}

impl Render for DeleteStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", Ident(&self.table))?;
        if let Some(where_) = &self.where_ {
            write!(f, " WHERE {}", Fmt(ctx, where_))?;
        }
        Ok(())
    }
}

impl Render for CteBody {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CteBody::Select(select) => select.render(ctx, f),
            CteBody::Insert(insert) => insert.render(ctx, f),
        }
    }
}

impl Render for WithQuery {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WITH ")?;
        for (i, cte) in self.ctes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} AS ({})", Ident(&cte.name), Fmt(ctx, &cte.body))?;
        }
        for (i, branch) in self.body.iter().enumerate() {
            if i == 0 {
                write!(f, " ")?;
            } else {
                write!(f, " UNION ALL ")?;
            }
            write!(f, "{}", Fmt(ctx, branch))?;
        }
        Ok(())
    }
}

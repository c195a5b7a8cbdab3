//! The materialized render procedure and the interpreter that runs it.

use std::fmt::Write as _;

use compact_str::CompactString;
use itertools::Itertools;

use crate::{
    code::{Expr, Piece, Var},
    RenderError, Resolve, Value, Values,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    Bind(Var),
    Emit(Vec<Piece>),
    If {
        cond: Expr,
        body: Vec<Node>,
    },
    For {
        var: Var,
        iter: Expr,
        body: Vec<Node>,
    },
}

/// A compiled template body.
///
/// Every variable lives in a numbered slot. Free variables are loaded into
/// their slots by the leading [`Node::Bind`]s; each loop owns a slot of its
/// own, so a loop variable shadows a free variable of the same name only
/// inside its body.
#[derive(Clone, Debug)]
pub(crate) struct Program {
    body: Vec<Node>,
    slots: usize,
}

impl Program {
    pub(crate) fn new(body: Vec<Node>, slots: usize) -> Self {
        Self { body, slots }
    }

    #[cfg(test)]
    pub(crate) fn body(&self) -> &[Node] {
        &self.body
    }

    #[cfg(test)]
    pub(crate) fn slots(&self) -> usize {
        self.slots
    }

    /// Runs the procedure, appending its output to `out`.
    ///
    /// Holds no state between calls: each run gets a fresh frame.
    pub(crate) fn run<V, R>(
        &self,
        values: &V,
        resolver: &R,
        out: &mut String,
    ) -> Result<(), RenderError>
    where
        V: Values + ?Sized,
        R: Resolve + ?Sized,
    {
        let mut frame = Frame {
            values,
            resolver,
            slots: vec![None; self.slots],
        };
        frame.exec(&self.body, out)
    }
}

struct Frame<'a, V: ?Sized, R: ?Sized> {
    values: &'a V,
    resolver: &'a R,
    slots: Vec<Option<Value>>,
}

impl<V, R> Frame<'_, V, R>
where
    V: Values + ?Sized,
    R: Resolve + ?Sized,
{
    fn exec(&mut self, nodes: &[Node], out: &mut String) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Bind(var) => {
                    let value = self
                        .values
                        .get_value(&var.name)
                        .ok_or_else(|| RenderError::MissingVariable(var.name.clone()))?
                        .into_owned();
                    self.slots[var.slot] = Some(value);
                }
                Node::Emit(pieces) => {
                    for piece in pieces {
                        match piece {
                            Piece::Literal(text) => out.push_str(text),
                            Piece::Expr(expr) => match self.eval(expr)? {
                                Value::Str(s) => out.push_str(&s),
                                // Writing into a String never fails.
                                value => {
                                    let _ = write!(out, "{value}");
                                }
                            },
                        }
                    }
                }
                Node::If { cond, body } => {
                    if self.eval(cond)?.is_true() {
                        self.exec(body, out)?;
                    }
                }
                Node::For { var, iter, body } => {
                    let value = self.eval(iter)?;
                    let items = value.try_iter().ok_or_else(|| RenderError::NotIterable {
                        expr: iter.source.clone(),
                        kind: value.kind(),
                    })?;

                    let shadowed = self.slots[var.slot].take();
                    for item in items {
                        self.slots[var.slot] = Some(item);
                        self.exec(body, out)?;
                    }
                    self.slots[var.slot] = shadowed;
                }
            }
        }
        Ok(())
    }

    fn load(&self, var: &Var) -> Result<Value, RenderError> {
        self.slots[var.slot]
            .clone()
            .ok_or_else(|| RenderError::MissingVariable(var.name.clone()))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RenderError> {
        let mut value = self.load(&expr.head)?;

        for (i, segment) in expr.path.iter().enumerate() {
            value = self
                .resolver
                .resolve(&value, segment)
                .ok_or_else(|| RenderError::Unresolved {
                    path: dotted(expr, i),
                    segment: segment.clone(),
                })?;
        }

        for filter in &expr.filters {
            let callee = self.load(filter)?;
            let callee = callee
                .as_filter()
                .ok_or_else(|| RenderError::NotCallable(filter.name.clone()))?;
            value = callee
                .call(&value)
                .map_err(|source| RenderError::Filter {
                    name: filter.name.clone(),
                    source,
                })?;
        }

        Ok(value)
    }
}

/// `head.a.b` up to and including path segment `upto`.
fn dotted(expr: &Expr, upto: usize) -> CompactString {
    std::iter::once(expr.head.name.as_str())
        .chain(expr.path[..=upto].iter().map(CompactString::as_str))
        .join(".")
        .into()
}

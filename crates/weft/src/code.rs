//! Indentation-aware builder for the generated render procedure.
//!
//! The compiler writes one [`Stmt`] per line. Block structure is carried by
//! indentation alone, the same way it would be in source text: the body of an
//! `if` or `for` is every following line indented one step deeper. A
//! [`Section`] reserves a position that can be filled in after later lines
//! have been written.

use std::fmt;

use compact_str::CompactString;
use itertools::Itertools;

use crate::{
    program::{Node, Program},
    InternalError,
};

pub(crate) const INDENT_STEP: usize = 4;

/// A variable reference after scope resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Var {
    pub(crate) name: CompactString,
    pub(crate) slot: usize,
    pub(crate) bound_by_loop: bool,
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bound_by_loop {
            write!(f, "l{}_{}", self.slot, self.name)
        } else {
            write!(f, "c_{}", self.name)
        }
    }
}

/// `head.path.path|filter|filter`
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Expr {
    pub(crate) source: CompactString,
    pub(crate) head: Var,
    pub(crate) path: Vec<CompactString>,
    pub(crate) filters: Vec<Var>,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for filter in self.filters.iter().rev() {
            write!(f, "{filter}(")?;
        }
        if self.path.is_empty() {
            write!(f, "{}", self.head)?;
        } else {
            write!(
                f,
                "resolve({}, {})",
                self.head,
                self.path.iter().map(|p| format!("{p:?}")).format(", ")
            )?;
        }
        for _ in &self.filters {
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Piece {
    Literal(String),
    Expr(Expr),
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{text:?}"),
            Self::Expr(expr) => write!(f, "to_str({expr})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Stmt {
    /// Entry point header; the procedure body follows one step deeper.
    Define,
    /// Pull a free variable out of the render context.
    Bind(Var),
    Emit(Vec<Piece>),
    If(Expr),
    For { var: Var, iter: Expr },
    Return,
}

impl Stmt {
    fn opens_block(&self) -> bool {
        matches!(self, Self::Define | Self::If(_) | Self::For { .. })
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Define => f.write_str("render(context, resolve):"),
            Self::Bind(var) => write!(f, "{var} = context[{:?}]", var.name),
            Self::Emit(pieces) => match pieces.as_slice() {
                [piece] => write!(f, "append_result({piece})"),
                pieces => write!(f, "extend_result([{}])", pieces.iter().format(", ")),
            },
            Self::If(expr) => write!(f, "if {expr}:"),
            Self::For { var, iter } => write!(f, "for {var} in {iter}:"),
            Self::Return => f.write_str("return result"),
        }
    }
}

#[derive(Debug)]
enum Chunk {
    Line { indent: usize, stmt: Stmt },
    Section(CodeBuilder),
}

/// Handle to a position reserved with [`CodeBuilder::add_section`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Section(usize);

#[derive(Debug, Default)]
pub(crate) struct CodeBuilder {
    chunks: Vec<Chunk>,
    base_indent: usize,
    indent_level: usize,
    extra_dedent: bool,
}

impl CodeBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with_indent(indent: usize) -> Self {
        Self {
            chunks: Vec::new(),
            base_indent: indent,
            indent_level: indent,
            extra_dedent: false,
        }
    }

    pub(crate) fn add_line(&mut self, stmt: Stmt) {
        self.chunks.push(Chunk::Line {
            indent: self.indent_level,
            stmt,
        });
    }

    pub(crate) fn indent(&mut self) {
        self.indent_level += INDENT_STEP;
    }

    pub(crate) fn dedent(&mut self) {
        match self.indent_level.checked_sub(INDENT_STEP) {
            Some(level) => self.indent_level = level,
            None => self.extra_dedent = true,
        }
    }

    /// Reserves the current position, at the current indentation.
    pub(crate) fn add_section(&mut self) -> Section {
        self.chunks
            .push(Chunk::Section(Self::with_indent(self.indent_level)));
        Section(self.chunks.len() - 1)
    }

    pub(crate) fn section(&mut self, section: Section) -> Result<&mut CodeBuilder, InternalError> {
        match self.chunks.get_mut(section.0) {
            Some(Chunk::Section(builder)) => Ok(builder),
            _ => Err(InternalError::MissingSection { index: section.0 }),
        }
    }

    /// Every indent must have been matched by a dedent, in this builder and
    /// in every section.
    fn check_balanced(&self) -> Result<(), InternalError> {
        if self.extra_dedent {
            return Err(InternalError::ExtraDedent);
        }
        if self.indent_level != self.base_indent {
            return Err(InternalError::UnbalancedIndent {
                expected: self.base_indent,
                found: self.indent_level,
            });
        }
        self.chunks.iter().try_for_each(|chunk| match chunk {
            Chunk::Section(section) => section.check_balanced(),
            Chunk::Line { .. } => Ok(()),
        })
    }

    /// The generated procedure as text, one statement per line.
    pub(crate) fn render(&self) -> Result<String, InternalError> {
        self.check_balanced()?;
        Ok(self.to_string())
    }

    fn flatten<'a>(&'a self, out: &mut Vec<(usize, &'a Stmt)>) {
        for chunk in &self.chunks {
            match chunk {
                Chunk::Line { indent, stmt } => out.push((*indent, stmt)),
                Chunk::Section(section) => section.flatten(out),
            }
        }
    }

    /// Turns the written lines into a runnable [`Program`].
    ///
    /// The first line must be [`Stmt::Define`] and the last line of its body
    /// a [`Stmt::Return`]; anything else means the compiler emitted bad code.
    pub(crate) fn materialize(&self) -> Result<Program, InternalError> {
        self.check_balanced()?;

        let mut lines = Vec::new();
        self.flatten(&mut lines);
        let mut lines = lines.into_iter().enumerate().peekable();

        match lines.next() {
            Some((_, (indent, Stmt::Define))) if indent == self.base_indent => {}
            _ => return Err(InternalError::MissingEntry),
        }

        let mut assembler = Assembler {
            lines,
            body_indent: self.base_indent + INDENT_STEP,
            slots: 0,
            returned: false,
        };
        let body = assembler.block(assembler.body_indent)?;

        if !assembler.returned {
            return Err(InternalError::MissingReturn);
        }
        if let Some((line, _)) = assembler.lines.next() {
            return Err(InternalError::TrailingCode { line: line + 1 });
        }

        Ok(Program::new(body, assembler.slots))
    }
}

impl fmt::Display for CodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.chunks {
            match chunk {
                Chunk::Line { indent, stmt } => writeln!(f, "{:width$}{stmt}", "", width = *indent)?,
                Chunk::Section(section) => fmt::Display::fmt(section, f)?,
            }
        }
        Ok(())
    }
}

struct Assembler<'a, I: Iterator<Item = (usize, (usize, &'a Stmt))>> {
    lines: std::iter::Peekable<I>,
    body_indent: usize,
    slots: usize,
    returned: bool,
}

impl<'a, I> Assembler<'a, I>
where
    I: Iterator<Item = (usize, (usize, &'a Stmt))>,
{
    fn see(&mut self, var: &Var) {
        self.slots = self.slots.max(var.slot + 1);
    }

    fn see_expr(&mut self, expr: &Expr) {
        self.see(&expr.head);
        for filter in &expr.filters {
            self.see(filter);
        }
    }

    /// Collects consecutive lines at exactly `indent`, recursing into the
    /// bodies of block openers.
    fn block(&mut self, indent: usize) -> Result<Vec<Node>, InternalError> {
        let mut nodes = Vec::new();

        while let Some(&(line, (line_indent, stmt))) = self.lines.peek() {
            if line_indent < indent || self.returned {
                break;
            }
            if line_indent > indent {
                return Err(InternalError::UnexpectedIndent { line: line + 1 });
            }
            self.lines.next();

            let body = if stmt.opens_block() {
                self.block(indent + INDENT_STEP)?
            } else {
                Vec::new()
            };

            match stmt {
                Stmt::Define => return Err(InternalError::UnexpectedIndent { line: line + 1 }),
                Stmt::Bind(var) => {
                    self.see(var);
                    nodes.push(Node::Bind(var.clone()));
                }
                Stmt::Emit(pieces) => {
                    for piece in pieces {
                        if let Piece::Expr(expr) = piece {
                            self.see_expr(expr);
                        }
                    }
                    nodes.push(Node::Emit(pieces.clone()));
                }
                Stmt::If(cond) => {
                    self.see_expr(cond);
                    nodes.push(Node::If {
                        cond: cond.clone(),
                        body,
                    });
                }
                Stmt::For { var, iter } => {
                    self.see(var);
                    self.see_expr(iter);
                    nodes.push(Node::For {
                        var: var.clone(),
                        iter: iter.clone(),
                        body,
                    });
                }
                Stmt::Return => {
                    if indent != self.body_indent {
                        return Err(InternalError::UnexpectedIndent { line: line + 1 });
                    }
                    self.returned = true;
                }
            }
        }

        Ok(nodes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn var(name: &str, slot: usize) -> Var {
        Var {
            name: name.into(),
            slot,
            bound_by_loop: false,
        }
    }

    fn expr(name: &str, slot: usize) -> Expr {
        Expr {
            source: name.into(),
            head: var(name, slot),
            path: Vec::new(),
            filters: Vec::new(),
        }
    }

    #[test]
    fn section_is_backfilled() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.indent();
        let vars = code.add_section();
        code.add_line(Stmt::Emit(vec![Piece::Expr(expr("a", 0))]));
        code.add_line(Stmt::Return);
        code.dedent();

        code.section(vars).unwrap().add_line(Stmt::Bind(var("a", 0)));

        assert_eq!(
            code.render().unwrap(),
            "render(context, resolve):\n    c_a = context[\"a\"]\n    append_result(to_str(c_a))\n    return result\n"
        );
    }

    #[test]
    fn unbalanced() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.indent();
        code.add_line(Stmt::Return);
        assert!(matches!(
            code.render(),
            Err(InternalError::UnbalancedIndent {
                expected: 0,
                found: 4
            })
        ));
        assert!(code.materialize().is_err());
    }

    #[test]
    fn section_handle_must_name_a_section() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        assert!(matches!(
            code.section(Section(0)),
            Err(InternalError::MissingSection { index: 0 })
        ));
        assert!(matches!(
            code.section(Section(7)),
            Err(InternalError::MissingSection { index: 7 })
        ));
    }

    #[test]
    fn extra_dedent() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.dedent();
        assert!(matches!(code.render(), Err(InternalError::ExtraDedent)));
    }

    #[test]
    fn unbalanced_section() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.indent();
        let section = code.add_section();
        code.add_line(Stmt::Return);
        code.dedent();
        code.section(section).unwrap().indent();
        assert!(matches!(
            code.materialize(),
            Err(InternalError::UnbalancedIndent {
                expected: 4,
                found: 8
            })
        ));
    }

    #[test]
    fn materialize_nesting() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.indent();
        code.add_line(Stmt::If(expr("a", 0)));
        code.indent();
        code.add_line(Stmt::Emit(vec![Piece::Literal("x".into())]));
        code.dedent();
        code.add_line(Stmt::Emit(vec![Piece::Literal("y".into())]));
        code.add_line(Stmt::Return);
        code.dedent();

        let program = code.materialize().unwrap();
        assert_eq!(
            program.body(),
            [
                Node::If {
                    cond: expr("a", 0),
                    body: vec![Node::Emit(vec![Piece::Literal("x".into())])],
                },
                Node::Emit(vec![Piece::Literal("y".into())]),
            ]
        );
        assert_eq!(program.slots(), 1);
    }

    #[test]
    fn missing_entry_and_return() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Return);
        assert!(matches!(
            code.materialize(),
            Err(InternalError::MissingEntry)
        ));

        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        assert!(matches!(
            code.materialize(),
            Err(InternalError::MissingReturn)
        ));
    }

    #[test]
    fn trailing_code() {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.indent();
        code.add_line(Stmt::Return);
        code.add_line(Stmt::Emit(vec![Piece::Literal("late".into())]));
        code.dedent();
        assert!(matches!(
            code.materialize(),
            Err(InternalError::TrailingCode { line: 3 })
        ));
    }

    #[test]
    fn literal_is_quoted() {
        let stmt = Stmt::Emit(vec![
            Piece::Literal("say \"hi\"\n".into()),
            Piece::Expr(expr("a", 0)),
        ]);
        assert_eq!(
            stmt.to_string(),
            r#"extend_result(["say \"hi\"\n", to_str(c_a)])"#
        );
    }
}

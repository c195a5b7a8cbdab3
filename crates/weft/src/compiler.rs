use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;
use tracing::{debug, trace};

use crate::{
    code::{CodeBuilder, Expr, Piece, Stmt, Var},
    program::Program,
    tokenizer::{tokenize, Token, TokenKind},
    CompileError, SyntaxError, SyntaxErrorKind,
};

/// How many `if`/`for` blocks may be open at once.
pub const MAX_DEPTH: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
enum BlockKind {
    If,
    For,
}

#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    token: Token,
    /// Loop variable introduced by a `for`, with its slot.
    binds: Option<(CompactString, usize)>,
}

/// Output of a successful compilation.
#[derive(Debug)]
pub(crate) struct Compiled {
    pub(crate) program: Program,
    pub(crate) code: String,
    pub(crate) all_vars: BTreeSet<CompactString>,
    pub(crate) loop_vars: BTreeSet<CompactString>,
    pub(crate) free_vars: BTreeSet<CompactString>,
}

pub(crate) fn compile(source: &str) -> Result<Compiled, CompileError> {
    Compiler::new(source).compile()
}

struct Compiler<'s> {
    source: &'s str,
    /// Every name referenced by an expression or bound by a loop.
    all_vars: BTreeSet<CompactString>,
    /// Every name bound by a `for`.
    loop_vars: BTreeSet<CompactString>,
    /// Names referenced outside any loop binding them, with their slot.
    free: BTreeMap<CompactString, usize>,
    ops_stack: Vec<OpenBlock>,
    buffered: Vec<Piece>,
    slots: usize,
}

impl<'s> Compiler<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            all_vars: BTreeSet::new(),
            loop_vars: BTreeSet::new(),
            free: BTreeMap::new(),
            ops_stack: Vec::new(),
            buffered: Vec::new(),
            slots: 0,
        }
    }

    fn compile(mut self) -> Result<Compiled, CompileError> {
        let mut code = CodeBuilder::new();
        code.add_line(Stmt::Define);
        code.indent();
        let vars_code = code.add_section();

        for token in tokenize(self.source) {
            match token.kind {
                TokenKind::Comment => {}
                TokenKind::Expr => {
                    let expr = self.expr_code(token.inner(self.source), &token)?;
                    self.buffered.push(Piece::Expr(expr));
                }
                TokenKind::Tag => {
                    self.flush_output(&mut code);
                    self.action(&token, &mut code)?;
                }
                TokenKind::Text => {
                    let text = token.text(self.source);
                    if !text.is_empty() {
                        self.buffered.push(Piece::Literal(text.to_owned()));
                    }
                }
            }
        }

        if let Some(open) = self.ops_stack.last() {
            return Err(self.error(SyntaxErrorKind::Unclosed, &open.token).into());
        }
        self.flush_output(&mut code);

        let vars_code = code.section(vars_code)?;
        for (name, &slot) in &self.free {
            vars_code.add_line(Stmt::Bind(Var {
                name: name.clone(),
                slot,
                bound_by_loop: false,
            }));
        }

        code.add_line(Stmt::Return);
        code.dedent();

        let program = code.materialize()?;
        let listing = code.render()?;

        debug!(
            free_vars = self.free.len(),
            loop_vars = self.loop_vars.len(),
            slots = self.slots,
            "compiled template"
        );
        trace!("generated code:\n{listing}");

        Ok(Compiled {
            program,
            code: listing,
            free_vars: self.free.into_keys().collect(),
            all_vars: self.all_vars,
            loop_vars: self.loop_vars,
        })
    }

    /// Emits the buffered output as a single statement.
    fn flush_output(&mut self, code: &mut CodeBuilder) {
        if !self.buffered.is_empty() {
            code.add_line(Stmt::Emit(std::mem::take(&mut self.buffered)));
        }
    }

    fn action(&mut self, token: &Token, code: &mut CodeBuilder) -> Result<(), SyntaxError> {
        let words: Vec<&str> = token.inner(self.source).split_whitespace().collect();

        match words.as_slice() {
            [] => return Err(self.error(SyntaxErrorKind::EmptyTag, token)),
            ["if", args @ ..] => {
                let [cond] = args else {
                    return Err(self.error(SyntaxErrorKind::BadIf, token));
                };
                let cond = self.expr_code(cond, token)?;
                self.check_depth(token)?;
                self.ops_stack.push(OpenBlock {
                    kind: BlockKind::If,
                    token: *token,
                    binds: None,
                });
                code.add_line(Stmt::If(cond));
                code.indent();
            }
            ["for", args @ ..] => {
                let [name, "in", iter] = args else {
                    return Err(self.error(SyntaxErrorKind::BadFor, token));
                };
                if !is_identifier(name) {
                    return Err(self.error(SyntaxErrorKind::InvalidName, token));
                }
                // The iterable is evaluated outside the loop's own scope.
                let iter = self.expr_code(iter, token)?;

                let name = CompactString::from(*name);
                let slot = self.next_slot();
                self.all_vars.insert(name.clone());
                self.loop_vars.insert(name.clone());
                self.check_depth(token)?;
                self.ops_stack.push(OpenBlock {
                    kind: BlockKind::For,
                    token: *token,
                    binds: Some((name.clone(), slot)),
                });

                code.add_line(Stmt::For {
                    var: Var {
                        name,
                        slot,
                        bound_by_loop: true,
                    },
                    iter,
                });
                code.indent();
            }
            [first, args @ ..] if first.starts_with("end") => {
                if !args.is_empty() {
                    return Err(self.error(SyntaxErrorKind::BadEnd, token));
                }
                let end_what = &first["end".len()..];
                let Some(start) = self.ops_stack.pop() else {
                    return Err(self.error(SyntaxErrorKind::TooManyEnds, token));
                };
                if start.kind.as_ref() != end_what {
                    return Err(self.error(SyntaxErrorKind::MismatchedEnd, token));
                }
                code.dedent();
            }
            _ => return Err(self.error(SyntaxErrorKind::UnknownTag, token)),
        }

        Ok(())
    }

    /// Compiles `path.to.value|filter|filter`.
    fn expr_code(&mut self, text: &str, token: &Token) -> Result<Expr, SyntaxError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.error(SyntaxErrorKind::EmptyExpression, token));
        }

        let mut pipes = text.split('|').map(str::trim);
        let mut dots = pipes.next().unwrap_or_default().split('.');
        let head = dots.next().unwrap_or_default();
        if !is_identifier(head) {
            return Err(self.error(SyntaxErrorKind::InvalidName, token));
        }

        let mut path = Vec::new();
        for segment in dots {
            if !is_path_segment(segment) {
                return Err(self.error(SyntaxErrorKind::InvalidName, token));
            }
            path.push(CompactString::from(segment));
        }

        let head = self.variable(head);

        let mut filters = Vec::new();
        for name in pipes {
            if !is_identifier(name) {
                return Err(self.error(SyntaxErrorKind::InvalidName, token));
            }
            filters.push(self.variable(name));
        }

        Ok(Expr {
            source: text.into(),
            head,
            path,
            filters,
        })
    }

    /// Resolves a bare name against the enclosing loops, falling back to a
    /// free variable pulled from the render context.
    fn variable(&mut self, name: &str) -> Var {
        self.all_vars.insert(name.into());

        let bound = self.ops_stack.iter().rev().find_map(|block| match &block.binds {
            Some((bound, slot)) if bound == name => Some(*slot),
            _ => None,
        });
        if let Some(slot) = bound {
            return Var {
                name: name.into(),
                slot,
                bound_by_loop: true,
            };
        }

        let next = self.slots;
        let slot = *self.free.entry(name.into()).or_insert(next);
        if slot == next {
            self.slots += 1;
        }
        Var {
            name: name.into(),
            slot,
            bound_by_loop: false,
        }
    }

    /// Rendering recurses once per open block, so nesting is capped.
    fn check_depth(&self, token: &Token) -> Result<(), SyntaxError> {
        if self.ops_stack.len() >= MAX_DEPTH {
            return Err(self.error(SyntaxErrorKind::TooDeep, token));
        }
        Ok(())
    }

    fn next_slot(&mut self) -> usize {
        self.slots += 1;
        self.slots - 1
    }

    fn error(&self, kind: SyntaxErrorKind, token: &Token) -> SyntaxError {
        SyntaxError::new(kind, self.source, token.span())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Components after the head may also be list indices.
fn is_path_segment(s: &str) -> bool {
    is_identifier(s) || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn syntax_kind(source: &str) -> SyntaxErrorKind {
        match compile(source) {
            Err(CompileError::Syntax(err)) => err.kind,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("_a1"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
        assert!(is_path_segment("0"));
        assert!(is_path_segment("name"));
        assert!(!is_path_segment(""));
    }

    #[test]
    fn generated_code() {
        let compiled = compile(
            "Hello {{ user.name|upper }}!{% for x in items %}{% if x %}{{ x }},{% endif %}{% endfor %}",
        )
        .unwrap();

        assert_eq!(
            compiled.code,
            r#"render(context, resolve):
    c_items = context["items"]
    c_upper = context["upper"]
    c_user = context["user"]
    extend_result(["Hello ", to_str(c_upper(resolve(c_user, "name"))), "!"])
    for l3_x in c_items:
        if l3_x:
            extend_result([to_str(l3_x), ","])
    return result
"#
        );
    }

    #[test]
    fn variable_sets() {
        let compiled = compile("{% for x in xs %}{{ x|f }}{% endfor %}{{ x }}").unwrap();
        let names = |set: &BTreeSet<CompactString>| set.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(names(&compiled.all_vars), ["f", "x", "xs"]);
        assert_eq!(names(&compiled.loop_vars), ["x"]);
        assert_eq!(names(&compiled.free_vars), ["f", "x", "xs"]);
    }

    #[test]
    fn loop_iterable_sees_outer_scope() {
        let compiled = compile("{% for x in x %}{{ x }}{% endfor %}").unwrap();
        assert_eq!(compiled.free_vars.len(), 1);
        assert!(compiled.code.contains("for l1_x in c_x:"));
    }

    #[test]
    fn errors() {
        assert_eq!(syntax_kind("{% %}"), SyntaxErrorKind::EmptyTag);
        assert_eq!(syntax_kind("{% if %}"), SyntaxErrorKind::BadIf);
        assert_eq!(syntax_kind("{% if a b %}"), SyntaxErrorKind::BadIf);
        assert_eq!(syntax_kind("{% for x on y %}"), SyntaxErrorKind::BadFor);
        assert_eq!(syntax_kind("{% for x in %}"), SyntaxErrorKind::BadFor);
        assert_eq!(syntax_kind("{% for 1 in y %}"), SyntaxErrorKind::InvalidName);
        assert_eq!(
            syntax_kind("{% if a %}{% endif now %}"),
            SyntaxErrorKind::BadEnd
        );
        assert_eq!(syntax_kind("{% endif %}"), SyntaxErrorKind::TooManyEnds);
        assert_eq!(
            syntax_kind("{% if a %}{% endfor %}"),
            SyntaxErrorKind::MismatchedEnd
        );
        assert_eq!(syntax_kind("{% while a %}"), SyntaxErrorKind::UnknownTag);
        assert_eq!(syntax_kind("{% if a %}x"), SyntaxErrorKind::Unclosed);
        assert_eq!(syntax_kind("{{ }}"), SyntaxErrorKind::EmptyExpression);
        assert_eq!(syntax_kind("{{ a..b }}"), SyntaxErrorKind::InvalidName);
        assert_eq!(syntax_kind("{{ a| }}"), SyntaxErrorKind::InvalidName);
        assert_eq!(syntax_kind("{{ a + b }}"), SyntaxErrorKind::InvalidName);
    }

    #[test]
    fn unclosed_points_at_opening_tag() {
        let err = match compile("a{% for x in y %}{% if x %}{% endif %}") {
            Err(CompileError::Syntax(err)) => err,
            other => panic!("expected a syntax error, got {other:?}"),
        };
        assert_eq!(err.token, "{% for x in y %}");
        assert_eq!(err.span(), 1..17);
    }

    #[test]
    fn output_is_batched() {
        let compiled = compile("a{{ b }}c{# skip #}d").unwrap();
        assert_eq!(
            compiled.code.lines().filter(|l| l.contains("_result(")).count(),
            1
        );
    }
}

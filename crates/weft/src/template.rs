use std::{collections::BTreeMap, io::Write, str::FromStr, sync::Arc};

use compact_str::CompactString;

use crate::{
    compiler::{compile, Compiled},
    program::Program,
    values::Layered,
    CompileError, RenderError, Resolve, Value, Values,
};

/// Values shared by every render of a template: filters and globals.
pub type Context = BTreeMap<String, Value>;

/// A compiled template.
///
/// Compilation happens once, in [`Template::new`] or
/// [`Template::with_contexts`]; rendering doesn't mutate the template, so a
/// `Template` can be rendered from many threads at once.
#[derive(Clone, Debug)]
pub struct Template {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    context: Context,
    program: Program,
    code: String,
    all_vars: Vec<CompactString>,
    loop_vars: Vec<CompactString>,
    free_vars: Vec<CompactString>,
}

impl Template {
    /// Compiles `text` with an empty base context.
    pub fn new(text: &str) -> Result<Self, CompileError> {
        Self::with_contexts(text, [])
    }

    /// Compiles `text`, merging `contexts` left to right into the base
    /// context. Later contexts win when they share a key.
    pub fn with_contexts<I>(text: &str, contexts: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = Context>,
    {
        let mut context = Context::new();
        for ctx in contexts {
            context.extend(ctx);
        }

        let Compiled {
            program,
            code,
            all_vars,
            loop_vars,
            free_vars,
        } = compile(text)?;

        Ok(Self {
            inner: Arc::new(Inner {
                context,
                program,
                code,
                all_vars: all_vars.into_iter().collect(),
                loop_vars: loop_vars.into_iter().collect(),
                free_vars: free_vars.into_iter().collect(),
            }),
        })
    }

    /// Renders the template to a string.
    ///
    /// `values` are consulted before the base context. `resolver` walks the
    /// dotted paths; [`Dots`](crate::Dots) handles maps, lists and
    /// [`Object`](crate::Object)s.
    pub fn render<V, R>(&self, values: &V, resolver: &R) -> Result<String, RenderError>
    where
        V: Values + ?Sized,
        R: Resolve + ?Sized,
    {
        let layered = Layered {
            top: values,
            base: &self.inner.context,
        };
        let mut out = String::new();
        self.inner.program.run(&layered, resolver, &mut out)?;
        Ok(out)
    }

    /// Renders the template to a writer.
    ///
    /// Nothing is written if rendering fails.
    pub fn render_into<V, R>(
        &self,
        writer: &mut dyn Write,
        values: &V,
        resolver: &R,
    ) -> Result<(), RenderError>
    where
        V: Values + ?Sized,
        R: Resolve + ?Sized,
    {
        let out = self.render(values, resolver)?;
        writer.write_all(out.as_bytes())?;
        Ok(())
    }

    /// The merged base context.
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Names that have to come from the values or the base context, sorted.
    pub fn free_vars(&self) -> impl Iterator<Item = &str> {
        self.inner.free_vars.iter().map(CompactString::as_str)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.free_vars().any(|var| var == name)
    }

    /// Every name the template mentions, loop variables and filters included.
    pub fn all_vars(&self) -> impl Iterator<Item = &str> {
        self.inner.all_vars.iter().map(CompactString::as_str)
    }

    /// Names bound by `{% for %}` tags.
    pub fn loop_vars(&self) -> impl Iterator<Item = &str> {
        self.inner.loop_vars.iter().map(CompactString::as_str)
    }

    /// Listing of the generated render procedure, for debugging.
    pub fn code(&self) -> &str {
        &self.inner.code
    }
}

impl FromStr for Template {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

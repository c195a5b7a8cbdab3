//! Compile text templates once, render them many times.
//!
//! Weft turns a template into a small render procedure up front, so every
//! render is a walk over already-validated code. It deliberately supports
//! very little: lookups, filters, conditionals, loops and comments.
//!
//! # Syntax
//!
//! ```plain
//! {# a comment, never rendered #}
//! Hello {{ user.name|upper }}!
//! {% if user.admin %}You can see everything.{% endif %}
//! {% for item in cart.items %}- {{ item.title }}
//! {% endfor %}
//! ```
//!
//! - `{{ path.to.value|filter|filter }}` renders a value. The first name is a
//!   variable; every `.segment` after it is looked up through the resolver
//!   passed at render time; every `|name` passes the value through the
//!   filter bound to `name`.
//! - `{% if expr %}...{% endif %}` renders its body when `expr` is truthy.
//! - `{% for name in expr %}...{% endfor %}` renders its body once per item.
//!   `name` is only bound inside the loop.
//! - `{# ... #}` is dropped entirely.
//! - Everything else is copied as-is.
//!
//! Tags must nest properly, at most [`MAX_DEPTH`] blocks deep. There is no
//! `else`, no operators and no arithmetic.
//!
//! # Usage
//!
//! ```
//! use std::collections::HashMap;
//! use weft::{filters, Dots, Template, Value};
//!
//! let template = Template::with_contexts(
//!     "{% for n in names %}{{ n|capitalize }}, {% endfor %}",
//!     [filters::builtins()],
//! )
//! .unwrap();
//!
//! let mut values = HashMap::new();
//! values.insert("names", Value::from(vec!["ada", "grace"]));
//! assert_eq!(template.render(&values, &Dots).unwrap(), "Ada, Grace, ");
//! ```
//!
//! Values come from anything implementing [`Values`]: maps, slices of pairs,
//! or a closure through [`vals()`]. Base contexts passed at compile time are
//! consulted after them, which is the usual place for filters.
//!
//! Dotted paths are walked by a [`Resolve`]r. [`Dots`] looks at
//! [`Object`] attributes, then map keys and list indices; any
//! `Fn(&Value, &str) -> Option<Value>` works too:
//!
//! ```
//! use weft::{Template, Value};
//!
//! let template = Template::new("{{ word.shout }}").unwrap();
//! let shout = |value: &Value, key: &str| match (value, key) {
//!     (Value::Str(s), "shout") => Some(Value::from(s.to_uppercase())),
//!     _ => None,
//! };
//! assert_eq!(
//!     template.render(&[("word", Value::from("hey"))], &shout).unwrap(),
//!     "HEY",
//! );
//! ```
//!
//! # Errors
//!
//! A malformed template fails [`Template::new`] with
//! [`CompileError::Syntax`], pointing at the offending tag. No partial
//! template is ever produced.
//!
//! Rendering fails with a [`RenderError`] when a variable is missing, a path
//! segment doesn't resolve, or a filter isn't a filter or returns an error.
//! The template stays usable after a failed render.
//!
//! [`CompileError::Internal`] means weft generated code it couldn't run, which
//! is a bug.

pub use compiler::MAX_DEPTH;

#[doc(inline)]
pub use error::*;

#[doc(inline)]
pub use resolve::*;

#[doc(inline)]
pub use template::*;

#[doc(inline)]
pub use value::{Filter, FilterError, Object, Value};

#[doc(inline)]
pub use values::*;

mod code;
mod compiler;
mod error;
pub mod filters;
mod program;
mod resolve;
mod template;
mod tokenizer;
mod value;
mod values;

//! Stock filters.
//!
//! Filters are ordinary values, so these are only available to templates
//! compiled with [`builtins()`] among their contexts:
//!
//! ```
//! use weft::{filters, Dots, Template, Value};
//!
//! let template = Template::with_contexts("{{ name|upper }}", [filters::builtins()]).unwrap();
//! assert_eq!(template.render(&[("name", Value::from("bo"))], &Dots).unwrap(), "BO");
//! ```

use crate::{value::FilterError, Context, Value};

/// All stock filters, keyed by name.
pub fn builtins() -> Context {
    [
        ("upper", Value::filter(upper)),
        ("lower", Value::filter(lower)),
        ("capitalize", Value::filter(capitalize)),
        ("title", Value::filter(title)),
        ("trim", Value::filter(trim)),
        ("length", Value::filter(length)),
        ("first", Value::filter(first)),
        ("last", Value::filter(last)),
    ]
    .into_iter()
    .map(|(name, filter)| (name.to_owned(), filter))
    .collect()
}

fn upper(value: &Value) -> Result<Value, FilterError> {
    Ok(value.to_string().to_uppercase().into())
}

fn lower(value: &Value) -> Result<Value, FilterError> {
    Ok(value.to_string().to_lowercase().into())
}

fn capitalize(value: &Value) -> Result<Value, FilterError> {
    let s = value.to_string();
    let mut chars = s.chars();
    Ok(match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect::<String>(),
        None => String::new(),
    }
    .into())
}

fn title(value: &Value) -> Result<Value, FilterError> {
    let mut out = String::new();
    let mut word_start = true;
    for c in value.to_string().chars() {
        if c.is_alphanumeric() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    Ok(out.into())
}

fn trim(value: &Value) -> Result<Value, FilterError> {
    Ok(value.to_string().trim().into())
}

fn length(value: &Value) -> Result<Value, FilterError> {
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(format!("cannot take the length of a {}", other.kind()).into());
        }
    };
    Ok(Value::Int(i64::try_from(len)?))
}

fn first(value: &Value) -> Result<Value, FilterError> {
    let items = value
        .try_iter()
        .ok_or_else(|| format!("a {} has no first item", value.kind()))?;
    Ok(items.into_iter().next().unwrap_or_default())
}

fn last(value: &Value) -> Result<Value, FilterError> {
    let items = value
        .try_iter()
        .ok_or_else(|| format!("a {} has no last item", value.kind()))?;
    Ok(items.into_iter().last().unwrap_or_default())
}

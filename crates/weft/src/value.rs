//! Runtime values seen by a compiled template.
//!
//! Containers are reference counted so that binding a variable, walking a
//! dotted path or iterating a loop only bumps a counter.

use std::{collections::BTreeMap, fmt, sync::Arc};

use itertools::Itertools;
use serde::Serialize;

/// Error type returned by [`Filter`]s.
pub type FilterError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A named unary transform applied with `|` in a template.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Value) -> Result<Value, FilterError> + Send + Sync>);

impl Filter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &Value) -> Result<Value, FilterError> {
        (self.0)(value)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// A host value exposed to templates.
///
/// Implement this for types that should be reachable through dotted paths
/// without converting them into maps first. All methods have defaults, so an
/// object only needs to provide what it supports.
pub trait Object: fmt::Debug + fmt::Display + Send + Sync {
    /// Attribute-style access, tried first by [`Dots`](crate::Dots).
    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Item-style access, tried when attribute access fails.
    fn get_item(&self, _key: &str) -> Option<Value> {
        None
    }

    fn is_true(&self) -> bool {
        true
    }

    /// Items yielded by `{% for %}`, or `None` if the object isn't iterable.
    fn try_iter(&self) -> Option<Vec<Value>> {
        None
    }
}

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<[Value]>),
    Map(Arc<BTreeMap<String, Value>>),
    Filter(Filter),
    Object(Arc<dyn Object>),
}

impl Value {
    /// Wraps a closure as a filter value.
    pub fn filter<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        Self::Filter(Filter::new(f))
    }

    pub fn object(object: impl Object + 'static) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Converts anything serde can serialize, going through `serde_json`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    pub fn is_true(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(x) => *x != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Filter(_) => true,
            Self::Object(obj) => obj.is_true(),
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Filter(_) => "filter",
            Self::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_filter(&self) -> Option<&Filter> {
        match self {
            Self::Filter(f) => Some(f),
            _ => None,
        }
    }

    /// The items a `{% for %}` loop walks over.
    ///
    /// Maps yield their keys and strings yield one value per character.
    pub fn try_iter(&self) -> Option<Vec<Value>> {
        match self {
            Self::List(items) => Some(items.to_vec()),
            Self::Map(map) => Some(map.keys().map(|k| Value::from(k.as_str())).collect()),
            Self::Str(s) => Some(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Self::Object(obj) => obj.try_iter(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            // Whole floats keep their fraction so they don't read as ints.
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.iter().format(", ")),
            Self::Map(map) => write!(
                f,
                "{{{}}}",
                map.iter()
                    .format_with(", ", |(k, v), f| f(&format_args!("{k}: {v}")))
            ),
            Self::Filter(_) => f.write_str("<filter>"),
            Self::Object(obj) => fmt::Display::fmt(obj, f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Filter(a), Self::Filter(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Int(n.into())
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<Filter> for Value {
    fn from(f: Filter) -> Self {
        Self::Filter(f)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::None, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(Arc::new(map))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::None,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .unwrap_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN))),
            Json::String(s) => Self::from(s),
            Json::Array(items) => Self::from(items),
            Json::Object(map) => map.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::None.is_true());
        assert!(!Value::from(0).is_true());
        assert!(!Value::from("").is_true());
        assert!(!Value::from(Vec::<Value>::new()).is_true());
        assert!(!Value::from(0.0).is_true());
        assert!(!Value::from(BTreeMap::<String, Value>::new()).is_true());
        assert!(Value::from(0.5).is_true());
        assert!(Value::from("0").is_true());
        assert!(Value::filter(|v| Ok(v.clone())).is_true());
    }

    #[test]
    fn display() {
        assert_eq!(Value::None.to_string(), "");
        assert_eq!(Value::from(2.0).to_string(), "2.0");
        assert_eq!(Value::from(-0.25).to_string(), "-0.25");
        assert_eq!(Value::from(f64::INFINITY).to_string(), "inf");
        assert_eq!(Value::from(vec![1, 2, 3]).to_string(), "[1, 2, 3]");
        let map: Value = [("a", Value::from(1)), ("b", Value::from("x"))]
            .into_iter()
            .collect();
        assert_eq!(map.to_string(), "{a: 1, b: x}");
    }

    #[test]
    fn from_json() {
        let value = Value::from(serde_json::json!({
            "n": 3,
            "f": 1.5,
            "list": [true, null],
        }));
        let expected: Value = [
            ("f", Value::Float(1.5)),
            ("list", Value::from(vec![Value::Bool(true), Value::None])),
            ("n", Value::Int(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(value, expected);
    }

    #[test]
    fn iterate_map_and_str() {
        let map: Value = [("x", 1), ("y", 2)].into_iter().collect();
        assert_eq!(
            map.try_iter().unwrap(),
            vec![Value::from("x"), Value::from("y")]
        );
        assert_eq!(
            Value::from("hé").try_iter().unwrap(),
            vec![Value::from("h"), Value::from("é")]
        );
        assert!(Value::from(3).try_iter().is_none());
    }
}

use std::{
    borrow::{Borrow, Cow},
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};

use crate::Value;

/// Per-call variables handed to [`Template::render`](crate::Template::render).
pub trait Values {
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>>;
}

impl<T> Values for &T
where
    T: Values + ?Sized,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        T::get_value(self, key)
    }
}

impl<K, V> Values for [(K, V)]
where
    K: AsRef<str>,
    V: Borrow<Value>,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.iter().find_map(|(k, v)| {
            if k.as_ref() == key {
                Some(Cow::Borrowed(v.borrow()))
            } else {
                None
            }
        })
    }
}

impl<K, V, const N: usize> Values for [(K, V); N]
where
    K: AsRef<str>,
    V: Borrow<Value>,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.as_slice().get_value(key)
    }
}

impl<K, V> Values for Vec<(K, V)>
where
    K: AsRef<str>,
    V: Borrow<Value>,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.as_slice().get_value(key)
    }
}

impl<K, V, S> Values for HashMap<K, V, S>
where
    K: Borrow<str> + Eq + Hash,
    V: Borrow<Value>,
    S: BuildHasher,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.get(key).map(|v| Cow::Borrowed(v.borrow()))
    }
}

impl<K, V> Values for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: Borrow<Value>,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.get(key).map(|v| Cow::Borrowed(v.borrow()))
    }
}

/// Workaround to allow using functions as [`Values`].
///
/// As this isn't constructible you'll want to use [`vals()`] instead.
pub struct ValuesFn<F> {
    inner: F,
}

impl<F> Values for ValuesFn<F>
where
    F: Fn(&str) -> Option<Value>,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        (self.inner)(key).map(Cow::Owned)
    }
}

/// Use a function as [`Values`].
///
/// ```
/// use weft::{vals, Dots, Template, Value};
///
/// let template = Template::new("hello {{ name }}").unwrap();
/// let out = template
///     .render(&vals(|key| (key == "name").then(|| Value::from("ida"))), &Dots)
///     .unwrap();
/// assert_eq!(out, "hello ida");
/// ```
pub const fn vals<F>(func: F) -> ValuesFn<F>
where
    F: Fn(&str) -> Option<Value>,
{
    ValuesFn { inner: func }
}

/// Per-call values layered over a fallback, the first one wins.
pub(crate) struct Layered<'a, A: ?Sized, B: ?Sized> {
    pub(crate) top: &'a A,
    pub(crate) base: &'a B,
}

impl<A, B> Values for Layered<'_, A, B>
where
    A: Values + ?Sized,
    B: Values + ?Sized,
{
    fn get_value(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.top
            .get_value(key)
            .or_else(|| self.base.get_value(key))
    }
}

use crate::Value;

/// Walks one segment of a dotted path.
///
/// `{{ user.name }}` looks up `user`, then asks the resolver for `name` on
/// the result. Templates never decide how that lookup happens; the caller
/// supplies it at render time. Returning `None` fails the render with
/// [`RenderError::Unresolved`](crate::RenderError::Unresolved).
///
/// Any `Fn(&Value, &str) -> Option<Value>` is a resolver. [`Dots`] covers
/// the common cases.
pub trait Resolve {
    fn resolve(&self, value: &Value, key: &str) -> Option<Value>;
}

impl<F> Resolve for F
where
    F: Fn(&Value, &str) -> Option<Value>,
{
    fn resolve(&self, value: &Value, key: &str) -> Option<Value> {
        (self)(value, key)
    }
}

/// The stock resolver: attribute access first, then item access.
///
/// - objects: [`Object::get_attr`](crate::Object::get_attr), then
///   [`Object::get_item`](crate::Object::get_item)
/// - maps: the entry under `key`
/// - lists: the element at `key` parsed as an index
#[derive(Clone, Copy, Debug, Default)]
pub struct Dots;

impl Resolve for Dots {
    fn resolve(&self, value: &Value, key: &str) -> Option<Value> {
        match value {
            Value::Object(obj) => obj.get_attr(key).or_else(|| obj.get_item(key)),
            Value::Map(map) => map.get(key).cloned(),
            Value::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use std::fmt;

    use super::*;
    use crate::Object;

    #[derive(Debug)]
    struct Point;

    impl fmt::Display for Point {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("(1, 2)")
        }
    }

    impl Object for Point {
        fn get_attr(&self, name: &str) -> Option<Value> {
            match name {
                "x" => Some(1.into()),
                "y" => Some(2.into()),
                _ => None,
            }
        }

        fn get_item(&self, key: &str) -> Option<Value> {
            (key == "x").then(|| "item".into())
        }
    }

    #[test]
    fn attribute_before_item() {
        let point = Value::object(Point);
        assert_eq!(Dots.resolve(&point, "x"), Some(Value::from(1)));
        assert_eq!(Dots.resolve(&point, "z"), None);
    }

    #[test]
    fn containers() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(Dots.resolve(&list, "1"), Some(Value::from("b")));
        assert_eq!(Dots.resolve(&list, "2"), None);
        assert_eq!(Dots.resolve(&list, "len"), None);

        let map: Value = [("k", 5)].into_iter().collect();
        assert_eq!(Dots.resolve(&map, "k"), Some(Value::from(5)));
        assert_eq!(Dots.resolve(&Value::from(3), "k"), None);
    }

    #[test]
    fn closure_resolver() {
        let upper = |value: &Value, key: &str| {
            value
                .as_str()
                .filter(|_| key == "upper")
                .map(|s| Value::from(s.to_uppercase()))
        };
        assert_eq!(
            upper.resolve(&Value::from("ab"), "upper"),
            Some(Value::from("AB"))
        );
    }
}

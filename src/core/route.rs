//! Routing keys as accepted by `publish` and `subscribe`.

use std::fmt;

/// A single routing key or pattern, or several of them.
///
/// `Multiple` is handled by iterating: one independent subscribe or dispatch
/// per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Single(String),
    Multiple(Vec<String>),
}

impl Route {
    /// The individual keys, in the order given.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let keys: &[String] = match self {
            Route::Single(key) => std::slice::from_ref(key),
            Route::Multiple(keys) => keys,
        };
        keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            Route::Single(_) => 1,
            Route::Multiple(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Single(key) => f.write_str(key),
            Route::Multiple(keys) => write!(f, "[{}]", keys.join(", ")),
        }
    }
}

impl From<&str> for Route {
    fn from(key: &str) -> Self {
        Route::Single(key.to_owned())
    }
}

impl From<String> for Route {
    fn from(key: String) -> Self {
        Route::Single(key)
    }
}

impl From<&String> for Route {
    fn from(key: &String) -> Self {
        Route::Single(key.clone())
    }
}

impl From<Vec<String>> for Route {
    fn from(keys: Vec<String>) -> Self {
        Route::Multiple(keys)
    }
}

impl From<Vec<&str>> for Route {
    fn from(keys: Vec<&str>) -> Self {
        Route::Multiple(keys.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[&str]> for Route {
    fn from(keys: &[&str]) -> Self {
        Route::Multiple(keys.iter().map(|k| (*k).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Route {
    fn from(keys: [&str; N]) -> Self {
        Route::Multiple(keys.iter().map(|k| (*k).to_owned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_iterate_in_given_order() {
        let route = Route::from(["a.b", "c", "d.e.f"]);
        assert_eq!(route.keys().collect::<Vec<_>>(), vec!["a.b", "c", "d.e.f"]);
        assert_eq!(route.len(), 3);

        let single = Route::from("x.y");
        assert_eq!(single.keys().collect::<Vec<_>>(), vec!["x.y"]);
        assert_eq!(single.to_string(), "x.y");
    }
}

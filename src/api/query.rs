//! Query-string parameters
//!
//! Keys keep their insertion order. Booleans encode as `true`/`false` and a
//! list value repeats its key once per element.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: Vec<(String, Vec<String>)>,
}

/// A value that can be placed in a [`Query`]
pub trait QueryValue {
    fn into_values(self) -> Vec<String>;
}

impl QueryValue for bool {
    fn into_values(self) -> Vec<String> {
        vec![if self { "true" } else { "false" }.to_string()]
    }
}

impl QueryValue for &str {
    fn into_values(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl QueryValue for String {
    fn into_values(self) -> Vec<String> {
        vec![self]
    }
}

impl QueryValue for &String {
    fn into_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

macro_rules! integer_query_value {
    ($($t:ty),*) => {
        $(impl QueryValue for $t {
            fn into_values(self) -> Vec<String> {
                vec![self.to_string()]
            }
        })*
    };
}

integer_query_value!(u32, u64, i32, i64, usize);

impl<T: QueryValue> QueryValue for Vec<T> {
    fn into_values(self) -> Vec<String> {
        self.into_iter().flat_map(QueryValue::into_values).collect()
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any earlier value (builder style)
    pub fn with(mut self, key: impl Into<String>, value: impl QueryValue) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key` only when a value is present
    pub fn with_opt<V: QueryValue>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl QueryValue) {
        let key = key.into();
        let values = value.into_values();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = values,
            None => self.params.push((key, values)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.params.iter().all(|(_, values)| values.is_empty())
    }

    /// Percent-encoded `key=value&...` form, without a leading `?`
    pub fn encode(&self) -> String {
        self.params
            .iter()
            .flat_map(|(key, values)| {
                values.iter().map(move |value| {
                    format!(
                        "{}={}",
                        urlencoding::encode(key),
                        urlencoding::encode(value)
                    )
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append the encoded query to `url`
    pub fn apply_to(&self, url: &str) -> String {
        if self.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, self.encode())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

//! Placeholder Remapping
//!
//! Sessions take the canonical `?` ordinal placeholder. Postgres-style text
//! uses numbered placeholders (`$1`, `$2`) that may repeat or appear out of
//! order, so preparing such text rewrites every occurrence to `?` and records
//! which caller parameter each `?` must receive.
//!
//! # Example
//! `INSERT INTO t VALUES($2, $1, $2)` becomes `INSERT INTO t VALUES(?, ?, ?)`
//! with the map `[2, 1, 2]`; binding `["a", "b"]` yields `["b", "a", "b"]`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{CompatError, Result};

// ASCII digits only: Unicode `\d` would also take digits such as U+0661
static NUMBERED_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[0-9]+").expect("placeholder pattern is valid"));

/// Placeholder syntax of a SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderStyle {
    /// `?`, already canonical (MySQL, SQLite)
    Ordinal,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

/// 1-based caller parameter index for each placeholder occurrence, in order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PlaceholderMap(Vec<u32>);

impl PlaceholderMap {
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Route caller parameters to canonical placeholder order.
    ///
    /// Fails with `UnboundParameter` if any placeholder refers to a slot the
    /// caller did not supply (`$0` never refers to a slot).
    pub fn bind<T: Clone>(&self, params: &[T]) -> Result<Vec<T>> {
        self.0
            .iter()
            .map(|&placeholder| {
                (placeholder as usize)
                    .checked_sub(1)
                    .and_then(|slot| params.get(slot))
                    .cloned()
                    .ok_or(CompatError::UnboundParameter { placeholder, supplied: params.len() })
            })
            .collect()
    }
}

/// Query text in canonical form plus the parameter routing, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedQuery {
    sql: String,
    placeholders: Option<PlaceholderMap>,
}

impl PreparedQuery {
    /// Canonical SQL, using `?` placeholders
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Routing map; `None` when parameters pass through unchanged
    #[must_use]
    pub const fn placeholders(&self) -> Option<&PlaceholderMap> {
        self.placeholders.as_ref()
    }

    /// Order caller parameters for execution
    pub fn bind<T: Clone>(&self, params: &[T]) -> Result<Vec<T>> {
        match &self.placeholders {
            Some(map) => map.bind(params),
            None => Ok(params.to_vec()),
        }
    }
}

/// Translates one dialect's placeholders into canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterRemapper {
    style: PlaceholderStyle,
}

impl ParameterRemapper {
    #[must_use]
    pub const fn new(style: PlaceholderStyle) -> Self {
        Self { style }
    }

    #[must_use]
    pub const fn style(&self) -> PlaceholderStyle {
        self.style
    }

    /// Rewrite `query` into canonical form.
    ///
    /// For numbered placeholders every `$<digits>` occurrence is replaced by
    /// `?`. A digit run that does not fit a `u32` fails the whole call with
    /// `MalformedPlaceholder`. Text between placeholders is kept as is.
    pub fn prepare(&self, query: &str) -> Result<PreparedQuery> {
        match self.style {
            PlaceholderStyle::Ordinal => {
                Ok(PreparedQuery { sql: query.to_string(), placeholders: None })
            }
            PlaceholderStyle::Numbered => prepare_numbered(query),
        }
    }
}

fn prepare_numbered(query: &str) -> Result<PreparedQuery> {
    let indices = NUMBERED_PLACEHOLDER
        .find_iter(query)
        .map(|m| {
            m.as_str()[1..].parse::<u32>().map_err(|_| CompatError::MalformedPlaceholder {
                token: m.as_str().to_string(),
                offset: m.start(),
            })
        })
        .collect::<Result<Vec<u32>>>()?;

    let sql = NUMBERED_PLACEHOLDER.replace_all(query, "?").into_owned();

    Ok(PreparedQuery { sql, placeholders: Some(PlaceholderMap(indices)) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(query: &str) -> Result<PreparedQuery> {
        ParameterRemapper::new(PlaceholderStyle::Numbered).prepare(query)
    }

    #[test]
    fn test_reordered_placeholders() {
        let prepared = numbered("INSERT INTO t VALUES($2,$1)").unwrap();
        assert_eq!(prepared.sql(), "INSERT INTO t VALUES(?,?)");
        assert_eq!(prepared.placeholders().unwrap().indices(), &[2, 1]);
    }

    #[test]
    fn test_duplicate_placeholders() {
        let prepared = numbered("INSERT INTO t VALUES($1,$1)").unwrap();
        assert_eq!(prepared.sql(), "INSERT INTO t VALUES(?,?)");
        assert_eq!(prepared.placeholders().unwrap().indices(), &[1, 1]);
    }

    #[test]
    fn test_surrounding_text_preserved() {
        let prepared = numbered("SELECT * FROM t WHERE a = $1 AND b > $10 ORDER BY c").unwrap();
        insta::assert_snapshot!(prepared.sql(), @"SELECT * FROM t WHERE a = ? AND b > ? ORDER BY c");
        assert_eq!(prepared.placeholders().unwrap().indices(), &[1, 10]);
    }

    #[test]
    fn test_no_placeholders() {
        let prepared = numbered("").unwrap();
        assert_eq!(prepared.sql(), "");
        assert!(prepared.placeholders().unwrap().is_empty());

        let prepared = numbered("SELECT 1").unwrap();
        assert_eq!(prepared.sql(), "SELECT 1");
        assert!(prepared.placeholders().unwrap().is_empty());
    }

    #[test]
    fn test_non_digit_dollar_is_left_alone() {
        let prepared = numbered("SELECT '$abc' FROM t").unwrap();
        assert_eq!(prepared.sql(), "SELECT '$abc' FROM t");
        assert!(prepared.placeholders().unwrap().is_empty());
    }

    #[test]
    fn test_non_ascii_digits_are_not_placeholder_digits() {
        let prepared = numbered("SELECT $\u{0661}").unwrap();
        assert_eq!(prepared.sql(), "SELECT $\u{0661}");
        assert!(prepared.placeholders().unwrap().is_empty());

        let prepared = numbered("SELECT $1\u{0662}, $2").unwrap();
        assert_eq!(prepared.sql(), "SELECT ?\u{0662}, ?");
        assert_eq!(prepared.placeholders().unwrap().indices(), &[1, 2]);
    }

    #[test]
    fn test_overflowing_index_is_malformed() {
        let err = numbered("SELECT $1, $99999999999999999999").unwrap_err();
        match err {
            CompatError::MalformedPlaceholder { token, offset } => {
                assert_eq!(token, "$99999999999999999999");
                assert_eq!(offset, 11);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bind_reorders() {
        let prepared = numbered("INSERT INTO t VALUES($2,$1)").unwrap();
        assert_eq!(prepared.bind(&["a", "b"]).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_bind_duplicates() {
        let prepared = numbered("SELECT $1, $1, $2").unwrap();
        assert_eq!(prepared.bind(&[1, 2]).unwrap(), vec![1, 1, 2]);
    }

    #[test]
    fn test_bind_out_of_range_is_unbound() {
        let map = PlaceholderMap(vec![3]);
        let err = map.bind(&["a", "b"]).unwrap_err();
        assert!(matches!(err, CompatError::UnboundParameter { placeholder: 3, supplied: 2 }));
    }

    #[test]
    fn test_bind_dollar_zero_is_unbound() {
        let prepared = numbered("SELECT $0").unwrap();
        assert!(matches!(
            prepared.bind(&["a"]).unwrap_err(),
            CompatError::UnboundParameter { placeholder: 0, .. }
        ));
    }

    #[test]
    fn test_extra_params_are_ignored() {
        let prepared = numbered("SELECT $2").unwrap();
        assert_eq!(prepared.bind(&["a", "b", "c"]).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_ordinal_passthrough() {
        let remapper = ParameterRemapper::new(PlaceholderStyle::Ordinal);
        let prepared = remapper.prepare("SELECT * FROM t WHERE a = ? AND b = '$1'").unwrap();
        assert_eq!(prepared.sql(), "SELECT * FROM t WHERE a = ? AND b = '$1'");
        assert!(prepared.placeholders().is_none());
        assert_eq!(prepared.bind(&["x", "y"]).unwrap(), vec!["x", "y"]);
    }
}

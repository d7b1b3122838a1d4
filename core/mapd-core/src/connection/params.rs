//! Parameter binding
//!
//! `:name` (or `$name`) placeholders are replaced by SQL literals. The
//! substitution runs over the `sqlparser` tokenizer, so colons inside string
//! literals, comments and `::` casts are left untouched.

use crate::error::{MapdError, MapdResult};
use crate::marshal::Value;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::collections::BTreeMap;
use tracing::debug;

/// Named query parameters.
pub type Params = BTreeMap<String, Value>;

/// Build [`Params`] from `(name, value)` pairs.
///
/// ```rust
/// use mapd_core::connection::params;
///
/// let p = params([("id", 7i64.into()), ("name", "x".into())]);
/// assert_eq!(p.len(), 2);
/// ```
pub fn params<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Params {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// SQL literal text for a value, as substituted for a placeholder.
pub fn to_sql_literal(value: &Value) -> MapdResult<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_nan() => "NULL".to_string(),
        Value::Float(f) if f.is_infinite() => {
            return Err(MapdError::Value(format!("{f} has no SQL literal")));
        }
        Value::Float(f) => format!("{f:?}"),
        Value::Decimal(d) => d.to_string(),
        Value::Str(s) => quote(s),
        Value::Date(d) => quote(&d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => quote(&t.format("%H:%M:%S").to_string()),
        Value::Timestamp(ts) => quote(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Geometry(g) => {
            g.check_finite()?;
            quote(&g.to_wkt())
        }
        Value::Array(items) => {
            let inner = items
                .iter()
                .map(to_sql_literal)
                .collect::<MapdResult<Vec<_>>>()?;
            format!("ARRAY[{}]", inner.join(", "))
        }
    })
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Replace every `:name` / `$name` placeholder in `sql` with the literal of
/// `params[name]`. A placeholder without a parameter is an `Interface` error;
/// unused parameters are ignored.
pub fn bind_parameters(sql: &str, params: &Params) -> MapdResult<String> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| MapdError::Interface(format!("cannot tokenize query: {e}")))?;

    let lookup = |name: &str| {
        params
            .get(name)
            .ok_or_else(|| MapdError::Interface(format!("missing value for parameter '{name}'")))
            .and_then(to_sql_literal)
    };

    let mut out = String::with_capacity(sql.len());
    let mut bound = 0usize;
    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Colon => match iter.peek() {
                Some(Token::Word(word)) if word.quote_style.is_none() => {
                    out.push_str(&lookup(&word.value)?);
                    bound += 1;
                    iter.next();
                }
                _ => out.push(':'),
            },
            Token::Placeholder(p) if p.len() > 1 && (p.starts_with(':') || p.starts_with('$')) => {
                out.push_str(&lookup(&p[1..])?);
                bound += 1;
            }
            other => out.push_str(&other.to_string()),
        }
    }
    debug!(target: "connection", bound, "bound query parameters");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Geometry;
    use chrono::NaiveDate;

    #[test]
    fn binds_named_parameters() {
        let p = params([("id", Value::Int(5)), ("name", Value::from("O'Brien"))]);
        let sql = bind_parameters("SELECT * FROM t WHERE id = :id AND name = :name", &p).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id = 5 AND name = 'O''Brien'");
    }

    #[test]
    fn leaves_literals_alone() {
        let p = params([("x", Value::Int(1))]);
        let sql = bind_parameters("SELECT ':x', a FROM t WHERE b = :x", &p).unwrap();
        assert_eq!(sql, "SELECT ':x', a FROM t WHERE b = 1");
    }

    #[test]
    fn keeps_double_colon_casts() {
        let p = Params::new();
        let sql = bind_parameters("SELECT a::INT FROM t", &p).unwrap();
        assert_eq!(sql, "SELECT a::INT FROM t");
    }

    #[test]
    fn missing_parameter_is_interface_error() {
        let err = bind_parameters("SELECT :nope", &Params::new()).unwrap_err();
        assert!(matches!(err, MapdError::Interface(_)));
    }

    #[test]
    fn literal_forms() {
        assert_eq!(to_sql_literal(&Value::Null).unwrap(), "NULL");
        assert_eq!(to_sql_literal(&Value::Float(f64::NAN)).unwrap(), "NULL");
        assert_eq!(to_sql_literal(&Value::Float(1.5)).unwrap(), "1.5");
        assert_eq!(to_sql_literal(&Value::Bool(false)).unwrap(), "FALSE");
        let d = NaiveDate::from_ymd_opt(2006, 1, 5).unwrap();
        assert_eq!(to_sql_literal(&Value::Date(d)).unwrap(), "'2006-01-05'");
        let arr = Value::Array(vec![Value::Int(1), Value::Null]);
        assert_eq!(to_sql_literal(&arr).unwrap(), "ARRAY[1, NULL]");
        assert!(to_sql_literal(&Value::Float(f64::INFINITY)).is_err());
        let nan_point = Value::Geometry(Geometry::Point((0.0, f64::NAN)));
        assert!(to_sql_literal(&nan_point).is_err());
    }
}

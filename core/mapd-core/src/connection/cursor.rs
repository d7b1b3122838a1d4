//! DB-API style cursor over `sql_execute` results.

use super::Connection;
use super::params::{Params, bind_parameters};
use crate::api::FromRow;
use crate::error::{MapdError, MapdResult};
use crate::marshal::{Table, Value, decode_columns, decode_rows};
use crate::rpc::{MapdClient, QueryResult};
use crate::types::{ColumnDesc, DatumType};
use tracing::debug;

/// One entry of [`Cursor::description`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub name: String,
    pub type_code: DatumType,
    pub precision: i32,
    pub scale: i32,
    pub null_ok: bool,
}

impl From<&ColumnDesc> for Description {
    fn from(desc: &ColumnDesc) -> Self {
        Self {
            name: desc.name.clone(),
            type_code: desc.col_type.datum,
            precision: desc.col_type.precision,
            scale: desc.col_type.scale,
            null_ok: desc.col_type.nullable,
        }
    }
}

/// Executes queries on a borrowed connection and hands out result rows.
///
/// Results are decoded eagerly when `execute` returns; fetching only walks
/// the decoded rows.
pub struct Cursor<'a, C: MapdClient> {
    connection: &'a mut Connection<C>,
    columnar: bool,
    arraysize: usize,
    rowcount: i64,
    description: Option<Vec<Description>>,
    names: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl<'a, C: MapdClient> Cursor<'a, C> {
    pub(crate) fn new(connection: &'a mut Connection<C>) -> Self {
        Self {
            connection,
            columnar: true,
            arraysize: 1,
            rowcount: -1,
            description: None,
            names: Vec::new(),
            rows: Vec::new().into_iter(),
        }
    }

    /// Run `sql`, binding `params` first when given.
    pub fn execute(&mut self, sql: &str, params: Option<&Params>) -> MapdResult<&mut Self> {
        let sql = match params {
            Some(p) => bind_parameters(sql, p)?,
            None => sql.to_string(),
        };
        self.rowcount = -1;
        self.description = None;
        self.names.clear();
        self.rows = Vec::new().into_iter();

        let columnar = self.columnar;
        let result = self
            .connection
            .call(|c, s| c.sql_execute(s, &sql, columnar, "", -1, -1))?;
        debug!(
            target: "cursor",
            execution_ms = result.execution_time_ms,
            total_ms = result.total_time_ms,
            "query executed"
        );

        let table = result_table(&result)?;
        self.rowcount = table.num_rows() as i64;
        self.description = Some(result.row_set.row_desc.iter().map(Description::from).collect());
        self.names = table.names().to_vec();
        self.rows = table.into_rows().into_iter();
        Ok(self)
    }

    /// Column descriptions of the last result, `None` before any `execute`.
    pub fn description(&self) -> Option<&[Description]> {
        self.description.as_deref()
    }

    /// Rows in the last result, `-1` before any `execute`.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) -> MapdResult<()> {
        if size == 0 {
            return Err(MapdError::Interface("arraysize must be positive".to_string()));
        }
        self.arraysize = size;
        Ok(())
    }

    /// Ask for columnar (default) or row-wise results on the next `execute`.
    pub fn set_columnar(&mut self, columnar: bool) {
        self.columnar = columnar;
    }

    pub fn columnar(&self) -> bool {
        self.columnar
    }

    pub fn fetchone(&mut self) -> Option<Vec<Value>> {
        self.rows.next()
    }

    /// Up to `size` rows (default: `arraysize`).
    pub fn fetchmany(&mut self, size: Option<usize>) -> Vec<Vec<Value>> {
        let size = size.unwrap_or(self.arraysize);
        self.rows.by_ref().take(size).collect()
    }

    pub fn fetchall(&mut self) -> Vec<Vec<Value>> {
        self.rows.by_ref().collect()
    }

    /// Remaining rows mapped onto `T` by column name.
    pub fn fetch_as<T: FromRow>(&mut self) -> MapdResult<Vec<T>> {
        let names = self.names.clone();
        self.rows
            .by_ref()
            .map(|row| T::from_row(&names, row))
            .collect()
    }

    pub fn connection(&mut self) -> &mut Connection<C> {
        self.connection
    }
}

impl<C: MapdClient> Iterator for Cursor<'_, C> {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// Decode an inline `sql_execute` result.
pub(crate) fn result_table(result: &QueryResult) -> MapdResult<Table> {
    let row_set = &result.row_set;
    if row_set.is_columnar {
        decode_columns(&row_set.columns, &row_set.row_desc)
    } else {
        decode_rows(&row_set.rows, &row_set.row_desc)
    }
}

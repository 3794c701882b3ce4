// SQLite-backed local analytic store.
//
// Implements both collaborator traits so the statistics pipeline can run
// against an embedded database, and loads per-game fact tables from CSV.

use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::source::{is_valid_identifier, ColumnLister, QueryParam, QueryRunner};
use crate::value::{Row, Scalar};

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            Scalar::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Scalar::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Scalar::Date(d) => ToSqlOutput::Owned(Value::Text(d.format("%Y-%m-%d").to_string())),
        })
    }
}

fn scalar_from_ref(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Int(i),
        ValueRef::Real(f) => Scalar::Float(f),
        ValueRef::Text(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Scalar::Null,
    }
}

/// Infer a cell's type from CSV text: blank is NULL, then integer, then
/// float, falling back to text.
fn scalar_from_csv(cell: &str) -> Scalar {
    let cell = cell.trim();
    if cell.is_empty() {
        return Scalar::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Scalar::Int(i);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => Scalar::Float(f),
        _ => Scalar::Text(cell.to_string()),
    }
}

/// Embedded analytic store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`. Pass `":memory:"` for an
    /// ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open analytic store at {path}"))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("failed to set store busy timeout")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
        conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a batch of SQL statements (schema setup, fixture inserts).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        Self::lock(&self.conn)
            .execute_batch(sql)
            .context("failed to execute SQL batch")
    }

    /// Load CSV records into `table`, creating it from the header row when it
    /// does not exist. Columns are untyped so each cell keeps the type
    /// inferred from its text. Malformed records are skipped with a warning.
    /// Returns the number of rows inserted.
    pub fn import_csv<R: Read>(&self, table: &str, rdr: R) -> Result<usize> {
        if !is_valid_identifier(table) {
            bail!("invalid table name: {table:?}");
        }

        let mut reader = csv::Reader::from_reader(rdr);
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read CSV header for {table}"))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            bail!("CSV for {table} has no header columns");
        }
        if let Some(bad) = headers.iter().find(|h| !is_valid_identifier(h)) {
            bail!("invalid column name in CSV header for {table}: {bad:?}");
        }

        let column_list = headers
            .iter()
            .map(|h| format!("`{h}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=headers.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut conn = Self::lock(&self.conn);
        let tx = conn.transaction().context("failed to begin CSV import")?;
        tx.execute_batch(&format!("CREATE TABLE IF NOT EXISTS `{table}` ({column_list});"))
            .with_context(|| format!("failed to create table {table}"))?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(&format!("INSERT INTO `{table}` ({column_list}) VALUES ({placeholders})"))
                .with_context(|| format!("failed to prepare insert into {table}"))?;

            for result in reader.records() {
                let record = match result {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("skipping malformed CSV record for {table}: {e}");
                        continue;
                    }
                };
                if record.len() != headers.len() {
                    warn!(
                        "skipping CSV record for {table}: expected {} fields, got {}",
                        headers.len(),
                        record.len()
                    );
                    continue;
                }
                let values: Vec<Scalar> = record.iter().map(scalar_from_csv).collect();
                stmt.execute(rusqlite::params_from_iter(values.iter()))
                    .with_context(|| format!("failed to insert CSV record into {table}"))?;
                inserted += 1;
            }
        }
        tx.commit().context("failed to commit CSV import")?;

        info!("imported {inserted} rows into {table}");
        Ok(inserted)
    }

    fn query_blocking(conn: &Mutex<Connection>, template: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        let conn = Self::lock(conn);
        let mut stmt = conn
            .prepare(template)
            .with_context(|| format!("failed to prepare query: {template}"))?;

        let names: Vec<String> = params.iter().map(|p| format!("@{}", p.name)).collect();
        let mut bound: Vec<(&str, &dyn ToSql)> = Vec::with_capacity(params.len());
        for (name, param) in names.iter().zip(params) {
            // SQLite rejects named parameters the statement does not use.
            if stmt.parameter_index(name)?.is_some() {
                bound.push((name.as_str(), &param.value as &dyn ToSql));
            }
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt
            .query(bound.as_slice())
            .context("failed to execute query")?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().context("failed to read query row")? {
            let mut result = Row::new();
            for (i, name) in columns.iter().enumerate() {
                result.insert(name, scalar_from_ref(row.get_ref(i)?));
            }
            out.push(result);
        }
        Ok(out)
    }

    fn columns_blocking(conn: &Mutex<Connection>, table: &str) -> Result<Vec<String>> {
        if !is_valid_identifier(table) {
            bail!("invalid table name: {table:?}");
        }
        let conn = Self::lock(conn);
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info(`{table}`)"))
            .with_context(|| format!("failed to read schema for {table}"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to read columns for {table}"))?;
        Ok(columns)
    }
}

#[async_trait]
impl QueryRunner for SqliteStore {
    async fn run_query(&self, template: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        debug!("running query with {} params: {template}", params.len());
        let conn = Arc::clone(&self.conn);
        let template = template.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || Self::query_blocking(&conn, &template, &params))
            .await
            .context("query task panicked")?
    }
}

#[async_trait]
impl ColumnLister for SqliteStore {
    async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = Arc::clone(&self.conn);
        let table = table.to_string();
        tokio::task::spawn_blocking(move || Self::columns_blocking(&conn, &table))
            .await
            .context("schema task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let csv_data = "\
batter_id,batter_name,season,game_pk,game_date,at_bats,hits
592450,Aaron Judge,2024,745001,2024-04-01,4,2
592450,Aaron Judge,2024,745002,2024-04-02,3,
605141,Mookie Betts,2024,745003,2024-04-01,5,1.5";
        let n = store.import_csv("batting", csv_data.as_bytes()).unwrap();
        assert_eq!(n, 3);
        store
    }

    #[test]
    fn csv_cells_infer_types() {
        assert_eq!(scalar_from_csv(""), Scalar::Null);
        assert_eq!(scalar_from_csv(" 4 "), Scalar::Int(4));
        assert_eq!(scalar_from_csv("0.375"), Scalar::Float(0.375));
        assert_eq!(scalar_from_csv("NaN"), Scalar::Text("NaN".into()));
        assert_eq!(scalar_from_csv("NYY"), Scalar::Text("NYY".into()));
    }

    #[tokio::test]
    async fn list_columns_reports_csv_header() {
        let store = seeded_store();
        let columns = store.list_columns("batting").await.unwrap();
        assert_eq!(
            columns,
            vec!["batter_id", "batter_name", "season", "game_pk", "game_date", "at_bats", "hits"]
        );
    }

    #[tokio::test]
    async fn list_columns_for_missing_table_is_empty() {
        let store = seeded_store();
        assert!(store.list_columns("pitching").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_columns_rejects_bad_identifier() {
        let store = seeded_store();
        assert!(store.list_columns("batting`; --").await.is_err());
    }

    #[tokio::test]
    async fn run_query_binds_named_params() {
        let store = seeded_store();
        let rows = store
            .run_query(
                "SELECT batter_id, hits FROM `batting` WHERE batter_id = @id ORDER BY game_pk",
                &[QueryParam::new("id", 592450i64)],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("batter_id"), Some(&Scalar::Int(592450)));
        assert_eq!(rows[0].get("hits"), Some(&Scalar::Int(2)));
        assert!(rows[1].has_column("hits"));
        assert_eq!(rows[1].get("hits"), None);
    }

    #[tokio::test]
    async fn unused_params_are_ignored() {
        let store = seeded_store();
        let rows = store
            .run_query(
                "SELECT COUNT(*) AS n FROM `batting`",
                &[QueryParam::new("season", 2024i64)],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].get("n"), Some(&Scalar::Int(3)));
    }

    #[tokio::test]
    async fn bad_query_is_an_error() {
        let store = seeded_store();
        let err = store
            .run_query("SELECT nope FROM `batting`", &[])
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to prepare query"));
    }

    #[tokio::test]
    async fn sql_batch_seeds_typed_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE pitching (pitcher_id INTEGER, season INTEGER, innings_pitched REAL);
                 INSERT INTO pitching VALUES (543037, 2024, 6.0), (543037, 2024, NULL);",
            )
            .unwrap();

        let columns = store.list_columns("pitching").await.unwrap();
        assert_eq!(columns, vec!["pitcher_id", "season", "innings_pitched"]);

        let rows = store
            .run_query(
                "SELECT innings_pitched FROM `pitching` WHERE season = @season ORDER BY rowid",
                &[QueryParam::new("season", 2024i64)],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].get("innings_pitched"), Some(&Scalar::Float(6.0)));
        assert_eq!(rows[1].get("innings_pitched"), None);
    }

    #[test]
    fn bad_sql_batch_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.execute_batch("CREATE TABLE (").unwrap_err();
        assert!(format!("{err:#}").contains("failed to execute SQL batch"));
    }

    #[test]
    fn import_skips_short_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let csv_data = "\
a,b
1,2
3
4,5";
        // The csv crate rejects ragged records by default.
        let n = store.import_csv("t", csv_data.as_bytes()).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn import_rejects_bad_table_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.import_csv("t; DROP", "a\n1".as_bytes()).is_err());
    }
}

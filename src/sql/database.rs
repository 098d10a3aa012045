//! Inventory database access (SQLite)
//!
//! Exposes the schema text shown to the model and executes the read-only
//! queries it writes.

use crate::config::env::DatabaseLocation;
use crate::config::DatabaseConfig;
use crate::error::{QueryError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Demo inventory schema and rows
pub const SEED_SQL: &str = include_str!("../../assets/inventory.sql");

/// A typed cell read back from the database
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

pub type Row = Vec<SqlValue>;

impl SqlValue {
    fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }

    /// Numeric value, if the cell holds a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Literal form used when rows are echoed back into a prompt
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => f.write_str("None"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(v) => write!(f, "{:?}", v),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Render rows as a list of tuples, e.g. `[(80,)]` or `[('Nike', 3)]`
pub fn format_rows(rows: &[Row]) -> String {
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(SqlValue::to_literal).collect();
            if cells.len() == 1 {
                format!("({},)", cells[0])
            } else {
                format!("({})", cells.join(", "))
            }
        })
        .collect();
    format!("[{}]", tuples.join(", "))
}

/// Whether `sql` is a single read-only statement we are willing to run
pub fn is_read_only_query(sql: &str) -> bool {
    let body = strip_leading_comments(sql).trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(keyword.as_str(), "SELECT" | "WITH")
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map(|i| &after[i + 1..]).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map(|i| &after[i + 2..]).unwrap_or("").trim_start();
        } else {
            return rest;
        }
    }
}

/// Connection to the inventory plus the tables exposed to the model
#[derive(Debug)]
pub struct InventoryDatabase {
    conn: Connection,
    include_tables: Vec<String>,
    sample_rows: usize,
}

impl InventoryDatabase {
    /// Open the database and check every exposed table exists
    ///
    /// An in-memory location holds the demo inventory; files open read-only.
    pub fn open(location: &DatabaseLocation, config: &DatabaseConfig) -> Result<Self> {
        let conn = match location {
            DatabaseLocation::Memory => {
                tracing::debug!("Using in-memory demo inventory");
                return Self::seeded_in_memory(config);
            }
            DatabaseLocation::File(path) => {
                if !path.exists() {
                    return Err(QueryError::Config(format!(
                        "Database file not found: {} (run 'querykit db init {}' to create a demo inventory)",
                        path.display(),
                        path.display()
                    )));
                }
                Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?
            }
        };
        tracing::debug!("Opened inventory database: {:?}", location);
        Self::from_connection(conn, config)
    }

    pub fn from_connection(conn: Connection, config: &DatabaseConfig) -> Result<Self> {
        let db = Self {
            conn,
            include_tables: config.include_tables.clone(),
            sample_rows: config.sample_rows,
        };
        db.check_tables()?;
        Ok(db)
    }

    /// In-memory database loaded with the demo inventory
    pub fn seeded_in_memory(config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SEED_SQL)?;
        Self::from_connection(conn, config)
    }

    /// Create a database file at `path` holding the demo inventory
    pub fn init_file(path: &Path, force: bool) -> Result<()> {
        if path.exists() {
            if !force {
                return Err(QueryError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            std::fs::remove_file(path).map_err(|e| {
                QueryError::io(e, format!("Failed to remove existing database: {}", path.display()))
            })?;
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                QueryError::io(e, format!("Failed to create directory: {}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SEED_SQL)?;
        tracing::info!("Seeded demo inventory at {}", path.display());
        Ok(())
    }

    fn check_tables(&self) -> Result<()> {
        let existing = self.table_names()?;
        let missing: Vec<&str> = self
            .include_tables
            .iter()
            .filter(|t| !existing.contains(t))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(QueryError::Config(format!(
                "Tables not found in database: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// User tables present in the database
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn include_tables(&self) -> &[String] {
        &self.include_tables
    }

    /// Schema text for the prompt: each exposed table's CREATE statement
    /// followed by a comment block with a few example rows
    pub fn table_info(&self) -> Result<String> {
        let mut sections = Vec::with_capacity(self.include_tables.len());
        for table in &self.include_tables {
            let create: String = self.conn.query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )?;

            let mut section = create.trim().to_string();
            if self.sample_rows > 0 {
                section.push_str("\n\n");
                section.push_str(&self.sample_block(table)?);
            }
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }

    fn sample_block(&self, table: &str) -> Result<String> {
        // Table names are checked against sqlite_master before we get here.
        let sql = format!("SELECT * FROM \"{}\" LIMIT {}", table, self.sample_rows);
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut lines = vec![columns.join("\t")];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let cells: Vec<String> = (0..columns.len())
                .map(|i| row.get_ref(i).map(|v| SqlValue::from_ref(v).to_string()))
                .collect::<std::result::Result<_, _>>()?;
            lines.push(cells.join("\t"));
        }

        Ok(format!(
            "/*\n{} rows from {} table:\n{}\n*/",
            self.sample_rows,
            table,
            lines.join("\n")
        ))
    }

    /// Execute a read-only query and return every row
    pub fn run(&self, sql: &str) -> Result<Vec<Row>> {
        if !is_read_only_query(sql) {
            return Err(QueryError::UnsafeSql(sql.to_string()));
        }

        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(QueryError::UnsafeSql(sql.to_string()));
        }

        let width = stmt.column_count();
        let mut result = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(SqlValue::from_ref))
                .collect::<std::result::Result<Row, _>>()?;
            result.push(values);
        }

        tracing::debug!("Query returned {} rows", result.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn db() -> InventoryDatabase {
        InventoryDatabase::seeded_in_memory(&Config::default().database).unwrap()
    }

    #[test]
    fn test_run_returns_typed_rows() {
        let rows = db()
            .run("SELECT brand, SUM(stock_quantity) FROM t_shirts WHERE brand = 'Nike' AND color = 'White' AND size = 'XS'")
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![SqlValue::Text("Nike".into()), SqlValue::Integer(80)]]
        );
    }

    #[test]
    fn test_non_select_is_refused() {
        let db = db();
        for sql in [
            "DELETE FROM t_shirts",
            "DROP TABLE discounts",
            "UPDATE t_shirts SET price = 0",
            "INSERT INTO discounts (t_shirt_id, pct_discount) VALUES (1, 50)",
        ] {
            assert!(matches!(db.run(sql), Err(QueryError::UnsafeSql(_))), "{}", sql);
        }
        assert_eq!(db.run("SELECT COUNT(*) FROM t_shirts").unwrap()[0][0], SqlValue::Integer(64));
    }

    #[test]
    fn test_read_only_detection() {
        assert!(is_read_only_query("  select 1"));
        assert!(is_read_only_query("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(is_read_only_query("-- count\nSELECT 1"));
        assert!(is_read_only_query("/* hint */ (SELECT 1)"));
        assert!(!is_read_only_query("PRAGMA writable_schema = 1"));
        assert!(!is_read_only_query(""));
    }

    #[test]
    fn test_table_info_lists_schema_and_samples() {
        let info = db().table_info().unwrap();
        assert!(info.contains("CREATE TABLE t_shirts"));
        assert!(info.contains("CREATE TABLE discounts"));
        assert!(info.contains("3 rows from t_shirts table:"));
        assert!(info.contains("t_shirt_id\tbrand\tcolor\tsize\tprice\tstock_quantity"));
        assert!(info.contains("1\tVan Huesen\tRed\tXS\t23\t47"));
        assert!(info.contains("1\t1\t10.0"));
    }

    #[test]
    fn test_missing_table_is_configuration_error() {
        let mut config = Config::default().database;
        config.include_tables.push("orders".to_string());
        let err = InventoryDatabase::seeded_in_memory(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn test_format_rows() {
        assert_eq!(format_rows(&[vec![SqlValue::Integer(80)]]), "[(80,)]");
        assert_eq!(
            format_rows(&[vec![SqlValue::Text("Nike".into()), SqlValue::Real(12.5)]]),
            "[('Nike', 12.5)]"
        );
        assert_eq!(format_rows(&[]), "[]");
    }

    #[test]
    fn test_init_file_and_open_read_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("inventory.db");
        InventoryDatabase::init_file(&path, false).unwrap();
        assert!(InventoryDatabase::init_file(&path, false).is_err());

        let db = InventoryDatabase::open(
            &DatabaseLocation::File(path.clone()),
            &Config::default().database,
        )
        .unwrap();
        let rows = db.run("SELECT SUM(stock_quantity) FROM t_shirts WHERE brand = 'Adidas'").unwrap();
        assert_eq!(rows[0][0], SqlValue::Integer(832));
    }

    #[test]
    fn test_memory_location_holds_demo_inventory() {
        let db = InventoryDatabase::open(&DatabaseLocation::Memory, &Config::default().database).unwrap();
        assert_eq!(db.table_names().unwrap(), vec!["discounts".to_string(), "t_shirts".to_string()]);
    }
}

//! SQL dialect builder.
//!
//! Generates dialect-portable DDL and DML text for the storage engine.
//! The dialect is chosen explicitly at factory construction time; there
//! is no process-wide dialect state. The builder produces strings only --
//! execution stays with the caller's connection.

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Positional parameter placeholder, 1-based: `?1` / `$1`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{n}"),
            Dialect::Postgres => format!("${n}"),
        }
    }

    /// `count` comma-separated placeholders starting at `start`.
    pub fn placeholders(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Column type for opaque byte payloads.
    pub fn bytes_type(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "BLOB",
            Dialect::Postgres => "BYTEA",
        }
    }

    /// `INSERT` that silently skips rows violating the conflict target.
    pub fn insert_or_ignore(&self, table: &str, columns: &[&str], conflict: &[&str]) -> String {
        format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            columns.join(", "),
            self.placeholders(1, columns.len()),
            conflict.join(", "),
        )
    }

    /// `INSERT` that updates `update_columns` from the excluded row when
    /// the conflict target matches.
    pub fn insert_or_update(
        &self,
        table: &str,
        columns: &[&str],
        conflict: &[&str],
        update_columns: &[&str],
    ) -> String {
        let updates = update_columns
            .iter()
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {updates}",
            columns.join(", "),
            self.placeholders(1, columns.len()),
            conflict.join(", "),
        )
    }

    /// Idempotent table creation. `columns` are full column definitions;
    /// `constraints` are trailing table constraints.
    pub fn create_table_if_not_exists(
        &self,
        table: &str,
        columns: &[String],
        constraints: &[String],
    ) -> String {
        let mut defs: Vec<String> = columns.to_vec();
        defs.extend(constraints.iter().cloned());
        format!("CREATE TABLE IF NOT EXISTS {table} ({})", defs.join(", "))
    }

    /// Idempotent index creation.
    pub fn create_index_if_not_exists(&self, name: &str, table: &str, column: &str) -> String {
        format!("CREATE INDEX IF NOT EXISTS {name} ON {table} ({column})")
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, params};
use serde::Serialize;

use crate::model::{MergeOutput, MergedTable};

const CATALOG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone)]
pub struct CatalogRun<'a> {
    pub run_id: &'a str,
    pub started_at: &'a str,
    pub completed_at: &'a str,
    pub text_sha256: &'a str,
    pub dom_sha256: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub runs: i64,
    pub tables: i64,
    pub columns: i64,
    pub indexes: i64,
    pub foreign_keys: i64,
    pub computed_columns: i64,
    pub warnings: i64,
}

pub fn open_catalog(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        crate::util::ensure_directory(parent)?;
    }
    let connection =
        Connection::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
          run_id TEXT PRIMARY KEY,
          started_at TEXT NOT NULL,
          completed_at TEXT NOT NULL,
          preference TEXT NOT NULL,
          text_sha256 TEXT NOT NULL,
          dom_sha256 TEXT,
          table_count INTEGER NOT NULL,
          warning_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schema_tables (
          table_key TEXT PRIMARY KEY,
          schema_name TEXT NOT NULL,
          table_name TEXT NOT NULL,
          extraction_source TEXT NOT NULL,
          run_id TEXT NOT NULL,
          FOREIGN KEY(run_id) REFERENCES runs(run_id)
        );

        CREATE TABLE IF NOT EXISTS schema_columns (
          table_key TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          name TEXT NOT NULL,
          data_type TEXT,
          base_data_type TEXT,
          max_length TEXT,
          numeric_precision TEXT,
          numeric_scale TEXT,
          allow_nulls INTEGER,
          is_identity INTEGER,
          identity_seed TEXT,
          identity_increment TEXT,
          default_value TEXT,
          key_marker TEXT,
          PRIMARY KEY(table_key, ordinal),
          FOREIGN KEY(table_key) REFERENCES schema_tables(table_key)
        );

        CREATE TABLE IF NOT EXISTS schema_indexes (
          table_key TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          name TEXT NOT NULL,
          key_columns TEXT,
          is_unique INTEGER NOT NULL,
          is_primary INTEGER NOT NULL,
          index_type TEXT,
          fill_factor INTEGER,
          PRIMARY KEY(table_key, ordinal),
          FOREIGN KEY(table_key) REFERENCES schema_tables(table_key)
        );

        CREATE TABLE IF NOT EXISTS schema_foreign_keys (
          table_key TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          name TEXT NOT NULL,
          columns TEXT,
          referenced_schema TEXT,
          referenced_table TEXT,
          referenced_columns TEXT,
          referenced_raw TEXT,
          update_rule TEXT,
          delete_rule TEXT,
          PRIMARY KEY(table_key, ordinal),
          FOREIGN KEY(table_key) REFERENCES schema_tables(table_key)
        );

        CREATE TABLE IF NOT EXISTS schema_computed_columns (
          table_key TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          name TEXT NOT NULL,
          formula TEXT,
          data_type TEXT,
          is_persisted INTEGER,
          PRIMARY KEY(table_key, ordinal),
          FOREIGN KEY(table_key) REFERENCES schema_tables(table_key)
        );

        CREATE TABLE IF NOT EXISTS merge_warnings (
          table_key TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          message TEXT NOT NULL,
          PRIMARY KEY(table_key, ordinal),
          FOREIGN KEY(table_key) REFERENCES schema_tables(table_key)
        );

        CREATE INDEX IF NOT EXISTS idx_schema_foreign_keys_target
          ON schema_foreign_keys(referenced_schema, referenced_table);
        ",
        )
        .context("failed to create catalog schema")?;

    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            [CATALOG_SCHEMA_VERSION],
        )
        .context("failed to record catalog schema version")?;
    Ok(())
}

/// Replaces the stored records of every table in `output` within one transaction. Tables
/// absent from `output` keep the rows of earlier runs.
pub fn write_catalog(
    connection: &mut Connection,
    run: &CatalogRun<'_>,
    output: &MergeOutput,
) -> Result<usize> {
    let tx = connection.transaction()?;

    tx.execute(
        "
        INSERT INTO runs(run_id, started_at, completed_at, preference, text_sha256, dom_sha256,
                         table_count, warning_count)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(run_id) DO UPDATE SET
          started_at=excluded.started_at,
          completed_at=excluded.completed_at,
          preference=excluded.preference,
          text_sha256=excluded.text_sha256,
          dom_sha256=excluded.dom_sha256,
          table_count=excluded.table_count,
          warning_count=excluded.warning_count
        ",
        params![
            run.run_id,
            run.started_at,
            run.completed_at,
            &output.metadata.preference,
            run.text_sha256,
            run.dom_sha256,
            output.tables.len() as i64,
            output.metadata.warnings.len() as i64,
        ],
    )
    .context("failed to upsert run")?;

    for (display, table) in &output.tables {
        write_table(&tx, run.run_id, &display.to_lowercase(), table)
            .with_context(|| format!("failed to write catalog rows for {display}"))?;
    }

    tx.commit().context("failed to commit catalog transaction")?;
    Ok(output.tables.len())
}

fn write_table(tx: &Transaction<'_>, run_id: &str, table_key: &str, table: &MergedTable) -> Result<()> {
    tx.execute(
        "
        INSERT INTO schema_tables(table_key, schema_name, table_name, extraction_source, run_id)
        VALUES(?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(table_key) DO UPDATE SET
          schema_name=excluded.schema_name,
          table_name=excluded.table_name,
          extraction_source=excluded.extraction_source,
          run_id=excluded.run_id
        ",
        params![
            table_key,
            &table.schema,
            &table.table_name,
            table.extraction_source.as_str(),
            run_id
        ],
    )?;

    for child in [
        "schema_columns",
        "schema_indexes",
        "schema_foreign_keys",
        "schema_computed_columns",
        "merge_warnings",
    ] {
        tx.execute(&format!("DELETE FROM {child} WHERE table_key = ?1"), [table_key])?;
    }

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO schema_columns(table_key, ordinal, name, data_type, base_data_type,
                                       max_length, numeric_precision, numeric_scale, allow_nulls,
                                       is_identity, identity_seed, identity_increment,
                                       default_value, key_marker)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )?;
        for (ordinal, column) in table.columns.iter().enumerate() {
            statement.execute(params![
                table_key,
                ordinal as i64,
                &column.name,
                &column.data_type,
                &column.base_data_type,
                &column.max_length,
                &column.numeric_precision,
                &column.numeric_scale,
                column.allow_nulls,
                column.identity,
                &column.identity_seed,
                &column.identity_increment,
                &column.default,
                &column.key,
            ])?;
        }
    }

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO schema_indexes(table_key, ordinal, name, key_columns, is_unique,
                                       is_primary, index_type, fill_factor)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;
        for (ordinal, index) in table.indexes.iter().enumerate() {
            statement.execute(params![
                table_key,
                ordinal as i64,
                &index.name,
                &index.key_columns,
                index.is_unique,
                index.is_primary,
                &index.index_type,
                index.fill_factor,
            ])?;
        }
    }

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO schema_foreign_keys(table_key, ordinal, name, columns, referenced_schema,
                                            referenced_table, referenced_columns, referenced_raw,
                                            update_rule, delete_rule)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )?;
        for (ordinal, foreign_key) in table.foreign_keys.iter().enumerate() {
            statement.execute(params![
                table_key,
                ordinal as i64,
                &foreign_key.name,
                &foreign_key.columns,
                &foreign_key.referenced_schema,
                &foreign_key.referenced_table,
                &foreign_key.referenced_columns,
                &foreign_key.referenced_raw,
                &foreign_key.update_rule,
                &foreign_key.delete_rule,
            ])?;
        }
    }

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO schema_computed_columns(table_key, ordinal, name, formula, data_type,
                                                is_persisted)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;
        for (ordinal, computed) in table.computed_columns.iter().enumerate() {
            statement.execute(params![
                table_key,
                ordinal as i64,
                &computed.name,
                &computed.formula,
                &computed.data_type,
                computed.is_persisted,
            ])?;
        }
    }

    {
        let mut statement = tx.prepare(
            "INSERT INTO merge_warnings(table_key, ordinal, message) VALUES(?1, ?2, ?3)",
        )?;
        for (ordinal, warning) in table.warnings.iter().enumerate() {
            statement.execute(params![table_key, ordinal as i64, warning])?;
        }
    }

    Ok(())
}

pub fn catalog_counts(connection: &Connection) -> Result<CatalogCounts> {
    Ok(CatalogCounts {
        runs: query_count(connection, "SELECT COUNT(*) FROM runs")?,
        tables: query_count(connection, "SELECT COUNT(*) FROM schema_tables")?,
        columns: query_count(connection, "SELECT COUNT(*) FROM schema_columns")?,
        indexes: query_count(connection, "SELECT COUNT(*) FROM schema_indexes")?,
        foreign_keys: query_count(connection, "SELECT COUNT(*) FROM schema_foreign_keys")?,
        computed_columns: query_count(connection, "SELECT COUNT(*) FROM schema_computed_columns")?,
        warnings: query_count(connection, "SELECT COUNT(*) FROM merge_warnings")?,
    })
}

/// Most recent run by completion time, if any.
pub fn latest_run(connection: &Connection) -> Result<Option<(String, String)>> {
    let mut statement = connection
        .prepare("SELECT run_id, completed_at FROM runs ORDER BY completed_at DESC LIMIT 1")?;
    let mut rows = statement.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
        None => Ok(None),
    }
}

fn query_count(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to run count query: {sql}"))?;
    Ok(count)
}

// ==========================================
// PIM 变体导入 - 暂存表 Repository 实现
// ==========================================
// 职责: CSV → tmp_<import_key>（rusqlite + csv）
// 约束: 列名来自文件表头，一律经 quote_ident 进入 SQL
// ==========================================

use crate::db::{quote_ident, staging_table_name, table_columns, value_as_text};
use crate::domain::column::{CODE_COLUMN, ENTITY_ID_COLUMN};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::staging_repo::{
    ColumnSpec, StagingCell, StagingFileFormat, StagingRepository, StagingRow,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// 系统列（装载时追加，文件中同名列忽略）
const IS_NEW_COLUMN: &str = "_is_new";

// ==========================================
// StagingRepositoryImpl
// ==========================================
pub struct StagingRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl StagingRepositoryImpl {
    /// 创建新的暂存表仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn open_reader(path: &Path, format: StagingFileFormat) -> RepositoryResult<csv::Reader<File>> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter)
            .quote(format.enclosure)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        Ok(reader)
    }

    /// 读取并规范化表头
    ///
    /// # 返回
    /// - Vec<(记录内下标, 列名)>：去 BOM、去空白，空名与重复名跳过，系统列跳过
    fn read_header(
        reader: &mut csv::Reader<File>,
        path: &Path,
    ) -> RepositoryResult<Vec<(usize, String)>> {
        let headers = reader.headers()?.clone();

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(headers.len());
        for (idx, raw) in headers.iter().enumerate() {
            let name = raw.trim_start_matches('\u{feff}').trim().to_string();
            if name.is_empty() || name == ENTITY_ID_COLUMN || name == IS_NEW_COLUMN {
                continue;
            }
            if !seen.insert(name.clone()) {
                tracing::warn!(column = %name, "表头列重复，仅保留首次出现");
                continue;
            }
            columns.push((idx, name));
        }

        if columns.is_empty() {
            return Err(RepositoryError::EmptyHeader(path.display().to_string()));
        }
        Ok(columns)
    }

    fn ensure_table(conn: &Connection, table: &str) -> RepositoryResult<Vec<String>> {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            return Err(RepositoryError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    fn ensure_column(columns: &[String], table: &str, column: &str) -> RepositoryResult<()> {
        if columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(RepositoryError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }
}

#[async_trait]
impl StagingRepository for StagingRepositoryImpl {
    async fn create_from_file(
        &self,
        path: &Path,
        import_key: &str,
        key_columns: &[&str],
        format: StagingFileFormat,
    ) -> RepositoryResult<Vec<String>> {
        let mut reader = Self::open_reader(path, format)?;
        let header = Self::read_header(&mut reader, path)?;
        let names: Vec<String> = header.into_iter().map(|(_, name)| name).collect();

        let table = staging_table_name(import_key);
        for key in key_columns {
            Self::ensure_column(&names, &table, key)?;
        }

        let primary = key_columns.first().copied().unwrap_or(CODE_COLUMN);
        let mut defs: Vec<String> = names
            .iter()
            .map(|name| {
                if name == primary {
                    format!("{} TEXT PRIMARY KEY", quote_ident(name))
                } else {
                    format!("{} TEXT", quote_ident(name))
                }
            })
            .collect();
        defs.push(format!("{} INTEGER", quote_ident(ENTITY_ID_COLUMN)));
        defs.push(format!("{} INTEGER NOT NULL DEFAULT 0", quote_ident(IS_NEW_COLUMN)));

        let mut sql = format!(
            "DROP TABLE IF EXISTS {t};\nCREATE TABLE {t} (\n    {defs}\n);\n",
            t = quote_ident(&table),
            defs = defs.join(",\n    ")
        );
        for key in key_columns.iter().skip(1) {
            sql.push_str(&format!(
                "CREATE INDEX {idx} ON {t} ({col});\n",
                idx = quote_ident(&format!("idx_{}_{}", table, key)),
                t = quote_ident(&table),
                col = quote_ident(key)
            ));
        }

        let conn = self.get_conn()?;
        conn.execute_batch(&sql)?;

        tracing::debug!(table = %table, columns = names.len(), "暂存表已创建");
        Ok(names)
    }

    async fn load_rows_from_file(
        &self,
        path: &Path,
        import_key: &str,
        format: StagingFileFormat,
    ) -> RepositoryResult<usize> {
        let mut reader = Self::open_reader(path, format)?;
        let header = Self::read_header(&mut reader, path)?;
        let table = staging_table_name(import_key);

        let mut conn = self.get_conn()?;
        let existing = Self::ensure_table(&conn, &table)?;
        let header: Vec<(usize, String)> = header
            .into_iter()
            .filter(|(_, name)| existing.contains(name))
            .collect();

        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote_ident(&table),
            header
                .iter()
                .map(|(_, name)| quote_ident(name))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; header.len()].join(", ")
        );

        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in reader.records() {
                let record = record?;
                if record.iter().all(|field| field.trim().is_empty()) {
                    continue;
                }

                let values: Vec<Option<&str>> =
                    header.iter().map(|(idx, _)| record.get(*idx)).collect();
                stmt.execute(params_from_iter(values))?;
                count += 1;
            }
        }
        tx.commit()?;

        Ok(count)
    }

    async fn drop_table(&self, import_key: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}",
            quote_ident(&staging_table_name(import_key))
        ))?;
        Ok(())
    }

    async fn describe_columns(&self, import_key: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        Self::ensure_table(&conn, &staging_table_name(import_key))
    }

    async fn column_exists(&self, import_key: &str, column: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let columns = table_columns(&conn, &staging_table_name(import_key))?;
        Ok(columns.iter().any(|c| c == column))
    }

    async fn add_column(
        &self,
        import_key: &str,
        column: &str,
        spec: &ColumnSpec,
    ) -> RepositoryResult<bool> {
        let table = staging_table_name(import_key);
        let conn = self.get_conn()?;
        let columns = Self::ensure_table(&conn, &table)?;
        if columns.iter().any(|c| c == column) {
            return Ok(false);
        }

        conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(&table),
            quote_ident(column),
            spec.to_sql()
        ))?;
        Ok(true)
    }

    async fn copy_column(&self, import_key: &str, from: &str, to: &str) -> RepositoryResult<bool> {
        let table = staging_table_name(import_key);
        let conn = self.get_conn()?;
        let columns = Self::ensure_table(&conn, &table)?;
        if !columns.iter().any(|c| c == from) {
            return Ok(false);
        }

        if !columns.iter().any(|c| c == to) {
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT",
                quote_ident(&table),
                quote_ident(to)
            ))?;
        }
        conn.execute(
            &format!(
                "UPDATE {} SET {} = {}",
                quote_ident(&table),
                quote_ident(to),
                quote_ident(from)
            ),
            [],
        )?;
        Ok(true)
    }

    async fn fetch_cells(
        &self,
        import_key: &str,
        column: &str,
    ) -> RepositoryResult<Vec<StagingCell>> {
        let table = staging_table_name(import_key);
        let conn = self.get_conn()?;
        let columns = Self::ensure_table(&conn, &table)?;
        Self::ensure_column(&columns, &table, column)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {code}, {eid}, {col} FROM {t} ORDER BY {code}",
            code = quote_ident(CODE_COLUMN),
            eid = quote_ident(ENTITY_ID_COLUMN),
            col = quote_ident(column),
            t = quote_ident(&table)
        ))?;
        let cells = stmt
            .query_map([], |row| {
                Ok(StagingCell {
                    code: value_as_text(row.get_ref(0)?).unwrap_or_default(),
                    entity_id: row.get::<_, Option<i64>>(1)?,
                    value: value_as_text(row.get_ref(2)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    async fn update_cells(
        &self,
        import_key: &str,
        column: &str,
        updates: &[(String, Option<String>)],
    ) -> RepositoryResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let table = staging_table_name(import_key);
        let mut conn = self.get_conn()?;
        let columns = Self::ensure_table(&conn, &table)?;
        Self::ensure_column(&columns, &table, column)?;

        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                quote_ident(&table),
                quote_ident(column),
                quote_ident(CODE_COLUMN)
            ))?;
            for (code, value) in updates {
                count += stmt.execute(params![value, code])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    async fn fetch_rows_after(
        &self,
        import_key: &str,
        after_code: Option<&str>,
        limit: usize,
    ) -> RepositoryResult<Vec<StagingRow>> {
        let table = staging_table_name(import_key);
        let conn = self.get_conn()?;
        let columns = Self::ensure_table(&conn, &table)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {t} WHERE ?1 IS NULL OR {code} > ?1 ORDER BY {code} LIMIT ?2",
            t = quote_ident(&table),
            code = quote_ident(CODE_COLUMN)
        ))?;

        let rows = stmt
            .query_map(params![after_code, limit as i64], |row| {
                let mut out = StagingRow::with_capacity(columns.len());
                for (idx, name) in columns.iter().enumerate() {
                    out.insert(name.clone(), value_as_text(row.get_ref(idx)?));
                }
                Ok(out)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

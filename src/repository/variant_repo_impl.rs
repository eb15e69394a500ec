// ==========================================
// PIM 变体导入 - 变体表 Repository 实现
// ==========================================

use crate::db::{quote_ident, table_columns, value_as_text, VARIANT_TABLE};
use crate::domain::column::CODE_COLUMN;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::staging_repo::StagingRow;
use crate::repository::variant_repo::VariantRepository;
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct VariantRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl VariantRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 生成 UPSERT 语句
    fn upsert_sql(columns: &[&str]) -> String {
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != CODE_COLUMN)
            .map(|c| format!("{col} = excluded.{col}", col = quote_ident(c)))
            .collect();

        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
            quote_ident(VARIANT_TABLE),
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; columns.len()].join(", "),
            quote_ident(CODE_COLUMN),
            conflict
        )
    }
}

#[async_trait]
impl VariantRepository for VariantRepositoryImpl {
    async fn describe_columns(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let columns = table_columns(&conn, VARIANT_TABLE)?;
        if columns.is_empty() {
            return Err(RepositoryError::TableNotFound(VARIANT_TABLE.to_string()));
        }
        Ok(columns)
    }

    async fn drop_column(&self, column: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(&format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(VARIANT_TABLE),
            quote_ident(column)
        ))?;
        Ok(())
    }

    async fn add_text_column(&self, column: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        if table_columns(&conn, VARIANT_TABLE)?.iter().any(|c| c == column) {
            return Ok(false);
        }
        conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            quote_ident(VARIANT_TABLE),
            quote_ident(column)
        ))?;
        Ok(true)
    }

    async fn upsert_batch(&self, rows: &[StagingRow]) -> RepositoryResult<usize> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let columns: Vec<&str> = first.keys().map(String::as_str).collect();
        if !columns.contains(&CODE_COLUMN) {
            return Err(RepositoryError::FieldValueError {
                field: CODE_COLUMN.to_string(),
                message: "批次记录缺少 code 列".to_string(),
            });
        }
        for row in rows.iter().skip(1) {
            if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(*c)) {
                return Err(RepositoryError::FieldValueError {
                    field: "*".to_string(),
                    message: "同一批次记录列集合不一致".to_string(),
                });
            }
        }

        let sql = Self::upsert_sql(&columns);
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let values: Vec<Option<&str>> = columns
                    .iter()
                    .map(|c| row.get(*c).and_then(|v| v.as_deref()))
                    .collect();
                stmt.execute(params_from_iter(values))?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    async fn fetch_all(&self) -> RepositoryResult<Vec<StagingRow>> {
        let conn = self.get_conn()?;
        let columns = table_columns(&conn, VARIANT_TABLE)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {}",
            quote_ident(VARIANT_TABLE),
            quote_ident(CODE_COLUMN)
        ))?;
        let rows = stmt
            .query_map([], |row| {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> VariantRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_catalog_schema(&conn).unwrap();
        VariantRepositoryImpl::new(Arc::new(Mutex::new(conn)))
    }

    fn row(pairs: &[(&str, Option<&str>)]) -> StagingRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_code() {
        let repo = setup();
        repo.add_text_column("name").await.unwrap();

        repo.upsert_batch(&[row(&[("code", Some("RED")), ("axis", Some("1")), ("name", Some("Red"))])])
            .await
            .unwrap();
        repo.upsert_batch(&[row(&[("code", Some("RED")), ("axis", Some("1,2")), ("name", Some("Rouge"))])])
            .await
            .unwrap();

        let all = repo.fetch_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["axis"].as_deref(), Some("1,2"));
        assert_eq!(all[0]["name"].as_deref(), Some("Rouge"));
    }

    #[tokio::test]
    async fn test_upsert_rejects_ragged_batch() {
        let repo = setup();
        let err = repo
            .upsert_batch(&[
                row(&[("code", Some("A")), ("axis", None)]),
                row(&[("code", Some("B"))]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));
    }

    #[tokio::test]
    async fn test_add_then_drop_column() {
        let repo = setup();
        assert!(repo.add_text_column("color").await.unwrap());
        assert!(!repo.add_text_column("color").await.unwrap());
        repo.drop_column("color").await.unwrap();
        assert_eq!(repo.describe_columns().await.unwrap(), vec!["code", "axis"]);
    }
}

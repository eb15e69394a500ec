// ==========================================
// PIM 变体导入 - 宿主目录 Repository 实现
// ==========================================
// 职责: 宿主目录协作接口的 SQLite 实现
// 约束: 暂存表列名一律经 quote_ident；值一律绑定参数
// ==========================================

use crate::db::{quote_ident, staging_table_name, table_columns, value_as_text};
use crate::domain::column::{CODE_COLUMN, ENTITY_ID_COLUMN};
use crate::domain::mapping::{OptionEntry, ValueSource};
use crate::domain::scope::StoreRef;
use crate::domain::types::ScopeDimension;
use crate::repository::catalog_repo::{
    CatalogRepository, CategoryLink, EntityMatchSummary, ImportCategory,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// url_rewrite.entity_type
const URL_ENTITY_TYPE: &str = "product";

/// 新建商品的类型与属性集（暂存表无对应列时）
const DEFAULT_TYPE_ID: &str = "configurable";
const DEFAULT_ATTRIBUTE_SET_ID: i64 = 4;

// ==========================================
// CatalogRepositoryImpl
// ==========================================
pub struct CatalogRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepositoryImpl {
    /// 创建新的目录仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 暂存表列名；表不存在时报错
    fn staging_columns(conn: &Connection, table: &str) -> RepositoryResult<Vec<String>> {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            return Err(RepositoryError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    fn load_attribute_ids(
        conn: &Connection,
        entity_type_id: i64,
    ) -> RepositoryResult<HashMap<String, i64>> {
        let mut stmt = conn.prepare(
            "SELECT attribute_code, attribute_id FROM eav_attribute WHERE entity_type_id = ?1",
        )?;
        let pairs = stmt
            .query_map(params![entity_type_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(pairs)
    }

    /// 在事务中查找或创建单个商品实体
    ///
    /// # 返回
    /// - (entity_id, is_new)
    fn resolve_entity_tx(
        tx: &Transaction,
        code: &str,
        entity_kind: &str,
        type_id: &str,
        attribute_set_id: i64,
    ) -> RepositoryResult<(i64, bool)> {
        // 1. 已登记的映射（实体仍存在）
        let mapped: Option<i64> = tx
            .query_row(
                r#"
                SELECT m.entity_id
                FROM pim_entities m
                JOIN catalog_product_entity e ON e.entity_id = m.entity_id
                WHERE m.import = ?1 AND m.code = ?2
                "#,
                params![entity_kind, code],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(entity_id) = mapped {
            return Ok((entity_id, false));
        }

        // 2. 同 SKU 的既有商品
        let by_sku: Option<i64> = tx
            .query_row(
                "SELECT entity_id FROM catalog_product_entity WHERE sku = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;

        let (entity_id, is_new) = match by_sku {
            Some(entity_id) => (entity_id, false),
            None => {
                tx.execute(
                    "INSERT INTO catalog_product_entity (sku, type_id, attribute_set_id) VALUES (?1, ?2, ?3)",
                    params![code, type_id, attribute_set_id],
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        tx.execute(
            r#"
            INSERT INTO pim_entities (import, code, entity_id) VALUES (?1, ?2, ?3)
            ON CONFLICT(import, code) DO UPDATE SET entity_id = excluded.entity_id
            "#,
            params![entity_kind, code, entity_id],
        )?;

        Ok((entity_id, is_new))
    }

    fn write_links(&self, sql: &str, links: &[CategoryLink]) -> RepositoryResult<usize> {
        if links.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for link in links {
                count += stmt.execute(params![link.category_id, link.product_id])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }
}

#[async_trait]
impl CatalogRepository for CatalogRepositoryImpl {
    async fn resolve_scopes(
        &self,
        dimensions: &[ScopeDimension],
    ) -> RepositoryResult<IndexMap<String, Vec<StoreRef>>> {
        let mut resolved: IndexMap<String, Vec<StoreRef>> = IndexMap::new();
        if dimensions.is_empty() {
            return Ok(resolved);
        }

        let select: Vec<&str> = dimensions.iter().map(|d| d.store_column()).collect();
        let filters: Vec<String> = select
            .iter()
            .map(|c| format!("{col} IS NOT NULL AND {col} <> ''", col = quote_ident(c)))
            .collect();
        let sql = format!(
            "SELECT store_id, website_id, {} FROM store WHERE {} ORDER BY store_id",
            select
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            filters.join(" AND ")
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let store = StoreRef {
                    store_id: row.get(0)?,
                    website_id: row.get(1)?,
                };
                let mut parts = Vec::with_capacity(select.len());
                for idx in 0..select.len() {
                    parts.push(value_as_text(row.get_ref(idx + 2)?).unwrap_or_default());
                }
                Ok((parts.join("-"), store))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (suffix, store) in rows {
            resolved.entry(suffix).or_default().push(store);
        }
        Ok(resolved)
    }

    async fn attribute_ids(&self, entity_type_id: i64) -> RepositoryResult<HashMap<String, i64>> {
        let conn = self.get_conn()?;
        Self::load_attribute_ids(&conn, entity_type_id)
    }

    async fn option_entries(&self, attribute_code: &str) -> RepositoryResult<Vec<OptionEntry>> {
        let prefix = format!("{}_", attribute_code);
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT substr(code, length(?1) + 1), entity_id
            FROM pim_entities
            WHERE import = 'option' AND substr(code, 1, length(?1)) = ?1
            ORDER BY entity_id
            "#,
        )?;
        let entries = stmt
            .query_map(params![prefix], |row| {
                Ok(OptionEntry {
                    code: row.get(0)?,
                    entity_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    async fn import_categories(&self) -> RepositoryResult<Vec<ImportCategory>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.code, c.entity_id
            FROM pim_entities c
            JOIN catalog_category_entity e ON e.entity_id = c.entity_id
            WHERE c.import = 'category'
            ORDER BY c.code
            "#,
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(ImportCategory {
                    code: row.get(0)?,
                    entity_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    async fn match_entities(
        &self,
        import_key: &str,
        natural_key_column: &str,
        entity_kind: &str,
    ) -> RepositoryResult<EntityMatchSummary> {
        let table = staging_table_name(import_key);
        let mut conn = self.get_conn()?;
        let columns = Self::staging_columns(&conn, &table)?;
        if !columns.iter().any(|c| c == natural_key_column) {
            return Err(RepositoryError::ColumnNotFound {
                table,
                column: natural_key_column.to_string(),
            });
        }

        let type_expr = if columns.iter().any(|c| c == "_type_id") {
            quote_ident("_type_id")
        } else {
            "NULL".to_string()
        };
        let set_expr = if columns.iter().any(|c| c == "_attribute_set_id") {
            quote_ident("_attribute_set_id")
        } else {
            "NULL".to_string()
        };

        let rows: Vec<(String, Option<String>, Option<i64>)> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {key}, {ty}, {set} FROM {t} WHERE {key} IS NOT NULL AND {key} <> '' ORDER BY {key}",
                key = quote_ident(natural_key_column),
                ty = type_expr,
                set = set_expr,
                t = quote_ident(&table)
            ))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        value_as_text(row.get_ref(0)?).unwrap_or_default(),
                        value_as_text(row.get_ref(1)?),
                        value_as_text(row.get_ref(2)?).and_then(|v| v.trim().parse::<i64>().ok()),
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let update_sql = format!(
            "UPDATE {} SET {} = ?1, \"_is_new\" = ?2 WHERE {} = ?3",
            quote_ident(&table),
            quote_ident(ENTITY_ID_COLUMN),
            quote_ident(natural_key_column)
        );

        let tx = conn.transaction()?;
        let mut summary = EntityMatchSummary::default();
        for (code, type_id, attribute_set_id) in rows {
            let (entity_id, is_new) = Self::resolve_entity_tx(
                &tx,
                &code,
                entity_kind,
                type_id.as_deref().unwrap_or(DEFAULT_TYPE_ID),
                attribute_set_id.unwrap_or(DEFAULT_ATTRIBUTE_SET_ID),
            )?;
            tx.execute(&update_sql, params![entity_id, is_new as i64, code])?;

            if is_new {
                summary.created += 1;
            } else {
                summary.matched += 1;
            }
        }
        tx.commit()?;

        Ok(summary)
    }

    async fn set_attribute_values(
        &self,
        import_key: &str,
        values: &IndexMap<String, ValueSource>,
        entity_type_id: i64,
        store_id: i64,
    ) -> RepositoryResult<usize> {
        let table = staging_table_name(import_key);
        let mut conn = self.get_conn()?;
        let columns = Self::staging_columns(&conn, &table)?;
        let attribute_ids = Self::load_attribute_ids(&conn, entity_type_id)?;

        let tx = conn.transaction()?;
        let mut count = 0;
        for (attribute_code, source) in values {
            let Some(attribute_id) = attribute_ids.get(attribute_code) else {
                tracing::debug!(attribute = %attribute_code, store_id, "未知属性，跳过");
                continue;
            };

            let (value_expr, literal) = match source {
                ValueSource::Column(column) => {
                    if !columns.iter().any(|c| c == column) {
                        tracing::warn!(attribute = %attribute_code, column = %column, "暂存表缺少来源列，跳过");
                        continue;
                    }
                    (quote_ident(column), None)
                }
                ValueSource::Literal(value) => ("?3".to_string(), Some(value.as_str())),
            };

            let sql = format!(
                r#"
                INSERT INTO catalog_product_entity_value (entity_id, attribute_id, store_id, value)
                SELECT {eid}, ?1, ?2, {value} FROM {t} WHERE {eid} IS NOT NULL
                ON CONFLICT(entity_id, attribute_id, store_id) DO UPDATE SET value = excluded.value
                "#,
                eid = quote_ident(ENTITY_ID_COLUMN),
                value = value_expr,
                t = quote_ident(&table)
            );
            count += match literal {
                Some(v) => tx.execute(&sql, params![attribute_id, store_id, v])?,
                None => tx.execute(&sql, params![attribute_id, store_id])?,
            };
        }
        tx.commit()?;

        Ok(count)
    }

    async fn link_websites(&self, import_key: &str, website_id: i64) -> RepositoryResult<usize> {
        let table = staging_table_name(import_key);
        let conn = self.get_conn()?;
        Self::staging_columns(&conn, &table)?;
        let count = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO catalog_product_website (product_id, website_id)
                 SELECT {eid}, ?1 FROM {t} WHERE {eid} IS NOT NULL",
                eid = quote_ident(ENTITY_ID_COLUMN),
                t = quote_ident(&table)
            ),
            params![website_id],
        )?;
        Ok(count)
    }

    async fn insert_category_links(&self, links: &[CategoryLink]) -> RepositoryResult<usize> {
        self.write_links(
            "INSERT OR IGNORE INTO catalog_category_product (category_id, product_id) VALUES (?1, ?2)",
            links,
        )
    }

    async fn delete_category_links(&self, links: &[CategoryLink]) -> RepositoryResult<usize> {
        self.write_links(
            "DELETE FROM catalog_category_product WHERE category_id = ?1 AND product_id = ?2",
            links,
        )
    }

    async fn rewrite_urls(
        &self,
        import_key: &str,
        store_id: i64,
        url_key_column: &str,
        url_suffix: &str,
    ) -> RepositoryResult<usize> {
        let table = staging_table_name(import_key);
        let mut conn = self.get_conn()?;
        let columns = Self::staging_columns(&conn, &table)?;
        if !columns.iter().any(|c| c == url_key_column) {
            return Err(RepositoryError::ColumnNotFound {
                table,
                column: url_key_column.to_string(),
            });
        }

        let rows: Vec<(i64, Option<String>)> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {eid}, {col} FROM {t} WHERE {eid} IS NOT NULL ORDER BY {code}",
                eid = quote_ident(ENTITY_ID_COLUMN),
                col = quote_ident(url_key_column),
                t = quote_ident(&table),
                code = quote_ident(CODE_COLUMN)
            ))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, value_as_text(row.get_ref(1)?))))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let tx = conn.transaction()?;
        let mut count = 0;
        for (entity_id, url_key) in rows {
            let Some(url_key) = url_key.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
            else {
                continue;
            };

            tx.execute(
                "DELETE FROM url_rewrite WHERE entity_type = ?1 AND entity_id = ?2 AND store_id = ?3",
                params![URL_ENTITY_TYPE, entity_id, store_id],
            )?;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO url_rewrite (entity_type, entity_id, store_id, request_path, target_path)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    URL_ENTITY_TYPE,
                    entity_id,
                    store_id,
                    format!("{}{}", url_key, url_suffix),
                    format!("catalog/product/view/id/{}", entity_id),
                ],
            )?;
            count += 1;
        }
        tx.commit()?;

        Ok(count)
    }

    async fn clean_caches(&self, cache_types: &[&str]) -> RepositoryResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.get_conn()?;
        for cache_type in cache_types {
            conn.execute(
                r#"
                INSERT INTO cache_invalidation (cache_type, invalidated_at) VALUES (?1, ?2)
                ON CONFLICT(cache_type) DO UPDATE SET invalidated_at = excluded.invalidated_at
                "#,
                params![cache_type, now],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Mutex<Connection>>, CatalogRepositoryImpl) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_catalog_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO store (store_id, code, website_id, lang, channel_code, currency) VALUES
                (1, 'en', 1, 'en_US', 'ecommerce', 'USD'),
                (2, 'fr', 1, 'fr_FR', 'ecommerce', 'EUR'),
                (3, 'us_mobile', 2, 'en_US', 'mobile', 'USD');
            CREATE TABLE tmp_variant (code TEXT PRIMARY KEY, axis TEXT, url_key TEXT,
                _entity_id INTEGER, _is_new INTEGER NOT NULL DEFAULT 0);
            INSERT INTO tmp_variant (code, axis, url_key) VALUES ('RED', 'color', 'red'), ('BLUE', 'color', '');
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = CatalogRepositoryImpl::new(conn.clone());
        (conn, repo)
    }

    #[tokio::test]
    async fn test_resolve_scopes_groups_stores_by_suffix() {
        let (_conn, repo) = setup();

        let by_lang = repo.resolve_scopes(&[ScopeDimension::Locale]).await.unwrap();
        assert_eq!(by_lang.keys().collect::<Vec<_>>(), vec!["en_US", "fr_FR"]);
        assert_eq!(by_lang["en_US"].len(), 2);

        let by_lang_channel = repo
            .resolve_scopes(&[ScopeDimension::Locale, ScopeDimension::Channel])
            .await
            .unwrap();
        assert!(by_lang_channel.contains_key("en_US-mobile"));

        let websites = repo.resolve_scopes(&[ScopeDimension::Website]).await.unwrap();
        assert_eq!(websites.keys().collect::<Vec<_>>(), vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_match_entities_creates_then_reuses() {
        let (conn, repo) = setup();

        let first = repo.match_entities("variant", "code", "product").await.unwrap();
        assert_eq!(first, EntityMatchSummary { matched: 0, created: 2 });

        let second = repo.match_entities("variant", "code", "product").await.unwrap();
        assert_eq!(second, EntityMatchSummary { matched: 2, created: 0 });

        let products: i64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM catalog_product_entity", [], |r| r.get(0))
            .unwrap();
        assert_eq!(products, 2);
    }

    #[tokio::test]
    async fn test_option_entries_strip_prefix() {
        let (conn, repo) = setup();
        conn.lock()
            .unwrap()
            .execute_batch(
                "INSERT INTO pim_entities (import, code, entity_id) VALUES
                    ('option', 'color_red', 11), ('option', 'color_blue', 12),
                    ('option', 'colorway_x', 13), ('category', 'color_red', 99);",
            )
            .unwrap();

        let entries = repo.option_entries("color").await.unwrap();
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["red", "blue"]);
    }

    #[tokio::test]
    async fn test_rewrite_urls_skips_empty_keys() {
        let (_conn, repo) = setup();
        repo.match_entities("variant", "code", "product").await.unwrap();

        let written = repo.rewrite_urls("variant", 1, "url_key", ".html").await.unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_set_attribute_values_skips_unknown_attributes() {
        let (conn, repo) = setup();
        conn.lock()
            .unwrap()
            .execute(
                "INSERT INTO eav_attribute (entity_type_id, attribute_code) VALUES (4, 'url_key')",
                [],
            )
            .unwrap();
        repo.match_entities("variant", "code", "product").await.unwrap();

        let mut values = IndexMap::new();
        values.insert("url_key".to_string(), ValueSource::column("url_key"));
        values.insert("unknown".to_string(), ValueSource::column("url_key"));
        let written = repo.set_attribute_values("variant", &values, 4, 0).await.unwrap();
        assert_eq!(written, 2);
    }
}

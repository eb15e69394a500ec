// ==========================================
// PIM 变体导入 - URL key 列选择与去重
// ==========================================
// 只看语言相关的组合（en_US / en_US-channel）
// 存在任一 url_key-<后缀> 列时按后缀取列；否则所有门店回落 url_key
// 同门店内重复的非空 url_key 追加 `-<code>` 去重
// ==========================================

use crate::domain::column::URL_KEY_COLUMN;
use crate::domain::scope::ScopeTable;
use crate::domain::types::{DEFAULT_STORE_ID, URL_SCOPE_COMBINATIONS};
use crate::importer::classifier::StagingSchema;
use crate::repository::staging_repo::StagingCell;
use std::collections::{BTreeMap, HashMap};

/// 门店 → url_key 列（不含 store 0）
pub fn url_key_columns(schema: &StagingSchema, scopes: &ScopeTable) -> BTreeMap<i64, String> {
    let mut columns = BTreeMap::new();

    for entry in scopes.entries_for(&URL_SCOPE_COMBINATIONS) {
        let column = format!("{}-{}", URL_KEY_COLUMN, entry.suffix);
        if schema.contains(&column) {
            for store in &entry.stores {
                columns.insert(store.store_id, column.clone());
            }
        }
    }

    if columns.is_empty() {
        for entry in scopes.entries_for(&URL_SCOPE_COMBINATIONS) {
            for store in &entry.stores {
                columns.insert(store.store_id, URL_KEY_COLUMN.to_string());
            }
        }
    }

    columns.remove(&DEFAULT_STORE_ID);
    columns
}

/// 重复 url_key 去重
///
/// # 返回
/// - 需要回写的 (code, 新 url_key)
pub fn disambiguate(cells: &[StagingCell]) -> Vec<(String, Option<String>)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for cell in cells {
        if let Some(value) = cell.value.as_deref() {
            *counts.entry(value).or_default() += 1;
        }
    }

    cells
        .iter()
        .filter_map(|cell| {
            let value = cell.value.as_deref()?;
            if value.is_empty() || counts.get(value).copied().unwrap_or(0) < 2 {
                return None;
            }
            Some((cell.code.clone(), Some(format!("{}-{}", value, cell.code))))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::StoreRef;

    fn store(store_id: i64) -> StoreRef {
        StoreRef {
            store_id,
            website_id: 1,
        }
    }

    fn scopes() -> ScopeTable {
        let mut table = ScopeTable::new();
        table.insert(0, "en_US", vec![store(1)]);
        table.insert(0, "fr_FR", vec![store(2)]);
        table.insert(1, "en_US-mobile", vec![store(3)]);
        table.insert(3, "USD", vec![store(1)]);
        table
    }

    fn cell(code: &str, value: Option<&str>) -> StagingCell {
        StagingCell {
            code: code.to_string(),
            entity_id: Some(1),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_suffixed_columns_take_precedence() {
        let scopes = scopes();
        let schema = StagingSchema::from_columns(&["code", "url_key", "url_key-en_US"], &scopes);
        let columns = url_key_columns(&schema, &scopes);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[&1], "url_key-en_US");
    }

    #[test]
    fn test_fallback_to_plain_url_key_for_all_stores() {
        let scopes = scopes();
        let schema = StagingSchema::from_columns(&["code", "url_key"], &scopes);
        let columns = url_key_columns(&schema, &scopes);
        assert_eq!(columns.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(columns.values().all(|c| c == "url_key"));
    }

    #[test]
    fn test_duplicate_url_keys_get_code_appended() {
        let cells = vec![
            cell("RED-L", Some("red-shirt")),
            cell("RED-M", Some("red-shirt")),
            cell("BLUE-M", Some("blue-shirt")),
            cell("X", Some("")),
            cell("Y", Some("")),
        ];
        let updates = disambiguate(&cells);
        assert_eq!(
            updates,
            vec![
                ("RED-L".to_string(), Some("red-shirt-RED-L".to_string())),
                ("RED-M".to_string(), Some("red-shirt-RED-M".to_string())),
            ]
        );
    }
}

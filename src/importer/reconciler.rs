// ==========================================
// PIM 变体导入 - 变体表结构对齐
// ==========================================
// 变体表列集合 = {code, axis} ∪ 本次暂存表的动态列（改名后）
// 上次导入遗留、本次缺失的列整体丢弃，不做增量保留
// ==========================================

use crate::domain::column::{AXIS_COLUMN, CODE_COLUMN};
use crate::importer::classifier::{is_persistent_candidate, persistent_column_name};
use indexmap::IndexSet;

/// 变体表固定列
pub const VARIANT_KEY_COLUMNS: [&str; 2] = [CODE_COLUMN, AXIS_COLUMN];

/// 需要删除的变体表列（固定列之外全部）
pub fn columns_to_drop<S: AsRef<str>>(persistent: &[S]) -> Vec<String> {
    persistent
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| !VARIANT_KEY_COLUMNS.contains(c))
        .map(str::to_string)
        .collect()
}

/// 暂存列对应的变体表目标列（改名、去重、保持顺序）
pub fn target_columns<S: AsRef<str>>(staging: &[S]) -> Vec<String> {
    staging
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| is_persistent_candidate(c))
        .map(persistent_column_name)
        .filter(|c| !VARIANT_KEY_COLUMNS.contains(&c.as_str()))
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// 需要新增的变体表列
pub fn columns_to_add<S: AsRef<str>, P: AsRef<str>>(staging: &[S], persistent: &[P]) -> Vec<String> {
    target_columns(staging)
        .into_iter()
        .filter(|c| !persistent.iter().any(|p| p.as_ref() == c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_reconcile_to_last_import_shape() {
        let persistent = ["code", "axis", "A", "B"];
        let staging = ["code", "axis", "B", "C"];

        // 先删后加，与 remove_columns / add_columns 两步一致
        let drop = columns_to_drop(&persistent);
        let kept: Vec<&str> = persistent
            .iter()
            .copied()
            .filter(|c| !drop.iter().any(|d| d == c))
            .collect();
        let add = columns_to_add(&staging, &kept[..]);
        let result: BTreeSet<String> = kept
            .iter()
            .map(|c| c.to_string())
            .chain(add)
            .collect();
        let expected: BTreeSet<String> = ["code", "axis", "B", "C"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_staging_system_columns_never_persist() {
        let staging = [
            "code", "axis", "type", "_entity_id", "_is_new", "_status", "sku", "label-en_US",
        ];
        assert_eq!(target_columns(&staging), vec!["name-en_US"]);
    }

    #[test]
    fn test_rename_collision_is_deduplicated() {
        let staging = ["code", "axis", "label", "name"];
        assert_eq!(target_columns(&staging), vec!["name"]);
    }

    #[test]
    fn test_drop_keeps_key_columns() {
        assert_eq!(columns_to_drop(&["code", "axis", "color"]), vec!["color"]);
    }
}

// ==========================================
// PIM 变体导入 - 变体表批量写入
// ==========================================
// 每 500 条一批 UPSERT（按 code），末批不足 500 也写入
// axis: 属性编码 → 属性 ID，未知编码直接丢弃
// ==========================================

use crate::domain::column::AXIS_COLUMN;
use crate::importer::classifier::persistent_column_name;
use crate::repository::staging_repo::StagingRow;
use std::collections::{HashMap, HashSet};

/// 单批写入条数
pub const UPSERT_BATCH_SIZE: usize = 500;

/// axis 属性编码列表 → 属性 ID 列表（保持顺序）
pub fn map_axis(raw: Option<&str>, attribute_ids: &HashMap<String, i64>) -> String {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter_map(|code| attribute_ids.get(code))
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// 暂存行 → 变体表记录
///
/// 只保留变体表中存在的列；同一暂存表生成的记录列集合一致
pub fn build_record(
    row: &StagingRow,
    persistent_columns: &HashSet<String>,
    attribute_ids: &HashMap<String, i64>,
) -> StagingRow {
    let mut record = StagingRow::with_capacity(row.len());
    for (column, value) in row {
        let target = persistent_column_name(column);
        if !persistent_columns.contains(&target) {
            continue;
        }
        if column == AXIS_COLUMN {
            record.insert(target, Some(map_axis(value.as_deref(), attribute_ids)));
        } else {
            record.insert(target, value.clone());
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> HashMap<String, i64> {
        [("color".to_string(), 93), ("size".to_string(), 144)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_map_axis_drops_unknown_codes() {
        let attrs = attributes();
        assert_eq!(map_axis(Some("color,size"), &attrs), "93,144");
        assert_eq!(map_axis(Some("size,material,color"), &attrs), "144,93");
        assert_eq!(map_axis(Some("material"), &attrs), "");
        assert_eq!(map_axis(None, &attrs), "");
    }

    #[test]
    fn test_build_record_renames_and_filters() {
        let persistent: HashSet<String> = ["code", "axis", "name-en_US"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut row = StagingRow::new();
        row.insert("code".to_string(), Some("RED".to_string()));
        row.insert("axis".to_string(), Some("color,size".to_string()));
        row.insert("label-en_US".to_string(), Some("Red".to_string()));
        row.insert("_entity_id".to_string(), Some("7".to_string()));

        let record = build_record(&row, &persistent, &attributes());
        assert_eq!(record.len(), 3);
        assert_eq!(record["axis"].as_deref(), Some("93,144"));
        assert_eq!(record["name-en_US"].as_deref(), Some("Red"));
    }
}

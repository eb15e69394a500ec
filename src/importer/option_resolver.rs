// ==========================================
// PIM 变体导入 - 选项编码解析
// ==========================================
// 单值单元格: 与选项编码完全相等
// 多值单元格（含逗号）: 逐个 token 比对
// 输出: 命中的选项 ID 按 token 顺序以逗号连接；无命中则不改写
// ==========================================

use crate::domain::mapping::OptionEntry;
use crate::repository::staging_repo::StagingCell;
use std::collections::HashMap;

const MULTI_VALUE_SEPARATOR: char = ',';

/// 某属性的选项编码索引（去前缀后的编码 → 选项 ID）
#[derive(Debug, Clone, Default)]
pub struct OptionIndex {
    by_code: HashMap<String, i64>,
}

impl OptionIndex {
    pub fn new(entries: Vec<OptionEntry>) -> Self {
        let mut by_code = HashMap::with_capacity(entries.len());
        for entry in entries {
            // 同编码重复登记时保留首个
            by_code.entry(entry.code).or_insert(entry.entity_id);
        }
        Self { by_code }
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<i64> {
        self.by_code.get(code).copied()
    }
}

/// 解析单个单元格
///
/// # 返回
/// - Some(ids): 至少命中一个选项，未命中的 token 被丢弃
/// - None: 无命中，保持原值
pub fn resolve_cell(value: &str, index: &OptionIndex) -> Option<String> {
    if value.contains(MULTI_VALUE_SEPARATOR) {
        let ids: Vec<String> = value
            .split(MULTI_VALUE_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter_map(|t| index.get(t))
            .map(|id| id.to_string())
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(ids.join(","))
        }
    } else {
        index.get(value).map(|id| id.to_string())
    }
}

/// 解析整列，返回需要回写的 (code, 新值)
pub fn resolve_column(cells: &[StagingCell], index: &OptionIndex) -> Vec<(String, Option<String>)> {
    cells
        .iter()
        .filter_map(|cell| {
            let value = cell.value.as_deref()?;
            let resolved = resolve_cell(value, index)?;
            if resolved == value {
                None
            } else {
                Some((cell.code.clone(), Some(resolved)))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> OptionIndex {
        OptionIndex::new(vec![
            OptionEntry {
                code: "red".to_string(),
                entity_id: 11,
            },
            OptionEntry {
                code: "blue".to_string(),
                entity_id: 12,
            },
            OptionEntry {
                code: "green".to_string(),
                entity_id: 13,
            },
        ])
    }

    #[test]
    fn test_single_value_exact_match() {
        let index = index();
        assert_eq!(resolve_cell("red", &index), Some("11".to_string()));
        assert_eq!(resolve_cell("reddish", &index), None);
        assert_eq!(resolve_cell("Red", &index), None);
    }

    #[test]
    fn test_multi_value_keeps_token_order_and_cardinality() {
        let index = index();
        assert_eq!(resolve_cell("blue,red", &index), Some("12,11".to_string()));
        assert_eq!(
            resolve_cell("green, blue ,red", &index),
            Some("13,12,11".to_string())
        );
    }

    #[test]
    fn test_multi_value_drops_exactly_unmatched_tokens() {
        let index = index();
        assert_eq!(resolve_cell("red,purple,blue", &index), Some("11,12".to_string()));
        assert_eq!(resolve_cell("purple,pink", &index), None);
    }

    #[test]
    fn test_resolve_column_skips_unmatched_and_null() {
        let cells = vec![
            StagingCell {
                code: "A".to_string(),
                entity_id: Some(1),
                value: Some("red".to_string()),
            },
            StagingCell {
                code: "B".to_string(),
                entity_id: Some(2),
                value: Some("unknown".to_string()),
            },
            StagingCell {
                code: "C".to_string(),
                entity_id: Some(3),
                value: None,
            },
        ];
        let updates = resolve_column(&cells, &index());
        assert_eq!(updates, vec![("A".to_string(), Some("11".to_string()))]);
    }
}

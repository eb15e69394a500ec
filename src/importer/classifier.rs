// ==========================================
// PIM 变体导入 - 列分类器
// ==========================================
// 列名约定: attribute[-locale][-channel][-currency]
// 首个 `-` 之前为基础属性；其余部分与作用域后缀整体比对（区分大小写）
// ==========================================

use crate::domain::column::{
    ColumnDescriptor, ScopeSuffix, AXIS_COLUMN, CODE_COLUMN, RESERVED_COLUMNS,
};
use crate::domain::scope::ScopeTable;
use indexmap::IndexMap;

/// 进入变体表前的列名改写（前缀匹配）
const COLUMN_RENAMES: [(&str, &str); 1] = [("label", "name")];

/// 不进入变体表的暂存列（另加保留列）
pub const PERSISTENT_EXCEPT: [&str; 3] = [CODE_COLUMN, AXIS_COLUMN, "type"];

/// 解析单个列名
pub fn classify(column: &str, scopes: &ScopeTable) -> ColumnDescriptor {
    let (base, remainder) = match column.split_once('-') {
        Some((base, rest)) => (base, Some(rest)),
        None => (column, None),
    };

    let scope = remainder.and_then(|rest| {
        scopes.get(rest).map(|entry| ScopeSuffix {
            suffix: entry.suffix.clone(),
            combination: entry.combination,
        })
    });

    ColumnDescriptor {
        name: column.to_string(),
        base_attribute: base.to_string(),
        scope,
    }
}

/// 变体表列名（`label*` → `name*`）
pub fn persistent_column_name(column: &str) -> String {
    for (from, to) in COLUMN_RENAMES {
        if let Some(rest) = column.strip_prefix(from) {
            return format!("{}{}", to, rest);
        }
    }
    column.to_string()
}

/// 暂存列是否进入变体表的动态列集合
pub fn is_persistent_candidate(column: &str) -> bool {
    !PERSISTENT_EXCEPT.contains(&column) && !RESERVED_COLUMNS.contains(&column)
}

// ==========================================
// StagingSchema - 暂存表列语义
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingSchema {
    columns: IndexMap<String, ColumnDescriptor>,
}

impl StagingSchema {
    /// 由暂存表列名（表结构顺序）构建
    pub fn from_columns<S: AsRef<str>>(columns: &[S], scopes: &ScopeTable) -> Self {
        let columns = columns
            .iter()
            .map(|c| {
                let descriptor = classify(c.as_ref(), scopes);
                (descriptor.name.clone(), descriptor)
            })
            .collect();
        Self { columns }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDescriptor> {
        self.columns.get(column)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// 参与属性值写入的列
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.values().filter(|d| d.writes_values())
    }

    /// 参与选项解析的列
    pub fn option_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.values().filter(|d| d.resolves_options())
    }

    /// 该基础属性是否存在不带后缀的值列
    pub fn has_unsuffixed_value_column(&self, base_attribute: &str) -> bool {
        self.value_columns()
            .any(|d| d.base_attribute == base_attribute && d.is_unsuffixed())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::StoreRef;

    fn scopes() -> ScopeTable {
        let store = StoreRef {
            store_id: 1,
            website_id: 1,
        };
        let mut table = ScopeTable::new();
        table.insert(0, "en_US", vec![store]);
        table.insert(1, "en_US-ecommerce", vec![store]);
        table.insert(2, "ecommerce", vec![store]);
        table.insert(3, "USD", vec![store]);
        table
    }

    #[test]
    fn test_classify_plain_and_scoped() {
        let scopes = scopes();

        let plain = classify("color", &scopes);
        assert_eq!(plain.base_attribute, "color");
        assert!(plain.scope.is_none());

        let scoped = classify("name-en_US-ecommerce", &scopes);
        assert_eq!(scoped.base_attribute, "name");
        let scope = scoped.scope.unwrap();
        assert_eq!(scope.suffix, "en_US-ecommerce");
        assert_eq!(scope.combination, 1);
    }

    #[test]
    fn test_classify_is_case_sensitive_and_anchored() {
        let scopes = scopes();
        assert!(classify("name-en_us", &scopes).scope.is_none());
        assert!(classify("name-en_US-", &scopes).scope.is_none());
        assert!(classify("price-USD-extra", &scopes).scope.is_none());
    }

    #[test]
    fn test_unit_column_is_classified_but_excluded() {
        let scopes = scopes();
        let unit = classify("weight-unit", &scopes);
        assert_eq!(unit.base_attribute, "weight");
        assert!(!unit.writes_values());
    }

    #[test]
    fn test_persistent_column_name_renames_label_prefix() {
        assert_eq!(persistent_column_name("label"), "name");
        assert_eq!(persistent_column_name("label-en_US"), "name-en_US");
        assert_eq!(persistent_column_name("color"), "color");
        assert_eq!(persistent_column_name("my_label"), "my_label");
    }

    #[test]
    fn test_persistent_candidates_exclude_reserved() {
        assert!(!is_persistent_candidate("code"));
        assert!(!is_persistent_candidate("type"));
        assert!(!is_persistent_candidate("_entity_id"));
        assert!(!is_persistent_candidate("categories"));
        assert!(is_persistent_candidate("color"));
    }

    #[test]
    fn test_schema_keeps_column_order() {
        let schema = StagingSchema::from_columns(
            &["code", "axis", "name", "name-en_US", "price-unit"],
            &scopes(),
        );
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, vec!["code", "axis", "name", "name-en_US", "price-unit"]);
        assert!(schema.has_unsuffixed_value_column("name"));
        assert_eq!(schema.value_columns().count(), 4);
    }

    #[test]
    fn test_unknown_suffix_does_not_count_as_unsuffixed() {
        let schema = StagingSchema::from_columns(&["code", "name-en_US", "name-de_DE"], &scopes());
        assert!(!schema.has_unsuffixed_value_column("name"));
    }
}

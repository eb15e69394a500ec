// ==========================================
// PIM 变体导入 - 列语义描述
// ==========================================
// 导入文件列名约定: attribute[-locale][-channel][-currency]
// 列集合运行期才可知，解析为 ColumnDescriptor 后按类型流转
// ==========================================

use serde::{Deserialize, Serialize};

/// 保留列：不写属性值、不解析选项、不进入变体表
pub const RESERVED_COLUMNS: [&str; 15] = [
    "_entity_id",
    "_is_new",
    "_status",
    "_type_id",
    "_options_container",
    "_tax_class_id",
    "_attribute_set_id",
    "_visibility",
    "_children",
    "_axis",
    "sku",
    "categories",
    "family",
    "groups",
    "enabled",
];

/// 单位补充列标记（price-unit 等），不是属性值
pub const UNIT_MARKER: &str = "-unit";

/// 自然键列
pub const CODE_COLUMN: &str = "code";

/// 轴列
pub const AXIS_COLUMN: &str = "axis";

/// URL key 列
pub const URL_KEY_COLUMN: &str = "url_key";

/// 分类列
pub const CATEGORIES_COLUMN: &str = "categories";

/// 启用状态源列
pub const ENABLED_COLUMN: &str = "enabled";

/// 已匹配实体 ID 列
pub const ENTITY_ID_COLUMN: &str = "_entity_id";

/// 作用域后缀
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSuffix {
    pub suffix: String,
    /// SCOPE_COMBINATIONS 下标
    pub combination: usize,
}

/// 列语义描述（派生，不落库）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub base_attribute: String,
    pub scope: Option<ScopeSuffix>,
}

impl ColumnDescriptor {
    pub fn is_reserved(&self) -> bool {
        RESERVED_COLUMNS.contains(&self.name.as_str())
    }

    pub fn is_unit(&self) -> bool {
        self.name.contains(UNIT_MARKER)
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// 列名不带任何后缀（无法识别的后缀也算带后缀）
    pub fn is_unsuffixed(&self) -> bool {
        self.name == self.base_attribute
    }

    /// 是否参与属性值写入
    pub fn writes_values(&self) -> bool {
        !self.is_reserved() && !self.is_unit()
    }

    /// 是否参与选项编码解析
    pub fn resolves_options(&self) -> bool {
        self.writes_values() && self.name != URL_KEY_COLUMN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, base: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            base_attribute: base.to_string(),
            scope: None,
        }
    }

    #[test]
    fn test_unit_columns_never_write() {
        let col = descriptor("weight-unit", "weight");
        assert!(col.is_unit());
        assert!(!col.writes_values());
        assert!(!col.resolves_options());
    }

    #[test]
    fn test_url_key_writes_but_skips_options() {
        let col = descriptor("url_key", "url_key");
        assert!(col.writes_values());
        assert!(!col.resolves_options());
    }

    #[test]
    fn test_unknown_suffix_is_not_unsuffixed() {
        assert!(descriptor("name", "name").is_unsuffixed());
        let col = descriptor("name-de_DE", "name");
        assert!(!col.is_scoped());
        assert!(!col.is_unsuffixed());
    }

    #[test]
    fn test_reserved_columns() {
        assert!(descriptor("categories", "categories").is_reserved());
        assert!(descriptor("_entity_id", "_entity_id").is_reserved());
        assert!(!descriptor("color", "color").is_reserved());
    }
}

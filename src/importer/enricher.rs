// ==========================================
// PIM 变体导入 - 必填数据补全
// ==========================================
// 固定列: _type_id / _options_container / _tax_class_id /
//         _attribute_set_id / _visibility / _status
// 派生: url_key（缺失时 = lower(code)）、_status（来自 enabled）、
//       _type_id（来自 type_id，白名单外回落 configurable）
// ==========================================

use crate::domain::mapping::AttributeMappingRule;
use crate::domain::scope::ScopeTable;
use crate::repository::staging_repo::ColumnSpec;

pub const DEFAULT_TYPE_ID: &str = "configurable";
pub const DEFAULT_OPTIONS_CONTAINER: &str = "container2";
pub const DEFAULT_TAX_CLASS_ID: i64 = 0; // None
pub const DEFAULT_ATTRIBUTE_SET_ID: i64 = 4; // Default
pub const DEFAULT_VISIBILITY: i64 = 4; // catalog, search
pub const STATUS_ENABLED: i64 = 1;
pub const STATUS_DISABLED: i64 = 2;

/// 源数据中的类型列
pub const TYPE_ID_COLUMN: &str = "type_id";

/// 固定补全列及默认值（顺序固定）
pub fn required_columns() -> Vec<(&'static str, ColumnSpec)> {
    vec![
        ("_type_id", ColumnSpec::text(DEFAULT_TYPE_ID)),
        ("_options_container", ColumnSpec::text(DEFAULT_OPTIONS_CONTAINER)),
        ("_tax_class_id", ColumnSpec::integer(DEFAULT_TAX_CLASS_ID)),
        ("_attribute_set_id", ColumnSpec::integer(DEFAULT_ATTRIBUTE_SET_ID)),
        ("_visibility", ColumnSpec::integer(DEFAULT_VISIBILITY)),
        ("_status", ColumnSpec::integer(STATUS_DISABLED)),
    ]
}

/// enabled → _status
///
/// 去空白后等于 "1" 为启用，其余（含空值）为停用
pub fn status_from_enabled(enabled: Option<&str>) -> i64 {
    match enabled.map(str::trim) {
        Some("1") => STATUS_ENABLED,
        _ => STATUS_DISABLED,
    }
}

/// type_id → _type_id（白名单外回落 configurable）
pub fn resolve_type_id(type_id: Option<&str>, allowed: &[String]) -> String {
    match type_id {
        Some(t) if allowed.iter().any(|a| a == t) => t.to_string(),
        _ => DEFAULT_TYPE_ID.to_string(),
    }
}

/// 缺失 url_key 时的默认值
pub fn default_url_key(code: &str) -> String {
    code.to_lowercase()
}

/// 属性复制规则展开为 (来源列, 目标列)：基础列 + 每个作用域后缀
pub fn copy_pairs(rule: &AttributeMappingRule, scopes: &ScopeTable) -> Vec<(String, String)> {
    let mut pairs = vec![(rule.pim_attribute.clone(), rule.magento_attribute.clone())];
    for suffix in scopes.suffixes() {
        pairs.push((
            format!("{}-{}", rule.pim_attribute, suffix),
            format!("{}-{}", rule.magento_attribute, suffix),
        ));
    }
    pairs
}

// ==========================================
// PIM 变体导入 - 属性映射与取值来源
// ==========================================

use serde::{Deserialize, Serialize};

/// 属性复制规则（PIM 属性 → 目录属性），含所有作用域后缀变体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMappingRule {
    pub pim_attribute: String,
    pub magento_attribute: String,
}

/// 属性值来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValueSource {
    /// 取暂存表某列
    Column(String),
    /// 固定值（如按门店配置的税率类别）
    Literal(String),
}

impl ValueSource {
    pub fn column(name: impl Into<String>) -> Self {
        ValueSource::Column(name.into())
    }

    pub fn as_column(&self) -> Option<&str> {
        match self {
            ValueSource::Column(c) => Some(c.as_str()),
            ValueSource::Literal(_) => None,
        }
    }
}

/// 选项条目（pim_entities 中 import='option'）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    /// 去掉 `<attribute_code>_` 前缀后的选项编码
    pub code: String,
    pub entity_id: i64,
}

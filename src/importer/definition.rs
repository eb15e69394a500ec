// ==========================================
// PIM 变体导入 - 导入定义（注册元数据）
// ==========================================

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDefinition {
    pub code: &'static str,
    pub name: &'static str,
    /// 导入列表中的排序
    pub sort_order: u32,
}

impl ImportDefinition {
    pub const fn variant() -> Self {
        Self {
            code: "variant",
            name: "Variants",
            sort_order: 50,
        }
    }

    /// 暂存表导入编码
    pub fn import_key(&self) -> &'static str {
        self.code
    }
}

impl Default for ImportDefinition {
    fn default() -> Self {
        Self::variant()
    }
}

// ==========================================
// PIM 变体导入 - 宿主目录 Repository Trait
// ==========================================
// 职责: 宿主目录协作接口（作用域、属性字典、实体映射、属性值、关联、URL、缓存）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::mapping::{OptionEntry, ValueSource};
use crate::domain::scope::StoreRef;
use crate::domain::types::ScopeDimension;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 实体匹配统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMatchSummary {
    pub matched: usize,
    pub created: usize,
}

/// 分类-商品关联
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryLink {
    pub category_id: i64,
    pub product_id: i64,
}

/// 导入来源分类（pim_entities.import='category' 且分类实体存在）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCategory {
    pub code: String,
    pub entity_id: i64,
}

// ==========================================
// CatalogRepository Trait
// ==========================================
// 实现者: CatalogRepositoryImpl（rusqlite）
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // ===== 字典 =====

    /// 按维度组合解析门店
    ///
    /// # 返回
    /// - 后缀（维度值以 `-` 连接）→ 受影响门店；只包含所请求维度全部非空的门店
    async fn resolve_scopes(
        &self,
        dimensions: &[ScopeDimension],
    ) -> RepositoryResult<IndexMap<String, Vec<StoreRef>>>;

    /// attribute_code → attribute_id
    async fn attribute_ids(&self, entity_type_id: i64) -> RepositoryResult<HashMap<String, i64>>;

    /// 属性的选项条目（pim_entities: import='option'，code 以 `<attribute_code>_` 开头）
    async fn option_entries(&self, attribute_code: &str) -> RepositoryResult<Vec<OptionEntry>>;

    /// 导入来源的分类列表
    async fn import_categories(&self) -> RepositoryResult<Vec<ImportCategory>>;

    // ===== 实体 =====

    /// 为暂存表每行匹配或创建实体，回填 _entity_id / _is_new
    ///
    /// # 参数
    /// - import_key: 暂存表
    /// - natural_key_column: 自然键列（code）
    /// - entity_kind: pim_entities.import 取值（product）
    async fn match_entities(
        &self,
        import_key: &str,
        natural_key_column: &str,
        entity_kind: &str,
    ) -> RepositoryResult<EntityMatchSummary>;

    /// 在指定门店写入属性值
    ///
    /// # 参数
    /// - values: 目标属性 → 取值来源
    ///
    /// # 返回
    /// - Ok(usize): 写入的单元格数；未知属性与缺失列跳过
    async fn set_attribute_values(
        &self,
        import_key: &str,
        values: &IndexMap<String, ValueSource>,
        entity_type_id: i64,
        store_id: i64,
    ) -> RepositoryResult<usize>;

    // ===== 关联 =====

    /// 所有已匹配商品关联到网站（重复忽略）
    async fn link_websites(&self, import_key: &str, website_id: i64) -> RepositoryResult<usize>;

    /// 新增分类关联（重复忽略）
    async fn insert_category_links(&self, links: &[CategoryLink]) -> RepositoryResult<usize>;

    /// 删除分类关联
    async fn delete_category_links(&self, links: &[CategoryLink]) -> RepositoryResult<usize>;

    // ===== URL / 缓存 =====

    /// 按门店重建商品 URL 重写
    ///
    /// # 参数
    /// - url_key_column: 暂存表中的 url_key 列
    /// - url_suffix: 商品 URL 后缀（.html）
    async fn rewrite_urls(
        &self,
        import_key: &str,
        store_id: i64,
        url_key_column: &str,
        url_suffix: &str,
    ) -> RepositoryResult<usize>;

    /// 标记缓存类型失效
    async fn clean_caches(&self, cache_types: &[&str]) -> RepositoryResult<()>;
}

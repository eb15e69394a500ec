// ==========================================
// PIM 变体导入 - 网站/分类关联计划
// ==========================================
// 分类: 只处理导入来源的分类（pim_entities.import='category'）
// - 行的 categories 列表包含该分类编码 → 新增关联
// - 不包含 → 删除关联
// 手工维护的其他分类关联不在计划范围内
// ==========================================

use crate::repository::catalog_repo::{CategoryLink, ImportCategory};
use crate::repository::staging_repo::StagingCell;
use std::collections::{BTreeSet, HashSet};

/// 需要关联的网站（排除默认网站 0）
pub fn website_targets(websites: &[i64]) -> Vec<i64> {
    websites.iter().copied().filter(|w| *w != 0).collect()
}

/// 分类关联计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLinkPlan {
    pub add: Vec<CategoryLink>,
    pub remove: Vec<CategoryLink>,
}

/// 逗号列表拆分为 token 集合
fn tokens(list: &str) -> HashSet<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// 计算分类关联的新增与删除
///
/// # 参数
/// - cells: 暂存表 categories 列（含 _entity_id）
/// - categories: 导入来源的分类
///
/// 未匹配实体或 categories 为空值（NULL）的行不参与
pub fn plan_category_links(cells: &[StagingCell], categories: &[ImportCategory]) -> CategoryLinkPlan {
    let mut add = BTreeSet::new();
    let mut remove = BTreeSet::new();

    for cell in cells {
        let (Some(product_id), Some(list)) = (cell.entity_id, cell.value.as_deref()) else {
            continue;
        };
        let wanted = tokens(list);

        for category in categories {
            let link = CategoryLink {
                category_id: category.entity_id,
                product_id,
            };
            if wanted.contains(category.code.as_str()) {
                add.insert(link);
            } else {
                remove.insert(link);
            }
        }
    }

    // 同一分类 ID 以多个编码登记时，新增优先
    let remove: Vec<CategoryLink> = remove.difference(&add).copied().collect();
    CategoryLinkPlan {
        add: add.into_iter().collect(),
        remove,
    }
}

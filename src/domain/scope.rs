// ==========================================
// PIM 变体导入 - 作用域解析表
// ==========================================
// 后缀（en_US / en_US-ecommerce / USD ...）→ 受影响门店
// 由宿主 resolve_scopes 的六种组合结果合并而成，保持组合顺序
// ==========================================

use crate::domain::types::{DEFAULT_STORE_ID, SCOPE_COMBINATIONS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 门店引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreRef {
    pub store_id: i64,
    pub website_id: i64,
}

impl StoreRef {
    pub fn is_default(&self) -> bool {
        self.store_id == DEFAULT_STORE_ID
    }
}

/// 单个作用域后缀
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub suffix: String,
    /// SCOPE_COMBINATIONS 下标
    pub combination: usize,
    pub stores: Vec<StoreRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTable {
    entries: IndexMap<String, ScopeEntry>,
    websites: Vec<i64>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由六种组合的解析结果构建
    ///
    /// `resolved[i]` 对应 `SCOPE_COMBINATIONS[i]`；同一后缀出现在多个组合中时保留首次出现。
    pub fn from_resolved(resolved: Vec<IndexMap<String, Vec<StoreRef>>>, websites: Vec<i64>) -> Self {
        let mut table = Self::new();
        for (combination, by_suffix) in resolved.into_iter().enumerate().take(SCOPE_COMBINATIONS.len()) {
            for (suffix, stores) in by_suffix {
                table.insert(combination, suffix, stores);
            }
        }
        table.websites = websites;
        table
    }

    /// 登记一个后缀；已存在则忽略
    pub fn insert(&mut self, combination: usize, suffix: impl Into<String>, stores: Vec<StoreRef>) {
        let suffix = suffix.into();
        if suffix.is_empty() || self.entries.contains_key(&suffix) {
            return;
        }
        self.entries.insert(
            suffix.clone(),
            ScopeEntry {
                suffix,
                combination,
                stores,
            },
        );
    }

    pub fn get(&self, suffix: &str) -> Option<&ScopeEntry> {
        self.entries.get(suffix)
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScopeEntry> {
        self.entries.values()
    }

    /// 仅返回指定组合的后缀（保持表内顺序）
    pub fn entries_for<'a>(&'a self, combinations: &'a [usize]) -> impl Iterator<Item = &'a ScopeEntry> {
        self.entries
            .values()
            .filter(move |e| combinations.contains(&e.combination))
    }

    /// 网站 ID 列表（含 0）
    pub fn websites(&self) -> &[i64] {
        &self.websites
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

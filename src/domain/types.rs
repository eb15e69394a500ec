// ==========================================
// PIM 变体导入 - 领域类型定义
// ==========================================
// 作用域维度、组合顺序、管道状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 商品实体类型 ID（eav_entity_type: catalog_product）
pub const PRODUCT_ENTITY_TYPE_ID: i64 = 4;

/// 默认值作用域（全局 / 管理后台）
pub const DEFAULT_STORE_ID: i64 = 0;

// ==========================================
// 作用域维度 (Scope Dimension)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeDimension {
    Locale,   // 语言，如 en_US
    Channel,  // 渠道，如 ecommerce
    Currency, // 币种，如 USD
    Website,  // 网站 ID
}

impl ScopeDimension {
    /// store 表中对应的列
    pub fn store_column(&self) -> &'static str {
        match self {
            ScopeDimension::Locale => "lang",
            ScopeDimension::Channel => "channel_code",
            ScopeDimension::Currency => "currency",
            ScopeDimension::Website => "website_id",
        }
    }
}

impl fmt::Display for ScopeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDimension::Locale => write!(f, "locale"),
            ScopeDimension::Channel => write!(f, "channel"),
            ScopeDimension::Currency => write!(f, "currency"),
            ScopeDimension::Website => write!(f, "website"),
        }
    }
}

// ==========================================
// 作用域组合（固定顺序）
// ==========================================
// 顺序即优先级: 同一门店、同一属性被多个后缀命中时，靠前的组合胜出
pub const SCOPE_COMBINATIONS: [&[ScopeDimension]; 6] = [
    &[ScopeDimension::Locale],                                                  // en_US
    &[ScopeDimension::Locale, ScopeDimension::Channel],                         // en_US-ecommerce
    &[ScopeDimension::Channel],                                                 // ecommerce
    &[ScopeDimension::Currency],                                                // USD
    &[ScopeDimension::Channel, ScopeDimension::Currency],                       // ecommerce-USD
    &[ScopeDimension::Locale, ScopeDimension::Channel, ScopeDimension::Currency], // en_US-ecommerce-USD
];

/// URL 重写只关心语言相关的组合（SCOPE_COMBINATIONS 下标）
pub const URL_SCOPE_COMBINATIONS: [usize; 2] = [0, 1];

// ==========================================
// 管道状态 (Pipeline State)
// ==========================================
// PENDING → RUNNING(i) → ... → DONE
// RUNNING(i) → HALTED(i)   （步骤要求中止）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Pending,
    Running { step: usize },
    Done,
    Halted { step: usize },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Halted { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Pending => write!(f, "PENDING"),
            PipelineState::Running { .. } => write!(f, "RUNNING"),
            PipelineState::Done => write!(f, "DONE"),
            PipelineState::Halted { .. } => write!(f, "HALTED"),
        }
    }
}

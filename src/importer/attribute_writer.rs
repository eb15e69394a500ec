// ==========================================
// PIM 变体导入 - 作用域属性值映射
// ==========================================
// 输出: store_id → {目标属性: 取值来源}
// 规则:
// - store 0 固定写 options_container / tax_class_id / visibility（有 enabled 时加 status）
// - 带后缀的列只写入该后缀解析出的门店，且从不写 store 0
// - store 0 取不带后缀的列；该属性没有不带后缀的列时按表序取首个带后缀的列
//   （后缀无法识别的列不写任何门店，但可作为 store 0 的后备）
// - 同一 (门店, 属性) 被多个后缀命中时，组合顺序靠前者胜出
// - 按门店配置的税率类别以固定值覆盖 tax_class_id
// ==========================================

use crate::domain::column::ENABLED_COLUMN;
use crate::domain::mapping::ValueSource;
use crate::domain::scope::ScopeTable;
use crate::domain::types::DEFAULT_STORE_ID;
use crate::importer::classifier::StagingSchema;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

/// store 0 固定映射（目标属性, 暂存列）
const DEFAULT_SCOPE_VALUES: [(&str, &str); 3] = [
    ("options_container", "_options_container"),
    ("tax_class_id", "_tax_class_id"),
    ("visibility", "_visibility"),
];

/// 按门店的属性值映射
pub type StoreValueMap = BTreeMap<i64, IndexMap<String, ValueSource>>;

pub fn plan_attribute_values(
    schema: &StagingSchema,
    scopes: &ScopeTable,
    tax_classes: &BTreeMap<i64, i64>,
) -> StoreValueMap {
    let mut plan: StoreValueMap = BTreeMap::new();

    let defaults = plan.entry(DEFAULT_STORE_ID).or_default();
    for (attribute, column) in DEFAULT_SCOPE_VALUES {
        defaults.insert(attribute.to_string(), ValueSource::column(column));
    }
    if schema.contains(ENABLED_COLUMN) {
        defaults.insert("status".to_string(), ValueSource::column("_status"));
    }

    for (store_id, tax_class_id) in tax_classes {
        plan.entry(*store_id)
            .or_default()
            .insert("tax_class_id".to_string(), ValueSource::Literal(tax_class_id.to_string()));
    }

    // (store_id, 属性) → 已生效后缀的组合下标
    let mut precedence: HashMap<(i64, String), usize> = HashMap::new();

    for column in schema.value_columns() {
        let attribute = &column.base_attribute;

        if let Some(scope) = &column.scope {
            if let Some(entry) = scopes.get(&scope.suffix) {
                for store in entry.stores.iter().filter(|s| !s.is_default()) {
                    let key = (store.store_id, attribute.clone());
                    let wins = precedence
                        .get(&key)
                        .map_or(true, |current| scope.combination < *current);
                    if wins {
                        precedence.insert(key, scope.combination);
                        plan.entry(store.store_id)
                            .or_default()
                            .insert(attribute.clone(), ValueSource::column(&column.name));
                    }
                }
            }
        }

        let takes_default =
            column.is_unsuffixed() || !schema.has_unsuffixed_value_column(attribute);
        if takes_default {
            let defaults = plan.entry(DEFAULT_STORE_ID).or_default();
            if !defaults.contains_key(attribute) {
                defaults.insert(attribute.clone(), ValueSource::column(&column.name));
            }
        }
    }

    plan.retain(|_, values| !values.is_empty());
    plan
}

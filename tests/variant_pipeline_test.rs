// ==========================================
// 变体导入管道集成测试
// ==========================================
// 测试目标: 完整 15 步在临时 SQLite 目录上的端到端行为
// ==========================================


use async_trait::async_trait;
use pim_variant_import::config::config_keys;
use pim_variant_import::domain::{PipelineState, StepOutcome};
use pim_variant_import::importer::{ImportContext, ImportStep, PipelineBuilder};
use pim_variant_import::logging;
use test_helpers::{TestEnv, VARIANT_CSV};

#[tokio::test]
async fn test_full_run_writes_variants_and_catalog() {
    logging::init_test();
    let env = TestEnv::new().unwrap();
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(report.steps.len(), 15);
    assert!(report.all_succeeded(), "failed: {:?}", report.failed_steps().collect::<Vec<_>>());
    assert_eq!(
        report.step("insert_data").unwrap().message.as_deref(),
        Some("3 line(s) found")
    );

    // 变体表：选项编码已转 ID，axis 已转属性 ID
    let color_id = env.attribute_id("color");
    let size_id = env.attribute_id("size");
    let ctx = env.context(&file).await.unwrap();
    let variants = ctx.variants.fetch_all().await.unwrap();
    assert_eq!(variants.len(), 3);

    let red_m = variants
        .iter()
        .find(|r| r.get("code").cloned().flatten().as_deref() == Some("RED-M"))
        .unwrap();
    assert_eq!(red_m["color"].as_deref(), Some("101"));
    assert_eq!(red_m["size"].as_deref(), Some("201"));
    assert_eq!(
        red_m["axis"].as_deref(),
        Some(format!("{},{}", color_id, size_id).as_str())
    );
    assert!(red_m.contains_key("name-en_US"));
    assert!(!red_m.contains_key("categories"));
    assert!(!red_m.contains_key("_entity_id"));

    // 属性值：store 0 取首个作用域列，作用域列只写对应门店
    assert_eq!(env.attribute_value("RED-M", "name", 0).as_deref(), Some("Red M"));
    assert_eq!(env.attribute_value("RED-M", "name", 1).as_deref(), Some("Red M"));
    assert_eq!(env.attribute_value("RED-M", "name", 2).as_deref(), Some("Rouge M"));
    assert_eq!(env.attribute_value("RED-M", "color", 0).as_deref(), Some("101"));
    assert_eq!(env.attribute_value("RED-M", "color", 1), None);
    assert_eq!(env.attribute_value("RED-M", "status", 0).as_deref(), Some("1"));
    assert_eq!(env.attribute_value("RED-L", "status", 0).as_deref(), Some("2"));
    assert_eq!(
        env.attribute_value("BLUE-M", "options_container", 0).as_deref(),
        Some("container2")
    );
    assert_eq!(env.attribute_value("BLUE-M", "visibility", 0).as_deref(), Some("4"));

    // 网站：默认网站 0 不关联
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM catalog_product_website WHERE website_id = 1"), 3);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM catalog_product_website WHERE website_id = 0"), 0);

    // 收尾：暂存表已删除，缓存已失效
    assert!(!env.staging_exists());
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM cache_invalidation"), 2);
    assert_eq!(
        report.step("clean_cache").unwrap().message.as_deref(),
        Some("Cache cleaned for: block_html, full_page")
    );
    assert_eq!(
        report.step("import_media").unwrap().message.as_deref(),
        Some("Media importation is disabled")
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let env = TestEnv::new().unwrap();
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();

    let first = env.pipeline(&file).await.unwrap().run().await;
    assert_eq!(first.state, PipelineState::Done);
    let ctx = env.context(&file).await.unwrap();
    let variants_after_first = ctx.variants.fetch_all().await.unwrap();
    let values_after_first = env.value_snapshot();

    let second = env.pipeline(&file).await.unwrap().run().await;
    assert_eq!(second.state, PipelineState::Done);
    assert_eq!(
        second.step("match_entity").unwrap().message.as_deref(),
        Some("3 code(s) matched, 0 new entity id(s)")
    );

    assert_eq!(ctx.variants.fetch_all().await.unwrap(), variants_after_first);
    assert_eq!(env.value_snapshot(), values_after_first);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM catalog_product_entity"), 3);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM url_rewrite"), 6);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM catalog_product_website"), 3);
}

#[tokio::test]
async fn test_variant_columns_follow_latest_file() {
    let env = TestEnv::new().unwrap();
    let first = env
        .write_csv("first.csv", "code;axis;material;fit\nA-1;color;cotton;slim\n")
        .unwrap();
    let second = env
        .write_csv("second.csv", "code;axis;fit;season\nA-1;color;regular;winter\n")
        .unwrap();

    env.pipeline(&first).await.unwrap().run().await;
    let report = env.pipeline(&second).await.unwrap().run().await;
    assert_eq!(report.state, PipelineState::Done);

    let ctx = env.context(&second).await.unwrap();
    let columns = ctx.variants.describe_columns().await.unwrap();
    assert!(columns.contains(&"fit".to_string()));
    assert!(columns.contains(&"season".to_string()));
    assert!(!columns.contains(&"material".to_string()));

    let rows = ctx.variants.fetch_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["fit"].as_deref(), Some("regular"));
    assert_eq!(rows[0]["season"].as_deref(), Some("winter"));
}

#[tokio::test]
async fn test_multi_value_options_keep_matched_tokens() {
    let env = TestEnv::new().unwrap();
    let file = env
        .write_csv(
            "options.csv",
            "code;axis;color\nA;color;red,blue,green\nB;color;purple\nC;color;blue\n",
        )
        .unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert!(report.step("update_option").unwrap().success);

    let ctx = env.context(&file).await.unwrap();
    let rows = ctx.variants.fetch_all().await.unwrap();
    let colors: Vec<Option<String>> = rows.iter().map(|r| r["color"].clone()).collect();
    assert_eq!(
        colors,
        vec![
            Some("101,102".to_string()),
            Some("purple".to_string()),
            Some("102".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_category_links_add_and_prune_import_categories_only() {
    let env = TestEnv::new().unwrap();
    {
        // RED-M 已存在：挂在 winter（导入来源）与 30（手工分类）
        let conn = env.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO catalog_product_entity (entity_id, sku, type_id) VALUES (500, 'RED-M', 'simple');
            INSERT INTO catalog_category_product (category_id, product_id) VALUES (20, 500), (30, 500);
            "#,
        )
        .unwrap();
    }
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert!(report.step("set_categories").unwrap().success);
    assert_eq!(
        report.step("match_entity").unwrap().message.as_deref(),
        Some("1 code(s) matched, 2 new entity id(s)")
    );

    assert_eq!(env.category_ids(500), vec![10, 30]);
    assert_eq!(env.category_ids(env.product_id("RED-L")), vec![10, 20]);
    assert!(env.category_ids(env.product_id("BLUE-M")).is_empty());
}

#[tokio::test]
async fn test_duplicate_url_keys_are_disambiguated() {
    let env = TestEnv::new().unwrap();
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert!(report.step("set_url_rewrite").unwrap().success);

    let red_m = env.product_id("RED-M");
    let blue_m = env.product_id("BLUE-M");
    let red_m_path = env.query_opt_string(&format!(
        "SELECT request_path FROM url_rewrite WHERE entity_id = {} AND store_id = 1",
        red_m
    ));
    assert_eq!(red_m_path.as_deref(), Some("red-shirt-RED-M.html"));
    let blue_m_path = env.query_opt_string(&format!(
        "SELECT request_path FROM url_rewrite WHERE entity_id = {} AND store_id = 2",
        blue_m
    ));
    assert_eq!(blue_m_path.as_deref(), Some("blue-shirt.html"));
    let target = env.query_opt_string(&format!(
        "SELECT target_path FROM url_rewrite WHERE entity_id = {} AND store_id = 1",
        red_m
    ));
    assert_eq!(target, Some(format!("catalog/product/view/id/{}", red_m)));

    assert_eq!(env.query_i64("SELECT COUNT(*) FROM url_rewrite WHERE store_id = 0"), 0);
    assert_eq!(
        env.attribute_value("RED-L", "url_key", 1).as_deref(),
        Some("red-shirt-RED-L")
    );
}

#[tokio::test]
async fn test_missing_url_key_defaults_to_lowercase_code() {
    let env = TestEnv::new().unwrap();
    env.set_config(config_keys::PRODUCT_URL_SUFFIX, "").unwrap();
    let file = env.write_csv("variants.csv", "code;axis\nTEE-Blue;color\n").unwrap();

    env.pipeline(&file).await.unwrap().run().await;

    let id = env.product_id("TEE-Blue");
    let path = env.query_opt_string(&format!(
        "SELECT request_path FROM url_rewrite WHERE entity_id = {} AND store_id = 1",
        id
    ));
    assert_eq!(path.as_deref(), Some("tee-blue"));
}

#[tokio::test]
async fn test_type_id_falls_back_outside_allow_list() {
    let env = TestEnv::new().unwrap();
    env.set_config(config_keys::ALLOWED_TYPE_IDS, "configurable,virtual").unwrap();
    let file = env
        .write_csv("types.csv", "code;axis;type_id\nA;color;virtual\nB;color;simple\nC;color;\n")
        .unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert_eq!(report.state, PipelineState::Done);

    let type_of = |sku: &str| {
        env.query_opt_string(&format!(
            "SELECT type_id FROM catalog_product_entity WHERE sku = '{}'",
            sku
        ))
    };
    assert_eq!(type_of("A").as_deref(), Some("virtual"));
    assert_eq!(type_of("B").as_deref(), Some("configurable"));
    assert_eq!(type_of("C").as_deref(), Some("configurable"));
}

#[tokio::test]
async fn test_missing_file_halts_pipeline() {
    let env = TestEnv::new().unwrap();
    let missing = env.dir.path().join("nope.csv");

    let report = env.pipeline(&missing).await.unwrap().run().await;

    assert!(report.is_halted());
    assert_eq!(report.state, PipelineState::Halted { step: 0 });
    assert_eq!(report.steps.len(), 1);
    assert!(report.steps[0].halted);
    assert!(report.steps[0]
        .message
        .as_deref()
        .unwrap()
        .starts_with("File not found"));
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM catalog_product_entity"), 0);

    let run = env.log_repo().find_run(&report.run_id).unwrap().unwrap();
    assert_eq!(run.state, "HALTED");
}

#[tokio::test]
async fn test_missing_categories_column_is_soft_failure() {
    let env = TestEnv::new().unwrap();
    let file = env
        .write_csv("variants.csv", "code;axis;color\nA;color;red\n")
        .unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;

    assert_eq!(report.state, PipelineState::Done);
    let step = report.step("set_categories").unwrap();
    assert!(!step.success);
    assert!(!step.halted);
    assert_eq!(step.message.as_deref(), Some("Column categories not found"));
    assert!(report.step("clean_cache").unwrap().success);
    assert_eq!(report.failed_steps().count(), 1);
}

#[tokio::test]
async fn test_settings_drive_mapping_and_tax_classes() {
    let env = TestEnv::new().unwrap();
    env.set_config(
        config_keys::ATTRIBUTE_MAPPING,
        r#"[{"pim_attribute": "name", "magento_attribute": "description"}]"#,
    )
    .unwrap();
    env.set_config(config_keys::TAX_CLASS, r#"{"2": 7}"#).unwrap();
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert_eq!(report.state, PipelineState::Done);

    assert_eq!(
        env.attribute_value("RED-M", "description", 2).as_deref(),
        Some("Rouge M")
    );
    assert_eq!(env.attribute_value("RED-M", "tax_class_id", 2).as_deref(), Some("7"));
    assert_eq!(env.attribute_value("RED-M", "tax_class_id", 0).as_deref(), Some("0"));
}

#[tokio::test]
async fn test_comma_delimited_file() {
    let env = TestEnv::new().unwrap();
    env.set_config(config_keys::FILE_DELIMITER, ",").unwrap();
    let file = env
        .write_csv("variants.csv", "code,axis,color\nA,\"color,size\",red\n")
        .unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert_eq!(
        report.step("insert_data").unwrap().message.as_deref(),
        Some("1 line(s) found")
    );
    assert_eq!(env.attribute_value("A", "color", 0).as_deref(), Some("101"));
}

// ==========================================
// 扩展步骤
// ==========================================

struct CountVariantsStep;

#[async_trait]
impl ImportStep for CountVariantsStep {
    fn code(&self) -> &'static str {
        "count_variants"
    }

    fn comment(&self) -> String {
        "Count variants".to_string()
    }

    async fn run(&self, ctx: &ImportContext) -> StepOutcome {
        match ctx.variants.fetch_all().await {
            Ok(rows) => StepOutcome::ok_with(rows.len().to_string()),
            Err(e) => StepOutcome::failed(e.to_string()),
        }
    }
}

#[tokio::test]
async fn test_additional_step_runs_after_variant_fill() {
    let env = TestEnv::new().unwrap();
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();
    let ctx = env.context(&file).await.unwrap();

    let pipeline = PipelineBuilder::new(ctx)
        .with_additional_step(Box::new(CountVariantsStep))
        .build();
    let report = pipeline.run().await;

    assert_eq!(report.steps.len(), 16);
    assert_eq!(report.steps[8].code, "count_variants");
    assert_eq!(report.steps[8].message.as_deref(), Some("3"));
    assert_eq!(report.steps[9].code, "set_values");
}

#[tokio::test]
async fn test_run_log_persisted() {
    let env = TestEnv::new().unwrap();
    let file = env.write_csv("variants.csv", VARIANT_CSV).unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;

    let log = env.log_repo();
    let run = log.find_run(&report.run_id).unwrap().unwrap();
    assert_eq!(run.import_code, "variant");
    assert_eq!(run.state, "DONE");
    assert!(run.finished_at.is_some());
    let json: serde_json::Value = serde_json::from_str(run.report_json.as_deref().unwrap()).unwrap();
    assert_eq!(json["steps"].as_array().unwrap().len(), 15);

    let steps = log.list_steps(&report.run_id).unwrap();
    assert_eq!(steps.len(), 15);
    assert_eq!(steps[0].1, "create_table");
    assert_eq!(steps[14].1, "clean_cache");
    assert!(steps.iter().all(|s| s.2));
}

#[tokio::test]
async fn test_unknown_suffix_column_does_not_take_default_scope() {
    let env = TestEnv::new().unwrap();
    let file = env
        .write_csv(
            "variants.csv",
            "code;axis;name-en_US;name-de_DE\nA;color;English;Deutsch\n",
        )
        .unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;
    assert_eq!(report.state, PipelineState::Done);

    // de_DE 没有对应门店：不写任何门店，也不抢占 store 0
    assert_eq!(env.attribute_value("A", "name", 0).as_deref(), Some("English"));
    assert_eq!(env.attribute_value("A", "name", 1).as_deref(), Some("English"));
    assert_eq!(env.attribute_value("A", "name", 2), None);
}

#[tokio::test]
async fn test_variant_fill_spans_multiple_batches() {
    let env = TestEnv::new().unwrap();
    let mut content = String::from("code;axis;name-en_US;color\n");
    for i in 0..1201 {
        content.push_str(&format!("V{:05};color;Variant {};red\n", i, i));
    }
    let file = env.write_csv("variants.csv", &content).unwrap();

    let report = env.pipeline(&file).await.unwrap().run().await;

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(
        report.step("insert_data").unwrap().message.as_deref(),
        Some("1201 line(s) found")
    );
    assert_eq!(
        report.step("update_data").unwrap().message.as_deref(),
        Some("1201 variant(s) written in 3 batch(es)")
    );
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM pim_variant"), 1201);
    assert_eq!(env.query_i64("SELECT COUNT(DISTINCT code) FROM pim_variant"), 1201);
    assert_eq!(
        env.query_opt_string("SELECT color FROM pim_variant WHERE code = 'V01200'")
            .as_deref(),
        Some("101")
    );
}

// ==========================================
// PIM 变体导入 - 命令行入口
// ==========================================
// 用法:
//   variant-import [db_path] <file>
// db_path 缺省时取 PIM_IMPORT_DB_PATH 或用户数据目录
// 运行报告以 JSON 输出到 stdout；管道中止时退出码为 1
// ==========================================

use anyhow::Context;
use pim_variant_import::config::{ConfigManager, ImportSettings};
use pim_variant_import::db::{default_db_path, init_catalog_schema, open_sqlite_connection};
use pim_variant_import::importer::{ImportContext, ImportDefinition, PipelineBuilder};
use pim_variant_import::perf::install_sqlite_tracing;
use pim_variant_import::repository::{
    CatalogRepositoryImpl, ImportLogRepository, StagingRepositoryImpl, VariantRepositoryImpl,
};
use pim_variant_import::{logging, VERSION};
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (db_path, file_path) = match args.as_slice() {
        [file] => (default_db_path(), file.clone()),
        [db, file] => (db.clone(), file.clone()),
        _ => {
            eprintln!("usage: variant-import [db_path] <file>");
            std::process::exit(2);
        }
    };

    tracing::info!(version = VERSION, db = %db_path, file = %file_path, "PIM 变体导入启动");

    let mut conn = open_sqlite_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    install_sqlite_tracing(&mut conn);
    init_catalog_schema(&conn).context("目录表初始化失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let config = ConfigManager::from_connection(conn.clone())?;
    let catalog = Arc::new(CatalogRepositoryImpl::new(conn.clone()));
    let settings = ImportSettings::load(&config, catalog.as_ref())
        .await
        .context("导入配置加载失败")?;

    let definition = ImportDefinition::variant();
    let ctx = ImportContext::new(
        definition.import_key(),
        file_path,
        Arc::new(settings),
        Arc::new(StagingRepositoryImpl::new(conn.clone())),
        Arc::new(VariantRepositoryImpl::new(conn.clone())),
        catalog,
    );

    let pipeline = PipelineBuilder::new(ctx)
        .with_run_log(ImportLogRepository::new(conn.clone()))
        .build();
    let report = pipeline.run().await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_halted() {
        std::process::exit(1);
    }
    Ok(())
}

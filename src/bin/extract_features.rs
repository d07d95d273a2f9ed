use phishfeat::{
    init_logging, log_app_start, log_run_config, logging_config_from_env, ExtractionConfig,
    PipelineDriver, SqliteRecordStore,
};
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let config = ExtractionConfig::from_env().inspect_err(|err| {
        error!(component = "extract_features", event = "config.invalid", error = %err);
    })?;
    log_run_config(&config);

    let db_path = config.db_path.clone();
    let mut driver = PipelineDriver::new(config, || SqliteRecordStore::open(&db_path))?;
    let report = driver.run().inspect_err(|err| {
        error!(component = "extract_features", event = "run.aborted", error = %err);
    })?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

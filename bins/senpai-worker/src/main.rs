mod executor;

use senpai_common::config::WorkerConfig;
use senpai_common::redis;
use senpai_harness::LanguageConfigManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Senpai Worker booting...");

    let config = WorkerConfig::from_env();

    // Load language configurations
    let languages = LanguageConfigManager::load(Path::new(&config.languages_path)).map_err(|e| {
        error!("Failed to load language configurations: {}", e);
        error!("Make sure {} exists", config.languages_path);
        e
    })?;

    info!("Loaded language configurations for: {:?}", languages.list_languages());

    // Validate language is configured
    if let Err(e) = languages.get_config(&config.language) {
        error!("Language '{}' is not configured: {}", config.language, e);
        error!("Available languages: {:?}", languages.list_languages());
        std::process::exit(1);
    }

    info!("Worker configured for language: {}", config.language);
    info!("Queue: {}", redis::queue_name(&config.language));
    info!("Checker root: {}", config.checker_root);

    // Connect to Redis
    let client = ::redis::Client::open(config.redis_url.as_str())?;
    let mut redis_conn = ::redis::aio::ConnectionManager::new(client).await?;

    info!("Connected to Redis: {}", config.redis_url);

    // Setup graceful shutdown; the loop checks the flag between jobs
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, stopping after the current job...");
        let _ = shutdown_tx.send(true);
    });

    let languages = Arc::new(languages);

    worker_loop(&mut redis_conn, &config, languages, shutdown_rx).await?;

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip(redis_conn, config, languages, shutdown), fields(language = %config.language))]
async fn worker_loop(
    redis_conn: &mut ::redis::aio::ConnectionManager,
    config: &WorkerConfig,
    languages: Arc<LanguageConfigManager>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let checker_root = PathBuf::from(&config.checker_root);

    while !*shutdown.borrow() {
        // BLPOP with a timeout so shutdown is noticed between jobs; the pop
        // is never cancelled, so a job that leaves the queue is always stored
        match redis::pop_job(redis_conn, &config.language, config.pop_timeout_secs).await {
            Ok(Some(job)) => {
                let job_id = job.id;
                info!(
                    job_id = %job_id,
                    language = %job.language,
                    locale = %job.locale,
                    tester = %job.checker.tester,
                    test_groups = job.checker.tests.len(),
                    source_size = job.submission.source_code.len(),
                    "Received job"
                );

                // Grading is synchronous and spawns runner processes
                let start = std::time::Instant::now();
                let languages = Arc::clone(&languages);
                let root = checker_root.clone();
                let result = match tokio::task::spawn_blocking(move || executor::grade(&job, &languages, &root)).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Grading task panicked");
                        continue;
                    }
                };

                info!(
                    job_id = %job_id,
                    status = ?result.status,
                    messages = result.report.messages().count(),
                    grading_ms = start.elapsed().as_millis(),
                    "Grading completed"
                );

                for group in &result.report.groups {
                    debug!(
                        job_id = %job_id,
                        title = %group.title,
                        runs = group.runs.len(),
                        "Test group"
                    );
                }

                // Persist result to Redis
                match redis::store_result(redis_conn, &result, config.result_ttl_secs).await {
                    Ok(_) => {
                        info!(job_id = %job_id, "Result persisted to Redis");
                    }
                    Err(e) => {
                        // Non-fatal; the worker moves on to the next job
                        error!(job_id = %job_id, error = %e, "Failed to persist result");
                    }
                }
            }
            Ok(None) => {
                continue;
            }
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::select! {
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(1)) => {},
                    _ = shutdown.changed() => {},
                }
            }
        }
    }

    Ok(())
}

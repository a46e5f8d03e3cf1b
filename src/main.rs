use account_auth::{
    auth::{SessionBinder, SessionStore},
    config::AppConfig,
    db,
    handlers::health,
    middleware::{default_session_codec, AppState},
    repository::{AccountStore, MemorySessionStore, PgAccountStore, PgSessionStore},
    routes, storage, telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::{Duration, MissedTickBehavior};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("account-auth {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    if let Ok(name) = std::env::var("AUTH_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "account-auth starting...");

    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    tracing::info!("Database initialized");

    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(db_pool.clone()));

    let session_store: Arc<dyn SessionStore> = match config.session.backend.to_lowercase().as_str()
    {
        "memory" => {
            tracing::warn!("Using in-memory session store, sessions are lost on restart");
            Arc::new(MemorySessionStore::new(default_session_codec()))
        }
        _ => Arc::new(PgSessionStore::new(db_pool.clone(), default_session_codec())),
    };

    let files = storage::from_config(&config.storage).await?;
    if !files.health_check().await {
        tracing::warn!(backend = %config.storage.backend, "File store is not reachable at startup");
    }

    let app_state = Arc::new(AppState::new(
        config.clone(),
        accounts,
        files,
        session_store,
    )?);

    spawn_session_purge(
        app_state.sessions.clone(),
        config.session.purge_interval_secs,
    );

    let app = routes::create_router(app_state);

    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 定期清理过期会话（Cookie 不再回传的记录只能靠这里删除）
fn spawn_session_purge(sessions: Arc<SessionBinder>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = sessions.purge_expired().await {
                tracing::warn!(error = %e, "Session purge failed");
            }
        }
    });
}

/// 等待退出信号；收到后启动看门狗，超时仍未完成则强制退出
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

fn print_help() {
    println!("account-auth {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: account-auth [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 AUTH_ 前缀的环境变量完成（例如 AUTH_DATABASE__URL）");
    println!("  AUTH_ENV=<name> 加载 .env.<name>");
    println!("  可用选项请参考 .env.example");
}

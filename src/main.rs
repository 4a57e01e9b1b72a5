//! 车队控制台服务入口

use fleet_console::{
    auth::JwtService,
    config::AppConfig,
    db,
    guard::RouteGuard,
    handlers::health,
    identity::PgIdentityProvider,
    middleware::AppState,
    repository::PermissionRepository,
    routes,
    services::PermissionResolver,
    session::{FileKeyValueStore, SessionLifecycleController, SessionLifecycleDeps, SessionStore},
    telemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("fleet-console {}", env!("CARGO_PKG_VERSION"));
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

    // 加载 .env 文件（开发环境）
    if let Ok(env) = std::env::var("FLEET_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config.logging);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Fleet console starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    tracing::info!("Database initialized");

    // 4. 会话与权限
    let jwt = Arc::new(JwtService::from_config(&config.security)?);
    let identity = Arc::new(PgIdentityProvider::new(db_pool.clone(), jwt));
    let permissions = Arc::new(PermissionResolver::new(Arc::new(PermissionRepository::new(
        db_pool.clone(),
    ))));

    let backend = Arc::new(FileKeyValueStore::new(&config.session.store_dir)?);
    let store = SessionStore::new(
        backend,
        config.session.storage_key.clone(),
        chrono::Duration::seconds(config.session.refresh_lead_secs as i64),
    );

    let lifecycle = SessionLifecycleController::new(SessionLifecycleDeps {
        store,
        identity,
        permissions,
    });

    let started = lifecycle.start();
    tracing::info!(phase = started.phase.as_str(), "Session lifecycle started");

    let expiry_monitor = lifecycle.spawn_expiry_monitor(Duration::from_secs(
        config.session.expiry_check_interval_secs,
    ));

    let app_state = Arc::new(AppState::new(lifecycle, RouteGuard::from_config(&config.routes)));

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    expiry_monitor.abort();
    if let Some(background) = started.background {
        background.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
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
}

/// 打印帮助信息
fn print_help() {
    println!("fleet-console {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: fleet-console [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 FLEET_ 前缀的环境变量完成，例如:");
    println!("  FLEET_DATABASE__URL, FLEET_SECURITY__JWT_SECRET, FLEET_SESSION__STORE_DIR");
}

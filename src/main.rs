mod auth;
mod command;
mod config;
mod db;
mod logger;
mod security;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;
use sqlx::postgres::PgPoolOptions;
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use auth::storage::{PostgresTokenStore, PostgresUserStore, UserStore};
use auth::{AuthManager, AuthMiddleware, TokenManager};
use command::{handle_command, CommandRegistry};
use config::AuthConfig;
use security::{IpAbuseTracker, PostgresBlockedIpStore, RegistrationRateLimiter};

// 应用状态
pub struct AppState {
    pub config: AuthConfig,
    pub users: Arc<dyn UserStore>,
    pub auth_manager: AuthManager,
    pub token_manager: Arc<TokenManager>,
    pub ip_tracker: IpAbuseTracker,
    pub rate_limiter: RegistrationRateLimiter,
    pub command_registry: CommandRegistry,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 加载 .env
    dotenv().ok();

    // 创建日志目录
    let log_dir = std::path::Path::new("logs");
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // 初始化日志系统，文件日志不可用时退回标准输出
    let log_path = log_dir.join("app.log");
    if let Err(e) = logger::Logger::init(&log_path) {
        eprintln!("初始化文件日志失败，改用标准输出: {}", e);
        env_logger::init();
    }

    info!("认证服务启动");

    let config = AuthConfig::from_env();

    // 连接数据库，获取连接设置有限的超时，避免卡死的持久化调用拖住请求
    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("数据库连接错误: {}", e)))?;

    // 初始化数据库
    db::initialize_db(pool.clone())
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("数据库初始化错误: {}", e)))?;

    // 组装各组件，存储一律显式注入，便于测试替换
    let users: Arc<dyn UserStore> = Arc::new(PostgresUserStore::new(pool.clone()));
    let token_manager = Arc::new(TokenManager::new(
        Arc::new(PostgresTokenStore::new(pool.clone())),
        config.clone(),
    ));
    let ip_tracker = IpAbuseTracker::new(
        Arc::new(PostgresBlockedIpStore::new(pool.clone())),
        config.clone(),
    );

    let auth_middleware = AuthMiddleware::new(users.clone(), token_manager.clone(), config.clone());

    let app_state = web::Data::new(AppState {
        auth_manager: AuthManager::new(users.clone(), config.clone()),
        rate_limiter: RegistrationRateLimiter::new(config.max_registrations_per_ip),
        command_registry: CommandRegistry::new(),
        users,
        token_manager,
        ip_tracker,
        config,
    });

    println!("服务器启动在 http://0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(auth_middleware.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .route("/api/command", web::post().to(handle_command))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}

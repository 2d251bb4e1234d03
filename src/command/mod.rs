use actix_web::{web, HttpMessage, HttpResponse, Responder};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::{AuthUser, Claims};
use crate::security::{resolve_client_ip, resolve_user_agent};

mod cmd_help;
mod cmd_id;
mod cmd_login;
mod cmd_logout;
mod cmd_register;

/// 一次命令调用的请求上下文
///
/// 凭证与身份由认证关卡挂到请求上，这里取下来传给各命令；
/// 客户端地址按代理头解析，供限流与封禁使用。
pub struct CommandContext {
    pub token: Option<String>,
    pub claims: Option<Claims>,
    pub current_user: Option<AuthUser>,
    pub client_ip: String,
    pub user_agent: String,
}

// 命令处理器的trait
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn handle(
        &self,
        args: &[&str],
        data: &web::Data<crate::AppState>,
        ctx: &CommandContext,
    ) -> HttpResponse;
}

// 命令注册器
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut registry = CommandRegistry {
            commands: HashMap::new(),
        };

        // 注册所有命令
        registry.register(Box::new(cmd_help::HelpCommand::new()));
        registry.register(Box::new(cmd_register::RegisterCommand::new()));
        registry.register(Box::new(cmd_login::LoginCommand::new()));
        registry.register(Box::new(cmd_logout::LogoutCommand::new()));
        registry.register(Box::new(cmd_id::IdCommand::new()));

        info!("命令注册器初始化完成");
        registry
    }

    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        let name = handler.name().to_string();
        self.commands.insert(name.clone(), handler);
        debug!("注册命令: {}", name);
    }

    pub fn get_handler(&self, command_name: &str) -> Option<&dyn CommandHandler> {
        self.commands.get(command_name).map(|h| h.as_ref())
    }
}

// 命令响应结构体
#[derive(Debug, serde::Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

// 处理命令的主函数
pub async fn handle_command(
    cmd: web::Json<Value>,
    data: web::Data<crate::AppState>,
    req: actix_web::HttpRequest,
) -> impl Responder {
    let command = cmd.get("command").and_then(|v| v.as_str()).unwrap_or("");

    let ctx = CommandContext {
        token: req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        claims: req.extensions().get::<Claims>().cloned(),
        current_user: req.extensions().get::<AuthUser>().cloned(),
        client_ip: resolve_client_ip(&req),
        user_agent: resolve_user_agent(&req),
    };

    info!("收到命令请求: {} (来自 {})", command, ctx.client_ip);

    let args: Vec<&str> = command.split_whitespace().collect();
    if args.is_empty() {
        warn!("空命令");
        return HttpResponse::BadRequest().json(CommandResponse {
            success: false,
            message: "命令不能为空".to_string(),
            data: None,
        });
    }

    if let Some(handler) = data.command_registry.get_handler(args[0]) {
        debug!("执行命令: {}", args[0]);
        let response = handler.handle(&args, &data, &ctx).await;
        if !response.status().is_success() {
            error!("命令执行失败: {} - {}", args[0], response.status());
        }
        response
    } else {
        warn!("未知命令: {}", args[0]);
        HttpResponse::BadRequest().json(CommandResponse {
            success: false,
            message: format!("未知命令: {}", args[0]),
            data: None,
        })
    }
}

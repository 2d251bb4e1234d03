use super::{CommandContext, CommandHandler};
use crate::auth::AuthError;
use actix_web::{web, HttpResponse, ResponseError};
use async_trait::async_trait;
use log::{error, info, warn};
use serde_json::json;

pub struct LoginCommand;

impl LoginCommand {
    pub fn new() -> Self {
        LoginCommand
    }
}

#[async_trait]
impl CommandHandler for LoginCommand {
    fn name(&self) -> &'static str {
        "login"
    }

    fn description(&self) -> &'static str {
        "用户登录，用法：login <email> <password>"
    }

    async fn handle(
        &self,
        args: &[&str],
        data: &web::Data<crate::AppState>,
        ctx: &CommandContext,
    ) -> HttpResponse {
        info!("开始处理登录命令");

        if args.len() < 3 {
            warn!("登录命令参数不足");
            return HttpResponse::BadRequest().json(super::CommandResponse {
                success: false,
                message: "请提供邮箱和密码".to_string(),
                data: None,
            });
        }

        let email = args[1];
        let password = args[2];

        // 被封禁的 IP 直接拒绝，不进入认证流程
        match data.ip_tracker.is_blocked(&ctx.client_ip).await {
            Ok(false) => {}
            Ok(true) => {
                warn!("IP {} 已封禁，拒绝登录", ctx.client_ip);
                return AuthError::TooManyRequests.error_response();
            }
            Err(e) => {
                error!("查询 IP 封禁状态失败: {}", e);
                return e.error_response();
            }
        }

        let user = match data.auth_manager.authenticate_user(email, password).await {
            Ok(user) => user,
            Err(e) => {
                // 认证失败也要把这次尝试记到 IP 上，记录失败不影响响应
                if matches!(
                    e,
                    AuthError::AuthenticationFailed | AuthError::AccountLocked
                ) {
                    if let Err(track_err) = data
                        .ip_tracker
                        .register_failed_attempt(&ctx.client_ip, &ctx.user_agent)
                        .await
                    {
                        error!("记录 IP 失败尝试出错: {}", track_err);
                    }
                }
                return e.error_response();
            }
        };

        // 签发新 token 对，旧凭证全部清除；落库失败则登录失败
        let pair = match data.token_manager.generate_token_response(&user).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("签发凭证失败: {}", e);
                return e.error_response();
            }
        };

        info!("用户 {} 登录成功", email);
        HttpResponse::Ok().json(super::CommandResponse {
            success: true,
            message: "登录成功".to_string(),
            data: Some(json!({
                "access_token": pair.access_token,
                "refresh_token": pair.refresh_token,
                "user": {
                    "id": user.id,
                    "email": user.email,
                    "name": user.display_name,
                    "role": user.role
                }
            })),
        })
    }
}

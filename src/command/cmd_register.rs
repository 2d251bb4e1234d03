use super::{CommandContext, CommandHandler};
use crate::auth::{AuthError, AuthManager, AuthUser};
use actix_web::{web, HttpResponse, ResponseError};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use regex::Regex;
use uuid::Uuid;

pub struct RegisterCommand;

impl RegisterCommand {
    pub fn new() -> Self {
        RegisterCommand
    }
}

#[async_trait]
impl CommandHandler for RegisterCommand {
    fn name(&self) -> &'static str {
        "register"
    }

    fn description(&self) -> &'static str {
        "注册新用户，用法：register <email> <password> --confirm <password> [--name <显示名>]"
    }

    async fn handle(
        &self,
        args: &[&str],
        data: &web::Data<crate::AppState>,
        ctx: &CommandContext,
    ) -> HttpResponse {
        info!("开始处理注册命令");

        // 同一 IP 的创建次数有进程级上限，先计数再做任何校验
        if !data.rate_limiter.allow_user_creation(&ctx.client_ip) {
            warn!("IP {} 注册过于频繁", ctx.client_ip);
            return AuthError::TooManyRequests.error_response();
        }

        if args.len() < 3 {
            warn!("注册命令参数不足");
            return HttpResponse::BadRequest().json(super::CommandResponse {
                success: false,
                message: "请提供邮箱和密码".to_string(),
                data: None,
            });
        }

        let email = args[1];
        let password = args[2];
        debug!("注册用户: {}", email);

        // 解析参数
        let mut confirm_password = None;
        let mut display_name = None;

        let mut i = 3;
        while i < args.len() {
            match args[i] {
                "--confirm" => {
                    if i + 1 < args.len() {
                        confirm_password = Some(args[i + 1]);
                        i += 2;
                    } else {
                        warn!("缺少确认密码");
                        return HttpResponse::BadRequest().json(super::CommandResponse {
                            success: false,
                            message: "请提供确认密码".to_string(),
                            data: None,
                        });
                    }
                }
                "--name" => {
                    if i + 1 < args.len() {
                        display_name = Some(args[i + 1]);
                        i += 2;
                    } else {
                        warn!("缺少显示名");
                        return HttpResponse::BadRequest().json(super::CommandResponse {
                            success: false,
                            message: "请提供显示名".to_string(),
                            data: None,
                        });
                    }
                }
                _ => {
                    warn!("未知参数: {}", args[i]);
                    return HttpResponse::BadRequest().json(super::CommandResponse {
                        success: false,
                        message: format!("未知参数: {}", args[i]),
                        data: None,
                    });
                }
            }
        }

        // 验证密码确认
        if let Some(confirm) = confirm_password {
            if confirm != password {
                warn!("密码不匹配");
                return HttpResponse::BadRequest().json(super::CommandResponse {
                    success: false,
                    message: "两次输入的密码不一致".to_string(),
                    data: None,
                });
            }
        } else {
            warn!("缺少密码确认");
            return HttpResponse::BadRequest().json(super::CommandResponse {
                success: false,
                message: "请使用 --confirm 参数确认密码".to_string(),
                data: None,
            });
        }

        if let Err(e) = validate_email(email) {
            warn!("邮箱验证失败: {}", e);
            return HttpResponse::BadRequest().json(super::CommandResponse {
                success: false,
                message: e,
                data: None,
            });
        }

        if let Err(e) = validate_password(password) {
            warn!("密码验证失败: {}", e);
            return HttpResponse::BadRequest().json(super::CommandResponse {
                success: false,
                message: e,
                data: None,
            });
        }

        // 检查邮箱是否已被占用
        match data.users.find_by_email(email).await {
            Ok(Some(_)) => {
                warn!("邮箱已被注册: {}", email);
                return HttpResponse::BadRequest().json(super::CommandResponse {
                    success: false,
                    message: "该邮箱已被注册".to_string(),
                    data: None,
                });
            }
            Ok(None) => {
                debug!("邮箱可用: {}", email);
            }
            Err(e) => {
                error!("查询用户失败: {}", e);
                return e.error_response();
            }
        }

        let password_hash = match AuthManager::hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                error!("密码加密失败");
                return e.error_response();
            }
        };

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: display_name.unwrap_or(email).to_string(),
            password_hash,
            role: "user".to_string(),
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
        };

        match data.users.create_user(&user).await {
            Ok(()) => {
                info!("用户注册成功: {}", email);
                HttpResponse::Ok().json(super::CommandResponse {
                    success: true,
                    message: "注册成功".to_string(),
                    data: None,
                })
            }
            Err(e) => {
                error!("用户注册失败: {}", e);
                e.error_response()
            }
        }
    }
}

// 邮箱格式验证
fn validate_email(email: &str) -> Result<(), String> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    if !email_regex.is_match(email) {
        return Err("邮箱格式不正确".to_string());
    }
    if email.len() > 254 {
        return Err("邮箱长度不能超过254个字符".to_string());
    }
    Ok(())
}

// 密码验证函数
fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 6 {
        return Err("密码长度必须大于等于6个字符".to_string());
    }
    if password.len() > 32 {
        return Err("密码长度不能超过32个字符".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert!(validate_email("reader@example.com").is_ok());
        assert!(validate_email("带中文@example.com").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn password_length_is_checked() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password(&"x".repeat(33)).is_err());
    }
}

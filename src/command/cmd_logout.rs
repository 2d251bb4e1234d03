use super::{CommandContext, CommandHandler};
use crate::auth::{validate_token, AuthError};
use actix_web::{web, HttpResponse, ResponseError};
use async_trait::async_trait;
use log::{error, info, warn};

pub struct LogoutCommand;

impl LogoutCommand {
    pub fn new() -> Self {
        LogoutCommand
    }
}

#[async_trait]
impl CommandHandler for LogoutCommand {
    fn name(&self) -> &'static str {
        "logout"
    }

    fn description(&self) -> &'static str {
        "用户登出，吊销当前凭证，用法：logout"
    }

    async fn handle(
        &self,
        _args: &[&str],
        data: &web::Data<crate::AppState>,
        ctx: &CommandContext,
    ) -> HttpResponse {
        info!("开始处理登出命令");

        // 用已失效的凭证登出是错误，不是静默成功
        let token = match &ctx.token {
            Some(token) => token,
            None => {
                warn!("登出请求未携带凭证");
                return AuthError::CredentialInvalid {
                    token: String::new(),
                }
                .error_response();
            }
        };

        let claims = match validate_token(token, &data.config) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("登出时凭证校验失败");
                return e.error_response();
            }
        };

        match data.token_manager.is_token_invalidated(token).await {
            Ok(false) => {}
            Ok(true) => {
                warn!("凭证已在失效名单中，重复登出");
                return AuthError::CredentialInvalid {
                    token: token.clone(),
                }
                .error_response();
            }
            Err(e) => return e.error_response(),
        }

        // 先把本次凭证写入失效名单，再吊销该用户名下的存量记录
        if let Err(e) = data.token_manager.invalidate_token(token).await {
            error!("写入失效名单失败: {}", e);
            return e.error_response();
        }

        let owner = match data.users.find_by_email(&claims.sub).await {
            Ok(user) => user,
            Err(e) => return e.error_response(),
        };
        if let Some(user) = owner {
            if let Err(e) = data.token_manager.revoke_all_user_tokens(&user.id).await {
                error!("吊销用户凭证失败: {}", e);
                return e.error_response();
            }
        }

        info!("用户 {} 登出成功", claims.sub);
        HttpResponse::Ok().json(super::CommandResponse {
            success: true,
            message: "登出成功".to_string(),
            data: None,
        })
    }
}

use super::{CommandContext, CommandHandler};
use actix_web::{web, HttpResponse};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::json;

pub struct IdCommand;

impl IdCommand {
    pub fn new() -> Self {
        IdCommand
    }
}

#[async_trait]
impl CommandHandler for IdCommand {
    fn name(&self) -> &'static str {
        "id"
    }

    fn description(&self) -> &'static str {
        "显示当前用户信息，用法：id"
    }

    async fn handle(
        &self,
        _args: &[&str],
        _data: &web::Data<crate::AppState>,
        ctx: &CommandContext,
    ) -> HttpResponse {
        info!("开始处理ID命令");

        // 身份由认证关卡挂在请求上，这里只消费
        match &ctx.current_user {
            Some(user) => {
                debug!("显示用户信息: {}", user.email);
                HttpResponse::Ok().json(super::CommandResponse {
                    success: true,
                    message: format!(
                        "用户ID: {}\n邮箱: {}\n显示名: {}\n角色: {}",
                        user.id, user.email, user.display_name, user.role
                    ),
                    data: Some(json!({
                        "id": user.id,
                        "email": user.email,
                        "name": user.display_name,
                        "role": user.role,
                        "is_guest": false
                    })),
                })
            }
            None => {
                // 访客模式
                debug!("显示访客信息");
                HttpResponse::Ok().json(super::CommandResponse {
                    success: true,
                    message: "当前为访客模式".to_string(),
                    data: Some(json!({
                        "name": "guest",
                        "role": "guest",
                        "is_guest": true
                    })),
                })
            }
        }
    }
}

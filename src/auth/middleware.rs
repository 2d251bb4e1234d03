use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::sync::Arc;

use crate::auth::jwt::validate_token;
use crate::auth::storage::UserStore;
use crate::auth::tokens::TokenManager;
use crate::auth::types::AuthError;
use crate::config::AuthConfig;

/// 请求认证关卡
///
/// 提取 Bearer 凭证并校验，校验通过后把身份挂到请求上，供下游
/// 鉴权使用。不携带凭证的请求按匿名放行；校验失败直接向边界抛出，
/// 由 actix 统一翻译成未授权响应，这里不做重试。
#[derive(Clone)]
pub struct AuthMiddleware {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenManager>,
    config: AuthConfig,
}

impl AuthMiddleware {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenManager>, config: AuthConfig) -> Self {
        Self {
            users,
            tokens,
            config,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Arc::new(service),
            users: self.users.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenManager>,
    config: AuthConfig,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let users = self.users.clone();
        let tokens = self.tokens.clone();
        let config = self.config.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .unwrap_or("")
                .to_string();

            // 未携带凭证按匿名请求放行
            if token.is_empty() {
                return service.call(req).await;
            }

            let claims = validate_token(&token, &config)?;

            // 已登出的凭证即使签名有效也拒绝
            if tokens.is_token_invalidated(&token).await? {
                warn!("凭证已登出 (用户: {})", claims.sub);
                return Err(AuthError::CredentialInvalid { token }.into());
            }

            // 按校验出的主体邮箱绑定身份
            match users.find_by_email(&claims.sub).await? {
                Some(user) => {
                    debug!("用户 {} 认证成功", user.email);
                    req.extensions_mut().insert(claims);
                    req.extensions_mut().insert(user);
                }
                None => {
                    warn!("凭证主体不存在: {}", claims.sub);
                    return Err(AuthError::CredentialInvalid { token }.into());
                }
            }

            service.call(req).await
        })
    }
}

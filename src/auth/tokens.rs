use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::auth::jwt;
use crate::auth::storage::TokenStore;
use crate::auth::types::{AuthError, AuthUser, StoredToken, TokenPair};
use crate::config::AuthConfig;

/// 凭证记录的生命周期管理：签发、换发清理、吊销与失效名单
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    config: AuthConfig,
    // 每个用户一把锁，串行化 token 换发，避免并发登录留下 0 条或多于 2 条记录
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, config: AuthConfig) -> Self {
        info!("初始化凭证管理器");
        Self {
            store,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap();
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// 登录成功后签发新的 token 对
    ///
    /// 先硬删除该用户全部旧凭证，再写入恰好两条新记录（access + refresh）。
    /// 任何一步落库失败都会中止登录，调用方不得把用户视为已登录。
    pub async fn generate_token_response(&self, user: &AuthUser) -> Result<TokenPair, AuthError> {
        let lock = self.user_lock(&user.id);
        let _guard = lock.lock().await;

        debug!("清除用户 {} 的旧凭证", user.email);
        self.store.delete_user_tokens(&user.id).await?;

        let access = jwt::generate_access_token(user, &self.config)?;
        let refresh = jwt::generate_refresh_token(user, &self.config)?;

        self.store
            .save_token(&StoredToken::bearer(&access, &user.id))
            .await?;
        self.store
            .save_token(&StoredToken::bearer(&refresh, &user.id))
            .await?;

        info!("用户 {} 的凭证已更新", user.email);
        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
        })
    }

    /// 将用户名下仍有效的凭证记录全部标记为已吊销、已过期
    ///
    /// 只改标记不删记录，与重新登录时的硬删除相区分。
    pub async fn revoke_all_user_tokens(&self, user_id: &str) -> Result<(), AuthError> {
        let mut tokens = self.store.find_valid_user_tokens(user_id).await?;
        if tokens.is_empty() {
            return Ok(());
        }

        for token in tokens.iter_mut() {
            token.revoked = true;
            token.expired = true;
        }
        self.store.save_tokens(&tokens).await?;

        info!("已吊销用户 {} 的 {} 条凭证", user_id, tokens.len());
        Ok(())
    }

    /// 登出时把凭证写入失效名单，此后无论签名是否有效都不再通过校验
    pub async fn invalidate_token(&self, raw: &str) -> Result<(), AuthError> {
        let hash = Self::hash_token(raw);
        self.store.insert_invalidated(&hash).await?;
        warn!("凭证已写入失效名单 (hash: {})", hash);
        Ok(())
    }

    /// 凭证是否已被登出
    pub async fn is_token_invalidated(&self, raw: &str) -> Result<bool, AuthError> {
        self.store.is_invalidated(&Self::hash_token(raw)).await
    }

    // 名单里只存哈希，不存原始凭证
    fn hash_token(raw: &str) -> String {
        let digest = Sha256::digest(raw.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MockTokenStore;
    use mockall::Sequence;
    use std::collections::HashSet;

    fn test_user() -> AuthUser {
        AuthUser {
            id: "u1".to_string(),
            email: "reader@example.com".to_string(),
            display_name: "读者".to_string(),
            password_hash: String::new(),
            role: "user".to_string(),
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
        }
    }

    #[tokio::test]
    async fn issuance_clears_before_it_saves_exactly_two() {
        let mut store = MockTokenStore::new();
        let mut seq = Sequence::new();

        // 顺序必须是：先删旧，再保存两条新记录
        store
            .expect_delete_user_tokens()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        store
            .expect_save_token()
            .times(2)
            .in_sequence(&mut seq)
            .withf(|t| t.token_type == "bearer" && !t.revoked && !t.expired)
            .returning(|_| Ok(()));

        let manager = TokenManager::new(Arc::new(store), AuthConfig::for_tests());
        let pair = manager.generate_token_response(&test_user()).await.unwrap();
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn save_failure_aborts_the_login() {
        let mut store = MockTokenStore::new();
        store.expect_delete_user_tokens().returning(|_| Ok(()));
        store
            .expect_save_token()
            .returning(|_| Err(AuthError::Persistence("磁盘已满".to_string())));

        let manager = TokenManager::new(Arc::new(store), AuthConfig::for_tests());
        let result = manager.generate_token_response(&test_user()).await;
        assert!(matches!(result, Err(AuthError::Persistence(_))));
    }

    #[tokio::test]
    async fn revoke_all_marks_but_does_not_delete() {
        let mut store = MockTokenStore::new();
        store.expect_find_valid_user_tokens().returning(|user_id| {
            Ok(vec![
                StoredToken::bearer("t1", user_id),
                StoredToken::bearer("t2", user_id),
            ])
        });
        store
            .expect_save_tokens()
            .times(1)
            .withf(|tokens| tokens.len() == 2 && tokens.iter().all(|t| t.revoked && t.expired))
            .returning(|_| Ok(()));
        store.expect_delete_user_tokens().times(0);

        let manager = TokenManager::new(Arc::new(store), AuthConfig::for_tests());
        manager.revoke_all_user_tokens("u1").await.unwrap();
    }

    #[tokio::test]
    async fn revoke_all_with_no_valid_tokens_writes_nothing() {
        let mut store = MockTokenStore::new();
        store
            .expect_find_valid_user_tokens()
            .returning(|_| Ok(vec![]));
        store.expect_save_tokens().times(0);

        let manager = TokenManager::new(Arc::new(store), AuthConfig::for_tests());
        manager.revoke_all_user_tokens("u1").await.unwrap();
    }

    #[tokio::test]
    async fn invalidated_token_stays_invalidated() {
        // 用共享集合让 mock 表现得像一张真实的失效名单
        let blocklist: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        let mut store = MockTokenStore::new();
        let writer = blocklist.clone();
        store.expect_insert_invalidated().returning(move |hash| {
            writer.lock().unwrap().insert(hash.to_string());
            Ok(())
        });
        let reader = blocklist.clone();
        store
            .expect_is_invalidated()
            .returning(move |hash| Ok(reader.lock().unwrap().contains(hash)));

        let manager = TokenManager::new(Arc::new(store), AuthConfig::for_tests());

        assert!(!manager.is_token_invalidated("some-jwt").await.unwrap());
        manager.invalidate_token("some-jwt").await.unwrap();
        assert!(manager.is_token_invalidated("some-jwt").await.unwrap());
        // 名单存的是哈希，其他凭证不受影响
        assert!(!manager.is_token_invalidated("another-jwt").await.unwrap());
    }
}

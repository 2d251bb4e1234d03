use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::auth::storage::UserStore;
use crate::auth::types::{AuthError, AuthUser};
use crate::config::AuthConfig;

/// 登录策略：失败计数、锁定窗口与密码校验的编排
pub struct AuthManager {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
}

impl AuthManager {
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        info!("初始化认证管理器");
        Self { users, config }
    }

    /// 认证一次登录请求
    ///
    /// 未知邮箱不产生任何副作用；已知邮箱的每次失败（密码错误、
    /// 锁定期内、账号停用）都会累计计数，计数达到阈值时加锁。
    pub async fn authenticate_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        debug!("尝试登录用户: {}", email);

        let mut user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                warn!("登录失败，用户不存在: {}", email);
                return Err(AuthError::AuthenticationFailed);
            }
        };

        // 每次尝试都先做锁定过期检查，再做计数。到期时刻本身视为已解锁。
        self.lift_expired_lock(&mut user).await?;

        if !Self::verify_password(password, &user.password_hash) {
            self.register_failure(&mut user).await?;
            warn!(
                "用户 {} 密码错误，当前失败次数: {}",
                email, user.failed_login_attempts
            );
            return Err(AuthError::AuthenticationFailed);
        }

        if !user.is_active || user.is_locked() {
            // 锁定或停用期间即使密码正确也计一次失败
            self.register_failure(&mut user).await?;
            warn!("用户 {} 处于锁定状态，拒绝登录", email);
            return Err(AuthError::AccountLocked);
        }

        // 登录成功，失败计数归零
        if user.failed_login_attempts != 0 {
            user.failed_login_attempts = 0;
            self.users.update_lock_state(&user).await?;
        }

        info!("用户 {} 登录成功", email);
        Ok(user)
    }

    /// 惰性解除已过期的锁定，无后台任务
    async fn lift_expired_lock(&self, user: &mut AuthUser) -> Result<(), AuthError> {
        if let Some(until) = user.locked_until {
            if Utc::now() >= until {
                debug!("用户 {} 的锁定已到期，解除", user.email);
                user.locked_until = None;
                user.failed_login_attempts = 0;
                self.users.update_lock_state(user).await?;
            }
        }
        Ok(())
    }

    /// 累计一次失败，达到阈值则锁定账号。失败计数的落库独立于请求结果。
    async fn register_failure(&self, user: &mut AuthUser) -> Result<(), AuthError> {
        user.failed_login_attempts += 1;
        if user.failed_login_attempts >= self.config.max_login_failures {
            let until = Utc::now() + Duration::hours(self.config.lock_duration_hours);
            user.locked_until = Some(until);
            warn!(
                "用户 {} 连续失败 {} 次，账号锁定至 {}",
                user.email, user.failed_login_attempts, until
            );
        }
        self.users.update_lock_state(user).await
    }

    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        debug!("加密密码");
        hash(password.as_bytes(), DEFAULT_COST).map_err(|e| {
            error!("密码加密失败: {}", e);
            AuthError::Persistence(format!("密码加密失败: {}", e))
        })
    }

    pub fn verify_password(password: &str, password_hash: &str) -> bool {
        match verify(password, password_hash) {
            Ok(result) => result,
            Err(e) => {
                // 损坏的哈希按校验失败处理
                error!("密码验证过程出错: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MockUserStore;
    use std::sync::Mutex;

    const PASSWORD: &str = "correct-horse";

    fn test_user() -> AuthUser {
        AuthUser {
            id: "u1".to_string(),
            email: "reader@example.com".to_string(),
            display_name: "读者".to_string(),
            // 测试里用最低 cost，避免拖慢用例
            password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
            role: "user".to_string(),
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
        }
    }

    /// 用共享状态把 mock 变成一个可读写的内存用户表
    fn manager_over(user: AuthUser) -> (AuthManager, Arc<Mutex<AuthUser>>) {
        let state = Arc::new(Mutex::new(user));
        let mut store = MockUserStore::new();

        let reader = state.clone();
        store
            .expect_find_by_email()
            .returning(move |_| Ok(Some(reader.lock().unwrap().clone())));

        let writer = state.clone();
        store.expect_update_lock_state().returning(move |u| {
            *writer.lock().unwrap() = u.clone();
            Ok(())
        });

        (
            AuthManager::new(Arc::new(store), AuthConfig::for_tests()),
            state,
        )
    }

    #[tokio::test]
    async fn unknown_email_has_no_side_effect() {
        let mut store = MockUserStore::new();
        store.expect_find_by_email().returning(|_| Ok(None));
        store.expect_update_lock_state().times(0);

        let manager = AuthManager::new(Arc::new(store), AuthConfig::for_tests());
        let result = manager.authenticate_user("nobody@example.com", "x").await;
        assert!(matches!(result, Err(AuthError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn four_consecutive_failures_lock_the_account() {
        let (manager, state) = manager_over(test_user());

        for attempt in 1..=3 {
            let result = manager
                .authenticate_user("reader@example.com", "wrong")
                .await;
            assert!(matches!(result, Err(AuthError::AuthenticationFailed)));
            assert_eq!(state.lock().unwrap().failed_login_attempts, attempt);
            assert!(state.lock().unwrap().locked_until.is_none());
        }

        // 第 4 次失败触发锁定，锁定时间约为当前时刻加配置时长
        let before = Utc::now();
        let result = manager
            .authenticate_user("reader@example.com", "wrong")
            .await;
        assert!(matches!(result, Err(AuthError::AuthenticationFailed)));

        let locked = state.lock().unwrap().clone();
        assert_eq!(locked.failed_login_attempts, 4);
        let until = locked.locked_until.expect("第 4 次失败后应当锁定");
        assert!(until >= before + Duration::hours(1));
        assert!(until <= Utc::now() + Duration::hours(1));
    }

    #[tokio::test]
    async fn locked_account_rejects_correct_password_and_keeps_counting() {
        let mut user = test_user();
        user.failed_login_attempts = 4;
        user.locked_until = Some(Utc::now() + Duration::hours(1));
        let (manager, state) = manager_over(user);

        let result = manager
            .authenticate_user("reader@example.com", PASSWORD)
            .await;
        assert!(matches!(result, Err(AuthError::AccountLocked)));
        // 锁定期间的正确密码同样计数
        assert_eq!(state.lock().unwrap().failed_login_attempts, 5);
    }

    #[tokio::test]
    async fn inactive_account_is_treated_as_locked() {
        let mut user = test_user();
        user.is_active = false;
        let (manager, state) = manager_over(user);

        let result = manager
            .authenticate_user("reader@example.com", PASSWORD)
            .await;
        assert!(matches!(result, Err(AuthError::AccountLocked)));
        assert_eq!(state.lock().unwrap().failed_login_attempts, 1);
    }

    #[tokio::test]
    async fn expired_lock_is_lifted_before_the_attempt_is_evaluated() {
        let mut user = test_user();
        user.failed_login_attempts = 4;
        // 锁定恰好已到期
        user.locked_until = Some(Utc::now());
        let (manager, state) = manager_over(user);

        let result = manager
            .authenticate_user("reader@example.com", PASSWORD)
            .await;
        assert!(result.is_ok());

        let after = state.lock().unwrap().clone();
        assert_eq!(after.failed_login_attempts, 0);
        assert!(after.locked_until.is_none());
    }

    #[tokio::test]
    async fn success_resets_the_counter() {
        let mut user = test_user();
        user.failed_login_attempts = 3;
        let (manager, state) = manager_over(user);

        let result = manager
            .authenticate_user("reader@example.com", PASSWORD)
            .await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().failed_login_attempts, 0);
        assert_eq!(state.lock().unwrap().failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn lock_boundary_scenario() {
        // failedLoginAttempts=3 的用户再失败一次即锁定，
        // 锁定期内的正确密码被拒，锁定过期后登录成功并清零
        let mut user = test_user();
        user.failed_login_attempts = 3;
        let (manager, state) = manager_over(user);

        let result = manager
            .authenticate_user("reader@example.com", "wrong")
            .await;
        assert!(matches!(result, Err(AuthError::AuthenticationFailed)));
        assert!(state.lock().unwrap().locked_until.is_some());

        let result = manager
            .authenticate_user("reader@example.com", PASSWORD)
            .await;
        assert!(matches!(result, Err(AuthError::AccountLocked)));

        // 手动把锁定时间拨到过去，模拟时间流逝
        state.lock().unwrap().locked_until = Some(Utc::now() - Duration::seconds(1));
        let result = manager
            .authenticate_user("reader@example.com", PASSWORD)
            .await;
        assert!(result.is_ok());
        assert_eq!(state.lock().unwrap().failed_login_attempts, 0);
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = AuthManager::hash_password("s3cret").unwrap();
        assert!(AuthManager::verify_password("s3cret", &hashed));
        assert!(!AuthManager::verify_password("wrong", &hashed));
        // 损坏的哈希按校验失败处理
        assert!(!AuthManager::verify_password("s3cret", "not-a-hash"));
    }
}

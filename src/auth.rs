use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;
use tracing::debug;

/// One shared password for every user and tenant. Per-salon accounts belong
/// to the surrounding application.
#[derive(Debug)]
pub struct ChairtimeAuthSource {
    password: String,
}

impl ChairtimeAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for ChairtimeAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        debug!("login user={:?} tenant={:?}", login.user(), login.database());
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

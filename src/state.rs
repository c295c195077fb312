use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    mailer::Mailer,
    oauth::{GoogleOAuthClient, build_google_client},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub mailer: Mailer,
    pub http_client: reqwest::Client,
    pub google: Option<GoogleOAuthClient>,
}

impl AppState {
    pub fn new(config: AppConfig, pool: DbPool) -> anyhow::Result<Self> {
        let mailer = Mailer::new(config.smtp.as_ref())?;
        let google = config.google.as_ref().map(build_google_client).transpose()?;
        // Token endpoints must not follow redirects.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            orm: orm_from_pool(pool.clone()),
            pool,
            config: Arc::new(config),
            mailer,
            http_client,
            google,
        })
    }
}

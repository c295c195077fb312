use std::env;

const VNPAY_SANDBOX_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub app_env: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub frontend_url: String,
    pub public_base_url: String,
    pub upload_dir: String,
    pub upload_max_bytes: usize,
    pub smtp: Option<SmtpConfig>,
    pub google: Option<GoogleConfig>,
    pub vnpay: VnpayConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let smtp = env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: parse_or("SMTP_PORT", 587),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Game Key Store <no-reply@gamekeystore.local>".to_string()),
        });

        let google = match (
            env::var("GOOGLE_CLIENT_ID"),
            env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url: env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                    format!("{public_base_url}/api/auth/google/callback")
                }),
            }),
            _ => None,
        };

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let vnpay = VnpayConfig {
            tmn_code: env::var("VNPAY_TMN_CODE").unwrap_or_default(),
            hash_secret: env::var("VNPAY_HASH_SECRET").unwrap_or_default(),
            pay_url: env::var("VNPAY_URL").unwrap_or_else(|_| VNPAY_SANDBOX_URL.to_string()),
            return_url: env::var("VNPAY_RETURN_URL")
                .unwrap_or_else(|_| format!("{frontend_url}/payment/result")),
        };

        Ok(Self {
            port,
            database_url,
            host,
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            jwt_secret,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24),
            frontend_url,
            public_base_url,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            upload_max_bytes: parse_or("UPLOAD_MAX_BYTES", 5 * 1024 * 1024),
            smtp,
            google,
            vnpay,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

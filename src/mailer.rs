//! Transactional email over SMTP.
//!
//! When no SMTP host is configured the mailer logs each message instead of
//! sending it, which keeps local development and tests free of a relay.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Keys delivered for one order line, used in the receipt email.
#[derive(Debug, Clone)]
pub struct DeliveredKeys {
    pub product_name: String,
    pub platform_name: String,
    pub keys: Vec<String>,
}

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
}

impl Mailer {
    pub fn new(config: Option<&SmtpConfig>) -> Result<Self, MailError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport: Some(transport),
            from_address: config.from_address.clone(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            transport: None,
            from_address: "no-reply@gamekeystore.local".to_string(),
        }
    }

    pub async fn send_verification_pin(
        &self,
        to: &str,
        username: &str,
        pin: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "Hi {username},\n\n\
             Your verification code is {pin}. It expires in 10 minutes.\n\n\
             If you did not create an account you can ignore this email.\n"
        );
        self.send(to, "Verify your Game Key Store account", body).await
    }

    pub async fn send_password_reset_pin(
        &self,
        to: &str,
        username: &str,
        pin: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "Hi {username},\n\n\
             Use the code {pin} to reset your password. It expires in 10 minutes.\n\n\
             If you did not ask for a reset, your password is unchanged.\n"
        );
        self.send(to, "Reset your Game Key Store password", body).await
    }

    pub async fn send_order_keys(
        &self,
        to: &str,
        payment_ref: &str,
        lines: &[DeliveredKeys],
    ) -> Result<(), MailError> {
        let mut body = format!("Thanks for your purchase! Order {payment_ref}\n\n");
        for line in lines {
            body.push_str(&format!("{} ({})\n", line.product_name, line.platform_name));
            for key in &line.keys {
                body.push_str(&format!("  {key}\n"));
            }
            body.push('\n');
        }
        self.send(to, &format!("Your game keys for order {payment_ref}"), body)
            .await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let Some(transport) = &self.transport else {
            tracing::info!(to, subject, body = %body, "smtp disabled, email not sent");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        transport.send(email).await?;
        tracing::debug!(to, subject, "email sent");
        Ok(())
    }
}

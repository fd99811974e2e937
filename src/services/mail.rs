use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};
use reqwest::Client;
use serde_json::json;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::services::templates::{self, Branding, Email};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
enum Backend {
    SendGrid { api_key: String },
    Smtp { host: String, port: u16, user: String, password: String },
    Disabled,
}

/// Sends transactional mail. Cheap to clone; routes hand a clone to a spawned task.
#[derive(Clone)]
pub struct MailService {
    transport: Backend,
    from: String,
    branding: Branding,
    client: Client,
}

impl MailService {
    pub fn from_config(config: &AppConfig) -> Self {
        let transport = match (&config.sendgrid_api_key, &config.mail_host, &config.mail_user, &config.mail_password) {
            (Some(api_key), _, _, _) if !api_key.is_empty() => Backend::SendGrid { api_key: api_key.clone() },
            (_, Some(host), Some(user), Some(password)) => Backend::Smtp {
                host: host.clone(),
                port: config.mail_port,
                user: user.clone(),
                password: password.clone(),
            },
            _ => Backend::Disabled,
        };

        MailService {
            transport,
            from: config.sendgrid_from_email.clone(),
            branding: Branding::from_config(config),
            client: Client::new(),
        }
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    pub async fn send(&self, to: &str, email: &Email) -> Result<()> {
        match &self.transport {
            Backend::SendGrid { api_key } => self.send_sendgrid(api_key, to, email).await,
            Backend::Smtp { host, port, user, password } => {
                let message = self.build_message(to, email)?;
                let creds = Credentials::new(user.clone(), password.clone());
                let mailer = SmtpTransport::relay(host)
                    .map_err(|e| AppError::Delivery(e.to_string()))?
                    .port(*port)
                    .credentials(creds)
                    .build();

                tokio::task::spawn_blocking(move || mailer.send(&message))
                    .await
                    .map_err(|e| AppError::Delivery(e.to_string()))?
                    .map_err(|e| AppError::Delivery(e.to_string()))?;
                Ok(())
            }
            Backend::Disabled => {
                warn!("Email delivery not configured. Skipping '{}' to {}", email.subject, to);
                Ok(())
            }
        }
    }

    async fn send_sendgrid(&self, api_key: &str, to: &str, email: &Email) -> Result<()> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html },
            ],
        });

        let res = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("SendGrid request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!("SendGrid returned {}: {}", status, detail)));
        }

        Ok(())
    }

    fn build_message(&self, to: &str, email: &Email) -> Result<Message> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| AppError::Delivery(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Delivery(format!("Invalid recipient: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(email.text.clone(), email.html.clone()))
            .map_err(|e| AppError::Delivery(e.to_string()))
    }

    /// Fire-and-forget: delivery runs on its own task and failures are only logged.
    pub fn dispatch(&self, to: &str, email: Email) {
        let mailer = self.clone();
        let to = to.to_string();
        tokio::spawn(async move {
            match mailer.send(&to, &email).await {
                Ok(()) => info!("'{}' email sent to {}", email.subject, to),
                Err(e) => error!("Failed to send '{}' email to {}: {}", email.subject, to, e),
            }
        });
    }

    pub fn send_verification_code(&self, to: &str, code: &str) {
        self.dispatch(to, templates::verification_code(&self.branding, to, code));
    }

    pub fn send_password_reset(&self, to: &str, token: &str) {
        self.dispatch(to, templates::password_reset(&self.branding, to, token));
    }

    pub fn send_welcome(&self, to: &str, name: Option<&str>) {
        self.dispatch(to, templates::welcome(&self.branding, to, name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sendgrid_preferred_over_smtp() {
        let config = AppConfig {
            sendgrid_api_key: Some("SG.key".to_string()),
            mail_host: Some("smtp.example.com".to_string()),
            mail_user: Some("user".to_string()),
            mail_password: Some("pass".to_string()),
            ..AppConfig::default()
        };
        let mail = MailService::from_config(&config);
        assert!(matches!(mail.transport, Backend::SendGrid { .. }));
    }

    #[test]
    fn test_smtp_needs_full_credentials() {
        let config = AppConfig {
            mail_host: Some("smtp.example.com".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(MailService::from_config(&config).transport, Backend::Disabled));
    }

    #[test]
    fn test_message_builds_multipart() {
        let mail = MailService::from_config(&AppConfig::default());
        let email = templates::welcome(mail.branding(), "ada@example.com", Some("Ada"));
        let message = mail.build_message("ada@example.com", &email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Subject: Welcome to Finance Teque"));
    }

    #[rocket::async_test]
    async fn test_disabled_transport_skips_quietly() {
        let mail = MailService::from_config(&AppConfig::default());
        let email = templates::verification_code(mail.branding(), "ada@example.com", "123456");
        assert!(mail.send("ada@example.com", &email).await.is_ok());
    }
}

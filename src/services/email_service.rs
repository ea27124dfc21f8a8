use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Outbound email. Implemented by `EmailService`; tests substitute their own.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

pub struct EmailService {
    config: Config,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

impl EmailService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send_verification_code(
        &self,
        email: &str,
        name: Option<&str>,
        code: &str,
    ) -> AppResult<()> {
        if !self.config.email_enabled {
            tracing::info!("Email disabled. Verification code for {}: {}", email, code);
            return Ok(());
        }

        let html = verification_email_html(name.unwrap_or("there"), code);
        self.send(email, "Your MyYard verification code", &html).await
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        if !self.config.email_enabled {
            tracing::info!("Email disabled. Skipping '{}' to {}", subject, to);
            return Ok(());
        }

        let body = SendEmailRequest {
            sender: Contact {
                email: &self.config.email_from_address,
                name: Some(&self.config.email_from_name),
            },
            to: vec![Contact {
                email: to,
                name: None,
            }],
            subject,
            html_content: html,
        };

        let response = self
            .client
            .post(&self.config.email_api_url)
            .header("api-key", &self.config.email_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Email API error: {} - {}", status, text);
            return Err(AppError::Email(format!("email API returned {}", status)));
        }

        tracing::info!("Email '{}' sent to {}", subject, to);
        Ok(())
    }
}

fn verification_email_html(name: &str, code: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 480px; margin: 0 auto;">
  <h2 style="color: #1f7a4d;">MyYard</h2>
  <p>Hi {name},</p>
  <p>Use this code to verify your email address:</p>
  <p style="font-size: 32px; font-weight: bold; letter-spacing: 6px;">{code}</p>
  <p>The code expires in 10 minutes. If you did not ask for it, you can ignore this email.</p>
</div>"#,
        name = html_escape(name),
        code = code
    )
}

/// Wraps a one-line notification in the same layout as the verification email.
pub fn notification_email_html(title: &str, body: &str, action_url: Option<&str>) -> String {
    let link = action_url
        .map(|url| format!(r#"<p><a href="{}">Open MyYard</a></p>"#, html_escape(url)))
        .unwrap_or_default();
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 480px; margin: 0 auto;">
  <h2 style="color: #1f7a4d;">{}</h2>
  <p>{}</p>
  {}
</div>"#,
        html_escape(title),
        html_escape(body),
        link
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_contains_code() {
        let html = verification_email_html("Thandi", "123456");
        assert!(html.contains("123456"));
        assert!(html.contains("Hi Thandi"));
    }

    #[test]
    fn test_html_is_escaped() {
        let html = notification_email_html("<b>New</b>", "a & b", None);
        assert!(html.contains("&lt;b&gt;New&lt;/b&gt;"));
        assert!(html.contains("a &amp; b"));
    }
}

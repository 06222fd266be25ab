use axum::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

/// Which templated message to deliver. Distinguishes the confirmation
/// and reset flows at the transport too, not just in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    VerifyEmail,
    ResetPassword,
}

/// Outbound email transport. Callers treat delivery as fire-and-forget:
/// sends are spawned off the request path and failures are logged, never
/// propagated back to the triggering operation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        kind: EmailKind,
        to: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from),
        })
    }
}

pub(crate) fn subject_for(kind: EmailKind) -> &'static str {
    match kind {
        EmailKind::VerifyEmail => "Confirm your email",
        EmailKind::ResetPassword => "Reset your password",
    }
}

pub(crate) fn body_for(kind: EmailKind, username: &str, base_url: &str, token: &str) -> String {
    match kind {
        EmailKind::VerifyEmail => format!(
            "Hello {username},\n\n\
            Thanks for registering with ContactHub.\n\n\
            Please confirm your email address by opening the link below:\n\n\
            {base_url}/api/auth/confirmed_email/{token}\n\n\
            The link is valid for 7 days. If you did not create an account,\n\
            you can safely ignore this message.\n\n\
            The ContactHub team"
        ),
        EmailKind::ResetPassword => format!(
            "Hello {username},\n\n\
            A password reset was requested for your ContactHub account.\n\n\
            Use the token below with the reset-password endpoint:\n\n\
            {base_url}/api/auth/reset-password-confirm/{token}\n\n\
            The token is valid for 7 days. If you did not request a reset,\n\
            please ignore this email and make sure your account is secure.\n\n\
            The ContactHub team"
        ),
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        kind: EmailKind,
        to: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject_for(kind))
            .header(ContentType::TEXT_PLAIN)
            .body(body_for(kind, username, base_url, token))?;
        self.transport.send(email).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_body_contains_link_and_token() {
        let body = body_for(
            EmailKind::VerifyEmail,
            "alice",
            "http://localhost:8080",
            "tok123",
        );
        assert!(body.contains("alice"));
        assert!(body.contains("http://localhost:8080/api/auth/confirmed_email/tok123"));
        assert!(body.contains("7 days"));
    }

    #[test]
    fn reset_body_contains_link_and_token() {
        let body = body_for(
            EmailKind::ResetPassword,
            "bob",
            "https://contacthub.example",
            "tok456",
        );
        assert!(body.contains("bob"));
        assert!(body.contains("reset-password-confirm/tok456"));
        assert!(body.contains("did not request a reset"));
    }

    #[test]
    fn subjects_differ_per_kind() {
        assert_ne!(
            subject_for(EmailKind::VerifyEmail),
            subject_for(EmailKind::ResetPassword)
        );
    }
}

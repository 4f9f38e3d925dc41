//! Email service for scratch card notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use scratchcard_core::CUSTOMIZATION_WINDOW_DAYS;

use crate::config::EmailConfig;

/// Subject line of the scratch card link email.
pub const SCRATCH_CARD_SUBJECT: &str = "Your Digital Scratch Card is Ready!";

/// HTML template for the scratch card link email.
#[derive(Template)]
#[template(path = "email/scratch_card.html")]
struct ScratchCardEmailHtml<'a> {
    link: &'a str,
    valid_days: i64,
}

/// Plain text template for the scratch card link email.
#[derive(Template)]
#[template(path = "email/scratch_card.txt")]
struct ScratchCardEmailText<'a> {
    link: &'a str,
    valid_days: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Rendered scratch card email bodies.
#[derive(Debug)]
pub struct RenderedEmail {
    pub text: String,
    pub html: String,
}

/// Render the scratch card link email.
///
/// # Errors
///
/// Returns `EmailError::Template` if rendering fails.
pub fn render_scratch_card_email(link: &str) -> Result<RenderedEmail, EmailError> {
    let valid_days = CUSTOMIZATION_WINDOW_DAYS;
    Ok(RenderedEmail {
        text: ScratchCardEmailText { link, valid_days }.render()?,
        html: ScratchCardEmailHtml { link, valid_days }.render()?,
    })
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Email a customer the link to their scratch card.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_scratch_card_link(&self, to: &str, link: &str) -> Result<(), EmailError> {
        let rendered = render_scratch_card_email(link)?;

        self.send_multipart_email(to, SCRATCH_CARD_SUBJECT, &rendered.text, &rendered.html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

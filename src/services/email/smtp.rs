use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{EmailProvider, OutgoingEmail};

pub struct SmtpEmailProvider {
    host: String,
    port: u16,
    credentials: Credentials,
    from: String,
}

impl SmtpEmailProvider {
    pub fn new(host: String, port: u16, username: String, password: String, from: String) -> Self {
        Self {
            host,
            port,
            credentials: Credentials::new(username, password),
            from,
        }
    }

    fn build_transport(&self) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        Ok(AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .context("SMTP relay error")?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build())
    }

    fn build_message(&self, email: &OutgoingEmail) -> anyhow::Result<Message> {
        let builder = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(email.to.parse().context("invalid to address")?)
            .subject(email.subject.clone());

        let message = match &email.inline_image {
            Some(image) => {
                let png_type = ContentType::parse("image/png").context("invalid content type")?;
                let inline = Attachment::new_inline(image.content_id.clone())
                    .body(image.png.clone(), png_type);
                builder.multipart(
                    MultiPart::related()
                        .singlepart(SinglePart::html(email.html.clone()))
                        .singlepart(inline),
                )
            }
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(email.html.clone()),
        };

        message.context("failed to build email")
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        if self.host.is_empty() {
            tracing::warn!(to = %email.to, "SMTP_HOST not set, email not sent");
            return Ok(());
        }

        let message = self.build_message(email)?;
        let mailer = self.build_transport()?;
        mailer
            .send(message)
            .await
            .context("failed to send email")?;

        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

pub mod smtp;

use async_trait::async_trait;

/// An image embedded in the HTML body, referenced as `cid:<content_id>`.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub content_id: String,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub inline_image: Option<InlineImage>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

//! Best-effort email delivery through a local msmtp subprocess.
//!
//! Delivery failures never abort a cycle: everything here is logged and
//! swallowed at this layer.
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

const MIME_BOUNDARY: &str = "=_birdbot_mime_boundary";

/// Seam for email delivery.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver `image` inline alongside `body`. Best-effort: failures are
    /// logged here and never propagate.
    async fn send(&self, subject: &str, body: &str, image: &[u8]);
}

#[derive(Debug, Clone)]
pub struct MsmtpMailer {
    msmtp_path: PathBuf,
    recipient: String,
}

impl MsmtpMailer {
    pub fn new(msmtp_path: impl Into<PathBuf>, recipient: impl Into<String>) -> Self {
        Self {
            msmtp_path: msmtp_path.into(),
            recipient: recipient.into(),
        }
    }

    async fn try_send(&self, message: &str) -> Result<()> {
        let mut child = Command::new(&self.msmtp_path)
            .arg("--debug")
            .arg("--from=default")
            .arg(&self.recipient)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.msmtp_path.display()))?;

        // Feed stdin from a separate task while the output pipes drain;
        // writing the whole message first deadlocks once the MTA fills its
        // stdout pipe (msmtp --debug prints the entire session).
        let writer = child.stdin.take().map(|mut stdin| {
            let message = message.as_bytes().to_vec();
            tokio::spawn(async move {
                stdin.write_all(&message).await?;
                stdin.shutdown().await
            })
        });

        let output = child
            .wait_with_output()
            .await
            .context("failed to wait for msmtp")?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // EPIPE when the MTA exits before reading everything; the
                // exit status below is what matters.
                Ok(Err(err)) => debug!(%err, "msmtp stdin write did not complete"),
                Err(err) => debug!(%err, "msmtp stdin writer task aborted"),
            }
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("msmtp exited with {}: {}", output.status, stderr.trim());
        }
        Ok(())
    }
}

#[async_trait]
impl MailSender for MsmtpMailer {
    async fn send(&self, subject: &str, body: &str, image: &[u8]) {
        let message = build_message(&self.recipient, subject, body, image);
        match self.try_send(&message).await {
            Ok(()) => info!(recipient = %self.recipient, "email sent"),
            Err(err) => error!(?err, "failed to send email"),
        }
    }
}

/// Serialize an RFC-5322 `multipart/related` message: a plain-text part
/// (body plus the attachment notice) and an inline base64 PNG part
/// referenced by content-id.
pub fn build_message(to: &str, subject: &str, body: &str, image: &[u8]) -> String {
    let encoded = BASE64.encode(image);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / 38 + 2);
    for chunk in encoded.as_bytes().chunks(76) {
        // Base64 output is ASCII, so the chunks are always valid UTF-8.
        wrapped.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        wrapped.push_str("\r\n");
    }

    format!(
        "To: {to}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/related; boundary=\"{MIME_BOUNDARY}\"\r\n\
         \r\n\
         --{MIME_BOUNDARY}\r\n\
         Content-Type: text/plain; charset=\"utf-8\"\r\n\
         \r\n\
         {body}\r\n\
         \r\n\
         Image is attached.\r\n\
         --{MIME_BOUNDARY}\r\n\
         Content-Type: image/png\r\n\
         Content-Transfer-Encoding: base64\r\n\
         Content-ID: <image1>\r\n\
         Content-Disposition: inline; filename=\"image.png\"\r\n\
         \r\n\
         {wrapped}\
         --{MIME_BOUNDARY}--\r\n"
    )
}

//! Mailbox access for manifest ingestion.
//!
//! The pipeline only needs one operation — "give me recent messages from
//! this sender" — so that is the whole trait. The real implementation talks
//! IMAP over TLS; tests substitute an in-memory mailbox.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::IngestError;

/// A file attached to a mail message, already transfer-decoded.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub uid: u32,
    pub attachments: Vec<Attachment>,
}

/// Source of manifest mail. Implementations return messages newest first,
/// at most `limit` of them.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn search_from(
        &self,
        sender: &str,
        limit: usize,
    ) -> Result<Vec<MailMessage>, IngestError>;
}

/// IMAP-over-TLS mailbox. The imap crate is blocking, so the whole
/// conversation runs on tokio's blocking pool.
pub struct ImapMailbox {
    host: String,
    port: u16,
    user: String,
    password: String,
}

impl ImapMailbox {
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn search_from(
        &self,
        sender: &str,
        limit: usize,
    ) -> Result<Vec<MailMessage>, IngestError> {
        let host = self.host.clone();
        let port = self.port;
        let user = self.user.clone();
        let password = self.password.clone();
        let sender = sender.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            fetch_from_imap(&host, port, &user, &password, &sender, limit)
        })
        .await;
        match joined {
            Ok(result) => result,
            Err(e) => Err(IngestError::Other(anyhow::anyhow!(
                "Mailbox task panicked: {}",
                e
            ))),
        }
    }
}

fn fetch_from_imap(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    sender: &str,
    limit: usize,
) -> Result<Vec<MailMessage>, IngestError> {
    let tls = native_tls::TlsConnector::builder()
        .build()
        .map_err(|e| IngestError::Connect {
            host: host.to_string(),
            source: anyhow::anyhow!("{}", e),
        })?;
    let client = imap::connect((host, port), host, &tls).map_err(|e| IngestError::Connect {
        host: host.to_string(),
        source: anyhow::anyhow!("{}", e),
    })?;
    let mut session = client
        .login(user, password)
        .map_err(|_| IngestError::Login {
            user: user.to_string(),
        })?;

    let result = (|| {
        session
            .select("INBOX")
            .map_err(|e| IngestError::Fetch(anyhow::anyhow!("{}", e)))?;
        let uids = session
            .uid_search(format!("FROM \"{}\"", sender))
            .map_err(|e| IngestError::Fetch(anyhow::anyhow!("{}", e)))?;

        // UIDs ascend with arrival order; highest first gives newest first.
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a));
        uids.truncate(limit);

        let mut messages = Vec::new();
        for uid in uids {
            let fetches = session
                .uid_fetch(uid.to_string(), "RFC822")
                .map_err(|e| IngestError::Fetch(anyhow::anyhow!("{}", e)))?;
            for fetch in fetches.iter() {
                let Some(body) = fetch.body() else {
                    debug!(uid, "Message fetch returned no body");
                    continue;
                };
                messages.push(MailMessage {
                    uid,
                    attachments: extract_attachments(body)?,
                });
            }
        }
        Ok(messages)
    })();

    let _ = session.logout();
    result
}

/// Pull every attachment out of a raw RFC 822 message. A leaf part counts
/// as an attachment when it carries a filename, via either the disposition
/// or the content type.
fn extract_attachments(raw: &[u8]) -> Result<Vec<Attachment>, IngestError> {
    let parsed =
        mailparse::parse_mail(raw).map_err(|e| IngestError::Fetch(anyhow::anyhow!("{}", e)))?;
    let mut attachments = Vec::new();
    collect_attachments(&parsed, &mut attachments);
    Ok(attachments)
}

fn collect_attachments(part: &mailparse::ParsedMail<'_>, out: &mut Vec<Attachment>) {
    if part.subparts.is_empty() {
        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();
        if let Some(filename) = filename {
            match part.get_body_raw() {
                Ok(data) => out.push(Attachment { filename, data }),
                Err(e) => debug!(filename = %filename, error = %e, "Failed to decode attachment body"),
            }
        }
    }
    for sub in &part.subparts {
        collect_attachments(sub, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_named_attachment_and_skips_inline_body() {
        let raw = concat!(
            "From: dispatch@factory.example\r\n",
            "To: ops@showroom.example\r\n",
            "Subject: Dispatch advice\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Please find the manifest attached.\r\n",
            "--XX\r\n",
            "Content-Type: text/plain; name=\"S08_20260801.txt\"\r\n",
            "Content-Disposition: attachment; filename=\"S08_20260801.txt\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "SEVMTE8=\r\n",
            "--XX--\r\n",
        );

        let attachments = extract_attachments(raw.as_bytes()).unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "S08_20260801.txt");
        assert_eq!(attachments[0].data, b"HELLO");
    }

    #[test]
    fn test_content_type_name_is_enough() {
        let raw = concat!(
            "From: dispatch@factory.example\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"YY\"\r\n",
            "\r\n",
            "--YY\r\n",
            "Content-Type: application/octet-stream; name=\"s08_plain.txt\"\r\n",
            "\r\n",
            "RAW BYTES\r\n",
            "--YY--\r\n",
        );

        let attachments = extract_attachments(raw.as_bytes()).unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "s08_plain.txt");
    }

    #[test]
    fn test_message_without_attachments_yields_none() {
        let raw = concat!(
            "From: someone@example.com\r\n",
            "Subject: hello\r\n",
            "\r\n",
            "Just text, no files.\r\n",
        );
        let attachments = extract_attachments(raw.as_bytes()).unwrap();
        assert!(attachments.is_empty());
    }
}

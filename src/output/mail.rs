use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::{Message, SmtpTransport, Transport};

/// Splits a comma-separated recipient list from the config file.
pub fn split_recipients(addresses: &str) -> Vec<String> {
    addresses
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sends one HTML message over SMTP with STARTTLS.
///
/// `smtp_host` may carry an explicit port as `host:port`; without one the
/// STARTTLS default (587) applies. Any failure is returned to the caller,
/// who falls back to the archived HTML file rather than aborting the run.
pub fn send_html(
    smtp_host: &str,
    from: &str,
    recipients: &[String],
    subject: &str,
    htmlcode: &str,
) -> Result<()> {
    if recipients.is_empty() {
        anyhow::bail!("no recipients configured");
    }

    let mut builder = Message::builder()
        .from(
            from.parse::<Mailbox>()
                .with_context(|| format!("Invalid sender address: {from}"))?,
        )
        .subject(subject);
    for recipient in recipients {
        builder = builder.to(recipient
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient address: {recipient}"))?);
    }

    let message = builder
        .multipart(
            MultiPart::alternative().singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(htmlcode.to_string()),
            ),
        )
        .context("Failed to build email message")?;

    let (host, port) = match smtp_host.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
            (host, port.parse::<u16>().ok())
        }
        _ => (smtp_host, None),
    };

    let mut transport = SmtpTransport::starttls_relay(host)
        .with_context(|| format!("Invalid SMTP host: {host}"))?;
    if let Some(port) = port {
        transport = transport.port(port);
    }

    transport
        .build()
        .send(&message)
        .context("Mail server did not accept the message")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_recipients() {
        assert_eq!(
            split_recipients("a@example.com, b@example.com,c@example.com"),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert!(split_recipients("").is_empty());
        assert!(split_recipients(" , ").is_empty());
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        let err = send_html(
            "smtp.example.com",
            "not an address",
            &["a@example.com".to_string()],
            "subject",
            "<html></html>",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid sender address"));
    }

    #[test]
    fn test_empty_recipients_is_rejected() {
        let err = send_html(
            "smtp.example.com",
            "valet@example.com",
            &[],
            "subject",
            "<html></html>",
        )
        .unwrap_err();
        assert!(err.to_string().contains("no recipients"));
    }
}

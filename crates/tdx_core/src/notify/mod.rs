//! Notifier: delivers the summary report over SMTP.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use crate::config::{EmailConfig, SmtpSecurity};
use crate::error::{AppError, ErrorKind};

pub trait Mailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// One SMTP session per [`Mailer::send`], secured per [`SmtpSecurity`] and
/// authenticated as the configured sender.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, AppError> {
        let from: Mailbox = self.config.sender.parse().map_err(|e| {
            AppError::new(
                ErrorKind::Config,
                "EMAIL_SENDER_INVALID",
                "Configured sender address is invalid",
            )
            .with_details(format!("sender={}; err={}", self.config.sender, e))
        })?;
        let to: Mailbox = to.parse().map_err(|e| {
            AppError::new(
                ErrorKind::Query,
                "EMAIL_RECIPIENT_INVALID",
                "Recipient address is invalid",
            )
            .with_details(format!("to={to}; err={e}"))
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| {
                AppError::new(
                    ErrorKind::Query,
                    "EMAIL_BUILD_FAILED",
                    "Failed to build email message",
                )
                .with_details(e.to_string())
            })
    }

    fn transport(&self) -> Result<SmtpTransport, AppError> {
        let cfg = &self.config;
        let relay_error = |e: lettre::transport::smtp::Error| {
            AppError::new(
                ErrorKind::Connection,
                "EMAIL_TRANSPORT_FAILED",
                "Failed to configure SMTP relay",
            )
            .with_details(format!("host={}; err={}", cfg.smtp_host, e))
        };

        let builder = match cfg.security {
            SmtpSecurity::StartTls => {
                SmtpTransport::starttls_relay(&cfg.smtp_host).map_err(relay_error)?
            }
            SmtpSecurity::Tls => SmtpTransport::relay(&cfg.smtp_host).map_err(relay_error)?,
            SmtpSecurity::Plaintext => SmtpTransport::builder_dangerous(&cfg.smtp_host),
        };
        let builder = builder
            .port(cfg.smtp_port)
            .timeout(Some(Duration::from_secs(cfg.timeout_secs)));

        // Unauthenticated submission is only possible without TLS (local relays).
        let builder = if cfg.security == SmtpSecurity::Plaintext && cfg.password.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(cfg.sender.clone(), cfg.password.clone()))
        };
        Ok(builder.build())
    }
}

impl Mailer for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let message = self.build_message(to, subject, body)?;
        let transport = self.transport()?;

        debug!(
            host = %self.config.smtp_host,
            port = self.config.smtp_port,
            from = %self.config.sender,
            to,
            "sending email"
        );
        let response = transport.send(&message).map_err(|e| classify_smtp_error(&e))?;
        info!(to, code = %response.code(), "email sent");
        Ok(())
    }
}

fn classify_smtp_error(e: &lettre::transport::smtp::Error) -> AppError {
    if let Some(code) = e.status() {
        return match code.to_string().as_str() {
            "530" | "534" | "535" => AppError::new(
                ErrorKind::Authentication,
                "EMAIL_AUTH_FAILED",
                "SMTP server rejected the sender credentials",
            )
            .with_details(e.to_string()),
            code => AppError::new(
                ErrorKind::Provider,
                "EMAIL_REJECTED",
                "SMTP server rejected the message",
            )
            .with_details(format!("code={code}; err={e}"))
            .with_retryable(e.is_transient()),
        };
    }

    // The relay answered but the session could not be set up as configured
    // (no STARTTLS, handshake refused, no usable AUTH mechanism).
    if e.is_tls() || e.is_client() {
        return AppError::new(
            ErrorKind::Connection,
            "EMAIL_NEGOTIATION_FAILED",
            "SMTP session could not be negotiated",
        )
        .with_details(e.to_string());
    }
    if e.is_response() {
        return AppError::new(
            ErrorKind::Provider,
            "EMAIL_PROTOCOL_ERROR",
            "SMTP server sent an unreadable reply",
        )
        .with_details(e.to_string());
    }
    if e.is_timeout() {
        return AppError::new(
            ErrorKind::Connection,
            "EMAIL_TIMEOUT",
            "SMTP server did not answer in time",
        )
        .with_details(e.to_string())
        .with_retryable(true);
    }
    AppError::new(
        ErrorKind::Connection,
        "EMAIL_TRANSPORT_FAILED",
        "Failed to reach SMTP server",
    )
    .with_details(e.to_string())
    .with_retryable(true)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    fn config(host: &str, port: u16, security: SmtpSecurity) -> EmailConfig {
        EmailConfig {
            smtp_host: host.to_string(),
            smtp_port: port,
            security,
            sender: "digest@example.com".to_string(),
            password: "wrong-password".to_string(),
            recipient: "team@example.com".to_string(),
            subject: "subject".to_string(),
            timeout_secs: 2,
        }
    }

    /// Minimal single-session SMTP server on loopback.
    ///
    /// Advertises AUTH PLAIN (never STARTTLS), answers AUTH with `auth_reply`
    /// and accepts any message. Every line it receives is sent back on the channel.
    fn fake_relay(auth_reply: &'static str) -> (u16, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let Ok(read_half) = stream.try_clone() else {
                return;
            };
            let mut reader = BufReader::new(read_half);
            let mut writer = stream;
            if writer.write_all(b"220 relay.test ESMTP\r\n").is_err() {
                return;
            }

            let mut in_data = false;
            let mut line = String::new();
            while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                let _ = tx.send(line.clone());
                let cmd = line.to_ascii_uppercase();
                let reply = if in_data {
                    if line == ".\r\n" {
                        in_data = false;
                        Some("250 2.0.0 queued\r\n")
                    } else {
                        None
                    }
                } else if cmd.starts_with("EHLO") {
                    Some("250-relay.test\r\n250 AUTH PLAIN LOGIN\r\n")
                } else if cmd.starts_with("AUTH") {
                    Some(auth_reply)
                } else if cmd.starts_with("MAIL") || cmd.starts_with("RCPT") {
                    Some("250 2.1.0 ok\r\n")
                } else if cmd.starts_with("DATA") {
                    in_data = true;
                    Some("354 go ahead\r\n")
                } else if cmd.starts_with("QUIT") {
                    let _ = writer.write_all(b"221 2.0.0 bye\r\n");
                    break;
                } else {
                    Some("502 5.5.2 not implemented\r\n")
                };
                if let Some(reply) = reply {
                    if writer.write_all(reply.as_bytes()).is_err() {
                        break;
                    }
                }
                line.clear();
            }
        });

        (port, rx)
    }

    #[test]
    fn builds_plain_text_message() {
        let n = SmtpNotifier::new(config("smtp.example.com", 587, SmtpSecurity::StartTls));
        let msg = n
            .build_message("team@example.com", "Digest", "Total Records: 3")
            .expect("message");
        let raw = String::from_utf8(msg.formatted()).expect("utf8");
        assert!(raw.contains("Subject: Digest"));
        assert!(raw.contains("To: team@example.com"));
        assert!(raw.contains("Total Records: 3"));
    }

    #[test]
    fn invalid_recipient_is_rejected_before_connecting() {
        let n = SmtpNotifier::new(config("smtp.example.com", 587, SmtpSecurity::StartTls));
        let err = n.send("not an address", "s", "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Query);
        assert_eq!(err.code, "EMAIL_RECIPIENT_INVALID");
    }

    #[test]
    fn unreachable_relay_returns_error_instead_of_panicking() {
        // Port 1 on loopback: nothing listens there.
        let n = SmtpNotifier::new(config("127.0.0.1", 1, SmtpSecurity::StartTls));
        let err = n.send("team@example.com", "s", "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(err.retryable);
    }

    #[test]
    fn wrong_credentials_are_an_authentication_error() {
        let (port, _lines) = fake_relay("535 5.7.8 Authentication credentials invalid\r\n");
        let n = SmtpNotifier::new(config("127.0.0.1", port, SmtpSecurity::Plaintext));

        let err = n.send("team@example.com", "s", "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.code, "EMAIL_AUTH_FAILED");
        assert!(!err.retryable);
    }

    #[test]
    fn relay_without_starttls_is_a_negotiation_error() {
        let (port, _lines) = fake_relay("235 2.7.0 accepted\r\n");
        let n = SmtpNotifier::new(config("127.0.0.1", port, SmtpSecurity::StartTls));

        let err = n.send("team@example.com", "s", "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert_eq!(err.code, "EMAIL_NEGOTIATION_FAILED");
        assert!(!err.retryable);
    }

    #[test]
    fn accepted_credentials_deliver_the_body() {
        let (port, lines) = fake_relay("235 2.7.0 accepted\r\n");
        let n = SmtpNotifier::new(config("127.0.0.1", port, SmtpSecurity::Plaintext));

        n.send("team@example.com", "Digest", "Total Records: 3")
            .expect("send");

        let transcript: Vec<String> = lines.try_iter().collect();
        assert!(transcript.iter().any(|l| l.starts_with("AUTH PLAIN")));
        assert!(transcript.iter().any(|l| l.starts_with("RCPT TO:<team@example.com>")));
        assert!(transcript.iter().any(|l| l.contains("Total Records: 3")));
    }
}

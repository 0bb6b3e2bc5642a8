//! SMTP envelope probing.
//!
//! One TCP connection to the primary MX on port 25, driven through
//! banner → HELO → MAIL FROM → RCPT TO, with a second RCPT to a
//! nonexistent address for catch-all detection. A single deadline covers
//! the whole dialogue. No STARTTLS upgrade, no DATA, no connection reuse.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::SmtpDeliverability;

const SMTP_PORT: u16 = 25;

/// Result of one probe dialogue.
#[derive(Debug, Clone)]
pub struct SmtpProbeOutcome {
    pub deliverable: SmtpDeliverability,
    pub is_catch_all: bool,
    pub banner: Option<String>,
    pub final_response: Option<String>,
    /// Banner-sniffing hint only; no TLS negotiation is performed.
    pub tls_supported: bool,
    pub reason: Option<String>,
}

impl SmtpProbeOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            deliverable: SmtpDeliverability::No,
            is_catch_all: false,
            banner: None,
            final_response: None,
            tls_supported: false,
            reason: Some(reason.into()),
        }
    }
}

/// A parsed SMTP reply: the 3-digit code plus all continuation lines.
#[derive(Debug, Clone)]
struct SmtpReply {
    code: u16,
    lines: Vec<String>,
}

impl SmtpReply {
    fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Definitive "mailbox unavailable" rejection (RFC 5321 §4.2.3).
    /// Other 5xx codes are policy or protocol noise, not proof about the
    /// recipient, and classify as unknown.
    fn is_mailbox_rejection(&self) -> bool {
        self.code == 550
    }

    fn text(&self) -> String {
        format!("{} {}", self.code, self.lines.join(" "))
    }
}

/// Probes remote mail servers at the envelope level.
pub struct SmtpProber {
    from_domain: String,
    deadline: Duration,
    port: u16,
}

impl SmtpProber {
    /// # Arguments
    /// * `from_domain` - domain presented in HELO and MAIL FROM
    /// * `deadline` - budget for the entire dialogue including connect
    pub fn new(from_domain: impl Into<String>, deadline: Duration) -> Self {
        Self {
            from_domain: from_domain.into(),
            deadline,
            port: SMTP_PORT,
        }
    }

    #[cfg(test)]
    fn with_port(from_domain: impl Into<String>, deadline: Duration, port: u16) -> Self {
        Self {
            from_domain: from_domain.into(),
            deadline,
            port,
        }
    }

    /// Probe whether `email` is accepted by `mx_host`, the mail exchanger
    /// for `domain`. Never returns an error: every failure mode is folded
    /// into the outcome.
    pub async fn probe(&self, email: &str, domain: &str, mx_host: &str) -> SmtpProbeOutcome {
        debug!(email, mx_host, "starting SMTP probe");
        match timeout(self.deadline, self.dialogue(email, domain, mx_host)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                debug!(mx_host, %err, "SMTP probe socket error");
                SmtpProbeOutcome::failed(format!("connection error: {err}"))
            }
            Err(_) => {
                debug!(mx_host, "SMTP probe timed out");
                SmtpProbeOutcome::failed("timeout")
            }
        }
    }

    async fn dialogue(
        &self,
        email: &str,
        domain: &str,
        mx_host: &str,
    ) -> io::Result<SmtpProbeOutcome> {
        let stream = TcpStream::connect((mx_host, self.port)).await?;
        let mut conn = Connection::new(stream);
        let mut outcome = SmtpProbeOutcome {
            deliverable: SmtpDeliverability::Unknown,
            is_catch_all: false,
            banner: None,
            final_response: None,
            tls_supported: false,
            reason: None,
        };

        let banner = conn.read_reply().await?;
        let banner_text = banner.text();
        outcome.tls_supported = banner_text.to_lowercase().contains("tls");
        outcome.banner = Some(banner_text.clone());
        if banner.code != 220 {
            outcome.final_response = Some(banner_text.clone());
            outcome.reason = Some(format!("unexpected greeting: {banner_text}"));
            return Ok(outcome);
        }

        let helo = conn
            .exchange(&format!("HELO {}", self.from_domain))
            .await?;
        if !helo.is_positive_completion() {
            outcome.final_response = Some(helo.text());
            outcome.reason = Some(format!("HELO rejected: {}", helo.text()));
            conn.quit().await;
            return Ok(outcome);
        }

        let mail = conn
            .exchange(&format!("MAIL FROM:<probe@{}>", self.from_domain))
            .await?;
        if !mail.is_positive_completion() {
            outcome.final_response = Some(mail.text());
            outcome.reason = Some(format!("MAIL FROM rejected: {}", mail.text()));
            conn.quit().await;
            return Ok(outcome);
        }

        let rcpt = conn.exchange(&format!("RCPT TO:<{email}>")).await?;
        outcome.final_response = Some(rcpt.text());

        if rcpt.is_positive_completion() {
            outcome.deliverable = SmtpDeliverability::Yes;

            // A server that also accepts a recipient that cannot exist is a
            // catch-all, which makes the acceptance above inconclusive.
            let probe_rcpt = format!("RCPT TO:<{}@{}>", random_probe_local(), domain);
            if let Ok(catch_all) = conn.exchange(&probe_rcpt).await {
                outcome.is_catch_all = catch_all.is_positive_completion();
            }
        } else if rcpt.is_mailbox_rejection() {
            outcome.deliverable = SmtpDeliverability::No;
            outcome.reason = Some(format!("recipient rejected: {}", rcpt.text()));
        } else {
            outcome.deliverable = SmtpDeliverability::Unknown;
            outcome.reason = Some(rcpt.text());
        }

        conn.quit().await;
        Ok(outcome)
    }
}

/// Local part that cannot correspond to a real mailbox, used for catch-all
/// detection.
fn random_probe_local() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("nonexistent-{millis}")
}

/// Buffered line-oriented SMTP connection.
struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    async fn exchange(&mut self, command: &str) -> io::Result<SmtpReply> {
        self.send(command).await?;
        self.read_reply().await
    }

    async fn send(&mut self, command: &str) -> io::Result<()> {
        debug!(command, "smtp >>");
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await
    }

    /// Read one complete (possibly multiline) reply, advancing on each line
    /// until the final line (no continuation dash after the code).
    async fn read_reply(&mut self) -> io::Result<SmtpReply> {
        let mut code: Option<u16> = None;
        let mut lines = Vec::new();

        loop {
            let line = self.read_line().await?;
            debug!(line = %line, "smtp <<");
            if line.len() < 3 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed reply line: {line}"),
                ));
            }
            let parsed = line[..3].parse::<u16>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("missing reply code: {line}"),
                )
            })?;
            code.get_or_insert(parsed);

            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or("").to_string());
            if is_last {
                break;
            }
        }

        Ok(SmtpReply {
            code: code.unwrap_or(0),
            lines,
        })
    }

    async fn read_line(&mut self) -> io::Result<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if line.ends_with(b"\n") {
                    line.pop();
                }
                if line.ends_with(b"\r") {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            let mut chunk = [0u8; 512];
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Best-effort QUIT; the connection is dropped either way.
    async fn quit(&mut self) {
        if self.send("QUIT").await.is_ok() {
            let _ = self.read_reply().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn reply(code: u16, lines: &[&str]) -> SmtpReply {
        SmtpReply {
            code,
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn reply_classification() {
        assert!(reply(250, &["OK"]).is_positive_completion());
        assert!(!reply(250, &["OK"]).is_mailbox_rejection());
        assert!(reply(550, &["no such user"]).is_mailbox_rejection());
        // Policy rejections and transient failures are not mailbox proof.
        assert!(!reply(554, &["policy"]).is_mailbox_rejection());
        assert!(!reply(451, &["try later"]).is_positive_completion());
        assert!(!reply(451, &["try later"]).is_mailbox_rejection());
    }

    #[test]
    fn reply_text_joins_lines() {
        let r = reply(250, &["first", "second"]);
        assert_eq!(r.text(), "250 first second");
    }

    #[test]
    fn probe_local_is_prefixed() {
        let local = random_probe_local();
        assert!(local.starts_with("nonexistent-"));
        assert!(local["nonexistent-".len()..]
            .chars()
            .all(|c| c.is_ascii_digit()));
    }

    /// Scripted SMTP server: sends the banner, then answers each client
    /// line with the next canned reply. Returns the bound port.
    async fn scripted_server(banner: &'static str, replies: &'static [&'static str]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(banner.as_bytes()).await.unwrap();
            socket.write_all(b"\r\n").await.unwrap();
            let mut buf = [0u8; 1024];
            for reply in replies {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
            }
        });
        port
    }

    async fn probe_scripted(
        banner: &'static str,
        replies: &'static [&'static str],
    ) -> SmtpProbeOutcome {
        let port = scripted_server(banner, replies).await;
        let prober = SmtpProber::with_port("mailvet.local", Duration::from_secs(2), port);
        prober
            .probe("user@example.com", "example.com", "127.0.0.1")
            .await
    }

    #[tokio::test]
    async fn accepted_recipient_with_rejected_catch_all() {
        let outcome = probe_scripted(
            "220 mx.example.com ESMTP",
            &[
                "250 hello",
                "250 ok",
                "250 ok",
                "550 no such user",
                "221 bye",
            ],
        )
        .await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::Yes);
        assert!(!outcome.is_catch_all);
        assert!(!outcome.tls_supported);
        assert!(outcome
            .banner
            .as_deref()
            .is_some_and(|b| b.contains("mx.example.com")));
    }

    #[tokio::test]
    async fn catch_all_server_accepts_everything() {
        let outcome = probe_scripted(
            "220 mx.example.com ESMTP ready STARTTLS",
            &["250 hello", "250 ok", "250 ok", "250 ok", "221 bye"],
        )
        .await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::Yes);
        assert!(outcome.is_catch_all);
        assert!(outcome.tls_supported);
    }

    #[tokio::test]
    async fn rejected_recipient_is_undeliverable() {
        let outcome = probe_scripted(
            "220 mx.example.com ESMTP",
            &["250 hello", "250 ok", "550 5.1.1 user unknown", "221 bye"],
        )
        .await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::No);
        assert!(outcome
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("user unknown")));
    }

    #[tokio::test]
    async fn transient_failure_is_unknown() {
        let outcome = probe_scripted(
            "220 mx.example.com ESMTP",
            &["250 hello", "250 ok", "451 greylisted, try later", "221 bye"],
        )
        .await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::Unknown);
        assert!(outcome
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("greylisted")));
    }

    #[tokio::test]
    async fn non_220_greeting_is_inconclusive() {
        let outcome = probe_scripted("554 no service", &[]).await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::Unknown);
        assert!(outcome
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("unexpected greeting")));
    }

    #[tokio::test]
    async fn multiline_replies_are_collected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"250-mx.example.com\r\n250-SIZE 35882577\r\n250 STARTTLS\r\n")
                .await
                .unwrap();
        });
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream);
        let reply = conn.read_reply().await.unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines.len(), 3);
        assert_eq!(reply.lines[2], "STARTTLS");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // Accept and hold the connection open without a banner.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let prober = SmtpProber::with_port("mailvet.local", Duration::from_millis(200), port);
        let outcome = prober
            .probe("user@example.com", "example.com", "127.0.0.1")
            .await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::No);
        assert_eq!(outcome.reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn connection_error_folds_into_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Drop the listener so the port refuses connections.
        drop(listener);
        let prober = SmtpProber::with_port("mailvet.local", Duration::from_secs(1), port);
        let outcome = prober
            .probe("user@example.com", "example.com", "127.0.0.1")
            .await;
        assert_eq!(outcome.deliverable, SmtpDeliverability::No);
        assert!(outcome
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("connection error")));
    }
}

//! Report delivery sinks.
//!
//! Two independent sinks: a multipart upload to the cloud endpoint and an
//! SMTP email with the bundled archive attached. A failure in one sink
//! never prevents the other from being attempted; the caller gets one
//! result per configured sink.

use crate::bundle;
use crate::config::{Config, EmailConfig, UploadConfig};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected upload ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("smtp error: {0}")]
    Smtp(String),
    #[error("delivery configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Bundle(#[from] bundle::BundleError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one sink attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub sink: String,
    pub success: bool,
    pub message: String,
    /// Payload size handed to the sink, in bytes.
    pub bytes: u64,
}

impl DeliveryResult {
    fn ok(sink: &str, message: String, bytes: u64) -> Self {
        Self {
            sink: sink.to_string(),
            success: true,
            message,
            bytes,
        }
    }

    fn failed(sink: &str, error: &DeliveryError, bytes: u64) -> Self {
        Self {
            sink: sink.to_string(),
            success: false,
            message: error.to_string(),
            bytes,
        }
    }
}

/// Stable identifier for this installation, persisted under the data
/// directory so the cloud endpoint sees the same system across restarts.
pub fn system_id(data_path: &Path) -> String {
    let id_file = data_path.join("system_id");
    if let Ok(existing) = std::fs::read_to_string(&id_file) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return existing.to_string();
        }
    }

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let id = format!("agent-{}-{}", host, &uuid::Uuid::new_v4().to_string()[..8]);

    if let Err(e) = std::fs::create_dir_all(data_path)
        .and_then(|_| std::fs::write(&id_file, &id))
    {
        warn!("could not persist system id: {e}");
    }
    id
}

/// Async client for the report ingest endpoint.
pub struct CloudClient {
    config: UploadConfig,
    client: reqwest::Client,
    system_id: String,
}

impl CloudClient {
    pub fn new(config: UploadConfig, system_id: String) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;
        Ok(Self {
            config,
            client,
            system_id,
        })
    }

    /// Upload the verified archive as a multipart form.
    pub async fn upload(&self, archive: &Path) -> Result<serde_json::Value, DeliveryError> {
        bundle::verify_archive(archive)?;

        let bytes = std::fs::read(archive)?;
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "report.zip".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")
            .map_err(|e| DeliveryError::Config(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("reportZip", part)
            .text("systemId", self.system_id.clone());

        let response = self
            .client
            .post(&self.config.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(DeliveryError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DeliveryError::Network(format!("unparseable response: {e}")))
    }
}

/// Blocking cloud client for use in synchronous contexts.
pub struct BlockingCloudClient {
    inner: CloudClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingCloudClient {
    pub fn new(config: UploadConfig, system_id: String) -> Result<Self, DeliveryError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DeliveryError::Config(e.to_string()))?;
        Ok(Self {
            inner: CloudClient::new(config, system_id)?,
            runtime,
        })
    }

    pub fn upload(&self, archive: &Path) -> Result<serde_json::Value, DeliveryError> {
        self.runtime.block_on(self.inner.upload(archive))
    }
}

/// Build the daily email, attaching the archive when one is available.
fn build_email(
    config: &EmailConfig,
    day: &str,
    archive: Option<&Path>,
) -> Result<Message, DeliveryError> {
    let parse_addr = |addr: &str| -> Result<Mailbox, DeliveryError> {
        addr.parse()
            .map_err(|e| DeliveryError::Config(format!("invalid address {addr:?}: {e}")))
    };

    let mut builder = Message::builder()
        .from(parse_addr(&config.from_addr)?)
        .to(parse_addr(&config.to_addr)?)
        .subject(format!("{} - {day}", config.subject));
    for cc in &config.cc {
        builder = builder.cc(parse_addr(cc)?);
    }

    let body = match archive {
        Some(_) => format!("Attached is the consolidated report bundle for {day}."),
        None => format!(
            "No report bundle could be produced for {day}; see the agent log for details."
        ),
    };
    let text_part = SinglePart::builder()
        .header(ContentType::TEXT_PLAIN)
        .body(body);

    let message = match archive {
        Some(path) => {
            let content = std::fs::read(path)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "report.zip".to_string());
            let content_type = ContentType::parse("application/zip")
                .map_err(|e| DeliveryError::Config(e.to_string()))?;
            let attachment = Attachment::new(file_name).body(content, content_type);
            builder
                .multipart(MultiPart::mixed().singlepart(text_part).singlepart(attachment))
        }
        None => builder.multipart(MultiPart::mixed().singlepart(text_part)),
    }
    .map_err(|e| DeliveryError::Config(e.to_string()))?;

    Ok(message)
}

/// Send the daily email over implicit-TLS SMTP.
pub fn send_email(
    config: &EmailConfig,
    day: &str,
    archive: Option<&Path>,
) -> Result<(), DeliveryError> {
    if let Some(path) = archive {
        bundle::verify_archive(path)?;
    }

    let message = build_email(config, day, archive)?;
    let transport = SmtpTransport::relay(&config.smtp_server)
        .map_err(|e| DeliveryError::Smtp(e.to_string()))?
        .port(config.smtp_port)
        .credentials(Credentials::new(
            config.from_addr.clone(),
            config.password.clone(),
        ))
        .build();

    transport
        .send(&message)
        .map_err(|e| DeliveryError::Smtp(e.to_string()))?;
    Ok(())
}

fn archive_size(archive: Option<&Path>) -> u64 {
    archive
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0)
}

/// Bundle and deliver the day's reports through every configured sink.
///
/// The cloud sink gets a full bundle; the email sink gets a lightweight
/// one without the screenshot tree. Sinks are attempted independently and
/// sinks with no configuration are skipped silently. A bundling failure
/// fails the cloud sink but the email is still sent, with the missing
/// attachment noted in the body.
pub fn deliver_day(config: &Config, day: &str) -> Vec<DeliveryResult> {
    let mut results = Vec::new();

    if let Some(upload) = &config.upload {
        let result = match bundle::bundle_day(&config.report_root, day, bundle::BundleMode::Full) {
            Ok(archive) => {
                // Size is recorded before the attempt so a failed upload
                // still reports how much it tried to send.
                let bytes = archive_size(Some(archive.as_path()));
                let attempt = BlockingCloudClient::new(upload.clone(), system_id(&config.data_path))
                    .and_then(|client| client.upload(&archive));
                match attempt {
                    Ok(response) => {
                        DeliveryResult::ok("cloud", format!("accepted: {response}"), bytes)
                    }
                    Err(e) => {
                        warn!("cloud delivery failed: {e}");
                        DeliveryResult::failed("cloud", &e, bytes)
                    }
                }
            }
            Err(e) => {
                warn!("could not bundle {day} for upload: {e}");
                DeliveryResult::failed("cloud", &DeliveryError::from(e), 0)
            }
        };
        results.push(result);
    }

    if let Some(email) = &config.email {
        let archive =
            match bundle::bundle_day(&config.report_root, day, bundle::BundleMode::Lightweight) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("could not bundle {day} for email: {e}");
                    None
                }
            };
        let bytes = archive_size(archive.as_deref());
        let result = match send_email(email, day, archive.as_deref()) {
            Ok(()) => DeliveryResult::ok("email", format!("sent to {}", email.to_addr), bytes),
            Err(e) => {
                warn!("email delivery failed: {e}");
                DeliveryResult::failed("email", &e, bytes)
            }
        };
        results.push(result);
    }

    for r in &results {
        info!(
            "delivery via {}: {} ({} bytes) - {}",
            r.sink,
            if r.success { "ok" } else { "failed" },
            r.bytes,
            r.message
        );
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleMode;

    fn email_config() -> EmailConfig {
        EmailConfig {
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 465,
            from_addr: "agent@example.com".to_string(),
            password: "secret".to_string(),
            to_addr: "manager@example.com".to_string(),
            cc: vec!["audit@example.com".to_string()],
            subject: "Daily Report From Vigil".to_string(),
        }
    }

    #[test]
    fn test_system_id_is_stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let first = system_id(dir.path());
        let second = system_id(dir.path());
        assert_eq!(first, second);
        assert!(first.starts_with("agent-"));
    }

    #[test]
    fn test_build_email_with_attachment() {
        let root = tempfile::tempdir().unwrap();
        let day = "13-07-2026";
        let day_dir = root.path().join(day);
        std::fs::create_dir_all(&day_dir).unwrap();
        std::fs::write(day_dir.join("activity_report.txt"), "Working Time: 1\n").unwrap();
        let archive = bundle::bundle_day(root.path(), day, BundleMode::Lightweight).unwrap();

        let message = build_email(&email_config(), day, Some(&archive)).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Daily Report From Vigil - 13-07-2026"));
        assert!(formatted.contains("vigil-report-13-07-2026.zip"));
        assert!(formatted.contains("application/zip"));
    }

    #[test]
    fn test_build_email_without_attachment_notes_it() {
        let message = build_email(&email_config(), "01-01-2026", None).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("No report bundle could be produced"));
        assert!(!formatted.contains("application/zip"));
    }

    #[test]
    fn test_build_email_rejects_bad_address() {
        let mut config = email_config();
        config.to_addr = "not an address".to_string();
        let err = build_email(&config, "01-01-2026", None).unwrap_err();
        assert!(matches!(err, DeliveryError::Config(_)));
    }

    #[test]
    fn test_upload_refuses_unverifiable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.zip");
        std::fs::write(&bad, b"not a zip").unwrap();

        let client = BlockingCloudClient::new(
            UploadConfig {
                url: "http://127.0.0.1:1/upload".to_string(),
                timeout_secs: 1,
            },
            "agent-test".to_string(),
        )
        .unwrap();
        let err = client.upload(&bad).unwrap_err();
        assert!(matches!(err, DeliveryError::Bundle(_)));
    }

    #[test]
    fn test_deliver_day_skips_unconfigured_sinks() {
        let config = Config::default();
        assert!(config.upload.is_none() && config.email.is_none());
        let results = deliver_day(&config, "01-01-2026");
        assert!(results.is_empty());
    }

    #[test]
    fn test_deliver_day_without_day_dir_fails_cloud_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_path = dir.path().to_path_buf();
        config.report_root = dir.path().join("reports");
        config.upload = Some(UploadConfig {
            url: "http://127.0.0.1:1/upload".to_string(),
            timeout_secs: 1,
        });

        let results = deliver_day(&config, "01-01-2026");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sink, "cloud");
        assert!(!results[0].success);
        assert!(results[0].message.contains("does not exist"));
    }

    #[test]
    fn test_sink_failures_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let day = "13-07-2026";
        let day_dir = dir.path().join("reports").join(day);
        std::fs::create_dir_all(&day_dir).unwrap();
        std::fs::write(day_dir.join("activity_report.txt"), "Working Time: 1\n").unwrap();

        // Both sinks point at an unroutable local port and fail fast.
        let mut config = Config::default();
        config.data_path = dir.path().to_path_buf();
        config.report_root = dir.path().join("reports");
        config.upload = Some(UploadConfig {
            url: "http://127.0.0.1:1/upload".to_string(),
            timeout_secs: 1,
        });
        config.email = Some(EmailConfig {
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 1,
            ..email_config()
        });

        let results = deliver_day(&config, day);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sink, "cloud");
        assert_eq!(results[1].sink, "email");
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().all(|r| !r.message.is_empty()));
        // The bundles were created, so even failed attempts carry the
        // payload size they tried to send.
        assert!(results.iter().all(|r| r.bytes > 0));
    }
}

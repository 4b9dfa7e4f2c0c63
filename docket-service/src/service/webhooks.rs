//! Signed status notifications from external processors.

use hmac::{Hmac, Mac};
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use crate::db::{BatchStatus, FileStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::service::DocketService;

type HmacSha256 = Hmac<Sha256>;

const KNOWN_EVENTS: [&str; 3] = [
    "file_processing_completed",
    "batch_processing_completed",
    "processing_error",
];

/// Verify an HMAC-SHA256 signature of `body`.
///
/// Accepts bare hex or `sha256=`-prefixed hex; comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let encoded = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(encoded) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub event_type: String,
}

impl WebhookResponse {
    fn processed(event_type: &str) -> Self {
        Self {
            status: "processed",
            event_type: event_type.to_string(),
        }
    }

    fn ignored(event_type: &str) -> Self {
        Self {
            status: "ignored",
            event_type: event_type.to_string(),
        }
    }
}

impl DocketService {
    /// Authenticate and apply one webhook notification
    pub fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> ServiceResult<WebhookResponse> {
        let mut event_label = "unknown";
        let result = self.authenticate_webhook(body, signature).and_then(|()| {
            let event: WebhookEvent =
                serde_json::from_slice(body).map_err(|e| ServiceError::InvalidRequest {
                    message: format!("Invalid webhook payload: {}", e),
                })?;
            if let Some(known) = KNOWN_EVENTS.iter().find(|k| **k == event.event_type) {
                event_label = *known;
            }
            self.apply_webhook(&event)
        });

        let outcome = match &result {
            Ok(response) => response.status,
            Err(_) => "rejected",
        };
        counter!("docket_webhooks_total", "event" => event_label, "outcome" => outcome)
            .increment(1);
        result
    }

    fn authenticate_webhook(&self, body: &[u8], signature: Option<&str>) -> ServiceResult<()> {
        let Some(secret) = self.config.webhook.secret.as_deref() else {
            warn!("Webhook secret not configured, accepting unsigned notification");
            return Ok(());
        };

        let signature = signature.ok_or_else(|| ServiceError::Unauthorized {
            message: "Missing webhook signature".to_string(),
        })?;
        if !verify_signature(secret, body, signature) {
            warn!("Rejected webhook with invalid signature");
            return Err(ServiceError::Unauthorized {
                message: "Invalid webhook signature".to_string(),
            });
        }
        Ok(())
    }

    fn apply_webhook(&self, event: &WebhookEvent) -> ServiceResult<WebhookResponse> {
        match event.event_type.as_str() {
            "file_processing_completed" => {
                let file_id = required(&event.file_id, "file_id")?;
                let status = match event.status.as_deref().unwrap_or("success") {
                    "success" => FileStatus::ReviewPending,
                    "failed" => FileStatus::ProcessingFailed,
                    other => FileStatus::parse(other)
                        .filter(|s| *s == FileStatus::ReviewPending || s.is_failure())
                        .ok_or_else(|| ServiceError::InvalidRequest {
                            message: format!("File status not accepted from webhook: {}", other),
                        })?,
                };
                self.apply_file_status(file_id, status, event.error.as_deref())?;
            }
            "batch_processing_completed" => {
                let batch_id = required(&event.batch_id, "batch_id")?;
                self.db
                    .get_batch(batch_id)?
                    .ok_or_else(|| ServiceError::BatchNotFound {
                        batch_id: batch_id.to_string(),
                    })?;
                self.check_batch_completion(batch_id)?;
            }
            "processing_error" => {
                let message = event
                    .error
                    .as_deref()
                    .unwrap_or("Processing error reported by webhook");
                if let Some(file_id) = event.file_id.as_deref() {
                    self.apply_file_status(file_id, FileStatus::ProcessingFailed, Some(message))?;
                } else {
                    let batch_id = required(&event.batch_id, "file_id or batch_id")?;
                    if !self
                        .db
                        .set_batch_status(batch_id, BatchStatus::Failed, Some(message))?
                    {
                        return Err(ServiceError::BatchNotFound {
                            batch_id: batch_id.to_string(),
                        });
                    }
                    warn!(batch_id = %batch_id, error = %message, "Batch failed by webhook");
                }
            }
            other => {
                info!(event_type = %other, "Ignoring unknown webhook event");
                return Ok(WebhookResponse::ignored(other));
            }
        }

        Ok(WebhookResponse::processed(&event.event_type))
    }

    /// Out-of-band status write; failures discard the document as the
    /// pipeline does
    fn apply_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> ServiceResult<()> {
        let file = self.require_file(file_id)?;
        let error = if status.is_failure() { error } else { None };
        self.db.set_file_status(file_id, status, error)?;
        info!(file_id = %file_id, status = %status, "File status set by webhook");

        if status.is_failure() {
            self.discard_document(file.document_id.as_deref());
        }
        self.recheck_batch(&file.batch_id);
        Ok(())
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> ServiceResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest {
            message: format!("Missing {} in webhook payload", name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::Providers;
    use crate::service::FileUploadResult;
    use crate::service::test_support::{harness, harness_with_config, text_file};

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature_formats() {
        let body = br#"{"event_type":"processing_error"}"#;
        let signature = sign("s3cret", body);

        assert!(verify_signature("s3cret", body, &signature));
        assert!(verify_signature("s3cret", body, &format!("sha256={}", signature)));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("s3cret", b"tampered", &signature));
        assert!(!verify_signature("s3cret", body, "not-hex"));
        assert!(!verify_signature("s3cret", body, ""));
    }

    #[tokio::test]
    async fn test_secret_requires_valid_signature() {
        let mut config = AppConfig::default();
        config.webhook.secret = Some("s3cret".to_string());
        let h = harness_with_config(config, Providers::default());
        let body = br#"{"event_type":"something_new"}"#;

        assert!(matches!(
            h.service.handle_webhook(body, None),
            Err(ServiceError::Unauthorized { .. })
        ));
        assert!(matches!(
            h.service.handle_webhook(body, Some("deadbeef")),
            Err(ServiceError::Unauthorized { .. })
        ));

        let response = h
            .service
            .handle_webhook(body, Some(&sign("s3cret", body)))
            .unwrap();
        assert_eq!(response, WebhookResponse::ignored("something_new"));
    }

    #[tokio::test]
    async fn test_file_completed_moves_file_to_review() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };

        let body = format!(
            r#"{{"event_type":"file_processing_completed","file_id":"{}"}}"#,
            file_id
        );
        let response = h.service.handle_webhook(body.as_bytes(), None).unwrap();
        assert_eq!(response.status, "processed");

        let file = h.service.get_file(file_id).unwrap();
        assert_eq!(file.status, FileStatus::ReviewPending);
        let batch = h.service.db.get_batch(&outcome.batch_id).unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::ProcessingComplete);
    }

    #[tokio::test]
    async fn test_file_completed_refuses_review_decisions() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };

        for status in ["approved", "rejected", "under_review", "queued", "bogus"] {
            let body = format!(
                r#"{{"event_type":"file_processing_completed","file_id":"{}","status":"{}"}}"#,
                file_id, status
            );
            assert!(matches!(
                h.service.handle_webhook(body.as_bytes(), None),
                Err(ServiceError::InvalidRequest { .. })
            ));
        }
        assert_eq!(h.service.get_file(file_id).unwrap().status, FileStatus::Queued);

        let body = format!(
            r#"{{"event_type":"file_processing_completed","file_id":"{}","status":"embedding_failed","error":"Vector store down"}}"#,
            file_id
        );
        h.service.handle_webhook(body.as_bytes(), None).unwrap();
        let file = h.service.get_file(file_id).unwrap();
        assert_eq!(file.status, FileStatus::EmbeddingFailed);
        assert_eq!(file.error_message.as_deref(), Some("Vector store down"));
    }

    #[tokio::test]
    async fn test_processing_error_fails_file_or_batch() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted {
            file_id,
            document_id,
            ..
        } = &outcome.files[0]
        else {
            panic!("upload was not accepted");
        };

        let body = format!(
            r#"{{"event_type":"processing_error","file_id":"{}","error":"OCR crashed"}}"#,
            file_id
        );
        h.service.handle_webhook(body.as_bytes(), None).unwrap();
        let file = h.service.get_file(file_id).unwrap();
        assert_eq!(file.status, FileStatus::ProcessingFailed);
        assert_eq!(file.error_message.as_deref(), Some("OCR crashed"));
        assert!(h.service.db.get_document(document_id).unwrap().is_none());

        let body = format!(
            r#"{{"event_type":"processing_error","batch_id":"{}","error":"Upstream outage"}}"#,
            outcome.batch_id
        );
        h.service.handle_webhook(body.as_bytes(), None).unwrap();
        let batch = h.service.db.get_batch(&outcome.batch_id).unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.error_message.as_deref(), Some("Upstream outage"));
    }

    #[tokio::test]
    async fn test_malformed_events() {
        let h = harness(Providers::default());

        assert!(matches!(
            h.service.handle_webhook(b"not json", None),
            Err(ServiceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            h.service
                .handle_webhook(br#"{"event_type":"file_processing_completed"}"#, None),
            Err(ServiceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            h.service.handle_webhook(
                br#"{"event_type":"batch_processing_completed","batch_id":"missing"}"#,
                None
            ),
            Err(ServiceError::BatchNotFound { .. })
        ));
    }
}

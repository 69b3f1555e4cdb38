//! Delivery of the evaluation report to the caller's callback URL.
//!
//! Delivery is attempted up to `max_attempts` times. Any non-200 status or transport
//! error triggers a retry after an exponential backoff (1 s, 2 s, 4 s, ... by default).
//! Exhausting every attempt is logged and reported, never escalated.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::contract::{CallbackResponse, CallbackTransport};
use crate::error::TransportError;
use crate::model::EvaluationReport;
use crate::settings::NotifySettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered {
        attempts: u32,
        status: u16,
        body: String,
    },
    GaveUp {
        attempts: u32,
        last_error: String,
    },
    /// No callback URL was supplied.
    Skipped,
}

impl NotifyOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            NotifyOutcome::Delivered { attempts, .. } | NotifyOutcome::GaveUp { attempts, .. } => {
                *attempts
            }
            NotifyOutcome::Skipped => 0,
        }
    }
}

pub struct EvaluationNotifier<T> {
    transport: T,
    settings: NotifySettings,
}

impl<T: CallbackTransport> EvaluationNotifier<T> {
    pub fn new(transport: T, settings: NotifySettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub async fn notify(&self, url: &str, report: &EvaluationReport) -> NotifyOutcome {
        if url.trim().is_empty() {
            warn!(task = %report.task, "[NOTIFY] No evaluation URL supplied, skipping");
            return NotifyOutcome::Skipped;
        }

        let max_attempts = self.settings.max_attempts.max(1);
        let mut backoff = self.settings.initial_backoff();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.transport.post_report(url, report).await {
                Ok(CallbackResponse { status: 200, body }) => {
                    info!(url, attempt, "[NOTIFY] Evaluation report delivered");
                    return NotifyOutcome::Delivered {
                        attempts: attempt,
                        status: 200,
                        body,
                    };
                }
                Ok(CallbackResponse { status, body }) => {
                    warn!(url, attempt, status, body = %body, "[NOTIFY] Callback rejected report");
                    last_error = format!("status {status}: {body}");
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "[NOTIFY] Callback transport failed");
                    last_error = e.to_string();
                }
            }
            if attempt < max_attempts {
                info!(url, delay_ms = backoff.as_millis() as u64, "[NOTIFY] Backing off");
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }

        error!(url, attempts = max_attempts, last_error = %last_error, "[NOTIFY][ERROR] Giving up on evaluation callback");
        NotifyOutcome::GaveUp {
            attempts: max_attempts,
            last_error,
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2)
}

/// JSON POST over `reqwest` with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpCallbackTransport {
    client: reqwest::Client,
}

impl HttpCallbackTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackTransport for HttpCallbackTransport {
    async fn post_report(
        &self,
        url: &str,
        report: &EvaluationReport,
    ) -> Result<CallbackResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .json(report)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(CallbackResponse { status, body })
    }
}

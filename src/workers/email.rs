use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    models::{EmailTemplate, NewEmailLog, OutboxJob},
    outbox::JOB_SEND_EMAIL,
    schema::{email_logs, email_templates},
    state::AppState,
};

use super::{JobExecution, JobHandler};

pub const EMAIL_STATUS_SENT: &str = "sent";
pub const EMAIL_STATUS_FAILED: &str = "failed";

const MAX_SEND_ATTEMPTS: i32 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmailPayload {
    pub template_key: String,
    pub recipient: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Substitutes `{{name}}` placeholders. Unknown placeholders are left in
/// place so a half-filled template is visible in the sent mail rather
/// than silently blanked.
pub fn render_template(text: &str, params: &HashMap<String, String>) -> String {
    let mut rendered = text.to_string();
    for (key, value) in params {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

pub struct SendEmailJob;

impl SendEmailJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for SendEmailJob {
    fn job_type(&self) -> &'static str {
        JOB_SEND_EMAIL
    }

    async fn handle(&self, state: Arc<AppState>, job: OutboxJob) -> JobExecution {
        let payload: SendEmailPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid send-email payload: {err}"),
                }
            }
        };

        let template_key = payload.template_key.clone();
        let state_clone = state.clone();
        let template = match task::spawn_blocking(move || load_template(state_clone, &template_key))
            .await
        {
            Ok(Ok(template)) => template,
            Ok(Err(err)) => {
                warn!(job_id = %job.id, error = %err, "send-email job will retry");
                return JobExecution::Retry {
                    delay: Duration::from_secs(30),
                    error: err,
                };
            }
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "send-email task panicked");
                return JobExecution::Retry {
                    delay: Duration::from_secs(60),
                    error: format!("worker panicked: {join_err}"),
                };
            }
        };

        let Some(template) = template else {
            return JobExecution::Failed {
                error: format!("no active email template {}", payload.template_key),
            };
        };

        let subject = render_template(&template.subject, &payload.params);
        let html = render_template(&template.body_html, &payload.params);

        match state.mailer.send(&payload.recipient, &subject, &html).await {
            Ok(()) => {
                append_log(
                    &state,
                    job.id,
                    &payload.recipient,
                    &subject,
                    EMAIL_STATUS_SENT,
                    None,
                )
                .await;
                JobExecution::Success
            }
            Err(err) => {
                let message = err.to_string();
                append_log(
                    &state,
                    job.id,
                    &payload.recipient,
                    &subject,
                    EMAIL_STATUS_FAILED,
                    Some(message.clone()),
                )
                .await;

                if job.attempts >= MAX_SEND_ATTEMPTS {
                    JobExecution::Failed { error: message }
                } else {
                    JobExecution::Retry {
                        delay: Duration::from_secs(60),
                        error: message,
                    }
                }
            }
        }
    }
}

fn load_template(state: Arc<AppState>, key: &str) -> Result<Option<EmailTemplate>, String> {
    let mut conn = state.db().map_err(|err| format!("{err:?}"))?;
    email_templates::table
        .filter(email_templates::key.eq(key))
        .filter(email_templates::is_active.eq(true))
        .first(&mut conn)
        .optional()
        .map_err(|err| format!("{err:?}"))
}

/// Audit record for every delivery attempt. Log-write failures are
/// logged and swallowed; the job outcome is already decided.
async fn append_log(
    state: &Arc<AppState>,
    outbox_id: Uuid,
    recipient: &str,
    subject: &str,
    status: &str,
    error_message: Option<String>,
) {
    let state = state.clone();
    let row = NewEmailLog {
        id: Uuid::new_v4(),
        outbox_id: Some(outbox_id),
        recipient: recipient.to_string(),
        subject: subject.to_string(),
        status: status.to_string(),
        error: error_message,
    };

    let result = task::spawn_blocking(move || {
        let mut conn = state.db().map_err(|err| format!("{err:?}"))?;
        diesel::insert_into(email_logs::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|err| format!("{err:?}"))
    })
    .await;

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => error!(%err, "failed to append email log"),
        Err(join_err) => error!(error = %join_err, "email log task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders() {
        let mut params = HashMap::new();
        params.insert("name".to_string(), "Dana".to_string());
        params.insert("order_url".to_string(), "https://portal/orders/1".to_string());

        let rendered = render_template("Hi {{name}}, your order: {{order_url}}", &params);
        assert_eq!(rendered, "Hi Dana, your order: https://portal/orders/1");
    }

    #[test]
    fn unknown_placeholders_survive_rendering() {
        let params = HashMap::new();
        let rendered = render_template("Hello {{name}}", &params);
        assert_eq!(rendered, "Hello {{name}}");
    }
}

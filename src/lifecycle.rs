use crate::auth::AuthenticatedUser;
use crate::models::Job;

pub const STATUS_DRAFT: &str = "Draft";
pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_ASSIGNED_TO_DESIGNER: &str = "Assigned to Designer";
pub const STATUS_PROOF_SENT: &str = "Proof Sent";
pub const STATUS_REVISIONS_REQUESTED: &str = "Revisions Requested";
pub const STATUS_COMPLETE: &str = "Complete";
pub const STATUS_CANCELLED: &str = "Cancel Job";

pub const PRIORITY_LOW: &str = "low";
pub const PRIORITY_NORMAL: &str = "normal";
pub const PRIORITY_HIGH: &str = "high";

pub fn is_valid_status(status: &str) -> bool {
    matches!(
        status,
        STATUS_DRAFT
            | STATUS_PENDING
            | STATUS_IN_PROGRESS
            | STATUS_ASSIGNED_TO_DESIGNER
            | STATUS_PROOF_SENT
            | STATUS_REVISIONS_REQUESTED
            | STATUS_COMPLETE
            | STATUS_CANCELLED
    )
}

pub fn is_valid_priority(priority: &str) -> bool {
    matches!(priority, PRIORITY_LOW | PRIORITY_NORMAL | PRIORITY_HIGH)
}

/// Drafts park in `Draft`; everything else enters the workflow at
/// `Pending`.
pub fn initial_status(is_draft: bool) -> &'static str {
    if is_draft {
        STATUS_DRAFT
    } else {
        STATUS_PENDING
    }
}

/// Row-level visibility: clients see their own jobs, designers the jobs
/// assigned to them, managers and admins everything.
pub fn can_view_job(user: &AuthenticatedUser, job: &Job) -> bool {
    if user.is_manager() {
        return true;
    }
    if user.role == crate::auth::ROLE_DESIGNER {
        return job.designer_id == Some(user.user_id);
    }
    job.client_id == user.user_id
}

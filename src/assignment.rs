use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::models::{DesignerAssignment, NewDesignerAssignment};
use crate::schema::designer_assignments;

pub const BUCKET_SELL_SHEETS: &str = "sell_sheets";
pub const BUCKET_VIRTUAL_PROTOTYPES: &str = "virtual_prototypes";
pub const BUCKET_LINE_DRAWINGS: &str = "line_drawings";

/// Package types map onto three fixed job-type buckets. The design
/// package opens with its virtual-prototype deliverable, so it routes to
/// that bucket.
const PACKAGE_TYPE_BUCKETS: &[(&str, &str)] = &[
    ("sell_sheet", BUCKET_SELL_SHEETS),
    ("virtual_prototype", BUCKET_VIRTUAL_PROTOTYPES),
    ("design_package", BUCKET_VIRTUAL_PROTOTYPES),
    ("line_drawing", BUCKET_LINE_DRAWINGS),
];

pub fn bucket_for_package_type(package_type: &str) -> Option<&'static str> {
    PACKAGE_TYPE_BUCKETS
        .iter()
        .find(|(key, _)| *key == package_type)
        .map(|(_, bucket)| *bucket)
}

/// Selection over a bucket's active candidate list. Named so a
/// rotation- or load-aware policy can be swapped in without touching the
/// call sites.
pub trait AssignmentStrategy {
    fn select(&self, candidates: &[DesignerAssignment]) -> Option<Uuid>;
}

/// The shipped policy: lowest priority value wins (0 = highest). Every
/// job in a bucket lands on the same designer until an admin reorders
/// the list.
pub struct HighestPriorityFirst;

impl AssignmentStrategy for HighestPriorityFirst {
    fn select(&self, candidates: &[DesignerAssignment]) -> Option<Uuid> {
        candidates
            .iter()
            .min_by_key(|candidate| candidate.priority)
            .map(|candidate| candidate.designer_id)
    }
}

/// Best-effort designer pick for a new job. Lookup failures are logged
/// and yield no assignment; job creation never fails on this path.
pub fn auto_assign_designer(conn: &mut PgConnection, package_type: &str) -> Option<Uuid> {
    let bucket = bucket_for_package_type(package_type)?;

    let candidates: Vec<DesignerAssignment> = match designer_assignments::table
        .filter(designer_assignments::job_type.eq(bucket))
        .filter(designer_assignments::is_active.eq(true))
        .order(designer_assignments::priority.asc())
        .load(conn)
    {
        Ok(rows) => rows,
        Err(err) => {
            warn!(%bucket, error = %err, "designer assignment lookup failed");
            return None;
        }
    };

    HighestPriorityFirst.select(&candidates)
}

/// Replaces a bucket's candidate list wholesale: existing active rows are
/// deactivated (kept for history) and the new ordered set is inserted
/// with priority = position. Atomic, so a crash cannot leave the bucket
/// half-replaced.
pub fn replace_bucket_assignments(
    conn: &mut PgConnection,
    job_type: &str,
    designer_ids: &[Uuid],
) -> Result<Vec<DesignerAssignment>, diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::update(
            designer_assignments::table
                .filter(designer_assignments::job_type.eq(job_type))
                .filter(designer_assignments::is_active.eq(true)),
        )
        .set(designer_assignments::is_active.eq(false))
        .execute(conn)?;

        let new_rows: Vec<NewDesignerAssignment> = designer_ids
            .iter()
            .enumerate()
            .map(|(index, designer_id)| NewDesignerAssignment {
                id: Uuid::new_v4(),
                job_type: job_type.to_string(),
                designer_id: *designer_id,
                priority: index as i32,
                is_active: true,
            })
            .collect();

        diesel::insert_into(designer_assignments::table)
            .values(&new_rows)
            .execute(conn)?;

        designer_assignments::table
            .filter(designer_assignments::job_type.eq(job_type))
            .filter(designer_assignments::is_active.eq(true))
            .order(designer_assignments::priority.asc())
            .load(conn)
    })
}

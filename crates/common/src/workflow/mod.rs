//! Case status state machine
//!
//! `apply` is pure: it takes a snapshot of the assignment-relevant fields of
//! a case, an action and the clock, and returns the field changes plus the
//! audit entry to append. Handlers load, apply, persist.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{AppError, Result};

/// Case status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    VendorAssigned,
    CandidateAssigned,
    Assigned,
    Submitted,
    Approved,
    Rejected,
    Insufficient,
    Stopped,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 9] = [
        CaseStatus::Pending,
        CaseStatus::VendorAssigned,
        CaseStatus::CandidateAssigned,
        CaseStatus::Assigned,
        CaseStatus::Submitted,
        CaseStatus::Approved,
        CaseStatus::Rejected,
        CaseStatus::Insufficient,
        CaseStatus::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::VendorAssigned => "vendor_assigned",
            CaseStatus::CandidateAssigned => "candidate_assigned",
            CaseStatus::Assigned => "assigned",
            CaseStatus::Submitted => "submitted",
            CaseStatus::Approved => "approved",
            CaseStatus::Rejected => "rejected",
            CaseStatus::Insufficient => "insufficient",
            CaseStatus::Stopped => "stopped",
        }
    }

    /// Statuses that count against TAT
    pub fn is_open_assignment(&self) -> bool {
        matches!(self, CaseStatus::Assigned | CaseStatus::CandidateAssigned)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        CaseStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::invalid(format!("Invalid status: {}", s)))
    }
}

/// An assignee reference with its denormalised display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub name: String,
}

impl Party {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Candidate contact details for self-submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateContact {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

/// Who performed an action, for the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub name: String,
}

impl Actor {
    pub fn new(id: Option<Uuid>, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Assignment-relevant view of a case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSnapshot {
    pub status: CaseStatus,
    pub vendor: Option<Party>,
    pub field_officer: Option<Party>,
    pub candidate: Option<CandidateContact>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub tat_due_date: Option<DateTime<Utc>>,
}

impl CaseSnapshot {
    pub fn pending() -> Self {
        Self {
            status: CaseStatus::Pending,
            vendor: None,
            field_officer: None,
            candidate: None,
            assigned_date: None,
            tat_due_date: None,
        }
    }
}

/// Actions that move a case through its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum CaseAction {
    AssignVendor { vendor: Party },
    Assign {
        vendor: Party,
        officer: Party,
        assigned_date: Option<DateTime<Utc>>,
    },
    UnassignVendor,
    AssignFieldOfficer { officer: Party },
    AssignCandidate { candidate: CandidateContact },
    Submit,
    MarkInsufficient { reason: Option<String> },
    Approve,
    Reject { reason: String },
    Reinitiate,
    SendBack,
    Stop { reason: Option<String> },
    Revert,
}

impl CaseAction {
    /// Audit log action name
    pub fn name(&self) -> &'static str {
        match self {
            CaseAction::AssignVendor { .. } => "assign_vendor",
            CaseAction::Assign { .. } => "assign",
            CaseAction::UnassignVendor => "unassign_vendor",
            CaseAction::AssignFieldOfficer { .. } => "assign_field_officer",
            CaseAction::AssignCandidate { .. } => "assign_candidate",
            CaseAction::Submit => "submit",
            CaseAction::MarkInsufficient { .. } => "mark_insufficient",
            CaseAction::Approve => "approve",
            CaseAction::Reject { .. } => "reject",
            CaseAction::Reinitiate => "reinitiate",
            CaseAction::SendBack => "send_back",
            CaseAction::Stop { .. } => "stop",
            CaseAction::Revert => "revert",
        }
    }
}

/// Change to a nullable field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    /// Resolve against the current value
    pub fn resolve(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Set(value) => Some(value),
            Patch::Clear => None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// Audit log entry appended on every applied action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub performed_by: String,
    pub performed_by_id: Option<Uuid>,
    pub performed_at: DateTime<Utc>,
    pub from_status: CaseStatus,
    pub to_status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Field changes produced by a transition
#[derive(Debug, Clone, PartialEq)]
pub struct CaseUpdate {
    pub status: CaseStatus,
    pub vendor: Patch<Party>,
    pub field_officer: Patch<Party>,
    pub candidate: Patch<CandidateContact>,
    pub assigned_date: Patch<DateTime<Utc>>,
    pub tat_due_date: Patch<DateTime<Utc>>,
    pub completion_date: Patch<DateTime<Utc>>,
    pub submitted_at: Patch<DateTime<Utc>>,
    pub is_late_submission: Option<bool>,
    pub remarks: Option<String>,
    pub history: HistoryEntry,
}

impl CaseUpdate {
    fn new(status: CaseStatus, history: HistoryEntry) -> Self {
        Self {
            status,
            vendor: Patch::Keep,
            field_officer: Patch::Keep,
            candidate: Patch::Keep,
            assigned_date: Patch::Keep,
            tat_due_date: Patch::Keep,
            completion_date: Patch::Keep,
            submitted_at: Patch::Keep,
            is_late_submission: None,
            remarks: None,
            history,
        }
    }

    fn clear_assignment(&mut self) {
        self.vendor = Patch::Clear;
        self.field_officer = Patch::Clear;
        self.candidate = Patch::Clear;
        self.assigned_date = Patch::Clear;
        self.tat_due_date = Patch::Clear;
    }

    fn start_clock(&mut self, at: DateTime<Utc>, tat_days: i64) -> Result<()> {
        self.tat_due_date = Patch::Set(tat_due_date(at, tat_days)?);
        self.assigned_date = Patch::Set(at);
        Ok(())
    }
}

/// Due date for an assignment made at `assigned`
pub fn tat_due_date(assigned: DateTime<Utc>, tat_days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(tat_days)
        .and_then(|span| assigned.checked_add_signed(span))
        .ok_or_else(|| AppError::invalid("Assigned date is out of range"))
}

/// Whether a submission at `submitted_at` misses the due date
pub fn is_late(submitted_at: DateTime<Utc>, due: Option<DateTime<Utc>>) -> bool {
    due.is_some_and(|due| submitted_at > due)
}

fn reject_transition(message: &str) -> AppError {
    AppError::InvalidTransition {
        message: message.to_string(),
    }
}

fn require(current: CaseStatus, allowed: &[CaseStatus], message: &str) -> Result<()> {
    if allowed.contains(&current) {
        Ok(())
    } else {
        Err(reject_transition(message))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply an action to a case snapshot
pub fn apply(
    snapshot: &CaseSnapshot,
    action: CaseAction,
    actor: &Actor,
    now: DateTime<Utc>,
    tat_days: i64,
) -> Result<CaseUpdate> {
    use CaseStatus::*;

    let from = snapshot.status;
    let assignable = [Pending, VendorAssigned, Assigned];
    let action_name = action.name();
    let mut details = None;

    let (to, mut update) = match action {
        CaseAction::AssignVendor { vendor } => {
            require(from, &assignable, "Case cannot be reassigned in its current status")?;
            details = Some(format!("Vendor: {}", vendor.name));
            let mut update = placeholder(VendorAssigned);
            update.vendor = Patch::Set(vendor);
            update.field_officer = Patch::Clear;
            update.assigned_date = Patch::Clear;
            update.tat_due_date = Patch::Clear;
            (VendorAssigned, update)
        }
        CaseAction::Assign { vendor, officer, assigned_date } => {
            require(from, &assignable, "Case cannot be reassigned in its current status")?;
            details = Some(format!("Vendor: {}, Field Officer: {}", vendor.name, officer.name));

            let officer_unchanged = snapshot
                .field_officer
                .as_ref()
                .is_some_and(|current| current.id == officer.id);
            let effective = match (assigned_date, snapshot.assigned_date) {
                (Some(date), _) => date,
                (None, Some(current)) if officer_unchanged => current,
                _ => now,
            };

            let mut update = placeholder(Assigned);
            update.vendor = Patch::Set(vendor);
            update.field_officer = Patch::Set(officer);
            update.candidate = Patch::Clear;
            update.start_clock(effective, tat_days)?;
            (Assigned, update)
        }
        CaseAction::UnassignVendor => {
            require(from, &assignable, "Case cannot be unassigned in its current status")?;
            let mut update = placeholder(Pending);
            update.clear_assignment();
            (Pending, update)
        }
        CaseAction::AssignFieldOfficer { officer } => {
            details = Some(format!("Field Officer: {}", officer.name));
            match from {
                Assigned => {
                    let mut update = placeholder(Assigned);
                    update.field_officer = Patch::Set(officer);
                    (Assigned, update)
                }
                Pending | VendorAssigned | CandidateAssigned => {
                    let mut update = placeholder(Assigned);
                    update.field_officer = Patch::Set(officer);
                    update.candidate = Patch::Clear;
                    update.start_clock(now, tat_days)?;
                    (Assigned, update)
                }
                _ => {
                    return Err(reject_transition(
                        "Field officer cannot be assigned in the current case status",
                    ))
                }
            }
        }
        CaseAction::AssignCandidate { candidate } => {
            require(
                from,
                &[VendorAssigned, Assigned, CandidateAssigned],
                "Case cannot be assigned to a candidate in its current status",
            )?;
            details = Some(format!("Candidate: {}", candidate.name));
            let mut update = placeholder(CandidateAssigned);
            update.field_officer = Patch::Clear;
            update.candidate = Patch::Set(candidate);
            update.start_clock(now, tat_days)?;
            (CandidateAssigned, update)
        }
        CaseAction::Submit => {
            require(
                from,
                &[Assigned, CandidateAssigned],
                "This case is no longer available for submission",
            )?;
            let mut update = placeholder(Submitted);
            update.completion_date = Patch::Set(now);
            update.submitted_at = Patch::Set(now);
            update.is_late_submission = Some(is_late(now, snapshot.tat_due_date));
            (Submitted, update)
        }
        CaseAction::MarkInsufficient { reason } => {
            require(
                from,
                &[Assigned, CandidateAssigned],
                "Only assigned cases can be marked insufficient",
            )?;
            details = non_blank(reason);
            (Insufficient, placeholder(Insufficient))
        }
        CaseAction::Approve => {
            require(from, &[Submitted], "Only submitted cases can be approved")?;
            let mut update = placeholder(Approved);
            update.completion_date = Patch::Set(now);
            (Approved, update)
        }
        CaseAction::Reject { reason } => {
            let reason = non_blank(Some(reason))
                .ok_or_else(|| AppError::invalid("Rejection reason is required"))?;
            require(from, &[Submitted], "Only submitted cases can be rejected")?;
            details = Some(reason.clone());
            let mut update = placeholder(Rejected);
            update.remarks = Some(reason);
            (Rejected, update)
        }
        CaseAction::Reinitiate => {
            require(from, &[Rejected], "Only rejected cases can be re-initiated")?;
            let mut update = placeholder(Pending);
            update.clear_assignment();
            update.completion_date = Patch::Clear;
            update.submitted_at = Patch::Clear;
            update.is_late_submission = Some(false);
            (Pending, update)
        }
        CaseAction::SendBack => {
            require(
                from,
                &[Insufficient],
                "Only insufficient cases can be sent back to Field Officer",
            )?;
            if snapshot.field_officer.is_none() {
                return Err(reject_transition("No Field Officer assigned to this case"));
            }
            (Assigned, placeholder(Assigned))
        }
        CaseAction::Stop { reason } => {
            if matches!(from, Stopped | Approved) {
                return Err(reject_transition(
                    "Stopped or approved cases cannot be stopped",
                ));
            }
            let reason = non_blank(reason);
            details = reason.clone();
            let mut update = placeholder(Stopped);
            update.remarks = reason;
            (Stopped, update)
        }
        CaseAction::Revert => {
            require(from, &[Stopped], "Only stopped cases can be reverted")?;
            let mut update = placeholder(Pending);
            update.clear_assignment();
            (Pending, update)
        }
    };

    update.status = to;
    update.history = HistoryEntry {
        action: action_name.to_string(),
        performed_by: actor.name.clone(),
        performed_by_id: actor.id,
        performed_at: now,
        from_status: from,
        to_status: to,
        details,
    };
    Ok(update)
}

// History is filled in once the target status is known
fn placeholder(status: CaseStatus) -> CaseUpdate {
    CaseUpdate::new(
        status,
        HistoryEntry {
            action: String::new(),
            performed_by: String::new(),
            performed_by_id: None,
            performed_at: DateTime::<Utc>::MIN_UTC,
            from_status: status,
            to_status: status,
            details: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TAT: i64 = 7;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
    }

    fn admin() -> Actor {
        Actor::new(Some(Uuid::new_v4()), "Admin")
    }

    fn vendor() -> Party {
        Party::new(Uuid::new_v4(), "Acme Verifications")
    }

    fn officer() -> Party {
        Party::new(Uuid::new_v4(), "Ravi Kumar")
    }

    fn candidate() -> CandidateContact {
        CandidateContact {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            mobile: "9876543210".into(),
        }
    }

    fn snapshot(status: CaseStatus) -> CaseSnapshot {
        CaseSnapshot {
            status,
            ..CaseSnapshot::pending()
        }
    }

    fn assigned_snapshot() -> CaseSnapshot {
        let assigned = now() - Duration::days(2);
        CaseSnapshot {
            status: CaseStatus::Assigned,
            vendor: Some(vendor()),
            field_officer: Some(officer()),
            candidate: None,
            assigned_date: Some(assigned),
            tat_due_date: Some(tat_due_date(assigned, TAT).unwrap()),
        }
    }

    fn run(snapshot: &CaseSnapshot, action: CaseAction) -> Result<CaseUpdate> {
        apply(snapshot, action, &admin(), now(), TAT)
    }

    fn message(err: AppError) -> String {
        err.to_string()
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in CaseStatus::ALL {
            assert_eq!(status.as_str().parse::<CaseStatus>().unwrap(), status);
        }
        assert!("late_submission".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn test_assign_vendor_from_pending() {
        let v = vendor();
        let update = run(&snapshot(CaseStatus::Pending), CaseAction::AssignVendor { vendor: v.clone() }).unwrap();
        assert_eq!(update.status, CaseStatus::VendorAssigned);
        assert_eq!(update.vendor, Patch::Set(v));
        assert_eq!(update.field_officer, Patch::Clear);
        assert_eq!(update.assigned_date, Patch::Clear);
        assert_eq!(update.tat_due_date, Patch::Clear);
        assert_eq!(update.history.from_status, CaseStatus::Pending);
        assert_eq!(update.history.to_status, CaseStatus::VendorAssigned);
        assert_eq!(update.history.action, "assign_vendor");
        assert_eq!(update.history.performed_by, "Admin");
    }

    #[test]
    fn test_assign_vendor_rejected_after_submission() {
        for status in [CaseStatus::Submitted, CaseStatus::Approved, CaseStatus::Stopped] {
            let err = run(&snapshot(status), CaseAction::AssignVendor { vendor: vendor() }).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_assign_both_sets_tat() {
        let update = run(
            &snapshot(CaseStatus::Pending),
            CaseAction::Assign { vendor: vendor(), officer: officer(), assigned_date: None },
        )
        .unwrap();
        assert_eq!(update.status, CaseStatus::Assigned);
        assert_eq!(update.assigned_date, Patch::Set(now()));
        assert_eq!(update.tat_due_date, Patch::Set(now() + Duration::days(7)));
    }

    #[test]
    fn test_assign_with_explicit_date() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let update = run(
            &snapshot(CaseStatus::VendorAssigned),
            CaseAction::Assign { vendor: vendor(), officer: officer(), assigned_date: Some(date) },
        )
        .unwrap();
        assert_eq!(update.assigned_date, Patch::Set(date));
        assert_eq!(
            update.tat_due_date,
            Patch::Set(Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_assign_date_out_of_range() {
        let err = run(
            &snapshot(CaseStatus::VendorAssigned),
            CaseAction::Assign {
                vendor: vendor(),
                officer: officer(),
                assigned_date: Some(DateTime::<Utc>::MAX_UTC),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Assigned date is out of range");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_assign_same_officer_keeps_date() {
        let current = assigned_snapshot();
        let same = current.field_officer.clone().unwrap();
        let update = run(
            &current,
            CaseAction::Assign { vendor: current.vendor.clone().unwrap(), officer: same, assigned_date: None },
        )
        .unwrap();
        assert_eq!(update.assigned_date, Patch::Set(current.assigned_date.unwrap()));
        assert_eq!(update.tat_due_date, Patch::Set(current.tat_due_date.unwrap()));
    }

    #[test]
    fn test_assign_different_officer_restarts_clock() {
        let current = assigned_snapshot();
        let update = run(
            &current,
            CaseAction::Assign { vendor: current.vendor.clone().unwrap(), officer: officer(), assigned_date: None },
        )
        .unwrap();
        assert_eq!(update.assigned_date, Patch::Set(now()));
    }

    #[test]
    fn test_unassign_vendor_clears_everything() {
        let update = run(&assigned_snapshot(), CaseAction::UnassignVendor).unwrap();
        assert_eq!(update.status, CaseStatus::Pending);
        assert_eq!(update.vendor, Patch::Clear);
        assert_eq!(update.field_officer, Patch::Clear);
        assert_eq!(update.assigned_date, Patch::Clear);
        assert_eq!(update.tat_due_date, Patch::Clear);
    }

    #[test]
    fn test_vendor_assigns_field_officer() {
        let o = officer();
        let update = run(
            &snapshot(CaseStatus::VendorAssigned),
            CaseAction::AssignFieldOfficer { officer: o.clone() },
        )
        .unwrap();
        assert_eq!(update.status, CaseStatus::Assigned);
        assert_eq!(update.field_officer, Patch::Set(o));
        assert_eq!(update.candidate, Patch::Clear);
        assert_eq!(update.tat_due_date, Patch::Set(now() + Duration::days(7)));
    }

    #[test]
    fn test_reassign_field_officer_keeps_dates() {
        let update = run(&assigned_snapshot(), CaseAction::AssignFieldOfficer { officer: officer() }).unwrap();
        assert_eq!(update.status, CaseStatus::Assigned);
        assert!(update.assigned_date.is_keep());
        assert!(update.tat_due_date.is_keep());
    }

    #[test]
    fn test_field_officer_from_candidate_clears_candidate() {
        let mut current = snapshot(CaseStatus::CandidateAssigned);
        current.candidate = Some(candidate());
        let update = run(&current, CaseAction::AssignFieldOfficer { officer: officer() }).unwrap();
        assert_eq!(update.candidate, Patch::Clear);
        assert_eq!(update.status, CaseStatus::Assigned);
    }

    #[test]
    fn test_field_officer_rejected_when_submitted() {
        let err = run(&snapshot(CaseStatus::Submitted), CaseAction::AssignFieldOfficer { officer: officer() }).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_assign_candidate() {
        let update = run(&assigned_snapshot(), CaseAction::AssignCandidate { candidate: candidate() }).unwrap();
        assert_eq!(update.status, CaseStatus::CandidateAssigned);
        assert_eq!(update.field_officer, Patch::Clear);
        assert_eq!(update.candidate, Patch::Set(candidate()));
        assert_eq!(update.assigned_date, Patch::Set(now()));

        let err = run(&snapshot(CaseStatus::Pending), CaseAction::AssignCandidate { candidate: candidate() }).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_submit_on_time() {
        let update = run(&assigned_snapshot(), CaseAction::Submit).unwrap();
        assert_eq!(update.status, CaseStatus::Submitted);
        assert_eq!(update.completion_date, Patch::Set(now()));
        assert_eq!(update.submitted_at, Patch::Set(now()));
        assert_eq!(update.is_late_submission, Some(false));
    }

    #[test]
    fn test_submit_late() {
        let mut current = assigned_snapshot();
        let assigned = now() - Duration::days(8);
        current.assigned_date = Some(assigned);
        current.tat_due_date = Some(tat_due_date(assigned, TAT).unwrap());
        let update = run(&current, CaseAction::Submit).unwrap();
        assert_eq!(update.is_late_submission, Some(true));
    }

    #[test]
    fn test_submit_exactly_at_due_is_not_late() {
        assert!(!is_late(now(), Some(now())));
        assert!(is_late(now() + Duration::seconds(1), Some(now())));
        assert!(!is_late(now(), None));
    }

    #[test]
    fn test_submit_requires_open_assignment() {
        let err = run(&snapshot(CaseStatus::Submitted), CaseAction::Submit).unwrap_err();
        assert_eq!(message(err), "This case is no longer available for submission");
    }

    #[test]
    fn test_mark_insufficient() {
        let update = run(
            &assigned_snapshot(),
            CaseAction::MarkInsufficient { reason: Some("House locked".into()) },
        )
        .unwrap();
        assert_eq!(update.status, CaseStatus::Insufficient);
        assert_eq!(update.history.details.as_deref(), Some("House locked"));
    }

    #[test]
    fn test_approve_only_submitted() {
        let update = run(&snapshot(CaseStatus::Submitted), CaseAction::Approve).unwrap();
        assert_eq!(update.status, CaseStatus::Approved);
        assert_eq!(update.completion_date, Patch::Set(now()));

        let err = run(&snapshot(CaseStatus::Assigned), CaseAction::Approve).unwrap_err();
        assert_eq!(message(err), "Only submitted cases can be approved");
    }

    #[test]
    fn test_reject_requires_reason() {
        let err = run(&snapshot(CaseStatus::Submitted), CaseAction::Reject { reason: "   ".into() }).unwrap_err();
        assert_eq!(message(err), "Rejection reason is required");

        let update = run(
            &snapshot(CaseStatus::Submitted),
            CaseAction::Reject { reason: " Photos blurry ".into() },
        )
        .unwrap();
        assert_eq!(update.status, CaseStatus::Rejected);
        assert_eq!(update.remarks.as_deref(), Some("Photos blurry"));

        let err = run(&snapshot(CaseStatus::Approved), CaseAction::Reject { reason: "x".into() }).unwrap_err();
        assert_eq!(message(err), "Only submitted cases can be rejected");
    }

    #[test]
    fn test_reinitiate_clears_all() {
        let mut current = assigned_snapshot();
        current.status = CaseStatus::Rejected;
        let update = run(&current, CaseAction::Reinitiate).unwrap();
        assert_eq!(update.status, CaseStatus::Pending);
        assert_eq!(update.vendor, Patch::Clear);
        assert_eq!(update.candidate, Patch::Clear);
        assert_eq!(update.completion_date, Patch::Clear);
        assert_eq!(update.submitted_at, Patch::Clear);
        assert_eq!(update.is_late_submission, Some(false));

        let err = run(&snapshot(CaseStatus::Submitted), CaseAction::Reinitiate).unwrap_err();
        assert_eq!(message(err), "Only rejected cases can be re-initiated");
    }

    #[test]
    fn test_send_back() {
        let mut current = assigned_snapshot();
        current.status = CaseStatus::Insufficient;
        let update = run(&current, CaseAction::SendBack).unwrap();
        assert_eq!(update.status, CaseStatus::Assigned);
        assert!(update.tat_due_date.is_keep());
        assert!(update.assigned_date.is_keep());

        let err = run(&snapshot(CaseStatus::Insufficient), CaseAction::SendBack).unwrap_err();
        assert_eq!(message(err), "No Field Officer assigned to this case");

        let err = run(&snapshot(CaseStatus::Submitted), CaseAction::SendBack).unwrap_err();
        assert_eq!(message(err), "Only insufficient cases can be sent back to Field Officer");
    }

    #[test]
    fn test_stop_and_revert() {
        let update = run(&assigned_snapshot(), CaseAction::Stop { reason: Some("Customer withdrew".into()) }).unwrap();
        assert_eq!(update.status, CaseStatus::Stopped);
        assert_eq!(update.remarks.as_deref(), Some("Customer withdrew"));

        let update = run(&snapshot(CaseStatus::Pending), CaseAction::Stop { reason: None }).unwrap();
        assert_eq!(update.remarks, None);

        for status in [CaseStatus::Stopped, CaseStatus::Approved] {
            assert!(run(&snapshot(status), CaseAction::Stop { reason: None }).is_err());
        }

        let mut stopped = assigned_snapshot();
        stopped.status = CaseStatus::Stopped;
        let update = run(&stopped, CaseAction::Revert).unwrap();
        assert_eq!(update.status, CaseStatus::Pending);
        assert_eq!(update.vendor, Patch::Clear);
        assert_eq!(update.tat_due_date, Patch::Clear);

        let err = run(&snapshot(CaseStatus::Pending), CaseAction::Revert).unwrap_err();
        assert_eq!(message(err), "Only stopped cases can be reverted");
    }

    #[test]
    fn test_patch_resolve() {
        assert_eq!(Patch::Keep.resolve(Some(1)), Some(1));
        assert_eq!(Patch::Set(2).resolve(Some(1)), Some(2));
        assert_eq!(Patch::<i32>::Clear.resolve(Some(1)), None);
    }
}

//! De-identified visit projection.
//!
//! Carries only the identity id and visit metadata. Names, DOB and contact
//! channels never reach this type.

use crate::model::identity::IdentityId;
use crate::model::timestamp::{format_date, format_time, Timestamp};
use crate::model::visit::Visit;

/// Visit record safe to hand to downstream collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeidentifiedVisit {
    pub identity_id: IdentityId,
    pub visit_number: u32,
    pub visited_at: Timestamp,
    pub study_code: Option<String>,
}

impl DeidentifiedVisit {
    pub fn from_visit(identity_id: IdentityId, visit: &Visit) -> Self {
        Self {
            identity_id,
            visit_number: visit.visit_number,
            visited_at: visit.visited_at,
            study_code: visit.study_code.clone(),
        }
    }

    pub fn visit_date(&self) -> String {
        format_date(self.visited_at)
    }

    pub fn visit_time(&self) -> String {
        format_time(self.visited_at)
    }
}

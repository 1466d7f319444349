//! Monthly prospect quota guard.

use linkhunter_shared::{Organisation, PlanTier};
use serde::Serialize;

/// Outcome of a quota check. `remaining` is reported whether or not the
/// request is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub remaining: u32,
    pub used: u32,
    pub limit: u32,
    pub plan: PlanTier,
}

/// Check whether `org` may create `requested` more prospects this month.
pub fn check_prospect_quota(org: &Organisation, requested: u32) -> QuotaCheck {
    let limit = org.monthly_prospect_limit;
    let used = org.prospects_used_this_month;
    let remaining = limit.saturating_sub(used);

    QuotaCheck {
        allowed: remaining >= requested,
        remaining,
        used,
        limit,
        plan: org.plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn org(limit: u32, used: u32) -> Organisation {
        Organisation {
            id: "org".into(),
            name: "Acme".into(),
            plan: PlanTier::Starter,
            monthly_prospect_limit: limit,
            prospects_used_this_month: used,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn allows_up_to_the_remaining_allowance() {
        let check = check_prospect_quota(&org(200, 195), 5);
        assert!(check.allowed);
        assert_eq!(check.remaining, 5);

        let check = check_prospect_quota(&org(200, 195), 6);
        assert!(!check.allowed);
        assert_eq!(check.remaining, 5);
        assert_eq!(check.used, 195);
        assert_eq!(check.limit, 200);
    }

    #[test]
    fn overdrawn_org_has_nothing_remaining() {
        let check = check_prospect_quota(&org(200, 240), 1);
        assert!(!check.allowed);
        assert_eq!(check.remaining, 0);
    }

    #[test]
    fn zero_request_is_always_allowed() {
        assert!(check_prospect_quota(&org(200, 200), 0).allowed);
    }
}

//! Subscription offer inference from the quota id.
//!
//! The management API does not expose the offer or its enrolment window, so
//! the type and dates here are a best-effort label. Callers must not treat
//! them as authoritative. Unmatched quota ids classify as `Other`.

use chrono::{DateTime, Duration, Months, Utc};
use vmsync_common::types::SubscriptionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferredSubscription {
    pub subscription_type: SubscriptionType,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Classify `quota_id` and estimate the offer window relative to `now`.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use vmsync_cloud::subscription_type::infer_subscription_type;
/// use vmsync_common::types::SubscriptionType;
///
/// let inferred = infer_subscription_type("AzureForStudents_2018-01-01", Utc::now());
/// assert_eq!(inferred.subscription_type, SubscriptionType::Student);
/// ```
pub fn infer_subscription_type(quota_id: &str, now: DateTime<Utc>) -> InferredSubscription {
    let quota = quota_id.trim().to_ascii_lowercase();

    if quota.starts_with("azureforstudents") {
        // 实际注册日期不可见，按一年前保守估计
        let start = now.checked_sub_months(Months::new(12)).unwrap_or(now);
        let end = start.checked_add_months(Months::new(12)).unwrap_or(now);
        return InferredSubscription {
            subscription_type: SubscriptionType::Student,
            start_date: Some(start),
            end_date: Some(end),
        };
    }

    if quota.contains("freetrial") {
        let start = now - Duration::days(30);
        return InferredSubscription {
            subscription_type: SubscriptionType::FreeTrial,
            start_date: Some(start),
            end_date: Some(start + Duration::days(30)),
        };
    }

    if quota.contains("payasyougo") {
        return InferredSubscription {
            subscription_type: SubscriptionType::PayAsYouGo,
            start_date: Some(now),
            end_date: None,
        };
    }

    if quota.contains("msdn") {
        return InferredSubscription {
            subscription_type: SubscriptionType::Msdn,
            start_date: Some(now.checked_sub_months(Months::new(1)).unwrap_or(now)),
            end_date: None,
        };
    }

    InferredSubscription {
        subscription_type: SubscriptionType::Other,
        start_date: None,
        end_date: None,
    }
}

/// `on|1|true` → `On`, `off|0|false` → `Off`, anything else unchanged.
pub fn normalize_spending_limit(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => "On".to_string(),
        "off" | "0" | "false" => "Off".to_string(),
        _ => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn should_classify_student_quota_with_one_year_window() {
        let now = fixed_now();
        let inferred = infer_subscription_type("AzureForStudents2024", now);
        assert_eq!(inferred.subscription_type, SubscriptionType::Student);
        let start = inferred.start_date.expect("start");
        let end = inferred.end_date.expect("end");
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).single().expect("date"));
        assert_eq!(end, now);
    }

    #[test]
    fn should_classify_free_trial_with_thirty_day_window() {
        let now = fixed_now();
        let inferred = infer_subscription_type("FreeTrial_2014-09-01", now);
        assert_eq!(inferred.subscription_type, SubscriptionType::FreeTrial);
        let start = inferred.start_date.expect("start");
        let end = inferred.end_date.expect("end");
        assert_eq!(end - start, Duration::days(30));
    }

    #[test]
    fn should_classify_pay_as_you_go_and_msdn() {
        let now = fixed_now();
        assert_eq!(
            infer_subscription_type("PayAsYouGo_2014-09-01", now).subscription_type,
            SubscriptionType::PayAsYouGo
        );
        let msdn = infer_subscription_type("MSDN_2014-09-01", now);
        assert_eq!(msdn.subscription_type, SubscriptionType::Msdn);
        assert!(msdn.end_date.is_none());
    }

    #[test]
    fn should_default_to_other_for_unrecognised_quota() {
        for quota in ["", "EnterpriseAgreement_2014-09-01", "Sponsored_2016-01-01"] {
            let inferred = infer_subscription_type(quota, fixed_now());
            assert_eq!(inferred.subscription_type, SubscriptionType::Other);
            assert!(inferred.start_date.is_none());
        }
    }

    #[test]
    fn should_normalize_spending_limit_values() {
        assert_eq!(normalize_spending_limit("true"), "On");
        assert_eq!(normalize_spending_limit("OFF"), "Off");
        assert_eq!(normalize_spending_limit("CurrentPeriodOff"), "CurrentPeriodOff");
    }
}

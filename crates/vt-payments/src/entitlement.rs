//! Premium Entitlement
//!
//! How a confirmed payment moves a user's `premium_until`.

use std::str::FromStr;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// Premium fields on a user record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumEntitlement {
    pub premium_active: bool,
    pub premium_until: DateTime<Utc>,
}

impl PremiumEntitlement {
    /// Active and not yet expired at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_active && self.premium_until > now
    }
}

/// Where a renewal starts counting from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionPolicy {
    /// `now + months`, discarding any remaining time
    ExtendFromNow,
    /// `max(now, premium_until) + months`
    #[default]
    ExtendFromExpiry,
}

impl ExtensionPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExtendFromNow => "extend-from-now",
            Self::ExtendFromExpiry => "extend-from-expiry",
        }
    }

    /// New entitlement after paying for `months`
    pub fn extend(
        &self,
        current: Option<&PremiumEntitlement>,
        months: u32,
        now: DateTime<Utc>,
    ) -> PremiumEntitlement {
        let start = match (self, current) {
            (Self::ExtendFromExpiry, Some(current)) if current.is_active_at(now) => {
                current.premium_until
            }
            _ => now,
        };

        PremiumEntitlement {
            premium_active: true,
            premium_until: add_months(start, months),
        }
    }
}

impl FromStr for ExtensionPolicy {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extend-from-now" | "now" => Ok(Self::ExtendFromNow),
            "extend-from-expiry" | "expiry" => Ok(Self::ExtendFromExpiry),
            other => Err(PaymentError::Config(format!(
                "unknown premium extension policy '{other}'"
            ))),
        }
    }
}

/// Calendar-month addition, clamping to the last day of the month
fn add_months(start: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn unexpired() -> PremiumEntitlement {
        PremiumEntitlement {
            premium_active: true,
            premium_until: now() + Duration::days(20),
        }
    }

    fn expired() -> PremiumEntitlement {
        PremiumEntitlement {
            premium_active: true,
            premium_until: now() - Duration::days(5),
        }
    }

    #[test]
    fn test_from_now_discards_remaining_time() {
        let next = ExtensionPolicy::ExtendFromNow.extend(Some(&unexpired()), 1, now());
        assert_eq!(next.premium_until, Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap());
        assert!(next.premium_active);
    }

    #[test]
    fn test_from_now_on_expired_user() {
        let next = ExtensionPolicy::ExtendFromNow.extend(Some(&expired()), 3, now());
        assert_eq!(next.premium_until, Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_from_expiry_stacks_on_unexpired_user() {
        let current = unexpired();
        let next = ExtensionPolicy::ExtendFromExpiry.extend(Some(&current), 1, now());
        assert_eq!(next.premium_until, Utc.with_ymd_and_hms(2026, 4, 30, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_from_expiry_on_expired_user_starts_now() {
        let next = ExtensionPolicy::ExtendFromExpiry.extend(Some(&expired()), 3, now());
        assert_eq!(next.premium_until, Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_from_expiry_restarts_when_inactive() {
        let mut inactive = unexpired();
        inactive.premium_active = false;
        let next = ExtensionPolicy::ExtendFromExpiry.extend(Some(&inactive), 1, now());
        assert_eq!(next.premium_until, Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_month_end_clamps() {
        let jan31 = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let next = ExtensionPolicy::ExtendFromNow.extend(None, 1, jan31);
        assert_eq!(next.premium_until, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(
            "extend-from-now".parse::<ExtensionPolicy>().unwrap(),
            ExtensionPolicy::ExtendFromNow
        );
        assert_eq!(ExtensionPolicy::default(), ExtensionPolicy::ExtendFromExpiry);
        assert!("stack".parse::<ExtensionPolicy>().is_err());
    }
}

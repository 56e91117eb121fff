//! Post-normalization assessments.

use chrono::NaiveDate;
use hostinfo_canon::patterns::CHAGE_DATE;
use hostinfo_common::timestamp::record_date;
use hostinfo_schema::{Token, TokenSeq};
use tracing::{debug, warn};

/// Default maximum root password age in days.
pub const ROOT_PASSWORD_MAX_AGE_DAYS: i64 = 179;

/// Status when the root password is within policy.
pub const ROOT_PASSWORD_CURRENT: &str = "Root_password_current";

/// Status when the root password must be rotated.
pub const CHANGE_ROOT_PASSWORD: &str = "CHANGE_ROOT_PASSWORD";

/// Key of the normalized `chage -l` line.
const LAST_CHANGE_KEY: &str = "Last_password_change";

/// A policy check applied to a probe's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// Classify the root password age against `max_age_days`.
    RootPasswordAge { max_age_days: i64 },
}

impl Assessment {
    /// Apply the assessment to the tokens of `field`.
    pub fn apply(&self, field: &str, tokens: TokenSeq, today: NaiveDate) -> TokenSeq {
        match self {
            Assessment::RootPasswordAge { max_age_days } => {
                root_password_status(field, &tokens, today, *max_age_days)
            }
        }
    }
}

/// Classify the last root password change.
///
/// The password is current while fewer than `max_age_days + 1` whole days
/// have passed since the change. `never`, a forced change and an
/// unreadable date all require a change.
pub fn root_password_status(
    field: &str,
    tokens: &TokenSeq,
    today: NaiveDate,
    max_age_days: i64,
) -> TokenSeq {
    let reported = tokens
        .get(LAST_CHANGE_KEY)
        .map(|t| t.value().to_string())
        .unwrap_or_default();

    let (status, last_changed) = match parse_change_date(&reported) {
        Some(date) => {
            let age = (today - date).num_days();
            debug!("Root password last changed {} ({} days ago)", date, age);
            let status = if age > max_age_days {
                CHANGE_ROOT_PASSWORD
            } else {
                ROOT_PASSWORD_CURRENT
            };
            (status, record_date(date))
        }
        None => {
            if !is_forced_change(&reported) {
                warn!("Cannot read root password change date: {:?}", reported);
            }
            (CHANGE_ROOT_PASSWORD, reported)
        }
    };

    vec![
        Token::new(field, status),
        Token::new("last_root_changed", last_changed),
    ]
    .into()
}

fn parse_change_date(text: &str) -> Option<NaiveDate> {
    let found = CHAGE_DATE.find(text)?;
    NaiveDate::parse_from_str(found.as_str(), "%b %d, %Y").ok()
}

fn is_forced_change(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("never") || lower.contains("password must be changed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use pretty_assertions::assert_eq;

    const FIELD: &str = "Root_Password_Status";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 10, 2).unwrap()
    }

    fn chage(value: &str) -> TokenSeq {
        vec![Token::new(LAST_CHANGE_KEY, value)].into()
    }

    fn chage_days_ago(days: u64) -> TokenSeq {
        let date = today().checked_sub_days(Days::new(days)).unwrap();
        chage(&date.format("%b %d, %Y").to_string())
    }

    fn status(tokens: &TokenSeq) -> String {
        tokens.get(FIELD).unwrap().value().to_string()
    }

    #[test]
    fn test_179_days_is_current() {
        let out = root_password_status(FIELD, &chage_days_ago(179), today(), 179);
        assert_eq!(status(&out), ROOT_PASSWORD_CURRENT);
    }

    #[test]
    fn test_180_days_needs_change() {
        let out = root_password_status(FIELD, &chage_days_ago(180), today(), 179);
        assert_eq!(status(&out), CHANGE_ROOT_PASSWORD);
    }

    #[test]
    fn test_render() {
        let out = root_password_status(FIELD, &chage("Mar 06, 2020"), today(), 179);
        assert_eq!(
            out.render(),
            "Root_Password_Status='CHANGE_ROOT_PASSWORD'; last_root_changed='2020-03-06'"
        );
    }

    #[test]
    fn test_never_and_forced() {
        for reported in ["never", "password must be changed"] {
            let out = root_password_status(FIELD, &chage(reported), today(), 179);
            assert_eq!(status(&out), CHANGE_ROOT_PASSWORD);
            assert_eq!(out.get("last_root_changed").unwrap().value(), reported);
        }
    }

    #[test]
    fn test_missing_line() {
        let out = root_password_status(FIELD, &TokenSeq::new(), today(), 179);
        assert_eq!(status(&out), CHANGE_ROOT_PASSWORD);
    }

    #[test]
    fn test_assessment_dispatch() {
        let assessment = Assessment::RootPasswordAge {
            max_age_days: ROOT_PASSWORD_MAX_AGE_DAYS,
        };
        let out = assessment.apply(FIELD, chage_days_ago(10), today());
        assert_eq!(status(&out), ROOT_PASSWORD_CURRENT);
    }
}

//! Company payroll settings

use super::common::StringUuid;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_PAY_DAY: u8 = 25;
pub const DEFAULT_CURRENCY: &str = "THB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PayrollConfig {
    pub company_id: StringUuid,
    pub pay_day: u8,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl PayrollConfig {
    pub fn with_defaults(company_id: StringUuid) -> Self {
        Self {
            company_id,
            pay_day: DEFAULT_PAY_DAY,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The next pay date on or after `today`, clamped to the month's last day.
    pub fn next_pay_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        let this_month = pay_date_in_month(today.year(), today.month(), self.pay_day)?;
        if this_month >= today {
            return Some(this_month);
        }
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        pay_date_in_month(year, month, self.pay_day)
    }
}

fn pay_date_in_month(year: i32, month: u32, pay_day: u8) -> Option<NaiveDate> {
    let day = u32::from(pay_day).max(1);
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

/// Current pay cycle as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayCycle {
    pub company_id: StringUuid,
    pub pay_date: NaiveDate,
    pub currency: String,
}

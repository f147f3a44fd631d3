//! Recurring salary obligations and the periods they are reconciled against.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Category of every transaction produced by the schedule reconciler.
pub const SALARY_CATEGORY: &str = "salary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            _ => Err(format!("Invalid frequency: {}", s)),
        }
    }
}

/// When in its period a salary falls due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum PaySchedule {
    /// Day of month, 1..=31; clamped to the month's last day.
    Monthly { due_day: u32 },
    /// ISO weekday, 1 = Monday ..= 7 = Sunday.
    Weekly { due_weekday: u32 },
}

impl PaySchedule {
    pub fn monthly(due_day: u32) -> Result<Self, AppError> {
        if !(1..=31).contains(&due_day) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "due_day must be between 1 and 31, got {}",
                due_day
            )));
        }
        Ok(Self::Monthly { due_day })
    }

    pub fn weekly(due_weekday: u32) -> Result<Self, AppError> {
        if !(1..=7).contains(&due_weekday) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "due_weekday must be between 1 and 7, got {}",
                due_weekday
            )));
        }
        Ok(Self::Weekly { due_weekday })
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Self::Monthly { .. } => Frequency::Monthly,
            Self::Weekly { .. } => Frequency::Weekly,
        }
    }
}

/// A recurring salary obligation. The profile id is the owner id of the
/// transactions generated for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryProfile {
    pub id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub is_active: bool,
    #[serde(flatten)]
    pub schedule: PaySchedule,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    Ok(())
}

/// Upsert payload for a salary profile, keyed by name.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SalaryProfileInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub frequency: Frequency,
    #[validate(range(min = 1, max = 31))]
    pub due_day: Option<u32>,
    #[validate(range(min = 1, max = 7))]
    pub due_weekday: Option<u32>,
}

impl SalaryProfileInput {
    /// Build the schedule; the due field matching `frequency` is required.
    pub fn schedule(&self) -> Result<PaySchedule, AppError> {
        match self.frequency {
            Frequency::Monthly => {
                let day = self.due_day.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("due_day is required for monthly salaries"))
                })?;
                PaySchedule::monthly(day)
            }
            Frequency::Weekly => {
                let weekday = self.due_weekday.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "due_weekday is required for weekly salaries"
                    ))
                })?;
                PaySchedule::weekly(weekday)
            }
        }
    }
}

/// Scope of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// Calendar month, held as its first day.
    Month(NaiveDate),
    /// Monday-anchored week, held as its Monday.
    Week(NaiveDate),
}

impl Period {
    /// Month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        Self::Month(date - Duration::days(i64::from(date.day0())))
    }

    /// Monday-anchored week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        Self::Week(date - Duration::days(i64::from(date.weekday().num_days_from_monday())))
    }

    /// Period of the given granularity containing `date`.
    pub fn containing(frequency: Frequency, date: NaiveDate) -> Self {
        match frequency {
            Frequency::Monthly => Self::month_of(date),
            Frequency::Weekly => Self::week_of(date),
        }
    }

    /// Parse a `YYYY-MM` month key.
    pub fn parse_month(key: &str) -> Result<Self, AppError> {
        NaiveDate::parse_from_str(&format!("{}-01", key.trim()), "%Y-%m-%d")
            .map(Self::Month)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid month: {}", key)))
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Self::Month(_) => Frequency::Monthly,
            Self::Week(_) => Frequency::Weekly,
        }
    }

    /// First day of the period.
    pub fn start(&self) -> NaiveDate {
        match self {
            Self::Month(first) | Self::Week(first) => *first,
        }
    }

    /// Last day of the period (inclusive).
    pub fn end(&self) -> NaiveDate {
        match self {
            Self::Month(first) => last_day_of_month(*first),
            Self::Week(monday) => *monday + Duration::days(6),
        }
    }

    /// `YYYY-MM` for months, the Monday as `YYYY-MM-DD` for weeks.
    pub fn key(&self) -> String {
        match self {
            Self::Month(first) => first.format("%Y-%m").to_string(),
            Self::Week(monday) => monday.format("%Y-%m-%d").to_string(),
        }
    }

    /// Due date of `schedule` within this period, or `None` when the
    /// schedule's frequency does not match the period's granularity.
    pub fn due_date(&self, schedule: &PaySchedule) -> Option<NaiveDate> {
        match (self, schedule) {
            (Self::Month(first), PaySchedule::Monthly { due_day }) => {
                let last = last_day_of_month(*first).day();
                let day = (*due_day).clamp(1, last);
                Some(*first + Duration::days(i64::from(day) - 1))
            }
            (Self::Week(monday), PaySchedule::Weekly { due_weekday }) => {
                let offset = (*due_weekday).clamp(1, 7) - 1;
                Some(*monday + Duration::days(i64::from(offset)))
            }
            _ => None,
        }
    }

    /// Notes field recorded on generated rows, for lookup and debugging.
    pub fn salary_notes(&self, owner_id: Uuid) -> String {
        match self {
            Self::Month(_) => format!("salary_owner_id={};salary_month={}", owner_id, self.key()),
            Self::Week(_) => format!(
                "salary_owner_id={};salary_week_start={}",
                owner_id,
                self.key()
            ),
        }
    }

    /// Deterministic description of a generated salary row.
    pub fn salary_description(&self, name: &str) -> String {
        format!("Salary - {} ({})", name, self.key())
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.frequency(), self.key())
    }
}

/// Last day of the month starting at `first`.
fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_due_day_is_clamped_to_month_end() {
        let feb = Period::parse_month("2026-02").unwrap();
        let leap_feb = Period::parse_month("2028-02").unwrap();
        let schedule = PaySchedule::monthly(31).unwrap();

        assert_eq!(feb.due_date(&schedule), Some(date(2026, 2, 28)));
        assert_eq!(leap_feb.due_date(&schedule), Some(date(2028, 2, 29)));
        assert_eq!(feb.end(), date(2026, 2, 28));
    }

    #[test]
    fn month_end_rolls_over_the_year() {
        let december = Period::parse_month("2026-12").unwrap();
        let schedule = PaySchedule::monthly(31).unwrap();

        assert_eq!(december.end(), date(2026, 12, 31));
        assert_eq!(december.due_date(&schedule), Some(date(2026, 12, 31)));
        assert_eq!(Period::parse_month("2100-02").unwrap().end(), date(2100, 2, 28));
    }

    #[test]
    fn weekly_due_weekday_offsets_from_monday() {
        // 2026-10-16 is a Friday.
        let week = Period::week_of(date(2026, 10, 16));
        assert_eq!(week.start(), date(2026, 10, 12));
        assert_eq!(week.end(), date(2026, 10, 18));
        assert_eq!(week.key(), "2026-10-12");

        assert_eq!(
            week.due_date(&PaySchedule::weekly(1).unwrap()),
            Some(date(2026, 10, 12))
        );
        assert_eq!(
            week.due_date(&PaySchedule::weekly(7).unwrap()),
            Some(date(2026, 10, 18))
        );
    }

    #[test]
    fn mismatched_granularity_has_no_due_date() {
        let month = Period::month_of(date(2026, 10, 16));
        assert_eq!(month.key(), "2026-10");
        assert_eq!(month.due_date(&PaySchedule::weekly(3).unwrap()), None);
    }

    #[test]
    fn containing_picks_granularity_from_frequency() {
        let sunday = date(2026, 11, 1);
        assert_eq!(Period::containing(Frequency::Monthly, sunday).key(), "2026-11");
        assert_eq!(Period::containing(Frequency::Weekly, sunday).key(), "2026-10-26");
    }

    #[test]
    fn notes_and_description_formats() {
        let owner = Uuid::nil();
        let month = Period::parse_month("2026-10").unwrap();
        let week = Period::week_of(date(2026, 10, 14));

        assert_eq!(
            month.salary_notes(owner),
            format!("salary_owner_id={};salary_month=2026-10", owner)
        );
        assert_eq!(
            week.salary_notes(owner),
            format!("salary_owner_id={};salary_week_start=2026-10-12", owner)
        );
        assert_eq!(
            month.salary_description("Nino"),
            "Salary - Nino (2026-10)"
        );
    }

    #[test]
    fn schedule_requires_matching_due_field() {
        let input = SalaryProfileInput {
            name: "Giorgi".into(),
            amount: Decimal::from(1200),
            currency: "GEL".into(),
            frequency: Frequency::Weekly,
            due_day: Some(5),
            due_weekday: None,
        };
        assert!(matches!(input.schedule(), Err(AppError::BadRequest(_))));
        assert!(PaySchedule::monthly(0).is_err());
        assert!(PaySchedule::weekly(8).is_err());
    }

    #[test]
    fn validation_rejects_non_positive_amount_and_out_of_range_day() {
        let input = SalaryProfileInput {
            name: "Giorgi".into(),
            amount: Decimal::ZERO,
            currency: "GEL".into(),
            frequency: Frequency::Monthly,
            due_day: Some(32),
            due_weekday: None,
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("amount"));
        assert!(fields.contains_key("due_day"));
    }
}

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Calendar day of this timestamp, used as the budget ledger key.
    pub fn calendar_date(self) -> CalendarDate {
        CalendarDate(self.0.date())
    }

    /// Signed time elapsed since `earlier`.
    pub fn since(self, earlier: UtcDateTime) -> time::Duration {
        self.0 - earlier.0
    }

    /// This timestamp shifted forward by a standard-library duration.
    pub fn plus(self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    /// This timestamp shifted backward by a standard-library duration.
    pub fn minus(self, duration: Duration) -> Self {
        Self(self.0 - duration)
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("UtcDateTime must be RFC3339 formattable")
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Calendar day in `YYYY-MM-DD` form, as stored in history and budget rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(Date);

impl CalendarDate {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let date = Date::parse(input, &calendar_format()).map_err(|_| {
            ValidationError::InvalidCalendarDate {
                value: input.to_owned(),
            }
        })?;
        Ok(Self(date))
    }

    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub fn into_inner(self) -> Date {
        self.0
    }

    /// The day after this one.
    pub fn next_day(self) -> Self {
        Self(
            self.0
                .next_day()
                .expect("calendar dates in use are far from the representable maximum"),
        )
    }

    /// This date shifted back by whole days.
    pub fn minus_days(self, days: u16) -> Self {
        Self(
            self.0
                .checked_sub(time::Duration::days(i64::from(days)))
                .expect("calendar dates in use are far from the representable minimum"),
        )
    }

    pub fn format_calendar(self) -> String {
        self.0
            .format(&calendar_format())
            .expect("CalendarDate must be YYYY-MM-DD formattable")
    }
}

impl Display for CalendarDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_calendar())
    }
}

impl Serialize for CalendarDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_calendar())
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

fn calendar_format() -> Vec<FormatItem<'static>> {
    time::format_description::parse("[year]-[month]-[day]")
        .expect("calendar format description is valid")
}

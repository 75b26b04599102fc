use super::{Decision, Filter, FilterError};
use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Parse a duration such as `45s`, `15m`, `6h`, `7d` or `1h30m`
pub fn parse_duration(value: &str) -> Result<TimeDelta, FilterError> {
    let invalid = |message: &str| FilterError::InvalidDuration {
        value: value.to_string(),
        message: message.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let amount: i64 = digits
            .parse()
            .map_err(|_| invalid("expected a number before the unit"))?;
        digits.clear();

        let part = match ch {
            's' => TimeDelta::try_seconds(amount),
            'm' => TimeDelta::try_minutes(amount),
            'h' => TimeDelta::try_hours(amount),
            'd' => TimeDelta::try_days(amount),
            _ => return Err(invalid("unknown unit, use s, m, h or d")),
        }
        .ok_or_else(|| invalid("duration out of range"))?;

        total = total
            .checked_add(&part)
            .ok_or_else(|| invalid("duration out of range"))?;
    }

    if !digits.is_empty() {
        return Err(invalid("missing unit, use s, m, h or d"));
    }

    Ok(total)
}

/// Creation time of an object, if set
pub fn created_at(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
    let timestamp = meta.creation_timestamp.as_ref()?;
    let value = serde_json::to_value(timestamp).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Keeps objects whose age lies inside the `--newer-than` / `--older-than`
/// window. Objects without a creation timestamp are kept.
pub struct AgeFilter {
    newer_than: Option<TimeDelta>,
    older_than: Option<TimeDelta>,
    now: DateTime<Utc>,
}

impl AgeFilter {
    pub fn new(newer_than: Option<&str>, older_than: Option<&str>) -> Result<Self, FilterError> {
        Ok(Self {
            newer_than: newer_than.map(parse_duration).transpose()?,
            older_than: older_than.map(parse_duration).transpose()?,
            now: Utc::now(),
        })
    }

    /// Judge ages against a fixed clock
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

impl Filter for AgeFilter {
    fn name(&self) -> &'static str {
        "age"
    }

    fn check(&self, meta: &ObjectMeta) -> Decision {
        let Some(created) = created_at(meta) else {
            return Decision::Keep;
        };
        let age = self.now - created;

        if let Some(limit) = self.newer_than {
            if age > limit {
                return Decision::Skip("older than --newer-than".to_string());
            }
        }
        if let Some(limit) = self.older_than {
            if age < limit {
                return Decision::Skip("newer than --older-than".to_string());
            }
        }
        Decision::Keep
    }
}

//! Money formatting and billing period arithmetic.

use chrono::{Months, TimeZone, Utc};
use marquee_core::types::PlanInterval;
use serde_json::Value;

use crate::BillingError;

/// Merchant reference sent to the gateway: `mq-` plus 32 hex chars.
pub fn generate_tx_ref() -> String {
    format!("mq-{}", uuid::Uuid::new_v4().simple())
}

/// `1999` -> `"19.99"`.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parse a gateway amount into cents. Accepts `"19.99"`, `"20"`, `19.99` and `20`.
pub fn parse_amount(value: &Value) -> Result<i64, BillingError> {
    match value {
        Value::String(s) => parse_decimal(s.trim()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64().filter(|i| *i >= 0) {
                i.checked_mul(100)
                    .ok_or_else(|| BillingError::InvalidAmount(n.to_string()))
            } else {
                parse_decimal(&n.to_string())
            }
        }
        other => Err(BillingError::InvalidAmount(other.to_string())),
    }
}

fn parse_decimal(s: &str) -> Result<i64, BillingError> {
    let invalid = || BillingError::InvalidAmount(s.to_string());

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    // Extra precision past cents is truncated; Chapa sends at most two places.
    let mut cents_str: String = frac.chars().take(2).collect();
    while cents_str.len() < 2 {
        cents_str.push('0');
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let cents: i64 = cents_str.parse().map_err(|_| invalid())?;
    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or_else(invalid)
}

/// End of a billing period that starts at `start_ts` (unix seconds).
///
/// Calendar months; the day is clamped to the end of shorter months.
pub fn period_end(start_ts: i64, interval: PlanInterval) -> i64 {
    let months = interval.months();
    Utc.timestamp_opt(start_ts, 0)
        .single()
        .and_then(|start| start.checked_add_months(Months::new(months)))
        .map(|end| end.timestamp())
        .unwrap_or(start_ts + months as i64 * 30 * 86_400)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap().timestamp()
    }

    #[test]
    fn tx_ref_shape() {
        let r = generate_tx_ref();
        assert!(r.starts_with("mq-"));
        assert_eq!(r.len(), 35);
        assert_ne!(r, generate_tx_ref());
    }

    #[test]
    fn amounts_format_with_two_decimals() {
        assert_eq!(format_amount(1999), "19.99");
        assert_eq!(format_amount(500), "5.00");
        assert_eq!(format_amount(7), "0.07");
    }

    #[test]
    fn amounts_parse_from_strings_and_numbers() {
        assert_eq!(parse_amount(&Value::from("19.99")).unwrap(), 1999);
        assert_eq!(parse_amount(&Value::from("20")).unwrap(), 2000);
        assert_eq!(parse_amount(&Value::from("4.5")).unwrap(), 450);
        assert_eq!(parse_amount(&serde_json::json!(300)).unwrap(), 30000);
        assert_eq!(parse_amount(&serde_json::json!(19.99)).unwrap(), 1999);
        assert!(parse_amount(&Value::from("12,00")).is_err());
        assert!(parse_amount(&Value::from("-3")).is_err());
        assert!(parse_amount(&Value::Null).is_err());
    }

    #[test]
    fn monthly_period_clamps_day() {
        assert_eq!(period_end(ts(2025, 1, 31), PlanInterval::Month), ts(2025, 2, 28));
        assert_eq!(period_end(ts(2024, 1, 31), PlanInterval::Month), ts(2024, 2, 29));
        assert_eq!(period_end(ts(2025, 3, 15), PlanInterval::Month), ts(2025, 4, 15));
    }

    #[test]
    fn yearly_period() {
        assert_eq!(period_end(ts(2024, 2, 29), PlanInterval::Year), ts(2025, 2, 28));
        assert_eq!(period_end(ts(2025, 6, 1), PlanInterval::Year), ts(2026, 6, 1));
    }
}

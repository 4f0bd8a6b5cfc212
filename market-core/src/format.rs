use chrono::{Locale, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const PRICE_SUFFIX: &str = " b";
pub const DEFAULT_LOCALE: Locale = Locale::ru_RU;

const GROUP_SEPARATOR: char = '\u{a0}';
const SHORT_DATE: &str = "%-d %b %Y";
const LONG_DATE: &str = "%-d %B %Y, %H:%M";

/// Integer price grouped in threes, followed by the currency unit.
pub fn format_price(price: i64) -> String {
    let digits = price.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if price < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(ch);
    }
    grouped.push_str(PRICE_SUFFIX);
    grouped
}

pub fn parse_locale(name: &str) -> Locale {
    Locale::try_from(name).unwrap_or_else(|_| {
        tracing::warn!(target: "catalog", locale = %name, "unknown locale, using ru_RU");
        DEFAULT_LOCALE
    })
}

/// Accepts RFC 3339, naive ISO date-times (with `T` or space) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn format_date(raw: &str, locale: Locale) -> String {
    localized(raw, SHORT_DATE, locale)
}

pub fn format_date_full(raw: &str, locale: Locale) -> String {
    localized(raw, LONG_DATE, locale)
}

fn localized(raw: &str, fmt: &str, locale: Locale) -> String {
    match parse_timestamp(raw) {
        Some(naive) => Utc
            .from_utc_datetime(&naive)
            .format_localized(fmt, locale)
            .to_string(),
        None => raw.to_string(),
    }
}

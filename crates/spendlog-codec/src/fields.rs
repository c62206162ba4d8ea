//! Tolerant field parsers

use chrono::{NaiveDate, NaiveTime, Timelike};
use once_cell::sync::OnceCell;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

const DATE_FORMATS: [&str; 2] = [DATE_FORMAT, "%Y/%m/%d"];

/// Parse `yyyy-MM-dd` or `yyyy/MM/dd`
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse `HH:mm`, `HH:mm:ss`, or the positional `HHmm` form
///
/// Seconds are dropped; stored times have minute precision.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        // Spreadsheets drop the leading zero of "0930"
        if s.len() != 3 && s.len() != 4 {
            return None;
        }
        let padded = format!("{:0>4}", s);
        let hour: u32 = padded[..2].parse().ok()?;
        let minute: u32 = padded[2..].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, TIME_FORMAT))
        .ok()
        .and_then(|t| t.with_second(0))
}

/// Parse a price, accepting a currency sign or unit and thousands separators
pub fn parse_amount(s: &str) -> Option<Decimal> {
    static AMOUNT: OnceCell<Regex> = OnceCell::new();
    let re = AMOUNT.get_or_init(|| {
        Regex::new(r"^(?:[¥￥$]\s*)?([-+]?\d+(?:\.\d+)?)\s*(?:元|RMB|CNY)?$").unwrap()
    });

    let cleaned = s.trim().replace(',', "");
    let caps = re.captures(&cleaned)?;
    Decimal::from_str(caps.get(1)?.as_str().trim_start_matches('+')).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

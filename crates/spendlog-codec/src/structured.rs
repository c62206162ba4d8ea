//! JSON array representation

use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;
use crate::types::RawEntry;

#[derive(Serialize)]
struct StoredEntry<'a> {
    category: &'a str,
    product: &'a str,
    price: Value,
    date: &'a str,
    time: &'a str,
    remark: &'a str,
}

/// Prices are written as JSON numbers only when the number prints back as
/// the same text; anything an `f64` would round stays a string.
fn price_value(price: &str) -> Value {
    match serde_json::from_str::<serde_json::Number>(price.trim()) {
        Ok(number) if number.to_string() == price.trim() => Value::Number(number),
        _ => Value::String(price.to_string()),
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn encode(rows: &[RawEntry]) -> Result<String, CodecError> {
    let stored: Vec<StoredEntry<'_>> = rows
        .iter()
        .map(|row| StoredEntry {
            category: &row.category,
            product: &row.product,
            price: price_value(&row.price),
            date: &row.date,
            time: &row.time,
            remark: &row.remark,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&stored)?)
}

/// Decode a JSON array of entry objects
///
/// The document must be an array; elements that are not objects are skipped.
/// Missing keys come back as empty strings.
pub fn decode(content: &str) -> Result<Vec<RawEntry>, CodecError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items: Vec<Value> = serde_json::from_str(content)?;
    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            log::warn!("structured entry {} is not an object, skipped", index);
            continue;
        };
        rows.push(RawEntry {
            category: value_text(obj.get("category")),
            product: value_text(obj.get("product")),
            price: value_text(obj.get("price")),
            date: value_text(obj.get("date")),
            time: value_text(obj.get("time")),
            remark: value_text(obj.get("remark")),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_written_as_number() {
        let row = RawEntry {
            category: "餐饮".to_string(),
            product: "午饭".to_string(),
            price: "25.5".to_string(),
            date: "2024-05-01".to_string(),
            time: "12:30".to_string(),
            remark: "食堂".to_string(),
        };
        let text = encode(&[row.clone()]).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["price"], serde_json::json!(25.5));
        assert_eq!(parsed[0]["date"], "2024-05-01");
        assert_eq!(decode(&text).unwrap(), vec![row]);
    }

    #[test]
    fn test_wide_prices_kept_as_text() {
        let mut row = RawEntry::from_cells(["理财", "基金", "", "2024-05-01", "09:00", ""]);
        for price in ["-1234567.123456789012", "123456789012345678901"] {
            row.price = price.to_string();
            let text = encode(&[row.clone()]).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed[0]["price"], Value::String(price.to_string()));
            assert_eq!(decode(&text).unwrap()[0].price, price);
        }
    }

    #[test]
    fn test_decode_tolerates_missing_and_odd_fields() {
        let text = r#"[{"category": "交通", "price": "12"}, 42, {"product": "x", "price": null}]"#;
        let rows = decode(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, "12");
        assert!(rows[0].date.is_empty());
        assert!(rows[1].price.is_empty());
    }

    #[test]
    fn test_empty_document() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("[]").unwrap().is_empty());
        assert!(decode("{").is_err());
    }
}

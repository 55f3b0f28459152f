//! Total conversions from loosely-typed model values into the typed draft.
//! None of these fail; absent, null or mistyped values become defaults.

use serde_json::{Map, Value};

use crate::core::types::CropBox;

pub fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

/// First non-empty text among `keys`.
pub fn text_of(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text(map.get(*key)))
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_default()
}

pub fn text_or(value: Option<&Value>, default: &str) -> String {
    let raw = text(value);
    if raw.is_empty() {
        default.to_string()
    } else {
        raw
    }
}

/// A non-negative integer index. Floats truncate and numeric strings are
/// accepted. Negative values are no index at all.
pub fn index(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                Some(clamp_u32(unsigned))
            } else if number.as_i64().is_some() {
                None
            } else {
                number.as_f64().and_then(float_index)
            }
        }
        Value::String(raw) => {
            let raw = raw.trim();
            match raw.parse::<u64>() {
                Ok(unsigned) => Some(clamp_u32(unsigned)),
                Err(_) => raw.parse::<f64>().ok().and_then(float_index),
            }
        }
        _ => None,
    }
}

/// Chapter index from an int, float or digit-bearing string such as `"ch1"`.
/// Digits found in a string are read as 1-based. Negative numbers clamp to 0.
pub fn chapter_index(value: Option<&Value>, position: u32) -> u32 {
    match value {
        Some(Value::Number(number)) => index(value).unwrap_or_else(|| {
            if number.as_f64().is_some_and(|raw| raw < 0.0) {
                0
            } else {
                position
            }
        }),
        Some(Value::String(raw)) => {
            let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return position;
            }
            digits
                .parse::<u64>()
                .map(|parsed| clamp_u32(parsed.saturating_sub(1)))
                .unwrap_or(position)
        }
        _ => position,
    }
}

pub fn float(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|number| number.is_finite()).unwrap_or(default)
}

/// A score clamped into `[0, 1]`.
pub fn unit_float(value: Option<&Value>, default: f64) -> f64 {
    float(value, default).clamp(0.0, 1.0)
}

pub fn boolean(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(raw)) => {
            matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
        }
        _ => false,
    }
}

pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text(Some(item)))
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::String(raw)) if !raw.is_empty() => vec![raw.clone()],
        _ => vec![],
    }
}

pub fn index_list(value: Option<&Value>) -> Vec<u32> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|item| index(Some(item))).collect(),
        Some(other) => index(Some(other)).into_iter().collect(),
        None => vec![],
    }
}

pub fn crop_box(value: Option<&Value>) -> CropBox {
    let Some(map) = object(value) else {
        return CropBox::default();
    };
    let defaults = CropBox::default();
    CropBox {
        x: unit_float(map.get("x"), defaults.x),
        y: unit_float(map.get("y"), defaults.y),
        w: unit_float(map.get("w").or_else(|| map.get("width")), defaults.w),
        h: unit_float(map.get("h").or_else(|| map.get("height")), defaults.h),
    }
}

pub fn crop_boxes(value: Option<&Value>) -> Vec<CropBox> {
    array(value)
        .iter()
        .filter(|item| item.is_object())
        .map(|item| crop_box(Some(item)))
        .collect()
}

pub fn object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

pub fn array(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// The value itself when it is an object, otherwise an empty object.
pub fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    }
}

fn float_index(number: f64) -> Option<u32> {
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(clamp_u32(number.trunc() as u64))
}

fn clamp_u32(number: u64) -> u32 {
    u32::try_from(number).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{boolean, chapter_index, crop_box, index, index_list, text, unit_float};

    #[test]
    fn chapter_index_reads_strings_as_one_based() {
        assert_eq!(chapter_index(Some(&json!("ch1")), 7), 0);
        assert_eq!(chapter_index(Some(&json!("chapter_4")), 7), 3);
        assert_eq!(chapter_index(Some(&json!("0")), 7), 0);
        assert_eq!(chapter_index(Some(&json!(2)), 7), 2);
        assert_eq!(chapter_index(Some(&json!(2.9)), 7), 2);
        assert_eq!(chapter_index(Some(&json!(-3)), 7), 0);
        assert_eq!(chapter_index(Some(&json!("intro")), 7), 7);
        assert_eq!(chapter_index(None, 7), 7);
        assert_eq!(chapter_index(Some(&json!(null)), 7), 7);
    }

    #[test]
    fn null_and_containers_become_empty_text() {
        assert_eq!(text(Some(&json!(null))), "");
        assert_eq!(text(Some(&json!(["a"]))), "");
        assert_eq!(text(Some(&json!(3))), "3");
        assert_eq!(text(None), "");
    }

    #[test]
    fn indices_accept_numbers_and_numeric_strings() {
        assert_eq!(index(Some(&json!(4))), Some(4));
        assert_eq!(index(Some(&json!("5"))), Some(5));
        assert_eq!(index(Some(&json!(1.7))), Some(1));
        assert_eq!(index(Some(&json!("x"))), None);
        assert_eq!(index(Some(&json!(-1))), None);
        assert_eq!(index(Some(&json!(-0.5))), None);
        assert_eq!(index(Some(&json!("-2"))), None);
        assert_eq!(index_list(Some(&json!([0, "2", null, 3.0]))), vec![0, 2, 3]);
    }

    #[test]
    fn scores_and_flags_are_coerced() {
        assert_eq!(unit_float(Some(&json!(1.4)), 0.0), 1.0);
        assert_eq!(unit_float(Some(&json!("0.25")), 0.0), 0.25);
        assert!(boolean(Some(&json!("yes"))));
        assert!(!boolean(Some(&json!(null))));
    }

    #[test]
    fn crop_box_clamps_and_defaults() {
        let crop = crop_box(Some(&json!({"x": -0.2, "y": 0.1, "w": 2})));
        assert_eq!(crop.x, 0.0);
        assert_eq!(crop.y, 0.1);
        assert_eq!(crop.w, 1.0);
        assert_eq!(crop.h, 1.0);
    }
}

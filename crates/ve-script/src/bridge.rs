use rhai::{Dynamic, ImmutableString, FLOAT, INT};

pub fn dynamic_to_text(value: &Dynamic) -> String {
    if value.is_unit() {
        return String::new();
    }
    if value.is_string() {
        return value
            .clone()
            .into_immutable_string()
            .map(|text| text.to_string())
            .unwrap_or_default();
    }
    if value.is_map() || value.is_array() {
        return serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
    }
    value.to_string()
}

pub fn dynamic_to_json(value: &Dynamic) -> Option<serde_json::Value> {
    if value.is_unit() {
        return None;
    }
    rhai::serde::from_dynamic::<serde_json::Value>(value).ok()
}

pub fn dynamic_to_float(value: &Dynamic) -> Option<f64> {
    if value.is::<FLOAT>() {
        return Some(value.clone().cast::<FLOAT>());
    }
    if value.is::<INT>() {
        return Some(value.clone().cast::<INT>() as f64);
    }
    if value.is::<ImmutableString>() {
        return parse_float_text(value.clone().cast::<ImmutableString>().as_str());
    }
    None
}

pub fn parse_float_text(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

pub fn parse_size_text(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<u32>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 => {
            Some(value.trunc() as u32)
        }
        _ => None,
    }
}

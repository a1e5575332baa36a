//! Shared output helpers for commands

use gradestore_core::error::Result;
use serde::Serialize;
use serde_json::json;

/// Escape double quotes for records output
pub fn escape_quotes(s: &str) -> String {
    s.replace('"', r#"\""#)
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a JSON status message with extra fields
pub fn print_json_status(status: &str, extra_fields: &[(&str, serde_json::Value)]) -> Result<()> {
    let mut output = json!({ "status": status });

    for (key, value) in extra_fields {
        if let Some(obj) = output.as_object_mut() {
            obj.insert(key.to_string(), value.clone());
        }
    }

    print_json(&output)
}

/// Print the records header line
pub fn print_records_header(mode: &str, extra_fields: &[(&str, &str)]) {
    let mut parts = vec![
        "H gradestore=1 records=1".to_string(),
        format!("mode={}", mode),
    ];

    for (key, value) in extra_fields {
        parts.push(format!("{}={}", key, value));
    }

    println!("{}", parts.join(" "));
}

/// `earned/possible` with integral values printed without a fraction
pub fn ratio(earned: f64, possible: f64) -> String {
    format!("{}/{}", earned, possible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes(r#"Quiz "A""#), r#"Quiz \"A\""#);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(5.0, 10.0), "5/10");
        assert_eq!(ratio(2.5, 4.0), "2.5/4");
    }
}

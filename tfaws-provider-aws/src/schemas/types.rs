//! AWS-specific type definitions

use std::sync::LazyLock;

use regex::Regex;
use tfaws_core::resource::Value;
use tfaws_core::schema::AttributeType;

static GUARDDUTY_FILTER_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_.\-]{3,64}$").ok());

static LEX_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]_?)+$").ok());

static LEX_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\$LATEST$|^[0-9]+$").ok());

static ACCELERATOR_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,62}[A-Za-z0-9])?$").ok()
});

fn string_matching(value: &Value, re: &Option<Regex>, what: &str) -> Result<(), String> {
    match value {
        Value::String(s) if re.as_ref().is_some_and(|re| re.is_match(s)) => Ok(()),
        Value::String(s) => Err(format!("'{}' is not a valid {}", s, what)),
        _ => Err("Expected string".to_string()),
    }
}

fn int_in_range(value: &Value, min: i64, max: i64) -> Result<(), String> {
    match value {
        Value::Int(n) if (min..=max).contains(n) => Ok(()),
        Value::Int(n) => Err(format!("Value must be between {} and {}, got {}", min, max, n)),
        _ => Err("Expected integer".to_string()),
    }
}

/// Global Accelerator name: alphanumerics and hyphens, not starting or ending with a hyphen
pub fn accelerator_name() -> AttributeType {
    AttributeType::Custom {
        name: "AcceleratorName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| string_matching(value, &ACCELERATOR_NAME, "accelerator name"),
    }
}

/// Health check interval: Global Accelerator only accepts 10 or 30 seconds
pub fn health_check_interval() -> AttributeType {
    AttributeType::Custom {
        name: "HealthCheckInterval".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(10 | 30) => Ok(()),
            Value::Int(n) => Err(format!("Health check interval must be 10 or 30, got {}", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

/// Healthy/unhealthy threshold count (1-10)
pub fn threshold_count() -> AttributeType {
    AttributeType::Custom {
        name: "ThresholdCount".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| int_in_range(value, 1, 10),
    }
}

/// Endpoint weight (0-255)
pub fn endpoint_weight() -> AttributeType {
    AttributeType::Custom {
        name: "EndpointWeight".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| int_in_range(value, 0, 255),
    }
}

/// GuardDuty filter name: 3-64 characters of letters, digits, `_`, `.` and `-`
pub fn guardduty_filter_name() -> AttributeType {
    AttributeType::Custom {
        name: "GuardDutyFilterName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| string_matching(value, &GUARDDUTY_FILTER_NAME, "GuardDuty filter name"),
    }
}

/// Lex bot, intent and slot type names: letters separated by single underscores
pub fn lex_name() -> AttributeType {
    AttributeType::Custom {
        name: "LexName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            string_matching(value, &LEX_NAME, "Lex name")?;
            match value.as_str().map(str::len) {
                Some(len) if (1..=100).contains(&len) => Ok(()),
                _ => Err("Lex names must be 1 to 100 characters long".to_string()),
            }
        },
    }
}

/// Lex version: `$LATEST` or a version number
pub fn lex_version() -> AttributeType {
    AttributeType::Custom {
        name: "LexVersion".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| string_matching(value, &LEX_VERSION, "Lex version"),
    }
}

/// Idle session TTL (60 seconds to 24 hours)
pub fn lex_idle_session_ttl() -> AttributeType {
    AttributeType::Custom {
        name: "IdleSessionTtl".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| int_in_range(value, 60, 86400),
    }
}

/// Prompt attempts (1-5)
pub fn lex_max_attempts() -> AttributeType {
    AttributeType::Custom {
        name: "MaxAttempts".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| int_in_range(value, 1, 5),
    }
}

/// NLU confidence threshold (0-1)
pub fn confidence_threshold() -> AttributeType {
    AttributeType::Custom {
        name: "ConfidenceThreshold".to_string(),
        base: Box::new(AttributeType::Float),
        validate: |value| match value.as_float() {
            Some(f) if (0.0..=1.0).contains(&f) => Ok(()),
            Some(f) => Err(format!("Threshold must be between 0 and 1, got {}", f)),
            None => Err("Expected number".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accelerator_names() {
        let t = accelerator_name();
        assert!(t.validate(&Value::from("my-accelerator-1")).is_ok());
        assert!(t.validate(&Value::from("a")).is_ok());
        assert!(t.validate(&Value::from("-leading")).is_err());
        assert!(t.validate(&Value::from("trailing-")).is_err());
        assert!(t.validate(&Value::from("under_score")).is_err());
    }

    #[test]
    fn health_check_interval_is_10_or_30() {
        let t = health_check_interval();
        assert!(t.validate(&Value::Int(10)).is_ok());
        assert!(t.validate(&Value::Int(30)).is_ok());
        assert!(t.validate(&Value::Int(20)).is_err());
    }

    #[test]
    fn guardduty_filter_names() {
        let t = guardduty_filter_name();
        assert!(t.validate(&Value::from("my_filter.v-2")).is_ok());
        assert!(t.validate(&Value::from("ab")).is_err());
        assert!(t.validate(&Value::from("has space")).is_err());
        assert!(t.validate(&Value::from("x".repeat(65))).is_err());
    }

    #[test]
    fn lex_names_and_versions() {
        let name = lex_name();
        assert!(name.validate(&Value::from("OrderFlowers")).is_ok());
        assert!(name.validate(&Value::from("Order_Flowers")).is_ok());
        assert!(name.validate(&Value::from("Order__Flowers")).is_err());
        assert!(name.validate(&Value::from("_Order")).is_err());
        assert!(name.validate(&Value::from("Order1")).is_err());

        let version = lex_version();
        assert!(version.validate(&Value::from("$LATEST")).is_ok());
        assert!(version.validate(&Value::from("12")).is_ok());
        assert!(version.validate(&Value::from("latest")).is_err());
    }

    #[test]
    fn ranges() {
        assert!(threshold_count().validate(&Value::Int(11)).is_err());
        assert!(endpoint_weight().validate(&Value::Int(255)).is_ok());
        assert!(lex_idle_session_ttl().validate(&Value::Int(59)).is_err());
        assert!(confidence_threshold().validate(&Value::Float(0.4)).is_ok());
        assert!(confidence_threshold().validate(&Value::Int(2)).is_err());
    }
}

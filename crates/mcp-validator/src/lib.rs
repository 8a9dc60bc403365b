//! Pluggable payload validation (§4.6).
//!
//! The runtime does not ship a JSON Schema engine — schema validators are an
//! external collaborator wired in through the [`Validator`] predicate trait.
//! This crate only owns the mode switch (`Off`/`Warn`/`Strict`) and the
//! field-error shape handlers report through.

use std::fmt;

use serde_json::Value;

use mcp_core::Error;

/// Which side of the wire a payload is being checked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A validation failure as a list of field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// An external schema/shape checker. Implementations never see anything
/// about transport or routing — just a method name, a direction, and a
/// JSON payload.
pub trait Validator: Send + Sync {
    fn validate(&self, method: &str, direction: Direction, payload: &Value) -> Result<(), FieldErrors>;
}

/// A validator that accepts everything. Used as the default when validation
/// is off, so callers never need to special-case a missing validator.
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _method: &str, _direction: Direction, _payload: &Value) -> Result<(), FieldErrors> {
        Ok(())
    }
}

/// How a failed [`Validator::validate`] call is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Validation is not run at all.
    Off,
    /// Failures are logged and the payload passes through unchanged.
    Warn,
    /// Failures are rejected with `-32602 InvalidParams`.
    Strict,
}

impl ValidationMode {
    /// Runs `validator` according to this mode, returning an error only in
    /// [`ValidationMode::Strict`].
    pub fn apply(
        &self,
        validator: &dyn Validator,
        method: &str,
        direction: Direction,
        payload: &Value,
    ) -> Result<(), Error> {
        match self {
            ValidationMode::Off => Ok(()),
            ValidationMode::Warn => {
                if let Err(errors) = validator.validate(method, direction, payload) {
                    tracing::warn!(method, ?direction, %errors, "payload failed validation");
                }
                Ok(())
            }
            ValidationMode::Strict => validator
                .validate(method, direction, payload)
                .map_err(|errors| Error::InvalidParams(errors.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct RequireName;

    impl Validator for RequireName {
        fn validate(&self, _method: &str, _direction: Direction, payload: &Value) -> Result<(), FieldErrors> {
            if payload.get("name").is_none() {
                Err(FieldErrors(vec![FieldError::new("name", "required field missing")]))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn off_mode_never_fails() {
        let mode = ValidationMode::Off;
        let result = mode.apply(&RequireName, "tools/call", Direction::Inbound, &json!({}));
        assert!(result.is_ok());
    }

    #[test]
    fn warn_mode_logs_but_does_not_fail() {
        let mode = ValidationMode::Warn;
        let result = mode.apply(&RequireName, "tools/call", Direction::Inbound, &json!({}));
        assert!(result.is_ok());
    }

    #[test]
    fn strict_mode_rejects_with_invalid_params() {
        let mode = ValidationMode::Strict;
        let result = mode.apply(&RequireName, "tools/call", Direction::Inbound, &json!({}));
        assert!(matches!(result.unwrap_err(), Error::InvalidParams(_)));
    }

    #[test]
    fn strict_mode_passes_valid_payloads() {
        let mode = ValidationMode::Strict;
        let result = mode.apply(&RequireName, "tools/call", Direction::Inbound, &json!({"name": "x"}));
        assert!(result.is_ok());
    }
}

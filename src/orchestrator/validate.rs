use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::errors::{FieldViolation, SightlineError};
use crate::models::{sanitize_target, ScanModule, ScanPlan, ScanRequest, ScanType};

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

/// Validate a raw request into a [`ScanPlan`].
///
/// Collects every violation rather than stopping at the first, so callers
/// can display all problems at once.
pub fn validate_request(request: &ScanRequest) -> Result<ScanPlan, SightlineError> {
    let mut violations = Vec::new();

    let target = sanitize_target(&request.target);
    if target.is_empty() {
        violations.push(FieldViolation::new(
            "target",
            "must not be empty after sanitization",
        ));
    }

    let scan_type = match ScanType::parse(&request.scan_type) {
        Some(t) => Some(t),
        None => {
            violations.push(FieldViolation::new(
                "scanType",
                format!("unknown scan type '{}'", request.scan_type),
            ));
            None
        }
    };

    // Email lookups additionally require an address-shaped target.
    if let (Some(ScanType::EmailLookup), false) = (scan_type, target.is_empty()) {
        if !email_regex().is_match(&target) {
            violations.push(FieldViolation::new(
                "target",
                format!("'{}' is not a valid email address", target),
            ));
        }
    }

    let mut modules = BTreeSet::new();
    for raw in &request.modules {
        match ScanModule::parse(raw) {
            Some(module) => {
                modules.insert(module);
            }
            None => violations.push(FieldViolation::new(
                "modules",
                format!("unknown module '{}'", raw),
            )),
        }
    }

    if request.timeout_secs == 0 {
        violations.push(FieldViolation::new("timeout", "must be greater than zero"));
    }

    if !violations.is_empty() {
        return Err(SightlineError::validation(violations));
    }

    Ok(ScanPlan {
        target,
        scan_type: scan_type.expect("checked above"),
        modules,
        options: request.options.clone(),
        timeout_secs: request.timeout_secs,
        retries: request.retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SightlineError;

    #[test]
    fn test_valid_email_lookup() {
        let request = ScanRequest::new("a@b.com", "email_lookup", &["email_verification"]);
        let plan = validate_request(&request).unwrap();
        assert_eq!(plan.target, "a@b.com");
        assert_eq!(plan.scan_type, ScanType::EmailLookup);
        assert!(plan.modules.contains(&ScanModule::EmailVerification));
    }

    #[test]
    fn test_all_violations_collected() {
        let mut request = ScanRequest::new("", "not_a_type", &["crystal_ball"]);
        request.timeout_secs = 0;
        let err = validate_request(&request).unwrap_err();
        match err {
            SightlineError::Validation(v) => {
                let fields = v.fields();
                assert!(fields.contains(&"target"));
                assert!(fields.contains(&"scanType"));
                assert!(fields.contains(&"modules"));
                assert!(fields.contains(&"timeout"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_target_is_sanitized() {
        let request = ScanRequest::new("  <b>example.com</b>  ", "domain_scan", &[]);
        let plan = validate_request(&request).unwrap();
        assert_eq!(plan.target, "bexample.comb");
    }

    #[test]
    fn test_email_lookup_rejects_non_address() {
        let request = ScanRequest::new("example.com", "email_lookup", &[]);
        let err = validate_request(&request).unwrap_err();
        assert!(err.to_string().contains("not a valid email address"));
    }

    #[test]
    fn test_duplicate_modules_collapse() {
        let request = ScanRequest::new("a@b.com", "email_lookup", &["whois", "whois"]);
        let plan = validate_request(&request).unwrap();
        assert_eq!(plan.modules.len(), 1);
    }
}

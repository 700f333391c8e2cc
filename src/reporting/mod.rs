use serde_json::Value;

use crate::models::ScanPlan;

/// Markdown summary of a completed scan, stored on its history entry.
pub fn format_scan_report(plan: &ScanPlan, results: &Value) -> String {
    let modules: Vec<&str> = plan.modules.iter().map(|m| m.as_str()).collect();
    let finding_count = results["findings"].as_array().map_or(0, |f| f.len());

    let mut report = format!(
        "## Scan Report\n\n**Target:** {}\n**Type:** {}\n**Modules:** {}\n**Findings:** {}\n",
        plan.target,
        plan.scan_type,
        if modules.is_empty() {
            "none".to_string()
        } else {
            modules.join(", ")
        },
        finding_count,
    );

    if let Some(findings) = results["findings"].as_array() {
        for finding in findings {
            let title = finding["title"].as_str().unwrap_or("untitled");
            let severity = finding["severity"].as_str().unwrap_or("info");
            report.push_str(&format!("\n- [{}] {}", severity, title));
        }
    }

    report
}

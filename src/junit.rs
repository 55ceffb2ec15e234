//! JUnit XML rendering of evaluation results for CI dashboards.
use crate::eval::TestResult;

const DEFAULT_FAILURE: &str = "assertion failed";

/// Render a single `<testsuite>`; failed cases carry a `<failure>` whose
/// message is the recorded error, or `assertion failed` when there is none.
pub fn junit_xml(suite: &str, results: &[TestResult], timestamp: &str) -> String {
    let failures = results.iter().filter(|result| !result.passed).count();
    let suite = escape_xml(suite);
    let mut xml = String::from("<?xml version='1.0' encoding='utf-8'?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"{suite}\" tests=\"{}\" failures=\"{failures}\" errors=\"0\" time=\"0\" timestamp=\"{}\">\n",
        results.len(),
        escape_xml(timestamp)
    ));
    for result in results {
        let name = escape_xml(&result.name);
        if result.passed {
            xml.push_str(&format!(
                "  <testcase name=\"{name}\" classname=\"{suite}\" time=\"0\" />\n"
            ));
            continue;
        }
        let message = escape_xml(result.error.as_deref().unwrap_or(DEFAULT_FAILURE));
        xml.push_str(&format!(
            "  <testcase name=\"{name}\" classname=\"{suite}\" time=\"0\">\n"
        ));
        xml.push_str(&format!(
            "    <failure message=\"{message}\" type=\"AssertionError\">{message}</failure>\n"
        ));
        xml.push_str("  </testcase>\n");
    }
    xml.push_str("</testsuite>\n");
    xml
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            ch if ch.is_control() && ch != '\t' => {}
            ch => escaped.push(ch),
        }
    }
    escaped
}

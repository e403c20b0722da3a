//! XCCDF results parsing.
//!
//! Works on both plain XCCDF result documents and ARF bundles: every
//! `rule-result` element is collected regardless of namespace prefix or
//! nesting depth.

use compliance_core::{Finding, RuleResult, Severity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::ExecutorError;

#[derive(Default)]
struct PendingRule {
    rule_id: String,
    severity: Severity,
    result: Option<String>,
}

/// Extract findings from an XCCDF results document.
///
/// Rules reported as `notselected` are skipped. A document without any
/// XCCDF result structure is a parse failure.
pub fn parse_results(xml: &str) -> Result<Vec<Finding>, ExecutorError> {
    let mut reader = Reader::from_str(xml);
    let mut findings = Vec::new();
    let mut pending: Option<PendingRule> = None;
    let mut in_result = false;
    let mut saw_results = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ExecutorError::parse_failure(format!(
                "malformed XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"rule-result" => {
                    saw_results = true;
                    pending = Some(start_rule(&e)?);
                }
                b"result" if pending.is_some() => in_result = true,
                b"TestResult" => saw_results = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                // A rule-result with no children has no outcome
                b"rule-result" => {
                    saw_results = true;
                    push_finding(&mut findings, start_rule(&e)?);
                }
                b"TestResult" => saw_results = true,
                _ => {}
            },
            Event::Text(t) if in_result => {
                let text = t
                    .unescape()
                    .map_err(|e| ExecutorError::parse_failure(format!("bad result text: {e}")))?;
                if let Some(rule) = pending.as_mut() {
                    rule.result
                        .get_or_insert_with(String::new)
                        .push_str(text.trim());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"result" => in_result = false,
                b"rule-result" => {
                    if let Some(rule) = pending.take() {
                        push_finding(&mut findings, rule);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_results {
        return Err(ExecutorError::parse_failure(
            "document contains no XCCDF test results",
        ));
    }
    Ok(findings)
}

fn start_rule(element: &BytesStart<'_>) -> Result<PendingRule, ExecutorError> {
    let mut rule = PendingRule::default();
    for attr in element.attributes() {
        let attr =
            attr.map_err(|e| ExecutorError::parse_failure(format!("bad attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| ExecutorError::parse_failure(format!("bad attribute value: {e}")))?;
        match attr.key.local_name().as_ref() {
            b"idref" => rule.rule_id = value.into_owned(),
            b"severity" => rule.severity = Severity::from_xccdf(&value),
            _ => {}
        }
    }
    if rule.rule_id.is_empty() {
        return Err(ExecutorError::parse_failure("rule-result without idref"));
    }
    Ok(rule)
}

fn push_finding(findings: &mut Vec<Finding>, rule: PendingRule) {
    let raw = rule.result.unwrap_or_else(|| String::from("unknown"));
    if let Some(result) = RuleResult::from_xccdf(&raw) {
        findings.push(Finding::new(rule.rule_id, result, rule.severity));
    }
}

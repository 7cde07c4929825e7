// crates/verdict-core/src/runtime/template.rs
// ============================================================================
// Module: Verdict Action Templates
// Description: FEEL-subset evaluation for action-result tokens.
// Purpose: Substitute fact variables and apply `string join` in emitted
//          action tokens.
// Dependencies: crate::core, regex, serde_json
// ============================================================================

//! ## Overview
//! Action results are usually single opaque tokens, but a rule may emit a
//! micro-template: `{name}` substitutes the fact value at `name` (missing
//! keys yield the empty string), and `string join(...)` joins alternating
//! value/separator arguments. Any evaluation error returns the original
//! template unchanged — template faults never reach the engine's hot path.
//!
//! Contract decision: the two-argument form `string join(v, sep)` returns
//! `v`; a single value joined with a separator is the value itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;

use crate::core::FactMap;
use crate::runtime::evaluator::canonical_text;

// ============================================================================
// SECTION: Template Detection
// ============================================================================

/// Returns the compiled `string join(...)` matcher.
fn join_matcher() -> Option<&'static Regex> {
    static MATCHER: OnceLock<Option<Regex>> = OnceLock::new();
    MATCHER.get_or_init(|| Regex::new(r"(?i)string\s+join\s*\(([^)]*)\)").ok()).as_ref()
}

/// Returns `true` when the action result needs template evaluation.
#[must_use]
pub fn is_template(action_result: &str) -> bool {
    action_result.contains('{') || action_result.to_ascii_lowercase().contains("string join")
}

// ============================================================================
// SECTION: Expansion
// ============================================================================

/// Expands a FEEL-subset action template against a fact map.
///
/// Plain tokens pass through untouched; faulty templates return the original
/// string unchanged.
#[must_use]
pub fn expand(action_result: &str, facts: &FactMap) -> String {
    let template = action_result.trim();
    if !is_template(template) {
        return action_result.to_string();
    }
    expand_template(template, facts).unwrap_or_else(|| action_result.to_string())
}

/// Inner expansion; `None` signals a fault and restores the original.
fn expand_template(template: &str, facts: &FactMap) -> Option<String> {
    if let Some(matcher) = join_matcher()
        && let Some(captures) = matcher.captures(template)
    {
        let args = split_arguments(captures.get(1)?.as_str());
        let resolved: Vec<String> = args.iter().map(|arg| resolve_argument(arg, facts)).collect();
        return Some(join_values(&resolved));
    }
    Some(substitute_variables(template, facts))
}

/// Splits a comma-separated argument list respecting single and double quotes.
fn split_arguments(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match ch {
            '"' | '\'' => {
                match quote {
                    Some(open) if open == ch => quote = None,
                    None => quote = Some(ch),
                    Some(_) => {}
                }
                current.push(ch);
            }
            ',' if quote.is_none() => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    args.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        args.push(trimmed.to_string());
    }
    args
}

/// Resolves one argument: quoted literal, `{name}` reference, or bare name.
fn resolve_argument(arg: &str, facts: &FactMap) -> String {
    let quoted = (arg.starts_with('"') && arg.ends_with('"') && arg.len() >= 2)
        || (arg.starts_with('\'') && arg.ends_with('\'') && arg.len() >= 2);
    if quoted {
        return arg[1 .. arg.len() - 1].to_string();
    }
    if arg.starts_with('{') && arg.ends_with('}') && arg.len() >= 2 {
        let name = arg[1 .. arg.len() - 1].trim();
        return facts.get(name).map(canonical_text).unwrap_or_default();
    }
    facts.get(arg).map_or_else(|| arg.to_string(), canonical_text)
}

/// Joins resolved arguments as alternating value/separator pairs.
///
/// Even indices are values, the first separator joins them; two arguments
/// join nothing and return the first value.
fn join_values(resolved: &[String]) -> String {
    if resolved.len() >= 3 {
        let separator = resolved[1].as_str();
        let values: Vec<&str> = resolved
            .iter()
            .step_by(2)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .collect();
        return values.join(separator);
    }
    if resolved.len() == 2 {
        return resolved[0].clone();
    }
    resolved.concat()
}

/// Substitutes every `{name}` reference; missing keys yield `""`.
fn substitute_variables(template: &str, facts: &FactMap) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[.. open]);
        let tail = &rest[open + 1 ..];
        if let Some(close) = tail.find('}') {
            let name = tail[.. close].trim();
            if let Some(value) = facts.get(name) {
                output.push_str(&canonical_text(value));
            }
            rest = &tail[close + 1 ..];
        } else {
            output.push('{');
            rest = tail;
        }
    }
    output.push_str(rest);
    output
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;

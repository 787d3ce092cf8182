use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{
    DEFAULT_RETRY_DELAY_MS, DEFAULT_STEP_TIMEOUT_MS, FailureStrategy, Scenario, ScenarioStep,
};
use crate::{
    error::{Error, Result},
    variable::display_value,
};

const DEFAULT_SCENARIO_NAME: &str = "Unnamed Scenario";

impl Scenario {
    /// Parses a JSON scenario definition.
    ///
    /// ```json
    /// {
    ///   "name": "Login flow",
    ///   "failureStrategy": "RETRY",
    ///   "retryCount": 2,
    ///   "retryDelayMs": 200,
    ///   "steps": [
    ///     { "id": "login", "method": "POST", "url": "http://localhost/login",
    ///       "body": "{\"user\":\"demo\"}", "extract": { "token": "$.token" } },
    ///     { "id": "me", "url": "http://localhost/me",
    ///       "headers": { "Authorization": "Bearer ${login.token}" } }
    ///   ]
    /// }
    /// ```
    ///
    /// Lenient where it can be: unknown strategies fall back to `STOP`, unknown
    /// methods to `GET`, non-string header and extract values are stringified.
    /// Only a malformed document, a missing step list, or a step without an id
    /// or url is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| invalid(format!("failed to parse scenario JSON: {e}")))?;
        let root = document
            .as_object()
            .ok_or_else(|| invalid("JSON root must be an object"))?;

        let steps = match root.get("steps") {
            Some(Value::Array(steps)) if !steps.is_empty() => steps
                .iter()
                .enumerate()
                .map(|(i, step)| parse_step(i, step))
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(invalid("scenario must have at least one step")),
        };

        let scenario = Scenario {
            name: text(root, "name").unwrap_or_else(|| DEFAULT_SCENARIO_NAME.to_string()),
            steps,
            failure_strategy: text(root, "failureStrategy")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            retry_count: number(root, "retryCount")
                .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
                .unwrap_or(0),
            retry_delay_ms: number(root, "retryDelayMs")
                .map(|n| n.max(0) as u64)
                .unwrap_or(DEFAULT_RETRY_DELAY_MS),
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

fn parse_step(index: usize, value: &Value) -> Result<ScenarioStep> {
    let step = value
        .as_object()
        .ok_or_else(|| invalid(format!("step #{index} must be an object")))?;

    let id = text(step, "id")
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| invalid(format!("step #{index} must have an id")))?;
    let url = text(step, "url")
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| invalid(format!("step must have a url: {id}")))?;

    Ok(ScenarioStep {
        name: text(step, "name").unwrap_or_else(|| id.clone()),
        method: text(step, "method")
            .and_then(|m| m.parse().ok())
            .unwrap_or_default(),
        url,
        headers: string_map(step, "headers"),
        body: text(step, "body"),
        extract: string_map(step, "extract"),
        timeout_ms: number(step, "timeoutMs")
            .filter(|&ms| ms > 0)
            .map_or(DEFAULT_STEP_TIMEOUT_MS, |ms| ms as u64),
        id,
    })
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidDefinition(reason.into())
}

/// String form of a field; `null` and absent are both `None`.
fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        value => Some(display_value(value).into_owned()),
    }
}

/// Numeric fields only; anything else counts as absent.
fn number(object: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = object.get(key)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn string_map(object: &Map<String, Value>, key: &str) -> HashMap<String, String> {
    match object.get(key) {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), display_value(v).into_owned()))
            .collect(),
        _ => HashMap::new(),
    }
}

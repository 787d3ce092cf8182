//! Per-iteration variable storage and `${step.var}` placeholder substitution.
use std::{borrow::Cow, collections::HashMap, sync::LazyLock};

use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid placeholder regex pattern"));

/// Values extracted during one scenario iteration, keyed by step id then
/// variable name.
///
/// One context exists per iteration and is only touched by that iteration's
/// own sequential task, so it needs no synchronization.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VariableContext {
    steps: HashMap<String, HashMap<String, Value>>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, overwriting any previous value under the same key.
    pub fn put(&mut self, step_id: impl Into<String>, var_name: impl Into<String>, value: Value) {
        self.steps
            .entry(step_id.into())
            .or_default()
            .insert(var_name.into(), value);
    }

    pub fn get(&self, step_id: &str, var_name: &str) -> Option<&Value> {
        self.steps.get(step_id)?.get(var_name)
    }

    /// Owned lookup, for callers that outlive the context.
    pub fn find(&self, step_id: &str, var_name: &str) -> Option<Value> {
        self.get(step_id, var_name).cloned()
    }

    pub fn contains(&self, step_id: &str, var_name: &str) -> bool {
        self.get(step_id, var_name).is_some()
    }

    /// Snapshot of every variable one step produced; empty if it produced none.
    pub fn step_variables(&self, step_id: &str) -> HashMap<String, Value> {
        self.steps.get(step_id).cloned().unwrap_or_default()
    }

    pub fn all(&self) -> &HashMap<String, HashMap<String, Value>> {
        &self.steps
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

/// Text form used when substituting a value: strings go in raw, anything
/// else as its JSON text.
pub fn display_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

/// Replaces `${stepId.varName}` placeholders with values from a
/// [`VariableContext`].
///
/// Unresolvable placeholders (unknown key, or no `.` in the reference) are
/// left in the output exactly as written. A broken extraction upstream then
/// shows up as a literal `${...}` in the request instead of aborting the
/// iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableResolver;

impl VariableResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve<'a>(&self, template: &'a str, context: &VariableContext) -> Cow<'a, str> {
        PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            let reference = &caps[1];
            reference
                .split_once('.')
                .and_then(|(step_id, var_name)| context.get(step_id, var_name))
                .map(|value| display_value(value).into_owned())
                .unwrap_or_else(|| caps[0].to_string())
        })
    }

    /// Resolves every header value; header names are taken literally.
    pub fn resolve_headers(
        &self,
        headers: &HashMap<String, String>,
        context: &VariableContext,
    ) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| (name.clone(), self.resolve(value, context).into_owned()))
            .collect()
    }
}

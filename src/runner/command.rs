// src/runner/command.rs

//! Turning a record's command template into the text submitted to the agent.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::record::{ExecutionRecord, Script};

/// Replace every placeholder key in `template` with its value.
///
/// Keys are matched literally (no delimiters are implied) and are expected
/// not to overlap, so the order of replacement does not matter.
pub fn substitute_arguments(template: &str, arguments: Option<&BTreeMap<String, Value>>) -> String {
    let Some(arguments) = arguments else {
        return template.to_string();
    };

    arguments
        .iter()
        .fold(template.to_string(), |command, (key, value)| {
            command.replace(key.as_str(), &argument_text(value))
        })
}

fn argument_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

/// Suffix the application name of a batch submission with a per-run
/// instance tag, e.g. `--name etl` → `--name etl_instance20240301120000`.
///
/// Only whole-name occurrences are rewritten. Scripts without a known
/// app-name flag, or without an app name, are returned unchanged.
pub fn inject_instance_name(command: &str, script: &Script, at: DateTime<Utc>) -> String {
    let Some(flag) = script.script_type.app_name_flag() else {
        return command.to_string();
    };
    if script.app_name.is_empty() {
        return command.to_string();
    }

    let original = format!("{flag} {}", script.app_name);
    let renamed = format!("{original}_instance{}", at.format("%Y%m%d%H%M%S"));

    match Regex::new(&format!(r#"{}(\s|'|"|$)"#, regex::escape(&original))) {
        Ok(re) => re
            .replace_all(command, |caps: &Captures| format!("{renamed}{}", &caps[1]))
            .into_owned(),
        Err(_) => command.replace(&original, &renamed),
    }
}

/// Full command for `record`: arguments substituted, then instance naming
/// applied when the record belongs to a recurring schedule.
pub fn build_command(
    record: &ExecutionRecord,
    script: &Script,
    scheduled: bool,
    at: DateTime<Utc>,
) -> String {
    let command = substitute_arguments(&record.command, record.arguments.as_ref());
    if scheduled {
        inject_instance_name(&command, script, at)
    } else {
        command
    }
}

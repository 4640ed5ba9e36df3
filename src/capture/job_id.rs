// src/capture/job_id.rs

//! Extraction of cluster application ids from captured stdout.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::record::ExecutionRecord;

static APPLICATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"application_\d+_\d+").expect("static regex is valid"));

/// First `application_<digits>_<digits>` in `text`.
pub fn find_external_job_id(text: &str) -> Option<&str> {
    APPLICATION_ID.find(text).map(|m| m.as_str())
}

/// `{base}/proxy/{id}/`, tolerating a trailing slash on `base`.
pub fn tracking_url(base: &str, id: &str) -> String {
    format!("{}/proxy/{}/", base.trim_end_matches('/'), id)
}

/// Set the record's external job id and url from `text` if it has none yet.
///
/// Returns `true` when the record was updated.
pub fn record_external_job(record: &mut ExecutionRecord, tracking_base_url: &str, text: &str) -> bool {
    if record.external_job_id.is_some() {
        return false;
    }
    let Some(id) = find_external_job_id(text) else {
        return false;
    };

    info!(record_id = %record.id, external_job_id = id, "captured external job id");
    record.external_job_url = Some(tracking_url(tracking_base_url, id));
    record.external_job_id = Some(id.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn finds_first_application_id() {
        let text = "INFO Submitted application application_1700000000000_0042\n\
                    INFO tracking application_1700000000000_0043";
        assert_eq!(
            find_external_job_id(text),
            Some("application_1700000000000_0042")
        );
        assert_eq!(find_external_job_id("application_x_1"), None);
        assert_eq!(find_external_job_id("no ids here"), None);
    }

    #[test]
    fn url_has_proxy_path() {
        assert_eq!(
            tracking_url("http://rm:8088", "application_1_2"),
            "http://rm:8088/proxy/application_1_2/"
        );
        assert_eq!(
            tracking_url("http://rm:8088/", "application_1_2"),
            "http://rm:8088/proxy/application_1_2/"
        );
    }

    #[test]
    fn extraction_is_idempotent() {
        let mut rec = ExecutionRecord::new("r1", "spark-submit", Utc::now());
        assert!(record_external_job(&mut rec, "http://rm", "got application_1_1"));
        assert!(!record_external_job(&mut rec, "http://rm", "got application_2_2"));
        assert_eq!(rec.external_job_id.as_deref(), Some("application_1_1"));
        assert_eq!(
            rec.external_job_url.as_deref(),
            Some("http://rm/proxy/application_1_1/")
        );
    }
}

//! A small unpacked backup: three tests, a precondition, a test set, a
//! dataset, and a metadata cache for two of the tests.

use serde_json::{Value, json};
use std::fs;
use std::path::Path;

pub const CACHE_FILE: &str = "jira_lookup_cache.json";

pub fn write_json(dir: &Path, name: &str, value: &Value) {
    fs::create_dir_all(dir).expect("create backup dir");
    fs::write(dir.join(name), serde_json::to_string_pretty(value).expect("json"))
        .expect("write fixture");
}

pub fn tests_document() -> Value {
    json!({
        "tests": [
            {
                "id": "100",
                "testVersionId": "v100",
                "type": "Manual",
                "preConditionTargetIssueIds": ["200"],
                "steps": [
                    {"action": "Open login page", "data": "", "result": "Form shown"},
                    {"action": "Submit !xray-attachment://abc-1|width=200!", "data": "user", "result": "Welcome"}
                ]
            },
            {
                "id": 101,
                "testVersionId": "v101",
                "generic": "run_smoke.sh",
                "steps": []
            },
            {
                "id": "102",
                "testVersionId": "v102",
                "steps": [{"action": "Check the report totals", "data": null, "result": ""}]
            }
        ]
    })
}

pub fn cache_document() -> Value {
    json!({
        "100": {
            "key": "QA-1",
            "summary": "Login works",
            "description": "User can log in",
            "status": "Done",
            "assignee": "Alex",
            "reporter": "Sam",
            "issuetype": "Test"
        },
        "101": {
            "key": "QA-2",
            "summary": "Smoke script",
            "status": "To Do",
            "issuetype": "Test"
        },
        "200": {"key": "QA-9", "summary": "User exists", "issuetype": "Precondition"},
        "300": {"key": "QA-20", "summary": "Regression", "issuetype": "Test Set"}
    })
}

/// Write the backup into `dir`, with or without the metadata cache.
pub fn write_backup(dir: &Path, with_cache: bool) {
    write_json(dir, "tests1.json", &tests_document());
    write_json(dir, "preconditions1.json", &json!({"preconditions": [{"id": "200"}]}));
    write_json(dir, "testSets1.json", &json!({"testSets": [{"id": 300, "tests": ["100", "101"]}]}));
    write_json(dir, "testPlans1.json", &json!({"testPlans": []}));
    write_json(
        dir,
        "datasets1.json",
        &json!({
            "datasets": [{
                "testIssueId": "v100",
                "parameters": [
                    {"_id": "p1", "name": "user", "combinations": false},
                    {"_id": "p2", "name": "browser", "combinations": true}
                ],
                "rows": [
                    {"values": {"p1": "alice", "p2": "firefox"}},
                    {"values": {"p1": "bob"}}
                ]
            }]
        }),
    );
    write_json(dir, "testRepository.json", &json!({"folders": []}));
    if with_cache {
        write_json(dir, CACHE_FILE, &cache_document());
    }
}

use std::fs;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::NamedTempFile;

use super::*;

mod core;

const ALLOW_FOOBAR_POLICY: &str = r#"
package policy

import future.keywords.if

default allow := false

allow if {
    input.name == "foobar"
}
"#;

const ALLOW_ALL_POLICY: &str = r#"
package policy

default allow := true
"#;

const DATA_DRIVEN_POLICY: &str = r#"
package policy

import future.keywords.if

default allow := false

allow if {
    input.name == data.allowed_name
}
"#;

const QUERY: &str = "data.policy.allow";

fn policy_file(text: &str) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".rego")
        .tempfile()
        .expect("temp file");
    fs::write(file.path(), text).expect("write policy");
    file
}

/// The temp file is returned alongside the handle so it outlives the test.
fn engine_from_policy(text: &str) -> (PolicyEngine, NamedTempFile) {
    let file = policy_file(text);
    let engine = PolicyEngine::load_from_path(file.path(), QUERY).expect("policy should load");
    (engine, file)
}

fn named_input(name: &str) -> Value {
    json!({ "name": name })
}

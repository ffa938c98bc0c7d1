use assert_cmd::Command;
use predicates::prelude::*;

fn fixture() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/videos.json")
}

fn creatoraudit() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("creatoraudit"));
    cmd.env_remove("CREATORAUDIT_ENV_FILE")
        .env_remove("CREATORAUDIT_SCENARIO")
        .env_remove("CREATORAUDIT_POLICY")
        .env_remove("CREATORAUDIT_TAXONOMY")
        .env("RUST_LOG", "error");
    cmd
}

fn analyze_json(extra: &[&str]) -> serde_json::Value {
    let out = creatoraudit()
        .arg("analyze")
        .arg("--videos")
        .arg(fixture())
        .args(extra)
        .output()
        .expect("run analyze");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("analyze json")
}

#[test]
fn analyze_fixture_json_contract() {
    let v = analyze_json(&[]);
    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("analyze"));

    let s = &v["summary"];
    assert_eq!(s["video_count"].as_u64(), Some(4));
    assert_eq!(s["average_views"].as_u64(), Some(16_250));
    assert_eq!(s["skipped_records"].as_u64(), Some(3));
    let top: Vec<&str> = s["top_n"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["video_id"].as_str().unwrap())
        .collect();
    assert_eq!(top, vec!["v2", "v4", "v1", "v3"]);
    assert_eq!(s["top_n"][0]["engagement_rate"].as_f64(), Some(3.33));

    let labels: Vec<&str> = s["series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Mar 01", "Mar 08", "Mar 15", "Mar 22"]);

    assert_eq!(v["classification"]["status"].as_str(), Some("matched"));
    let topics: Vec<&str> = v["classification"]["topics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["category"].as_str().unwrap())
        .collect();
    assert_eq!(topics, vec!["Marketing", "Sales", "Web Dev"]);

    assert_eq!(v["pricing"]["scenario"].as_str(), Some("median"));
    assert_eq!(v["pricing"]["price"].as_u64(), Some(57));

    let rejected: Vec<u64> = v["rejected"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["index"].as_u64().unwrap())
        .collect();
    assert_eq!(rejected, vec![4, 5, 6]);
    assert_eq!(v["rejected"][0]["issue"]["kind"].as_str(), Some("negative"));
}

#[test]
fn analyze_all_matches_and_best_case() {
    let v = analyze_json(&["--policy", "all-matches", "--scenario", "best-case", "--top", "2"]);
    let topics: Vec<&str> = v["classification"]["topics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["category"].as_str().unwrap())
        .collect();
    assert_eq!(topics, vec!["AI", "Marketing", "Sales", "Tech", "Web Dev"]);
    assert_eq!(v["pricing"]["price"].as_u64(), Some(81));
    assert_eq!(v["summary"]["top_n"].as_array().unwrap().len(), 2);
}

#[test]
fn analyze_custom_taxonomy_can_yield_no_fit() {
    let tmp = tempfile::tempdir().unwrap();
    let tax = tmp.path().join("taxonomy.json");
    std::fs::write(&tax, r#"[{"category": "Gaming", "keywords": ["speedrun", "minecraft"]}]"#)
        .unwrap();
    let v = analyze_json(&["--taxonomy", tax.to_str().unwrap()]);
    assert_eq!(v["classification"]["status"].as_str(), Some("no_fit"));
    assert_eq!(v["taxonomy_categories"].as_u64(), Some(1));
}

#[test]
fn analyze_markdown_output_has_average_and_table() {
    creatoraudit()
        .args(["analyze", "--output", "markdown", "--videos"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Average views: 16,250"))
        .stdout(predicate::str::contains("| 1 | v2 | AI tools for sales teams | 30,000 |"));
}

#[test]
fn analyze_text_output_lists_rejects() {
    creatoraudit()
        .args(["analyze", "--output", "text", "--videos"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Topics: Marketing, Sales, Web Dev"))
        .stdout(predicate::str::contains("Rejected records:"))
        .stdout(predicate::str::contains("record #4 (v5)"));
}

#[test]
fn analyze_reads_stdin_and_handles_empty_input() {
    let out = creatoraudit()
        .args(["analyze", "--videos", "-"])
        .write_stdin("[]")
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["summary"]["average_views"].as_u64(), Some(0));
    assert_eq!(v["classification"]["status"].as_str(), Some("no_fit"));
    assert_eq!(v["pricing"]["price"].as_u64(), Some(0));
}

#[test]
fn analyze_rejects_unknown_scenario_and_bad_input() {
    creatoraudit()
        .args(["analyze", "--scenario", "wildest-dreams", "--videos"])
        .arg(fixture())
        .assert()
        .failure()
        .stderr(predicate::str::contains("scenario"));

    creatoraudit()
        .args(["analyze", "--videos", "-"])
        .write_stdin("{\"not\": \"an array\"}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON array"));
}

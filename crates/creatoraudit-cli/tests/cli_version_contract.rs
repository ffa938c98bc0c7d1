#[test]
fn creatoraudit_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("creatoraudit");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .env_remove("CREATORAUDIT_ENV_FILE")
        .output()
        .expect("run creatoraudit version");

    assert!(out.status.success(), "creatoraudit version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["name"].as_str(), Some("creatoraudit"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn creatoraudit_version_text_output_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("creatoraudit");
    let out = std::process::Command::new(bin)
        .args(["version", "--output", "text"])
        .output()
        .expect("run creatoraudit version --output text");

    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.trim_start().starts_with("creatoraudit "), "{s}");
}

//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `configmigration` binary against
//! migration directories and configuration files built in a temp dir,
//! and verifies exit codes, stdout, stderr and the files left behind.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A temp dir holding `migrations/` and a YAML config at version 1.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let migrations = dir.path().join("migrations");
        fs::create_dir(&migrations).unwrap();
        fs::write(
            migrations.join("V2__rename_name_to_title.yaml"),
            "from: 1\nwhen: { type: exists, path: $.name }\noperations:\n  - { type: rename, path: $, old_key: name, new_key: title }\n",
        )
        .unwrap();
        fs::write(
            migrations.join("V3__add_server.yaml"),
            "description: add server block\nwhen: { type: absent, path: $.server }\noperations:\n  - { type: put, path: $, key: server, value: { port: 80 } }\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a migration").unwrap();
        fs::write(dir.path().join("config.yaml"), "version: 1\nname: gateway\n").unwrap();
        Fixture { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn add_migration(&self, name: &str, body: &str) {
        fs::write(self.path("migrations").join(name), body).unwrap();
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    /// Command rooted at the fixture so the default `migrations/` resolves.
    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("configmigration");
        cmd.current_dir(self.dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

fn stdout_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    Fixture::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Versioned migrations for configuration files",
        ));
}

#[test]
fn version_flag_exits_0() {
    Fixture::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("configmigration"));
}

// ──────────────────────────────────────────────
// 2. migrate
// ──────────────────────────────────────────────

#[test]
fn migrate_prints_document_and_report() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml"])
        .assert()
        .success()
        .stdout("version: 3\ntitle: gateway\nserver:\n  port: 80\n")
        .stderr(predicate::str::contains("applied  1->2"))
        .stderr(predicate::str::contains("applied  2->3"));
    assert_eq!(fx.read("config.yaml"), "version: 1\nname: gateway\n");
}

#[test]
fn migrate_to_explicit_target_as_json() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--target", "2", "--format", "json"])
        .assert()
        .success()
        .stdout("{\n  \"version\": 2,\n  \"title\": \"gateway\"\n}\n");
}

#[test]
fn migrate_write_overwrites_config() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--write"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));
    assert_eq!(
        fx.read("config.yaml"),
        "version: 3\ntitle: gateway\nserver:\n  port: 80\n"
    );
}

#[test]
fn migrate_out_writes_other_file() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--out", "migrated.yaml", "--quiet"])
        .assert()
        .success()
        .stdout("");
    assert!(fx.read("migrated.yaml").starts_with("version: 3\n"));
    assert_eq!(fx.read("config.yaml"), "version: 1\nname: gateway\n");
}

#[test]
fn migrate_dry_run_only_reports() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--dry-run", "--write"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrated 1 -> 3 (2 applied, 0 skipped)"));
    assert_eq!(fx.read("config.yaml"), "version: 1\nname: gateway\n");
}

#[test]
fn migrate_already_current_is_noop() {
    let fx = Fixture::new();
    fs::write(fx.path("current.json"), r#"{"version":3,"title":"t"}"#).unwrap();
    fx.cmd()
        .args(["migrate", "current.json"])
        .assert()
        .success()
        .stdout("{\n  \"version\": 3,\n  \"title\": \"t\"\n}\n")
        .stderr(predicate::str::contains("already at version 3"));
}

#[test]
fn migrate_json_output_contains_report() {
    let fx = Fixture::new();
    let assert = fx
        .cmd()
        .args(["--output", "json", "migrate", "config.yaml"])
        .assert()
        .success();
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["report"]["status"], "completed");
    assert_eq!(out["report"]["records"][0]["step"], "1->2");
    assert_eq!(out["report"]["records"][1]["status"], "applied");
    assert_eq!(out["document"]["server"]["port"], 80);
}

#[test]
fn failed_step_exits_2_and_keeps_committed_steps() {
    let fx = Fixture::new();
    fx.add_migration("V4__drop_missing.yaml", "- type: delete\n  path: $.missing\n");
    fx.cmd()
        .args(["migrate", "config.yaml", "--write"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("failed   3->4"))
        .stderr(predicate::str::contains("does not exist"));
    assert_eq!(
        fx.read("config.yaml"),
        "version: 3\ntitle: gateway\nserver:\n  port: 80\n"
    );
}

#[test]
fn failed_first_step_leaves_file_alone() {
    let fx = Fixture::new();
    fx.add_migration("V4__drop_missing.yaml", "- type: delete\n  path: $.missing\n");
    fs::write(fx.path("at3.yaml"), "version:   3\n").unwrap();
    fx.cmd()
        .args(["migrate", "at3.yaml", "--out", "out.yaml"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("wrote").not());
    assert!(!fx.path("out.yaml").exists());
    assert_eq!(fx.read("at3.yaml"), "version:   3\n");
}

#[test]
fn failed_step_json_report() {
    let fx = Fixture::new();
    fx.add_migration("V4__drop_missing.yaml", "- type: delete\n  path: $.missing\n");
    let assert = fx
        .cmd()
        .args(["--output", "json", "migrate", "config.yaml"])
        .assert()
        .failure()
        .code(2);
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["report"]["status"], "failed");
    assert_eq!(out["report"]["records"][2]["step"], "3->4");
    assert_eq!(out["document"]["version"], 3);
    assert_eq!(out["document"]["title"], "gateway");
}

#[test]
fn unreachable_target_exits_1() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--target", "7"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot migrate from version 1 to 7"));
}

#[test]
fn missing_version_needs_default() {
    let fx = Fixture::new();
    fs::write(fx.path("bare.yaml"), "name: x\n").unwrap();
    fx.cmd()
        .args(["migrate", "bare.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no version found at $.version"));
    fx.cmd()
        .args(["migrate", "bare.yaml", "--default-version", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("title: x"));
}

#[test]
fn invalid_document_exits_1() {
    let fx = Fixture::new();
    fs::write(fx.path("broken.json"), "{\"version\": 1,").unwrap();
    fx.cmd()
        .args(["migrate", "broken.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid JSON document"));
}

#[test]
fn wildcard_version_path_exits_1() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--version-path", "$..version"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("exactly one location"));
    assert_eq!(fx.read("config.yaml"), "version: 1\nname: gateway\n");
}

#[test]
fn invalid_version_path_exits_1() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "config.yaml", "--version-path", "$.a[1:2]"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid path expression"));
}

#[test]
fn nonexistent_config_exits_1() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["migrate", "nope.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not read"));
    assert!(!fx.path("nope.yaml").exists());
}

#[test]
fn create_missing_allows_nested_puts() {
    let fx = Fixture::new();
    fx.add_migration(
        "V4__tls.yaml",
        "- { type: put, path: $.server.tls, key: enabled, value: false }\n",
    );
    fx.cmd()
        .args(["migrate", "config.yaml"])
        .assert()
        .failure()
        .code(2);
    fx.cmd()
        .args(["migrate", "config.yaml", "--create-missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tls:\n    enabled: false"));
}

// ──────────────────────────────────────────────
// 3. plan, list, version
// ──────────────────────────────────────────────

#[test]
fn plan_lists_pending_steps() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["plan", "config.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 step(s) from 1 to 3:"))
        .stdout(predicate::str::contains("rename name to title"))
        .stdout(predicate::str::contains("add server block"));
    assert_eq!(fx.read("config.yaml"), "version: 1\nname: gateway\n");
}

#[test]
fn plan_json() {
    let fx = Fixture::new();
    let assert = fx
        .cmd()
        .args(["--output", "json", "plan", "config.yaml", "--target", "2"])
        .assert()
        .success();
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["current"], 1);
    assert_eq!(out["target"], 2);
    assert_eq!(out["steps"].as_array().unwrap().len(), 1);
}

#[test]
fn list_shows_migrations_in_order() {
    let fx = Fixture::new();
    let assert = fx
        .cmd()
        .args(["--output", "json", "list"])
        .assert()
        .success();
    let out = stdout_json(&assert.get_output().stdout);
    let ids: Vec<_> = out
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1->2", "2->3"]);
}

#[test]
fn list_missing_directory_exits_1() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["list", "--migrations", "elsewhere"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not read migrations"));
}

#[test]
fn version_prints_current_version() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["version", "config.yaml"])
        .assert()
        .success()
        .stdout("1\n");
    fs::write(fx.path("nested.json"), r#"{"meta":{"schema":"2.1"}}"#).unwrap();
    fx.cmd()
        .args(["version", "nested.json", "--version-path", "$.meta.schema"])
        .assert()
        .success()
        .stdout("2.1\n");
}

// ──────────────────────────────────────────────
// 4. Settings file
// ──────────────────────────────────────────────

#[test]
fn settings_file_supplies_defaults() {
    let fx = Fixture::new();
    fs::rename(fx.path("migrations"), fx.path("db")).unwrap();
    fs::write(
        fx.path("configmigration.toml"),
        "migrations = \"db\"\ntarget = \"2\"\nformat = \"json\"\n",
    )
    .unwrap();
    fx.cmd()
        .args(["--settings", "configmigration.toml", "migrate", "config.yaml"])
        .assert()
        .success()
        .stdout("{\n  \"version\": 2,\n  \"title\": \"gateway\"\n}\n");

    // Flags win over the file.
    fx.cmd()
        .args([
            "--settings",
            "configmigration.toml",
            "migrate",
            "config.yaml",
            "--target",
            "3",
            "--format",
            "yaml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 80"));
}

#[test]
fn bad_settings_file_exits_1() {
    let fx = Fixture::new();
    fs::write(fx.path("bad.toml"), "unknown_key = 1\n").unwrap();
    fx.cmd()
        .args(["--settings", "bad.toml", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}

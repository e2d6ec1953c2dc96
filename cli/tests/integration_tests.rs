use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn dynatable(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dynatable"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run dynatable")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const SCHEMA: &str = r#"datasource db {
  provider = "sqlite"
  url      = "file:dev.db"
}

model users {
  id    Int    @id @default(autoincrement())
  email String @unique
}

model notes {
  id   Int     @id @default(autoincrement())
  body String?
}
"#;

#[test]
fn test_init_config_writes_defaults_once() {
    let dir = tempfile::tempdir().unwrap();

    let out = dynatable(dir.path(), &["init-config"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let yaml = fs::read_to_string(dir.path().join("dynatable.yml")).unwrap();
    assert!(yaml.contains("127.0.0.1:3000"));
    assert!(yaml.contains("mode: in_process"));

    let out = dynatable(dir.path(), &["init-config"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("already exists"));

    let out = dynatable(dir.path(), &["init-config", "--force"]);
    assert!(out.status.success());
}

#[test]
fn test_migrate_up_creates_declared_tables() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("schema.dyn"), SCHEMA).unwrap();

    let out = dynatable(dir.path(), &["migrate", "status", "--json"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let status: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(status["pending"], serde_json::json!(["users", "notes"]));
    assert_eq!(status["history_exists"], false);

    let out = dynatable(dir.path(), &["migrate", "up"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("+ users"));
    assert!(stdout(&out).contains("+ notes"));

    let out = dynatable(dir.path(), &["migrate", "status"]);
    assert!(stdout(&out).contains("In sync: yes"));
    assert!(stdout(&out).contains("Applied migrations: 2"));

    let out = dynatable(dir.path(), &["tables"]);
    let text = stdout(&out);
    assert!(text.contains("users"));
    assert!(text.contains("email TEXT (not null)"));
    assert!(text.contains("body TEXT\n"));
}

#[test]
fn test_migrate_up_prune_drops_undeclared_tables() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("schema.dyn"), SCHEMA).unwrap();
    let out = dynatable(dir.path(), &["migrate", "up"]);
    assert!(out.status.success());

    fs::write(
        dir.path().join("schema.dyn"),
        SCHEMA.split("\nmodel notes").next().unwrap(),
    )
    .unwrap();
    let out = dynatable(dir.path(), &["migrate", "status", "--json"]);
    let status: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(status["orphaned"], serde_json::json!(["notes"]));

    let out = dynatable(dir.path(), &["migrate", "up", "--prune"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("- notes"));

    let out = dynatable(dir.path(), &["tables", "--json"]);
    let tables: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(tables.as_array().unwrap().len(), 1);
    assert_eq!(tables[0]["name"], "users");
}

#[test]
fn test_flags_override_config_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("custom.dyn"), SCHEMA).unwrap();

    let out = dynatable(
        dir.path(),
        &["migrate", "up", "--schema", "custom.dyn", "--database", "other.db"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.path().join("other.db").exists());
    assert!(!dir.path().join("schema.dyn").exists());
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dynatable.yml"), "listen: [not, a, string]\n").unwrap();
    let out = dynatable(dir.path(), &["tables"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).starts_with("error: Failed to load config"));
}

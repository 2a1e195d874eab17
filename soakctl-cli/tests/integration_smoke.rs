//! Smoke tests for command wiring and the configuration failure path.
//! None of these reach a database.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// soakctl with no ambient .env, config file, or DATABASE_URL
fn isolated(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("soakctl").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("DATABASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_help() {
    let mut cmd = Command::cargo_bin("soakctl").unwrap();
    cmd.arg("run").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--max-connections"))
        .stdout(predicate::str::contains("--rounds"));
}

#[test]
fn test_setup_help() {
    let mut cmd = Command::cargo_bin("soakctl").unwrap();
    cmd.arg("setup").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_missing_database_url_fails() {
    let home = TempDir::new().unwrap();
    isolated(&home)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("DATABASE_URL not set"))
        .stderr(predicate::str::contains("operation=\"config\""));
}

#[test]
fn test_empty_database_url_fails() {
    let home = TempDir::new().unwrap();
    isolated(&home)
        .args(["run", "--database-url", ""])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("empty"))
        .stderr(predicate::str::contains("operation=\"config\""));
}

#[test]
fn test_empty_database_url_env_fails() {
    let home = TempDir::new().unwrap();
    // an empty variable is either rejected as empty or treated as unset
    isolated(&home)
        .env("DATABASE_URL", "")
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("DATABASE_URL"))
        .stderr(predicate::str::contains("operation=\"config\""));
}

#[test]
fn test_malformed_database_url_fails() {
    let home = TempDir::new().unwrap();
    isolated(&home)
        .args(["run", "--database-url", "definitely not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"))
        // rejected before any connection attempt
        .stderr(predicate::str::contains("connection pool").not());
}

#[test]
fn test_zero_rounds_rejected() {
    let home = TempDir::new().unwrap();
    isolated(&home)
        .args(["run", "--database-url", "postgres://localhost/soak", "--rounds", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rounds must be at least 1"));
}

#[test]
fn test_explicit_config_file_must_exist() {
    let home = TempDir::new().unwrap();
    isolated(&home)
        .args(["setup", "--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn test_database_url_from_dotenv() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join(".env"), "DATABASE_URL=mysql://localhost/soak\n").unwrap();

    // the .env value is picked up, then rejected for its scheme
    isolated(&home)
        .arg("setup")
        .assert()
        .failure()
        .stderr(predicate::str::contains("postgres://"));
}

#[test]
fn test_database_url_from_config_file() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("soakctl.toml"),
        "[database]\nurl = \"\"\n",
    )
    .unwrap();

    isolated(&home)
        .arg("setup")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL is empty"));
}

#[test]
fn test_unparsable_config_file_fails() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("soakctl.toml"),
        "[database]\nurl = \"postgres://localhost/soak\"\nmax_connections = \"fifty\"\n",
    )
    .unwrap();

    // the file is not silently skipped in favour of defaults
    isolated(&home)
        .args(["run", "--rounds", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"))
        .stderr(predicate::str::contains("soakctl.toml"))
        .stderr(predicate::str::contains("operation=\"config\""))
        .stderr(predicate::str::contains("connection pool").not());
}

#[test]
fn test_unparsable_global_config_fails() {
    let home = TempDir::new().unwrap();
    std::fs::create_dir(home.path().join(".soakctl")).unwrap();
    std::fs::write(home.path().join(".soakctl").join("config.toml"), "[run\n").unwrap();

    isolated(&home)
        .args(["setup", "--database-url", "postgres://localhost/soak"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}

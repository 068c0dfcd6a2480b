use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const CONFIG: &str = r#"
[project]
name = "cli-app"

[[entry]]
name = "home"
path = "src/home.js"

[[entry]]
name = "account"
path = "src/account.js"
"#;

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "splitpack.toml", CONFIG);
    write(dir.path(), "src/home.js", "import { user } from './session';");
    write(dir.path(), "src/account.js", "import { user } from './session';");
    write(dir.path(), "src/session.js", "export const user = null;");
    dir
}

fn splitpack(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("splitpack").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("DEPLOY_ENV")
        .env_remove("APP_VERSION")
        .env_remove("APP_SECRET")
        .env_remove("GA_ID");
    cmd
}

#[test]
fn build_writes_env_asset_from_environment() {
    let dir = fixture();

    splitpack(dir.path())
        .arg("build")
        .env("DEPLOY_ENV", "staging")
        .assert()
        .success()
        .stderr(predicate::str::contains("Built 3 chunk(s)"));

    let env_js = fs::read_to_string(dir.path().join("dist/assets/env.js")).unwrap();
    assert!(env_js.contains("\"DEPLOY_ENV\": \"staging\""));
    assert!(env_js.contains("\"GA_ID\": undefined"));

    let document = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(document.contains("\"async-common\":{\"hash\":"));
}

#[test]
fn build_respects_outdir() {
    let dir = fixture();

    splitpack(dir.path())
        .args(["build", "--outdir", "public_html"])
        .assert()
        .success();

    assert!(dir.path().join("public_html/index.html").exists());
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn chunks_reports_assignment_as_json() {
    let dir = fixture();

    splitpack(dir.path())
        .args(["chunks", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"async-common\""))
        .stdout(predicate::str::contains("\"src/session.js\""));

    assert!(!dir.path().join("dist").exists());
}

#[test]
fn unresolved_import_fails_the_build() {
    let dir = fixture();
    write(dir.path(), "src/account.js", "import './missing';");

    splitpack(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "cannot resolve './missing' imported from src/account.js",
        ));

    assert!(!dir.path().join("dist").exists());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = fixture();
    write(
        dir.path(),
        "splitpack.toml",
        &format!("{}\n[split]\nmin_chunks = 1\n", CONFIG),
    );

    splitpack(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_chunks"));
}

#[test]
fn init_scaffolds_a_buildable_project() {
    let dir = tempfile::tempdir().unwrap();

    splitpack(dir.path()).args(["init", "shop"]).assert().success();

    let project = dir.path().join("shop");
    assert!(project.join("splitpack.toml").exists());
    assert!(project.join("public/robots.txt").exists());

    splitpack(&project).arg("build").assert().success();
    assert!(project.join("dist/robots.txt").exists());
    assert!(project.join("dist/assets/env.js").exists());

    splitpack(dir.path())
        .args(["init", "shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn filmdesk_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_filmdesk"))
}

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("create temp home"),
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(filmdesk_bin())
            .args(args)
            .env("FILMDESK_HOME", self.home.path())
            .env("FILMDESK_DB", self.home.path().join("filmdesk.sqlite3"))
            .env_remove("FILMDESK_STORAGE_KEY")
            .env("RUST_LOG", "error")
            .output()
            .expect("failed to execute filmdesk CLI")
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> T {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {}\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_value(parse_json_output(&output)).unwrap_or_else(|err| {
            panic!(
                "failed to deserialize JSON output: {}\nstdout:\n{}",
                err,
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }

    fn run_json_error(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "command unexpectedly succeeded: {}\nstdout:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout)
        );
        parse_json_output(&output)
    }

    fn create_project(&self, extra: &[&str]) -> String {
        let mut args = vec![
            "projects",
            "create",
            "Harbor Lights",
            "--type",
            "documentary",
            "--genre",
            "documentary",
            "--stage",
            "production",
            "--budget",
            "40000",
            "--themes",
            "community",
        ];
        args.extend_from_slice(extra);
        args.push("--json");
        let project: ProjectOutput = self.run_json(&args);
        project.id
    }

    fn enqueue(&self, kind: &str, project: &str) -> EnqueueOutput {
        self.run_json(&["jobs", "enqueue", kind, "--project", project, "--json"])
    }

    fn scrape_grants(&self, project: &str) {
        self.enqueue("grant_scrape", project);
        let output = self.run(&["agents", "run", "--once"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    }

    fn discover_grants(&self, project: &str) -> DiscoveryOutput {
        self.run_json(&["grants", "discover", "--project", project, "--json"])
    }
}

fn parse_json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout.find(['{', '[']).unwrap_or_else(|| {
        panic!(
            "no JSON payload found in output\nstdout:\n{}\nstderr:\n{}",
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    });
    let mut deserializer = serde_json::Deserializer::from_str(&stdout[json_start..]);
    serde_json::Value::deserialize(&mut deserializer).expect("parse JSON output")
}

#[derive(Debug, Deserialize)]
struct ProjectOutput {
    id: String,
    name: String,
    setup_completed: bool,
}

#[derive(Debug, Deserialize)]
struct EnqueueOutput {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct JobOutput {
    id: String,
    kind: String,
    status: String,
    completed_at: Option<i64>,
    error_message: Option<String>,
    output_data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DiscoveryOutput {
    matches_found: usize,
}

#[test]
fn test_projects_create_and_show() {
    let env = Env::new();
    let id = env.create_project(&[]);

    let projects: Vec<ProjectOutput> = env.run_json(&["projects", "list", "--json"]);
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, id);
    assert_eq!(projects[0].name, "Harbor Lights");
    assert!(projects[0].setup_completed);

    let shown: serde_json::Value = env.run_json(&["projects", "show", &id, "--json"]);
    assert_eq!(shown["project"]["project_type"], "documentary");
    assert_eq!(shown["progress"]["grants_matched"], false);
    assert_eq!(shown["activity"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_job_lifecycle_through_the_poller() {
    let env = Env::new();
    let project = env.create_project(&[]);

    let queued = env.enqueue("grant_scrape", &project);
    assert_eq!(queued.status, "queued");

    let before: JobOutput = env.run_json(&["jobs", "status", &queued.id, "--json"]);
    assert_eq!(before.status, "queued");
    assert!(before.completed_at.is_none());

    let output = env.run(&["agents", "run", "--once"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let after: JobOutput = env.run_json(&["jobs", "status", &queued.id, "--json"]);
    assert_eq!(after.id, queued.id);
    assert_eq!(after.kind, "grant_scrape");
    assert_eq!(after.status, "completed");
    assert!(after.completed_at.is_some());
    assert!(after.error_message.is_none());
    assert_eq!(after.output_data["grants_scraped"], 3);
}

#[test]
fn test_unknown_kind_fails_at_dispatch() {
    let env = Env::new();
    let project = env.create_project(&[]);

    let queued = env.enqueue("xyz", &project);
    let output = env.run(&["agents", "run", "--once"]);
    assert!(output.status.success());

    let job: JobOutput = env.run_json(&["jobs", "status", &queued.id, "--json"]);
    assert_eq!(job.status, "failed");
    assert_eq!(job.error_message.as_deref(), Some("Unknown agent type: xyz"));
}

#[test]
fn test_enqueue_for_missing_project() {
    let env = Env::new();
    let missing = "00000000-0000-4000-8000-000000000000";
    let err =
        env.run_json_error(&["jobs", "enqueue", "grant_match", "--project", missing, "--json"]);
    assert_eq!(err["error"], format!("Project not found: {}", missing));
}

#[test]
fn test_grant_discovery() {
    let env = Env::new();
    let project = env.create_project(&[]);

    env.scrape_grants(&project);

    let first = env.discover_grants(&project);
    assert!(first.matches_found >= 2);

    let again = env.discover_grants(&project);
    assert_eq!(again.matches_found, 0);

    let matches: Vec<serde_json::Value> =
        env.run_json(&["grants", "list", "--project", &project, "--json"]);
    assert_eq!(matches.len(), first.matches_found);
    assert!(matches.iter().all(|m| m["score"].as_u64().unwrap_or(0) >= 50));
}

#[test]
fn test_grant_preferences_shape_discovery() {
    let env = Env::new();
    let project = env.create_project(&[]);
    env.scrape_grants(&project);

    let shown: serde_json::Value = env.run_json(&["grants", "prefs", "-p", &project, "--json"]);
    assert_eq!(shown["saved"], false);

    let loans_only: serde_json::Value = env.run_json(&[
        "grants",
        "prefs",
        "--project",
        &project,
        "--funding-type",
        "loan",
        "--lead-time-days",
        "0",
        "--json",
    ]);
    assert_eq!(loans_only["saved"], true);
    assert_eq!(loans_only["preferences"]["preferred_funding_types"], serde_json::json!(["loan"]));
    assert_eq!(env.discover_grants(&project).matches_found, 0);

    env.run_json::<serde_json::Value>(&[
        "grants",
        "prefs",
        "--project",
        &project,
        "--funding-type",
        "grant",
        "--json",
    ]);
    let stored: serde_json::Value = env.run_json(&["grants", "prefs", "-p", &project, "--json"]);
    assert_eq!(stored["preferences"]["preferred_funding_types"], serde_json::json!(["grant"]));
    assert_eq!(stored["preferences"]["lead_time_days"], 0);
    assert!(env.discover_grants(&project).matches_found >= 2);

    let err = env.run_json_error(&[
        "grants", "prefs", "-p", &project, "--min", "9000", "--max", "100", "--json",
    ]);
    assert_eq!(err["error"], "Minimum amount 9000 is above maximum amount 100");
}

#[test]
fn test_festival_preferences_round_trip() {
    let env = Env::new();
    let project = env.create_project(&[]);

    let saved: serde_json::Value = env.run_json(&[
        "festivals",
        "prefs",
        "--project",
        &project,
        "--tier",
        "a_list,genre",
        "--max-fee",
        "80",
        "--lead-time-days",
        "14",
        "--json",
    ]);
    assert_eq!(saved["saved"], true);

    let shown: serde_json::Value =
        env.run_json(&["festivals", "prefs", "--project", &project, "--json"]);
    assert_eq!(shown["preferences"]["preferred_tiers"], serde_json::json!(["a_list", "genre"]));
    assert_eq!(shown["preferences"]["max_entry_fee"], 80.0);
    assert_eq!(shown["preferences"]["lead_time_days"], 14);

    let project_view: serde_json::Value = env.run_json(&["projects", "show", &project, "--json"]);
    assert_eq!(project_view["activity"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_grant_catalog_filters() {
    let env = Env::new();
    let project = env.create_project(&[]);
    env.scrape_grants(&project);

    let all: Vec<serde_json::Value> = env.run_json(&["grants", "list", "--all", "--json"]);
    assert_eq!(all.len(), 3);

    let development: Vec<serde_json::Value> =
        env.run_json(&["grants", "list", "--all", "--grant-type", "development", "--json"]);
    assert_eq!(development.len(), 1);
    assert_eq!(development[0]["grant_type"], "development");

    let loans: Vec<serde_json::Value> =
        env.run_json(&["grants", "list", "--all", "--funding-type", "loan", "--json"]);
    assert!(loans.is_empty());

    let small: Vec<serde_json::Value> =
        env.run_json(&["grants", "list", "--all", "--max", "30000", "--json"]);
    assert_eq!(small.len(), 1);
}

#[test]
fn test_discovery_requires_completed_setup() {
    let env = Env::new();
    let project = env.create_project(&["--draft"]);

    let err = env.run_json_error(&["grants", "discover", "--project", &project, "--json"]);
    assert_eq!(err["error"], "Complete project setup before running discovery");
}

#[test]
fn test_discovery_requires_feature() {
    let env = Env::new();
    let project = env.create_project(&["--features", "budget,schedule"]);

    let err = env.run_json_error(&["festivals", "discover", "--project", &project, "--json"]);
    assert_eq!(err["error"], "The festivals feature is not enabled for this project");
}

#[test]
fn test_config_json() {
    let env = Env::new();
    let config: serde_json::Value = env.run_json(&["config", "--json"]);
    assert_eq!(config["home"], env.home.path().to_string_lossy().as_ref());
    assert_eq!(config["config_file"]["exists"], false);
    assert_eq!(config["storage"]["key_set"], false);
}

//! CLI tests running the built `tmc` binary against real files.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ADULT_NAMES: &str = "\
| Census income excerpt
<=50K, >50K.                      | the target attribute

age: continuous.
workclass: Private, Self-emp-not-inc, Local-gov, Never-worked.
fnlwgt: ignore.
hours-per-week: continuous.
";

const ADULT_TRAIN: &str = "\
39, Local-gov, 77516, 40, <=50K
50, Self-emp-not-inc, 83311, 13, >50K
38, Private, 215646, 45, <=50K
53, Private, 234721, 40, >50K
28, Private, 338409, ?, <=50K
37, ?, 284582, 12, >50K
49, Private, 160187, 50, <=50K

";

const ADULT_TEST: &str = "\
|1x3 Cross validator
25, Private, 226802, 40, <=50K.
38, Local-gov, 89814, 50, >50K.
?, Never-worked, 336951, 40, >50K.
";

fn tmc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tmc"))
}

struct Workspace {
    dir: TempDir,
    home: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let home = dir.path().join("home");
        fs::create_dir_all(&home).unwrap();
        fs::write(dir.path().join("adult.names"), ADULT_NAMES).unwrap();
        fs::write(dir.path().join("adult.data"), ADULT_TRAIN).unwrap();
        fs::write(dir.path().join("adult.test"), ADULT_TEST).unwrap();
        Self { dir, home }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn arg(&self, name: &str) -> String {
        path_arg(&self.path(name))
    }

    fn run(&self, args: &[String]) -> Output {
        let mut cmd = Command::new(tmc_bin());
        cmd.args(args);
        cmd.env("TMC_HOME", &self.home);
        cmd.env_remove("TMC_CONFIG");
        cmd.env_remove("RUST_LOG");
        cmd.output().expect("failed to execute tmc CLI")
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> T {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {}\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let value = parse_json_output(&output);
        serde_json::from_value(value).unwrap_or_else(|err| {
            panic!(
                "failed to deserialize JSON output: {}\nstdout:\n{}",
                err,
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }

    fn run_json_error(&self, args: &[String]) -> serde_json::Value {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "command unexpectedly succeeded: {}\nstdout:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout)
        );
        parse_json_output(&output)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
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
    serde_json::Value::deserialize(&mut deserializer).unwrap_or_else(|err| {
        panic!("failed to parse JSON output: {}\nstdout:\n{}", err, stdout)
    })
}

#[derive(Debug, Deserialize)]
struct NamesOutput {
    target_feature: String,
    target_index: usize,
    size: usize,
    features: Vec<FeatureOutput>,
    names: String,
}

#[derive(Debug, Deserialize)]
struct FeatureOutput {
    name: String,
    kind: Option<String>,
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TransformOutput {
    names: String,
    rows_read: u64,
    rules: Vec<serde_json::Value>,
    outputs: Vec<OutputFile>,
}

#[derive(Debug, Deserialize)]
struct OutputFile {
    output: String,
    rows: u64,
}

#[test]
fn test_names_json() {
    let ws = Workspace::new();
    let out: NamesOutput = ws.run_json(&[
        "names".to_string(),
        ws.arg("adult.names"),
        "--json".to_string(),
    ]);

    assert_eq!(out.target_feature, "target");
    assert_eq!(out.target_index, 4);
    assert_eq!(out.size, 5);
    assert_eq!(out.features[1].name, "workclass");
    assert_eq!(out.features[1].kind.as_deref(), Some("categorical"));
    assert_eq!(out.features[1].values.len(), 4);
    assert_eq!(out.features[2].kind.as_deref(), Some("ignore"));
    assert!(out.names.starts_with("target: <=50K, >50K.\n"));
}

#[test]
fn test_stats_json() {
    let ws = Workspace::new();
    let stats: serde_json::Value = ws.run_json(&[
        "stats".to_string(),
        ws.arg("adult.names"),
        ws.arg("adult.data"),
        "--json".to_string(),
    ]);

    assert_eq!(stats["rows_read"], 7);
    assert_eq!(stats["rows_skipped"], 0);
    let features = stats["features"].as_array().unwrap();
    assert_eq!(features.len(), 5);
    assert_eq!(features[0]["kind"], "numeric");
    assert_eq!(features[0]["count"], 7);
    assert_eq!(features[1]["kind"], "categorical");
    assert_eq!(features[1]["count"], 6);
    assert_eq!(features[2]["kind"], "untracked");
    assert_eq!(features[3]["count"], 6);

    let private = features[1]["categories"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["value"] == "Private")
        .unwrap();
    assert_eq!(private["negatives"], 3);
    assert_eq!(private["positives"], 1);
    assert_eq!(private["goodness"], 0.25);
}

#[test]
fn test_stats_positive_flag_swaps_encoding() {
    let ws = Workspace::new();
    let stats: serde_json::Value = ws.run_json(&[
        "stats".to_string(),
        ws.arg("adult.names"),
        ws.arg("adult.data"),
        "--positive".to_string(),
        "<=50K".to_string(),
        "--json".to_string(),
    ]);
    let private = &stats["features"][1]["categories"][0];
    assert_eq!(private["value"], "Private");
    assert_eq!(private["goodness"], 0.75);
}

#[test]
fn test_transform_writes_outputs() {
    let ws = Workspace::new();
    let out_dir = ws.path("out");
    let report: TransformOutput = ws.run_json(&[
        "transform".to_string(),
        ws.arg("adult.names"),
        ws.arg("adult.data"),
        "--apply".to_string(),
        ws.arg("adult.test"),
        "--out-dir".to_string(),
        path_arg(&out_dir),
        "--json".to_string(),
    ]);

    assert_eq!(report.rows_read, 7);
    assert_eq!(PathBuf::from(&report.names), out_dir.join("adult.transformed.names"));
    assert_eq!(report.outputs.len(), 2);
    assert_eq!(report.outputs[0].rows, 7);
    assert_eq!(report.outputs[1].rows, 3);

    let rules: Vec<(&str, &str)> = report
        .rules
        .iter()
        .map(|r| (r["name"].as_str().unwrap(), r["rule"].as_str().unwrap()))
        .collect();
    assert_eq!(
        rules,
        vec![
            ("age", "linear"),
            ("workclass", "categorical_to_continuous"),
            ("fnlwgt", "ignore"),
            ("hours-per-week", "linear"),
            ("target", "target"),
        ]
    );

    let train = fs::read_to_string(out_dir.join("adult.transformed.data")).unwrap();
    assert_eq!(train.lines().count(), 7);
    assert_eq!(train.lines().next(), Some("39,0,77516,-40,0"));

    let test = fs::read_to_string(&report.outputs[1].output).unwrap();
    assert_eq!(test, "25,0.25,226802,-40,0\n38,0,89814,-50,1\n?,0,336951,-40,1\n");

    let names = fs::read_to_string(out_dir.join("adult.transformed.names")).unwrap();
    assert!(names.starts_with("target: 0, 1.\n"));
    assert!(names.contains("workclass: continuous.\n"));
    assert!(names.contains("fnlwgt: ignore.\n"));
}

#[test]
fn test_config_file_sets_suffix() {
    let ws = Workspace::new();
    fs::write(
        ws.home.join("config.toml"),
        "[transform]\nsuffix = \"numeric\"\n",
    )
    .unwrap();

    let config: serde_json::Value = ws.run_json(&args(&["config", "--json"]));
    assert_eq!(config["home"], path_arg(&ws.home));
    assert_eq!(config["config_file"]["exists"], true);
    assert_eq!(config["effective"]["transform"]["suffix"], "numeric");

    let report: TransformOutput = ws.run_json(&[
        "transform".to_string(),
        ws.arg("adult.names"),
        ws.arg("adult.data"),
        "--json".to_string(),
    ]);
    assert_eq!(PathBuf::from(&report.outputs[0].output), ws.path("adult.numeric.data"));
    assert!(ws.path("adult.numeric.names").is_file());
}

#[test]
fn test_missing_names_file_is_json_error() {
    let ws = Workspace::new();
    let err = ws.run_json_error(&[
        "stats".to_string(),
        ws.arg("absent.names"),
        ws.arg("adult.data"),
        "--json".to_string(),
    ]);
    let message = err["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("File not found"), "{}", message);
    assert!(!err["error"]["suggestions"].as_array().unwrap().is_empty());
}

#[test]
fn test_short_row_is_json_error_with_line() {
    let ws = Workspace::new();
    fs::write(
        ws.path("short.data"),
        "39, Private, 77516, 40, <=50K\n50, Private, >50K\n",
    )
    .unwrap();
    let err = ws.run_json_error(&[
        "transform".to_string(),
        ws.arg("adult.names"),
        ws.arg("short.data"),
        "--json".to_string(),
    ]);
    let message = err["error"]["message"].as_str().unwrap();
    assert!(message.contains("Schema mismatch at line 2"), "{}", message);
    assert!(!ws.path("short.transformed.data").exists());
}

#[test]
fn test_bad_apply_file_publishes_no_outputs() {
    let ws = Workspace::new();
    let out_dir = ws.path("out");
    fs::write(ws.path("bad.test"), "25, Private, 226802, 40, <=50K\n25, Private\n").unwrap();
    let err = ws.run_json_error(&[
        "transform".to_string(),
        ws.arg("adult.names"),
        ws.arg("adult.data"),
        "--apply".to_string(),
        ws.arg("bad.test"),
        "--out-dir".to_string(),
        path_arg(&out_dir),
        "--json".to_string(),
    ]);
    let message = err["error"]["message"].as_str().unwrap();
    assert!(message.contains("Schema mismatch at line 2"), "{}", message);

    assert!(!out_dir.join("adult.transformed.names").exists());
    assert!(!out_dir.join("adult.transformed.data").exists());
    assert!(!out_dir.join("bad.transformed.test").exists());
    assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
}

#[test]
fn test_suffix_flag_is_validated() {
    let ws = Workspace::new();
    for suffix in ["a/b", ""] {
        let err = ws.run_json_error(&[
            "transform".to_string(),
            ws.arg("adult.names"),
            ws.arg("adult.data"),
            "--suffix".to_string(),
            suffix.to_string(),
            "--json".to_string(),
        ]);
        let message = err["error"]["message"].as_str().unwrap();
        assert!(message.contains("Invalid --suffix"), "{}", message);
    }
    assert!(!ws.path("adult.a").exists());
    assert!(!ws.path("adult..names").exists());
    assert!(!ws.path("adult..data").exists());
}

#[test]
fn test_broken_config_only_affects_commands_that_read_it() {
    let ws = Workspace::new();
    fs::write(ws.home.join("config.toml"), "[transform\nsuffix = \n").unwrap();

    fs::write(ws.path("stock.data"), "1.5,2.5,0.5,1\n").unwrap();
    let output = ws.run(&["reweight".to_string(), ws.arg("stock.data")]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let names: NamesOutput = ws.run_json(&[
        "names".to_string(),
        ws.arg("adult.names"),
        "--json".to_string(),
    ]);
    assert_eq!(names.target_feature, "target");

    let err = ws.run_json_error(&[
        "stats".to_string(),
        ws.arg("adult.names"),
        ws.arg("adult.data"),
        "--json".to_string(),
    ]);
    let message = format!("{}", err["error"]);
    assert!(message.contains("config"), "{}", message);
}

#[test]
fn test_reweight_prints_pairs() {
    let ws = Workspace::new();
    fs::write(ws.path("stock.data"), "1.5,2.5,0.5,1\n1.5,2.5,0.5,0\n").unwrap();
    let output = ws.run(&["reweight".to_string(), ws.arg("stock.data")]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "1.5,2.5,0.25,0\n1.5,2.5,0.75,1\n1.5,2.5,0.75,0\n1.5,2.5,0.25,1\n"
    );
}

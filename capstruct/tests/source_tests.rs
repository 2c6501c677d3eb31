use libtest_mimic::{Failed, Trial};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::{env, fs, io};
use walkdir::WalkDir;

fn main() {
    let args = libtest_mimic::Arguments::from_args();

    let tests = find_source_files("tests/schemas")
        .map(extract_schema_test)
        .collect();

    libtest_mimic::run(&args, tests).exit();
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
struct Config {
    #[serde(default = "DEFAULT_IGNORE")]
    ignore: bool,
    #[serde(default = "DEFAULT_EXIT_CODE")]
    exit_code: i32,
    /// The struct to read example data as.
    #[serde(default)]
    read_type: Option<String>,
    /// Framed messages, relative to the schema, that should read successfully.
    #[serde(default = "DEFAULT_EXAMPLE_DATA")]
    example_data: Vec<String>,
    /// Framed messages, relative to the schema, that should fail to read.
    #[serde(default = "DEFAULT_EXAMPLE_DATA")]
    example_data_invalid: Vec<String>,
    #[serde(skip)]
    update_snapshots: bool,
}

const DEFAULT_IGNORE: fn() -> bool = || false;
const DEFAULT_EXIT_CODE: fn() -> i32 = || 0;
const DEFAULT_EXAMPLE_DATA: fn() -> Vec<String> = Vec::new;

const CONFIG_COMMENT_START: &str = "#~";

struct TestFailure {
    name: &'static str,
    details: Vec<(&'static str, String)>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
struct SnapshotData {
    stdout: String,
    stderr: String,
}

#[derive(Debug)]
struct Snapshot {
    path: PathBuf,
    expected: Option<SnapshotData>,
    actual: SnapshotData,
}

#[derive(Eq, PartialEq, Debug)]
enum SnapshotOutcome {
    Equal,
    Different,
    Missing,
}

struct TestCommand<'a> {
    command: Command<'a>,
    config: &'a Config,
    input_file: &'a Path,
}

#[derive(Copy, Clone)]
enum Command<'a> {
    Compile,
    Read(&'a Path, &'a str, ExpectedOutcome),
}

#[derive(Copy, Clone)]
enum ExpectedOutcome {
    Success,
    Failure,
}

impl<'a> Command<'a> {
    fn expected_outcome(&self) -> ExpectedOutcome {
        match self {
            Command::Read(_, _, outcome) => *outcome,
            Command::Compile => ExpectedOutcome::Success,
        }
    }
}

/// Recursively walk over schema files under a file path.
fn find_source_files(root: impl AsRef<Path>) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| matches!(entry.path().extension(), Some(ext) if ext == "capnp"))
        .map(|entry| entry.into_path())
}

fn extract_schema_test(path: PathBuf) -> Trial {
    let is_ignored = matches!(read_config(&path), Ok(config) if config.ignore);
    Trial::test(path.display().to_string(), move || run_test(&path)).with_ignored_flag(is_ignored)
}

/// Collect the lines with the config comment prefix, stripping the prefix in
/// the process, and parse them as TOML.
fn read_config(input_file: &Path) -> Result<Config, TestFailure> {
    use itertools::Itertools;

    let input_source = fs::read_to_string(input_file).map_err(|error| TestFailure {
        name: "unexpected test command error",
        details: vec![("std::io::Error", error.to_string())],
    })?;
    let config_source = input_source
        .lines()
        .filter_map(|line| line.split(CONFIG_COMMENT_START).nth(1))
        .join("\n");

    match toml::from_str::<Config>(&config_source) {
        Ok(mut config) => {
            config.update_snapshots = env::var_os("CAPSTRUCT_UPDATE_SNAP").is_some();
            Ok(config)
        }
        Err(error) => Err(TestFailure {
            name: "config parse error",
            details: vec![("toml::de::Error", error.to_string())],
        }),
    }
}

fn run_test(input_file: &Path) -> Result<(), Failed> {
    let mut failures = Vec::new();

    let config = match read_config(input_file) {
        Ok(config) => config,
        Err(failure) => return failures_to_outcome(&[failure]),
    };

    run_command(Command::Compile, &config, input_file, &mut failures);

    let base_dir = input_file.with_file_name("");
    let examples = std::iter::empty()
        .chain(config.example_data.iter().map(|file| (file, ExpectedOutcome::Success)))
        .chain(config.example_data_invalid.iter().map(|file| (file, ExpectedOutcome::Failure)));

    for (example_file, outcome) in examples {
        let read_type = match &config.read_type {
            Some(read_type) => read_type.as_str(),
            None => {
                failures.push(TestFailure {
                    name: "config error",
                    details: vec![("read-type", "example data needs a read type".to_owned())],
                });
                break;
            }
        };
        let example_file = base_dir.join(example_file);
        let command = Command::Read(input_file, read_type, outcome);
        run_command(command, &config, &example_file, &mut failures);
    }

    failures_to_outcome(&failures)
}

fn run_command(command: Command<'_>, config: &Config, input_file: &Path, failures: &mut Vec<TestFailure>) {
    let test_command = TestCommand {
        command,
        config,
        input_file,
    };
    match test_command.run() {
        Ok(mut test_failures) => failures.append(&mut test_failures),
        Err(error) => {
            failures.push(TestFailure {
                name: "unexpected test command error",
                details: vec![("std::io::Error", error.to_string())],
            });
        }
    }
}

fn failures_to_outcome(failures: &[TestFailure]) -> Result<(), Failed> {
    if failures.is_empty() {
        return Ok(());
    }

    let mut msg = String::new();

    writeln!(msg).unwrap();
    for failure in failures {
        writeln!(msg, "    {}:", failure.name).unwrap();
        for (name, data) in &failure.details {
            writeln!(msg, "        ---- {name} ----").unwrap();
            for line in data.lines() {
                writeln!(msg, "        {line}").unwrap();
            }
        }
        writeln!(msg).unwrap();
    }
    writeln!(msg).unwrap();
    writeln!(msg, "    failures:").unwrap();
    for failure in failures {
        writeln!(msg, "        {}", failure.name).unwrap();
    }

    Err(msg.into())
}

impl<'a> TestCommand<'a> {
    fn run(&self) -> Result<Vec<TestFailure>, io::Error> {
        let mut failures = Vec::new();
        let mut exe = process::Command::from(self.command);
        exe.arg(self.input_file);

        let output = match exe.output() {
            Ok(output) => output,
            Err(error) => {
                failures.push(TestFailure {
                    name: "unexpected command error",
                    details: vec![("std::io::Error", error.to_string())],
                });
                return Ok(failures);
            }
        };

        let mut snapshot = Snapshot::new(self.input_file, &output)?;

        if self.config.update_snapshots && snapshot.outcome() != SnapshotOutcome::Equal {
            snapshot.update()?;
        }

        match snapshot.outcome() {
            SnapshotOutcome::Equal => {}
            SnapshotOutcome::Different => {
                let mut details = vec![("path", snapshot.path.to_string_lossy().into_owned())];
                if let Some(diff) = snapshot.stdout_diff() {
                    details.push(("stdout diff", diff));
                }
                if let Some(diff) = snapshot.stderr_diff() {
                    details.push(("stderr diff", diff));
                }
                failures.push(TestFailure {
                    name: "snapshot mismatch",
                    details,
                });
            }
            SnapshotOutcome::Missing => {
                let mut details = vec![("path", snapshot.path.to_string_lossy().into_owned())];
                if !snapshot.stdout().is_empty() {
                    details.push(("stdout", snapshot.stdout().to_owned()));
                }
                if !snapshot.stderr().is_empty() {
                    details.push(("stderr", snapshot.stderr().to_owned()));
                }
                failures.push(TestFailure {
                    name: "snapshot missing",
                    details,
                });
            }
        }

        if !command_status_matches_expectation(
            self.command.expected_outcome(),
            output.status.code(),
            self.config.exit_code,
        ) {
            let mut details = vec![("command", format!("{exe:?}"))];
            if output.status.code() != Some(self.config.exit_code) {
                details.push(("status", output.status.to_string()));
            }
            if !snapshot.stdout().is_empty() {
                details.push(("stdout", snapshot.stdout().to_owned()));
            }
            if !snapshot.stderr().is_empty() {
                details.push(("stderr", snapshot.stderr().to_owned()));
            }
            failures.push(TestFailure {
                name: "unexpected command output",
                details,
            });
        }

        Ok(failures)
    }
}

fn command_status_matches_expectation(
    expected_outcome: ExpectedOutcome,
    exit_code: Option<i32>,
    expected_code: i32,
) -> bool {
    let expected_code = Some(expected_code);
    match expected_outcome {
        ExpectedOutcome::Success => exit_code == expected_code,
        ExpectedOutcome::Failure => exit_code != Some(0),
    }
}

impl<'a> From<Command<'a>> for process::Command {
    fn from(command: Command<'_>) -> Self {
        let mut exe = process::Command::new(env!("CARGO_BIN_EXE_capstruct"));
        match command {
            Command::Compile => {
                exe.arg("compile");
            }
            Command::Read(schema, read_type, _) => {
                exe.arg("read");
                exe.arg(schema);
                exe.args(["--type", read_type]);
            }
        }
        exe
    }
}

impl Snapshot {
    fn new(test_path: &Path, output: &process::Output) -> Result<Snapshot, io::Error> {
        let mut file_name = test_path.file_stem().unwrap().to_os_string();
        file_name.push(".snap");

        let path = test_path.with_file_name(file_name);
        let actual = SnapshotData {
            stdout: String::from_utf8_lossy(&output.stdout).into(),
            stderr: String::from_utf8_lossy(&output.stderr).into(),
        };
        let expected = match fs::read_to_string(&path) {
            Ok(snap) => toml::from_str(&snap)
                .map(Some)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?,
            // A missing snapshot needs to be generated
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };
        Ok(Snapshot {
            path,
            expected,
            actual,
        })
    }

    fn stdout(&self) -> &str {
        &self.actual.stdout
    }

    fn stderr(&self) -> &str {
        &self.actual.stderr
    }

    fn update(&mut self) -> Result<(), io::Error> {
        let serialised = toml::to_string_pretty(&self.actual)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        fs::write(&self.path, serialised)?;
        self.expected = Some(self.actual.clone());
        Ok(())
    }

    fn outcome(&self) -> SnapshotOutcome {
        match &self.expected {
            Some(expected) if expected == &self.actual => SnapshotOutcome::Equal,
            Some(_) => SnapshotOutcome::Different,
            None => SnapshotOutcome::Missing,
        }
    }

    fn stdout_diff(&self) -> Option<String> {
        (self.expected.as_ref()).and_then(|expected| make_diff(&self.actual.stdout, &expected.stdout))
    }

    fn stderr_diff(&self) -> Option<String> {
        (self.expected.as_ref()).and_then(|expected| make_diff(&self.actual.stderr, &expected.stderr))
    }
}

fn make_diff(actual: &str, expected: &str) -> Option<String> {
    let mut diff = String::new();
    let mut left_line_number = 0;
    let mut right_line_number = 0;
    let line_count = actual.lines().count().max(expected.lines().count()).max(1);
    let line_width = line_count.to_string().len();
    for result in diff::lines(expected, actual) {
        match result {
            diff::Result::Left(l) => {
                left_line_number += 1;
                diff.push_str(&diff_line('-', left_line_number, line_width, l));
            }
            diff::Result::Both(_, _) => {
                left_line_number += 1;
                right_line_number += 1;
            }
            diff::Result::Right(r) => {
                right_line_number += 1;
                diff.push_str(&diff_line('+', right_line_number, line_width, r));
            }
        }
    }
    (!diff.is_empty()).then_some(diff)
}

fn diff_line(sign: char, line_number: usize, line_width: usize, line: &str) -> String {
    format!("{line_number:>line_width$}| {sign} {line}\n")
}

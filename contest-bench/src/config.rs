use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SetupError;
use crate::scenario::Scenario;

/// Login of one simulated user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
}

impl Credential {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Parser, Debug)]
#[command(name = "contest-bench")]
#[command(about = "Load testing utility for the BACS contest site")]
#[command(version)]
#[command(after_long_help = usage_examples())]
pub struct Cli {
    /// Number of parallel jobs
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Number of iterations
    #[arg(long, default_value_t = 1)]
    pub iterations: usize,

    /// BACS URL
    #[arg(long = "bacs-url")]
    pub bacs_url: String,

    /// Username
    #[arg(long, default_value = "")]
    pub username: String,

    /// Password, - to prompt for it without echo
    #[arg(long, default_value = "-")]
    pub password: String,

    /// Contest ID to use
    #[arg(long = "contest-id", default_value_t = 0)]
    pub contest_id: u64,

    /// Name of scenario to run
    #[arg(long, default_value = "AcmMonitor")]
    pub scenario: String,

    /// Configuration file for jobs (JSON array of {"Username", "Password"})
    #[arg(long = "jobs-config")]
    pub jobs_config: Option<PathBuf>,

    /// Write the aggregated result as JSON to this file
    #[arg(long = "json-report")]
    pub json_report: Option<PathBuf>,
}

/// Everything a run needs, fixed before the first worker starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub jobs: usize,
    pub iterations: usize,
    pub base_url: String,
    pub contest_id: u64,
    pub scenario: Scenario,
    pub credentials: Vec<Credential>,
    pub json_report: Option<PathBuf>,
}

impl Cli {
    /// Validates the flags and resolves credentials. `read_password` is only
    /// called when credentials come from flags and the password is `-`.
    pub fn into_config<P>(self, read_password: P) -> Result<RunConfig, SetupError>
    where
        P: FnOnce() -> std::io::Result<String>,
    {
        if self.jobs == 0 {
            return Err(SetupError::Config("--jobs must be at least 1".to_string()));
        }
        if self.iterations == 0 {
            return Err(SetupError::Config(
                "--iterations must be at least 1".to_string(),
            ));
        }
        let scenario: Scenario = self.scenario.parse()?;
        let base_url = validate_base_url(&self.bacs_url)?;

        let credentials = match &self.jobs_config {
            Some(path) => load_credentials(path)?,
            None => {
                let password = if self.password == "-" {
                    read_password().map_err(SetupError::Password)?
                } else {
                    self.password.clone()
                };
                vec![Credential::new(self.username.clone(), password); self.jobs]
            }
        };
        let credentials = select_credentials(credentials, self.jobs)?;

        Ok(RunConfig {
            jobs: self.jobs,
            iterations: self.iterations,
            base_url,
            contest_id: self.contest_id,
            scenario,
            credentials,
            json_report: self.json_report,
        })
    }
}

fn validate_base_url(raw: &str) -> Result<String, SetupError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| SetupError::Config(format!("Invalid --bacs-url {raw:?}: {e}")))?;
    if url.scheme() != "http" || !url.has_host() {
        return Err(SetupError::Config(format!(
            "--bacs-url must be an absolute http:// url, got {raw:?}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Reads a JSON array of credentials.
pub fn load_credentials(path: &Path) -> Result<Vec<Credential>, SetupError> {
    let data = std::fs::read(path).map_err(|source| SetupError::CredentialsFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| SetupError::CredentialsFormat {
        path: path.to_path_buf(),
        source,
    })
}

/// Keeps the first `jobs` credentials. Never reuses an entry.
pub fn select_credentials(
    mut credentials: Vec<Credential>,
    jobs: usize,
) -> Result<Vec<Credential>, SetupError> {
    if credentials.len() < jobs {
        return Err(SetupError::InsufficientCredentials {
            available: credentials.len(),
            jobs,
        });
    }
    credentials.truncate(jobs);
    Ok(credentials)
}

fn usage_examples() -> String {
    let example = serde_json::to_string_pretty(&[
        Credential::new("user1@example.com", "password1"),
        Credential::new("user2@example.com", "password2"),
    ])
    .unwrap_or_default()
    .replace('\n', "\n    ");
    format!(
        "\
Supported scenarios: {scenarios}

Usage examples:
    Request AcmMonitor by 2 workers in parallel, 10 times each.

        contest-bench --bacs-url http://testing.new.bacs.cs.istu.ru \\
            --contest-id 1 \\
            --username you@example.com \\
            --jobs 2 --iterations 10 \\
            --scenario AcmMonitor

    Submit to problem A \"A+B\" solution,
    use first 5 users.json as source of users/passwords, each does 10 iterations

        contest-bench --bacs-url http://testing.new.bacs.cs.istu.ru \\
            --contest-id 1 \\
            --jobs-config users.json \\
            --jobs 5 --iterations 10 \\
            --scenario SubmitA

--jobs-config example (JSON array):
    {example}",
        scenarios = Scenario::names().join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["contest-bench", "--bacs-url", "http://bacs.local"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn no_prompt() -> std::io::Result<String> {
        panic!("password prompt not expected")
    }

    #[test]
    fn defaults_match_the_original_flags() {
        let cli = cli(&[]);
        assert_eq!(cli.jobs, 1);
        assert_eq!(cli.iterations, 1);
        assert_eq!(cli.password, "-");
        assert_eq!(cli.contest_id, 0);
        assert_eq!(cli.scenario, "AcmMonitor");
    }

    #[test]
    fn uniform_credentials_are_repeated_per_job() {
        let config = cli(&["--jobs", "3", "--username", "u", "--password", "p"])
            .into_config(no_prompt)
            .unwrap();
        assert_eq!(config.credentials, vec![Credential::new("u", "p"); 3]);
        assert_eq!(config.scenario, Scenario::AcmMonitor);
        assert_eq!(config.base_url, "http://bacs.local");
    }

    #[test]
    fn dash_password_is_prompted() {
        let config = cli(&["--username", "u", "--scenario", "SubmitA"])
            .into_config(|| Ok("secret".to_string()))
            .unwrap();
        assert_eq!(config.credentials[0].password, "secret");
        assert_eq!(config.scenario, Scenario::SubmitA);
    }

    #[test]
    fn jobs_config_is_truncated_to_jobs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"Username": "a", "Password": "1"}},
                {{"Username": "b", "Password": "2"}},
                {{"Username": "c", "Password": "3"}}]"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = cli(&["--jobs", "2", "--jobs-config", &path])
            .into_config(no_prompt)
            .unwrap();
        assert_eq!(
            config.credentials,
            vec![Credential::new("a", "1"), Credential::new("b", "2")]
        );
    }

    #[test]
    fn short_jobs_config_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"Username": "a", "Password": "1"}}]"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let err = cli(&["--jobs", "2", "--jobs-config", &path])
            .into_config(no_prompt)
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::InsufficientCredentials {
                available: 1,
                jobs: 2
            }
        ));
    }

    #[test]
    fn malformed_jobs_config_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let err = cli(&["--jobs-config", &path])
            .into_config(no_prompt)
            .unwrap_err();
        assert!(matches!(err, SetupError::CredentialsFormat { .. }));
    }

    #[test]
    fn rejects_bad_flags() {
        assert!(matches!(
            cli(&["--jobs", "0", "--password", "p"]).into_config(no_prompt),
            Err(SetupError::Config(_))
        ));
        assert!(matches!(
            cli(&["--iterations", "0", "--password", "p"]).into_config(no_prompt),
            Err(SetupError::Config(_))
        ));
        assert!(matches!(
            cli(&["--scenario", "Nope", "--password", "p"]).into_config(no_prompt),
            Err(SetupError::UnknownScenario { .. })
        ));
        let https = Cli::try_parse_from([
            "contest-bench",
            "--bacs-url",
            "https://bacs.local",
            "--password",
            "p",
        ])
        .unwrap();
        assert!(matches!(https.into_config(no_prompt), Err(SetupError::Config(_))));
    }

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let config = Cli::try_parse_from([
            "contest-bench",
            "--bacs-url",
            "http://bacs.local/bacs/",
            "--password",
            "p",
        ])
        .unwrap()
        .into_config(no_prompt)
        .unwrap();
        assert_eq!(config.base_url, "http://bacs.local/bacs");
    }

    #[test]
    fn usage_lists_scenarios_and_jobs_example() {
        let usage = usage_examples();
        assert!(usage.contains("AcmMonitor, MySchoolFinalSubmits, SchoolFinalMonitor, SubmitA"));
        assert!(usage.contains(r#""Username": "user1@example.com""#));
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", Credential::new("u", "hunter2"));
        assert!(!shown.contains("hunter2"));
    }
}

//! Workflow Data Model
//!
//! Core data structures representing a publishing workflow: jobs, the steps
//! inside them and the dependencies between jobs.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: Publish poems
//! on:
//!   push:
//!     branches: [main]
//!   workflow_dispatch:
//!
//! jobs:
//!   build:
//!     runs-on: ubuntu-latest
//!     steps:
//!       - uses: actions/checkout@v4
//!       - uses: poempress/generate
//!         with:
//!           input: poems.txt
//!       - uses: poempress/stage
//!         with:
//!           dest: public
//!       - uses: actions/upload-pages-artifact@v3
//!         with:
//!           path: public
//!
//!   deploy:
//!     needs: build
//!     environment:
//!       name: github-pages
//!       url: ${{ steps.deployment.outputs.page_url }}
//!     steps:
//!       - id: deployment
//!         uses: actions/deploy-pages@v4
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::triggers::Triggers;

/// Deserializes either a single string or array of strings into Vec<String>
fn single_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Array(arr) => arr
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(de::Error::custom("Expected string in array")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected string or array of strings")),
    }
}

/// Deserializes a map of scalars, stringifying numbers and booleans.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => {
                        return Err(de::Error::custom(format!(
                            "Expected a scalar value for '{}'",
                            key
                        )))
                    }
                };
                Ok((key, value))
            })
            .collect(),
        _ => Err(de::Error::custom("Expected a mapping")),
    }
}

/// A single step inside a job: either an action (`uses`) or a script (`run`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Identifier used to reference this step's outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Action reference, e.g. `actions/checkout@v4`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Shell script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Action inputs
    #[serde(
        default,
        deserialize_with = "scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub with: BTreeMap<String, String>,

    #[serde(
        default,
        deserialize_with = "scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub env: BTreeMap<String, String>,

    /// Directory for `run` scripts, relative to the workspace
    #[serde(
        default,
        rename = "working-directory",
        skip_serializing_if = "Option::is_none"
    )]
    pub working_directory: Option<String>,
}

impl Step {
    /// Creates a step that runs an action.
    ///
    /// # Example
    ///
    /// ```
    /// use poempress::workflow::Step;
    ///
    /// let step = Step::action("actions/upload-pages-artifact@v3")
    ///     .with_id("upload")
    ///     .with_input("path", "public");
    /// assert_eq!(step.input("path"), Some("public"));
    /// ```
    pub fn action(uses: impl Into<String>) -> Self {
        Self {
            uses: Some(uses.into().trim().to_string()),
            ..Self::default()
        }
    }

    /// Creates a step that runs a shell script.
    pub fn script(run: impl Into<String>) -> Self {
        Self {
            run: Some(run.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets an action input.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Returns an action input, if set.
    pub fn input(&self, key: &str) -> Option<&str> {
        self.with.get(key).map(String::as_str)
    }

    /// Human readable label: name, id, action or first script line.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_ref().or(self.id.as_ref()) {
            return name.clone();
        }
        if let Some(uses) = &self.uses {
            return uses.clone();
        }
        self.run
            .as_deref()
            .and_then(|run| run.lines().map(str::trim).find(|l| !l.is_empty()))
            .map(|line| format!("Run {}", line))
            .unwrap_or_else(|| "(empty step)".to_string())
    }
}

/// Deployment environment a job targets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "EnvironmentSpec")]
pub struct Environment {
    pub name: String,
    /// URL expression reported after the job succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `environment: name` or `environment: {name, url}`
#[derive(Deserialize)]
#[serde(untagged)]
enum EnvironmentSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        url: Option<String>,
    },
}

impl From<EnvironmentSpec> for Environment {
    fn from(spec: EnvironmentSpec) -> Self {
        match spec {
            EnvironmentSpec::Name(name) => Self { name, url: None },
            EnvironmentSpec::Full { name, url } => Self { name, url },
        }
    }
}

/// A group of steps executed in order on a single fresh workspace.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Job {
    /// Key of the job in the `jobs` mapping
    #[serde(skip)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Runner label; informational only
    #[serde(default, rename = "runs-on", skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,

    /// IDs of jobs that must complete before this job can run
    #[serde(
        default,
        deserialize_with = "single_or_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub needs: Vec<String>,

    /// IDs of jobs that depend on this job (auto-populated)
    #[serde(skip)]
    pub next: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    #[serde(
        default,
        deserialize_with = "scalar_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Adds a dependency on another job.
    pub fn depends_on(mut self, job_id: impl Into<String>) -> Self {
        self.needs.push(job_id.into());
        self
    }

    pub fn with_environment(mut self, name: impl Into<String>, url: Option<&str>) -> Self {
        self.environment = Some(Environment {
            name: name.into(),
            url: url.map(str::to_string),
        });
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Deserializes the `jobs` mapping, keeping declaration order and
/// assigning each job its key as ID.
fn jobs_from_map<'de, D>(deserializer: D) -> Result<Vec<Job>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    mapping
        .into_iter()
        .map(|(key, value)| {
            let id = key
                .as_str()
                .ok_or_else(|| <D::Error as de::Error>::custom("Job IDs must be strings"))?
                .to_string();
            let mut job: Job = serde_yaml::from_value(value)
                .map_err(|e| <D::Error as de::Error>::custom(format!("job '{}': {}", id, e)))?;
            job.id = id;
            Ok(job)
        })
        .collect()
}

fn jobs_to_map<S>(jobs: &[Job], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(jobs.iter().map(|job| (&job.id, job)))
}

/// A complete workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Events that start the workflow
    #[serde(rename = "on", default)]
    pub triggers: Triggers,

    /// Jobs in declaration order (topological order after validation)
    #[serde(
        default,
        deserialize_with = "jobs_from_map",
        serialize_with = "jobs_to_map"
    )]
    pub jobs: Vec<Job>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a workflow from a list of jobs.
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        Self {
            jobs,
            ..Self::default()
        }
    }

    /// Adds a job to the workflow.
    pub fn add_job(&mut self, job: Job) -> Result<(), String> {
        if self.jobs.iter().any(|j| j.id == job.id) {
            return Err(format!("Job '{}' already exists", job.id));
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Gets a job by ID.
    pub fn get_job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// IDs of every job downstream of `id`, excluding `id` itself.
    pub fn dependents_of(&self, id: &str) -> HashSet<String> {
        let mut found = HashSet::new();
        let mut stack = vec![id.to_string()];

        while let Some(current) = stack.pop() {
            for job in &self.jobs {
                if job.needs.contains(&current) && found.insert(job.id.clone()) {
                    stack.push(job.id.clone());
                }
            }
        }
        found
    }

    /// Total number of steps across all jobs.
    pub fn step_count(&self) -> usize {
        self.jobs.iter().map(|j| j.steps.len()).sum()
    }

    /// Returns the number of jobs in the workflow.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if the workflow has no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

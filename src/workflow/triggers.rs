//! Workflow Triggers
//!
//! Parses the `on:` section and decides whether an event starts a run.
//!
//! Accepted forms:
//!
//! ```yaml
//! on: push
//! on: [push, workflow_dispatch]
//! on:
//!   push:
//!     branches: [main, 'release/**']
//!     branches-ignore: [wip/*]
//!   workflow_dispatch:
//! ```

use std::fmt;

use glob_match::glob_match;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// An event that may start a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// A push to a branch
    Push { branch: String },
    /// A manual `workflow_dispatch`
    ManualDispatch,
}

impl TriggerEvent {
    pub fn push(branch: impl Into<String>) -> Self {
        Self::Push {
            branch: branch.into(),
        }
    }

    /// Event name as it appears under `on:`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::ManualDispatch => "workflow_dispatch",
        }
    }

    /// Branch the event refers to, if any.
    pub fn ref_name(&self) -> Option<&str> {
        match self {
            Self::Push { branch } => Some(branch),
            Self::ManualDispatch => None,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push { branch } => write!(f, "push to '{}'", branch),
            Self::ManualDispatch => f.write_str("manual dispatch"),
        }
    }
}

/// Branch restrictions of a push trigger. Patterns are globs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchFilter {
    pub branches: Vec<String>,
    pub branches_ignore: Vec<String>,
}

impl BranchFilter {
    pub fn matches(&self, branch: &str) -> bool {
        let included = self.branches.is_empty()
            || self.branches.iter().any(|p| glob_match(p, branch));
        let ignored = self.branches_ignore.iter().any(|p| glob_match(p, branch));
        included && !ignored
    }
}

/// The events a workflow listens to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Triggers {
    /// Present if the workflow runs on pushes
    pub push: Option<BranchFilter>,
    /// True if the workflow can be started manually
    pub workflow_dispatch: bool,
    /// Declared events this runner never produces
    pub other: Vec<String>,
}

impl Triggers {
    /// Returns true if `event` starts this workflow.
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        match event {
            TriggerEvent::Push { branch } => self
                .push
                .as_ref()
                .map(|filter| filter.matches(branch))
                .unwrap_or(false),
            TriggerEvent::ManualDispatch => self.workflow_dispatch,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.push.is_none() && !self.workflow_dispatch && self.other.is_empty()
    }

    /// Names of all declared events.
    pub fn event_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.push.is_some() {
            names.push("push".to_string());
        }
        if self.workflow_dispatch {
            names.push("workflow_dispatch".to_string());
        }
        names.extend(self.other.iter().cloned());
        names
    }

    fn add_event<E: de::Error>(&mut self, name: &str, config: Option<&Value>) -> Result<(), E> {
        match name {
            "push" => {
                self.push = Some(branch_filter(config)?);
            }
            "workflow_dispatch" => self.workflow_dispatch = true,
            other => self.other.push(other.to_string()),
        }
        Ok(())
    }
}

fn string_list<E: de::Error>(value: Option<&Value>, key: &str) -> Result<Vec<String>, E> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| E::custom(format!("'{}' entries must be strings", key)))
            })
            .collect(),
        Some(_) => Err(E::custom(format!("'{}' must be a string or list", key))),
    }
}

fn branch_filter<E: de::Error>(config: Option<&Value>) -> Result<BranchFilter, E> {
    match config {
        None | Some(Value::Null) => Ok(BranchFilter::default()),
        Some(Value::Mapping(map)) => Ok(BranchFilter {
            branches: string_list(map.get("branches"), "branches")?,
            branches_ignore: string_list(map.get("branches-ignore"), "branches-ignore")?,
        }),
        Some(_) => Err(E::custom("push trigger configuration must be a mapping")),
    }
}

impl<'de> Deserialize<'de> for Triggers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let mut triggers = Triggers::default();

        match &value {
            Value::Null => {}
            Value::String(name) => triggers.add_event::<D::Error>(name, None)?,
            Value::Sequence(names) => {
                for name in names {
                    let name = name.as_str().ok_or_else(|| {
                        <D::Error as de::Error>::custom("Trigger names must be strings")
                    })?;
                    triggers.add_event::<D::Error>(name, None)?;
                }
            }
            Value::Mapping(map) => {
                for (name, config) in map {
                    let name = name.as_str().ok_or_else(|| {
                        <D::Error as de::Error>::custom("Trigger names must be strings")
                    })?;
                    triggers.add_event::<D::Error>(name, Some(config))?;
                }
            }
            _ => return Err(de::Error::custom("Unsupported 'on' value")),
        }

        Ok(triggers)
    }
}

fn is_empty_list(list: &&[String]) -> bool {
    list.is_empty()
}

/// Serialized push filter; empty lists are omitted.
#[derive(Serialize)]
struct FilterBody<'a> {
    #[serde(skip_serializing_if = "is_empty_list")]
    branches: &'a [String],
    #[serde(rename = "branches-ignore", skip_serializing_if = "is_empty_list")]
    branches_ignore: &'a [String],
}

impl Serialize for Triggers {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(filter) = &self.push {
            if filter.branches.is_empty() && filter.branches_ignore.is_empty() {
                map.serialize_entry("push", &())?;
            } else {
                map.serialize_entry(
                    "push",
                    &FilterBody {
                        branches: &filter.branches,
                        branches_ignore: &filter.branches_ignore,
                    },
                )?;
            }
        }
        if self.workflow_dispatch {
            map.serialize_entry("workflow_dispatch", &())?;
        }
        for name in &self.other {
            map.serialize_entry(name, &())?;
        }
        map.end()
    }
}

//! Job Context
//!
//! Per-job state visible to `${{ ... }}` expressions: the event that
//! started the run, the job workspace, environment variables and the
//! outputs of steps that already ran.
//!
//! Supported expressions:
//!
//! - `steps.<id>.outputs.<key>`
//! - `env.<NAME>`
//! - `github.event_name`, `github.ref_name`, `github.workspace`
//! - quoted string literals (`'text'`)

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::warn;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::workflow::{Step, TriggerEvent};

static EXPRESSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\{\s*(.*?)\s*\}\}").expect("expression pattern is valid"));

/// Evaluation scope for one job.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: String,
    workspace: PathBuf,
    event_name: String,
    ref_name: String,
    env: BTreeMap<String, String>,
    step_outputs: HashMap<String, BTreeMap<String, String>>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, workspace: impl Into<PathBuf>, event: &TriggerEvent) -> Self {
        Self {
            job_id: job_id.into(),
            workspace: workspace.into(),
            event_name: event.name().to_string(),
            ref_name: event.ref_name().unwrap_or_default().to_string(),
            env: BTreeMap::new(),
            step_outputs: HashMap::new(),
        }
    }

    /// Adds environment variables, evaluating expressions in their values.
    pub fn extend_env(&mut self, vars: &BTreeMap<String, String>) {
        for (key, value) in vars {
            let value = self.evaluate(value, &self.env);
            self.env.insert(key.clone(), value);
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Job environment overlaid with the step's own `env:`.
    pub fn step_env(&self, step: &Step) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        for (key, value) in &step.env {
            let value = self.evaluate(value, &env);
            env.insert(key.clone(), value);
        }
        env
    }

    /// Records outputs of a step with an `id`.
    pub fn record_outputs(&mut self, step_id: &str, outputs: BTreeMap<String, String>) {
        self.step_outputs
            .entry(step_id.to_string())
            .or_default()
            .extend(outputs);
    }

    pub fn output(&self, step_id: &str, key: &str) -> Option<&str> {
        self.step_outputs
            .get(step_id)
            .and_then(|outputs| outputs.get(key))
            .map(String::as_str)
    }

    /// Replaces every `${{ ... }}` in `text`. Unknown expressions become
    /// empty strings.
    pub fn evaluate(&self, text: &str, env: &BTreeMap<String, String>) -> String {
        if !text.contains("${{") {
            return text.to_string();
        }

        EXPRESSION_PATTERN
            .replace_all(text, |caps: &Captures| {
                let expression = &caps[1];
                self.lookup(expression, env).unwrap_or_else(|| {
                    warn!(
                        "Job '{}': unknown expression '{}' evaluates to an empty string",
                        self.job_id, expression
                    );
                    String::new()
                })
            })
            .into_owned()
    }

    /// Evaluates every value of a `with:` map.
    pub fn evaluate_inputs(
        &self,
        inputs: &BTreeMap<String, String>,
        env: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        inputs
            .iter()
            .map(|(key, value)| (key.clone(), self.evaluate(value, env)))
            .collect()
    }

    fn lookup(&self, expression: &str, env: &BTreeMap<String, String>) -> Option<String> {
        if let Some(literal) = expression
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
        {
            return Some(literal.replace("''", "'"));
        }

        let parts: Vec<&str> = expression.split('.').collect();
        match parts.as_slice() {
            ["steps", step_id, "outputs", key] => self.output(step_id, key).map(str::to_string),
            ["env", name] => env.get(*name).cloned(),
            ["github", "event_name"] => Some(self.event_name.clone()),
            ["github", "ref_name"] => Some(self.ref_name.clone()),
            ["github", "workspace"] => Some(self.workspace.display().to_string()),
            ["github", "job"] => Some(self.job_id.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> JobContext {
        JobContext::new("deploy", "/work/deploy", &TriggerEvent::push("main"))
    }

    #[test]
    fn test_plain_text_unchanged() {
        let ctx = context();
        assert_eq!(ctx.evaluate("no expressions", &BTreeMap::new()), "no expressions");
    }

    #[test]
    fn test_step_outputs() {
        let mut ctx = context();
        let mut outputs = BTreeMap::new();
        outputs.insert("page_url".to_string(), "https://example.org/".to_string());
        ctx.record_outputs("deployment", outputs);

        assert_eq!(
            ctx.evaluate("${{ steps.deployment.outputs.page_url }}", ctx.env()),
            "https://example.org/"
        );
        assert_eq!(ctx.output("deployment", "page_url"), Some("https://example.org/"));
    }

    #[test]
    fn test_github_context() {
        let ctx = context();
        assert_eq!(
            ctx.evaluate("${{github.event_name}} on ${{ github.ref_name }}", ctx.env()),
            "push on main"
        );
        assert_eq!(ctx.evaluate("${{ github.workspace }}", ctx.env()), "/work/deploy");
    }

    #[test]
    fn test_manual_dispatch_has_empty_ref() {
        let ctx = JobContext::new("build", "/w", &TriggerEvent::ManualDispatch);
        assert_eq!(
            ctx.evaluate("[${{ github.event_name }}][${{ github.ref_name }}]", ctx.env()),
            "[workflow_dispatch][]"
        );
    }

    #[test]
    fn test_env_layers() {
        let mut ctx = context();
        let mut job_env = BTreeMap::new();
        job_env.insert("SITE".to_string(), "public".to_string());
        job_env.insert("TARGET".to_string(), "${{ env.SITE }}/out".to_string());
        ctx.extend_env(&job_env);
        assert_eq!(ctx.env()["TARGET"], "public/out");

        let step = Step::script("ls").with_env("SITE", "site");
        let env = ctx.step_env(&step);
        assert_eq!(ctx.evaluate("${{ env.SITE }}", &env), "site");
        assert_eq!(ctx.evaluate("${{ env.SITE }}", ctx.env()), "public");
    }

    #[test]
    fn test_unknown_expression_is_empty() {
        let ctx = context();
        assert_eq!(
            ctx.evaluate("a${{ secrets.TOKEN }}b${{ steps.missing.outputs.x }}c", ctx.env()),
            "abc"
        );
    }

    #[test]
    fn test_string_literal() {
        let ctx = context();
        assert_eq!(ctx.evaluate("${{ 'it''s' }}", ctx.env()), "it's");
    }

    #[test]
    fn test_evaluate_inputs() {
        let ctx = context();
        let mut inputs = BTreeMap::new();
        inputs.insert("path".to_string(), "${{ github.workspace }}/public".to_string());

        let evaluated = ctx.evaluate_inputs(&inputs, ctx.env());
        assert_eq!(evaluated["path"], "/work/deploy/public");
    }
}

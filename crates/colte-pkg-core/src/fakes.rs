//! In-memory command runner (testing only)
//!
//! `ScriptedRunner` records every command it is asked to run and answers
//! from a list of rules instead of spawning processes.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::exec::{CommandOutput, CommandRunner, ToolCommand};

type Matcher = Box<dyn Fn(&ToolCommand) -> bool + Send + Sync>;

struct Rule {
    matches: Matcher,
    output: CommandOutput,
}

/// Runner that records invocations and replies from scripted rules.
///
/// Rules are checked in the order they were added; the first match
/// wins. Commands matching no rule succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching commands with `output`.
    pub fn respond_when<F>(mut self, matches: F, output: CommandOutput) -> Self
    where
        F: Fn(&ToolCommand) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matches: Box::new(matches),
            output,
        });
        self
    }

    /// Fail matching commands with exit code 1 and the given stderr.
    pub fn fail_when<F>(self, matches: F, stderr: &str) -> Self
    where
        F: Fn(&ToolCommand) -> bool + Send + Sync + 'static,
    {
        self.respond_when(matches, CommandOutput::failed(1, stderr))
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    /// Commands whose program and first argument match, e.g. `("docker", "run")`.
    pub fn calls_to(&self, program: &str, subcommand: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program && c.args.iter().any(|a| a == subcommand))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let output = self
            .rules
            .iter()
            .find(|rule| (rule.matches)(command))
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}

/// Matcher: the command has an argument equal to `arg`.
pub fn has_arg(arg: &'static str) -> impl Fn(&ToolCommand) -> bool + Send + Sync + 'static {
    move |cmd| cmd.args.iter().any(|a| a == arg)
}

/// Matcher: some argument contains `needle`.
pub fn arg_contains(
    needle: &'static str,
) -> impl Fn(&ToolCommand) -> bool + Send + Sync + 'static {
    move |cmd| cmd.args.iter().any(|a| a.contains(needle))
}

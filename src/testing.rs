//! Recording command runner for tests.

use crate::command_runner::{CommandOutput, CommandRunner, ToolCommand};
use crate::error::Result;

type Rule = (Box<dyn Fn(&ToolCommand) -> bool>, CommandOutput);

/// Records every command; answers with the first matching rule, else success.
///
/// In dry-run mode mutating commands are not answered by the rules: they go
/// to `skipped` and report success, like [`SystemRunner`](crate::SystemRunner).
#[derive(Default)]
pub struct FakeRunner {
    /// Commands that were executed
    pub calls: Vec<ToolCommand>,
    /// Mutating commands suppressed by dry-run
    pub skipped: Vec<ToolCommand>,
    rules: Vec<Rule>,
    dry_run: bool,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn on(
        mut self,
        matches: impl Fn(&ToolCommand) -> bool + 'static,
        output: CommandOutput,
    ) -> Self {
        self.rules.push((Box::new(matches), output));
        self
    }

    pub fn count(&self, program: &str, subcommand: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| is(c, program, subcommand))
            .count()
    }

    pub fn count_program(&self, program: &str) -> usize {
        self.calls.iter().filter(|c| c.program == program).count()
    }

    pub fn find(&self, program: &str, subcommand: &str) -> Option<&ToolCommand> {
        self.calls.iter().find(|c| is(c, program, subcommand))
    }
}

pub fn is(command: &ToolCommand, program: &str, subcommand: &str) -> bool {
    command.program == program && command.subcommand() == Some(subcommand)
}

impl CommandRunner for FakeRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutput> {
        if self.dry_run && command.mutating {
            self.skipped.push(command.clone());
            return Ok(CommandOutput::skipped());
        }

        self.calls.push(command.clone());
        let output = self
            .rules
            .iter()
            .find(|(matches, _)| matches(command))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

use std::path::PathBuf;
use std::process::Command;

use crate::ledger::config::ExtractorCommand;
use crate::ledger::util::run_command_with_optional_timeout;
use crate::logging::log;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorRun {
    pub program: String,
    /// Exit code, `None` when killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

fn resolve_program(program: &str) -> PathBuf {
    let path = PathBuf::from(program);
    if path.components().count() > 1 || path.is_file() {
        return path;
    }
    which::which(program).unwrap_or(path)
}

/// Run the downstream extractors in order after a merge. Outcomes are logged
/// and reported but never fail the run.
pub fn run_extractors(commands: &[ExtractorCommand]) -> Vec<ExtractorRun> {
    let mut runs = Vec::with_capacity(commands.len());
    for command in commands {
        log(format!(
            "Running extractor: {} {}",
            command.program,
            command.args.join(" ")
        ));
        let mut cmd = Command::new(resolve_program(&command.program));
        cmd.args(&command.args);
        let run = match run_command_with_optional_timeout(&mut cmd, command.timeout_secs) {
            Ok(out) => ExtractorRun {
                program: command.program.clone(),
                exit_code: out.status.code(),
                error: None,
            },
            Err(err) => ExtractorRun {
                program: command.program.clone(),
                exit_code: None,
                error: Some(format!("{err:#}")),
            },
        };
        match (&run.exit_code, &run.error) {
            (_, Some(err)) => log(format!("Extractor {} failed to run: {err}", run.program)),
            (Some(code), None) => log(format!("Extractor {} exited with {code}", run.program)),
            (None, None) => log(format!("Extractor {} terminated by signal", run.program)),
        }
        runs.push(run);
    }
    runs
}

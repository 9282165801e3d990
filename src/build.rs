#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::process::{CommandOutput, ProcessRunner};

/// First target declared with `add_executable(<name> ...)`.
static ADD_EXECUTABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"add_executable\s*\(\s*([\w.-]+)").expect("add_executable regex is valid")
});

/// Executable run when `CMakeLists.txt` declares none.
pub const DEFAULT_EXECUTABLE: &str = "main";

/// Configures and builds into `./build`.
const CONFIGURE_AND_BUILD: &str = "mkdir -p build && cd build && cmake .. && cmake --build .";

/// What happened when a submission was built and run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Output of the configure and build step.
    pub build:      CommandOutput,
    /// Executable that was (or would have been) run.
    pub executable: String,
    /// Output of the program, if it ran to completion.
    pub run:        Option<CommandOutput>,
    /// Why the program has no output: the build failed, or it could not be
    /// started or timed out.
    pub error:      Option<String>,
}

impl BuildOutcome {
    /// The build step succeeded.
    pub fn built(&self) -> bool {
        self.build.success()
    }

    /// Program stdout, empty when it never ran.
    pub fn stdout(&self) -> &str {
        self.run.as_ref().map(|r| r.stdout.as_str()).unwrap_or_default()
    }

    /// Short description for the summary table.
    pub fn status(&self) -> String {
        match (&self.run, &self.error) {
            _ if !self.built() => format!("build failed ({})", self.build.exit_code),
            (Some(run), _) if run.success() => "ok".to_string(),
            (Some(run), _) => format!("exited with {}", run.exit_code),
            (None, Some(e)) => e.clone(),
            (None, None) => "did not run".to_string(),
        }
    }
}

/// Name of the executable declared in `cmake_lists`.
pub fn executable_name(cmake_lists: &str) -> String {
    ADD_EXECUTABLE
        .captures(cmake_lists)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string())
}

/// Builds CMake projects and runs the resulting program.
///
/// The build and the program run through separate runners so each can carry
/// its own timeout.
#[derive(Debug, Clone, Copy)]
pub struct BuildDriver<'a, R: ProcessRunner> {
    /// Runs `cmake`.
    builder:  &'a R,
    /// Runs the built program.
    executor: &'a R,
}

impl<'a, R: ProcessRunner> BuildDriver<'a, R> {
    /// Creates a driver.
    pub fn new(builder: &'a R, executor: &'a R) -> Self {
        Self { builder, executor }
    }

    /// Configures, builds and runs the project in `project`.
    ///
    /// A failing build, a failing program and a timed out program are all
    /// reported in the outcome. `Err` means cmake itself could not be run.
    pub async fn build_and_run(&self, project: &Path) -> anyhow::Result<BuildOutcome> {
        let lists = project.join("CMakeLists.txt");
        let Ok(cmake_lists) = std::fs::read_to_string(&lists) else {
            tracing::warn!("no CMakeLists.txt in {}", project.display());
            return Ok(BuildOutcome {
                build: CommandOutput {
                    stderr: format!("{} not found", lists.display()),
                    exit_code: 1,
                    ..Default::default()
                },
                executable: DEFAULT_EXECUTABLE.to_string(),
                error: Some("no CMakeLists.txt".to_string()),
                ..Default::default()
            });
        };
        let executable = executable_name(&cmake_lists);

        let build = self.builder.run(CONFIGURE_AND_BUILD, Some(project)).await?;
        if !build.success() {
            tracing::info!("build failed in {} with code {}", project.display(), build.exit_code);
            return Ok(BuildOutcome {
                error: Some("build failed".to_string()),
                build,
                executable,
                run: None,
            });
        }

        let command = format!("./build/{executable}");
        match self.executor.run(&command, Some(project)).await {
            Ok(run) => Ok(BuildOutcome {
                build,
                executable,
                run: Some(run),
                error: None,
            }),
            Err(e) => {
                tracing::warn!("{command} in {}: {e:#}", project.display());
                Ok(BuildOutcome {
                    build,
                    executable,
                    run: None,
                    error: Some(format!("{e:#}")),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_executable() {
        let lists = "project(ht)\nadd_executable( hash_table main.cpp HashTable.cpp)\n\
                     add_executable(tests test.cpp)";
        assert_eq!(executable_name(lists), "hash_table");
        assert_eq!(executable_name("project(x)"), DEFAULT_EXECUTABLE);
    }
}

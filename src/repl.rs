use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{EvoError, Result},
    runtime::{RunMode, Runtime},
};

/// Line-at-a-time interactive session. Every line runs in the same runtime, so
/// globals persist between lines.
pub struct Repl {
    runtime: Runtime,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self {
            runtime: Runtime::new(),
        }
    }

    pub fn with_runtime(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| EvoError::from(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    // Errors were already reported on the runtime's error stream.
                    if let Err(err @ EvoError::Io(_)) = self.runtime.run_code(trimmed, RunMode::Repl) {
                        return Err(err);
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(EvoError::from(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        err,
                    )));
                }
            }
        }
        Ok(())
    }
}

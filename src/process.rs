use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("spawn {program}: {err}")]
    Spawn {
        err: std::io::Error,
        program: String,
    },

    #[error("{program} wrote invalid utf-8 to {stream}")]
    Encoding {
        program: String,
        stream: &'static str,
    },
}

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; -1 if the process was terminated by a signal.
    pub status: i32,
}

impl Output {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// The boundary to every external tool (docker, gcloud, kubectl).
/// Callers interpret exit status and output; there is no retry here.
pub trait Runner {
    fn run(&self, program: &str, args: &[&str]) -> Result<Output, Error>;
}

/// Runs the command on the local system and captures its output.
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<Output, Error> {
        debug!("running: {} {}", program, args.join(" "));

        let output = std::process::Command::new(program)
            .args(args)
            .output()
            .map_err(|err| Error::Spawn {
                err,
                program: program.to_string(),
            })?;

        let stdout = String::from_utf8(output.stdout).map_err(|_| Error::Encoding {
            program: program.to_string(),
            stream: "stdout",
        })?;
        let stderr = String::from_utf8(output.stderr).map_err(|_| Error::Encoding {
            program: program.to_string(),
            stream: "stderr",
        })?;

        Ok(Output {
            stdout,
            stderr,
            status: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
pub mod fake {
    use super::{Error, Output, Runner};
    use std::cell::RefCell;

    /// Records every issued command line and replays stubbed outputs.
    /// Stubs are matched by command-line prefix; a stub with several
    /// outputs yields them in order and repeats the last one.
    pub struct FakeRunner {
        pub calls: RefCell<Vec<String>>,
        stubs: RefCell<Vec<(String, Vec<Output>)>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                stubs: RefCell::new(Vec::new()),
            }
        }

        pub fn stub(&self, prefix: &str, output: Output) {
            let mut stubs = self.stubs.borrow_mut();
            if let Some((_, outputs)) = stubs.iter_mut().find(|(p, _)| p == prefix) {
                outputs.push(output);
            } else {
                stubs.push((prefix.to_string(), vec![output]));
            }
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|call| call.starts_with(prefix))
                .count()
        }
    }

    pub fn ok(stdout: &str) -> Output {
        Output {
            stdout: stdout.to_string(),
            stderr: String::new(),
            status: 0,
        }
    }

    pub fn failed(status: i32) -> Output {
        Output {
            stdout: String::new(),
            stderr: String::new(),
            status,
        }
    }

    pub fn failed_with_stderr(status: i32, stderr: &str) -> Output {
        Output {
            stdout: String::new(),
            stderr: stderr.to_string(),
            status,
        }
    }

    impl Runner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<Output, Error> {
            let command = format!("{} {}", program, args.join(" "));
            self.calls.borrow_mut().push(command.clone());

            let mut stubs = self.stubs.borrow_mut();
            match stubs.iter_mut().find(|(p, _)| command.starts_with(p)) {
                Some((_, outputs)) if outputs.len() > 1 => Ok(outputs.remove(0)),
                Some((_, outputs)) => Ok(outputs[0].clone()),
                None => Ok(ok("")),
            }
        }
    }
}

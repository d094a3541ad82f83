use cw_core::{CommandOutput, ExecError, Executor};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    Timeout,
    NonUtf8,
}

/// In-memory executor answering from a script and recording every call
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    replies: HashMap<Vec<String>, Reply>,
    fallback: Option<CommandOutput>,
    calls: RefCell<Vec<Vec<String>>>,
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, args: &[&str], output: CommandOutput) -> Self {
        self.replies.insert(argv(args), Reply::Output(output));
        self
    }

    pub fn time_out(mut self, args: &[&str]) -> Self {
        self.replies.insert(argv(args), Reply::Timeout);
        self
    }

    pub fn print_non_utf8(mut self, args: &[&str]) -> Self {
        self.replies.insert(argv(args), Reply::NonUtf8);
        self
    }

    /// Answer for commands without a scripted reply; without one they fail to spawn
    pub fn otherwise(mut self, output: CommandOutput) -> Self {
        self.fallback = Some(output);
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Calls carrying the given flag, e.g. `-N`
    pub fn calls_with_flag(&self, flag: &str) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.iter().any(|arg| arg == flag))
            .cloned()
            .collect()
    }
}

impl Executor for ScriptedExecutor {
    async fn execute(&self, argv: &[String]) -> Result<CommandOutput, ExecError> {
        self.calls.borrow_mut().push(argv.to_vec());

        match self.replies.get(argv) {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::Timeout) => Err(ExecError::Timeout {
                command: argv.join(" "),
                timeout: Duration::from_secs(30),
            }),
            Some(Reply::NonUtf8) => Err(ExecError::NonUtf8 {
                command: argv.join(" "),
                stream: "stdout",
            }),
            None => match &self.fallback {
                Some(output) => Ok(output.clone()),
                None => Err(ExecError::Spawn {
                    command: argv.join(" "),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            },
        }
    }
}

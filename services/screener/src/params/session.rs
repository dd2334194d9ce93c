//! Guided parameter session.
//!
//! Walks a user through the parameters one reply at a time: first an
//! "apply defaults?" question, then (if declined) one prompt per parameter in
//! order. Invalid replies re-ask the same question. The session is transport
//! agnostic; a chat front-end feeds it text and relays the returned prompts.

use super::parse::{parse_strict_bool, Parsed};
use super::{ScreenParams, PARAMS};

const APPLY_DEFAULTS_HELP: &str = "Please reply with:\n\
    `1` or `yes` => apply default values\n\
    `0` or `no` => don't apply default values";

/// What the front-end should do after a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// Ask the next question
    Prompt(String),
    /// The reply was not understood; ask again
    Retry(String),
    /// All parameters collected
    Complete(ScreenParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ApplyDefaults,
    Param(usize),
    Done,
}

#[derive(Debug, Clone)]
pub struct ParamSession {
    stage: Stage,
    params: ScreenParams,
}

impl ParamSession {
    /// Start a session. Returns the session and the opening question, which
    /// lists every parameter with its default.
    pub fn start() -> (Self, String) {
        let mut greeting = String::from("Apply Default Params?  yes/no:\n\n");
        for param in &PARAMS {
            greeting.push_str(&format!("\t{}: {}\n", param.name, param.default));
        }

        let session = Self {
            stage: Stage::ApplyDefaults,
            params: ScreenParams::default(),
        };
        (session, greeting)
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Feed one user reply.
    pub fn reply(&mut self, text: &str) -> SessionStep {
        match self.stage {
            Stage::ApplyDefaults => match parse_strict_bool(text) {
                Parsed::Value(true) => self.finish(),
                Parsed::Value(false) => {
                    self.stage = Stage::Param(0);
                    SessionStep::Prompt(PARAMS[0].prompt.to_string())
                }
                _ => SessionStep::Retry(APPLY_DEFAULTS_HELP.to_string()),
            },
            Stage::Param(idx) => {
                let param = &PARAMS[idx];
                let Ok(value) = param.parse(text) else {
                    return SessionStep::Retry(param.prompt.to_string());
                };
                self.params.set(param.name, value);

                match PARAMS.get(idx + 1) {
                    Some(next) => {
                        self.stage = Stage::Param(idx + 1);
                        SessionStep::Prompt(next.prompt.to_string())
                    }
                    None => self.finish(),
                }
            }
            Stage::Done => SessionStep::Complete(self.params.clone()),
        }
    }

    fn finish(&mut self) -> SessionStep {
        self.stage = Stage::Done;
        SessionStep::Complete(self.params.clone())
    }
}

//! Answers Git's credential prompts from `GIT_USERNAME` and `GIT_PASSWORD`.
//!
//! Git runs the program named by `GIT_ASKPASS` with the prompt text as its only
//! argument and reads the answer from stdout.

pub const ASKPASS_BIN: &str = "ohdsi-git-askpass";

pub const USERNAME_VAR: &str = "GIT_USERNAME";
pub const PASSWORD_VAR: &str = "GIT_PASSWORD";

/// Which credential a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    Username,
    Password,
}

impl Credential {
    pub fn from_prompt(prompt: &str) -> Option<Self> {
        let prompt = prompt.to_lowercase();
        if prompt.contains("username") {
            Some(Self::Username)
        } else if prompt.contains("password") {
            Some(Self::Password)
        } else {
            None
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Self::Username => USERNAME_VAR,
            Self::Password => PASSWORD_VAR,
        }
    }
}

/// Looks up the answer to `prompt` through `lookup`, which maps a variable name to its value.
pub fn answer(prompt: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    Credential::from_prompt(prompt).and_then(|credential| lookup(credential.env_var()))
}

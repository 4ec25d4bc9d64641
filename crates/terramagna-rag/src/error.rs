use thiserror::Error;

/// Reasons the agent runs without a model behind it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build the LLM client: {0}")]
    ClientInit(String),
}

/// Rejections raised before any upstream call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("the question cannot be empty")]
    Empty,

    #[error("the question is too long ({len} characters, max {max})")]
    TooLong { len: usize, max: usize },
}

/// Reject blank or oversized questions.
pub fn validate_question(text: &str, max_chars: usize) -> Result<&str, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(InputError::TooLong { len, max: max_chars });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_question_rejected() {
        assert_eq!(validate_question("   \n", 100), Err(InputError::Empty));
    }

    #[test]
    fn test_long_question_rejected() {
        let text = "a".repeat(101);
        assert_eq!(
            validate_question(&text, 100),
            Err(InputError::TooLong { len: 101, max: 100 })
        );
    }

    #[test]
    fn test_question_is_trimmed() {
        assert_eq!(validate_question("  hola  ", 100), Ok("hola"));
    }
}

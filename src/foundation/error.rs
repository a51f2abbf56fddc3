pub type SubrastResult<T> = Result<T, SubrastError>;

#[derive(thiserror::Error, Debug)]
pub enum SubrastError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("quantize error: {0}")]
    Quantize(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("timing error: {0}")]
    Timing(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SubrastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn quantize(msg: impl Into<String>) -> Self {
        Self::Quantize(msg.into())
    }

    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    pub fn timing(msg: impl Into<String>) -> Self {
        Self::Timing(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SubrastError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(SubrastError::render("x").to_string().contains("render error:"));
        assert!(
            SubrastError::quantize("x")
                .to_string()
                .contains("quantize error:")
        );
        assert!(
            SubrastError::scheduler("x")
                .to_string()
                .contains("scheduler error:")
        );
        assert!(SubrastError::timing("x").to_string().contains("timing error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = SubrastError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}

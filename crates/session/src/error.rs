use palaver_engine::EngineError;

/// Failures absorbed by the session pipeline.
///
/// Both variants are converted into an error row on the sink and a forced
/// unload at the point of origin; neither is ever returned to the caller
/// that submitted the operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionFailure {
    #[error("Init error: {0}")]
    Initialization(EngineError),
    #[error("Generate error: {0}")]
    Generation(EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_underlying_failure() {
        let failure = SessionFailure::Initialization(EngineError::LoadFailed("OOM".to_string()));
        assert_eq!(failure.to_string(), "Init error: model load failed: OOM");

        let failure = SessionFailure::Generation(EngineError::Generation("kv full".to_string()));
        assert_eq!(failure.to_string(), "Generate error: generation failed: kv full");
    }
}

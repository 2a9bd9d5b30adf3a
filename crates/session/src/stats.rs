//! Throughput stats formatting.

use palaver_engine::CompletionUsage;

/// Render a usage record as the single stats line shown to the user.
pub fn format_usage(usage: &CompletionUsage) -> String {
    format!(
        "prompt_tokens: {}, completion_tokens: {}, prefill: {:.4} tokens/sec, decoding: {:.4} tokens/sec",
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.prefill_tokens_per_s,
        usage.decode_tokens_per_s,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rates_with_four_decimals() {
        let usage = CompletionUsage {
            prompt_tokens: 5,
            completion_tokens: 2,
            prefill_tokens_per_s: 120.5,
            decode_tokens_per_s: 30.25,
        };
        assert_eq!(
            format_usage(&usage),
            "prompt_tokens: 5, completion_tokens: 2, prefill: 120.5000 tokens/sec, decoding: 30.2500 tokens/sec"
        );
    }
}

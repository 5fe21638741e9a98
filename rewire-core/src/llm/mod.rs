pub mod providers;

use serde::{Deserialize, Serialize};

/// Token usage from a patch-generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Tracks cumulative generation costs across a reconciliation run.
#[allow(clippy::cast_precision_loss)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostTracker {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_requests: u64,
    pub estimated_cost_usd: f64,
}

#[allow(clippy::cast_precision_loss)]
impl CostTracker {
    pub fn record_call(
        &mut self,
        usage: &TokenUsage,
        cost_per_1k_input: f64,
        cost_per_1k_output: f64,
    ) {
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.total_requests += 1;
        self.estimated_cost_usd += (usage.input_tokens as f64 / 1000.0) * cost_per_1k_input
            + (usage.output_tokens as f64 / 1000.0) * cost_per_1k_output;
    }

    pub fn is_over_budget(&self, budget: f64) -> bool {
        budget > 0.0 && self.estimated_cost_usd >= budget
    }
}

/// Common interface for patch-generation providers.
///
/// The engine treats generation purely as `generate(prompt) → text`; prompt
/// construction and templating live with callers. Calls are blocking with no
/// implicit timeout — supply your own deadline wrapper.
#[async_trait::async_trait]
pub trait PatchGenerator: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// The model ID being used.
    fn model_id(&self) -> &str;

    /// Generate replacement source text for the given prompt.
    async fn generate(&self, prompt: &str) -> crate::error::Result<(String, TokenUsage)>;

    /// Cost per 1K input tokens (USD).
    fn cost_per_1k_input(&self) -> f64;

    /// Cost per 1K output tokens (USD).
    fn cost_per_1k_output(&self) -> f64;
}

/// Strip code-fence markup from generated source.
///
/// Models routinely wrap whole-file answers in ```` ```java … ``` ````;
/// everything outside the first fenced block is discarded. Unfenced answers
/// pass through unchanged.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(fence_start) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_fence = &trimmed[fence_start + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n').map_or(0, |pos| pos + 1);
    let body = &after_fence[body_start..];

    let body_end = body.find("```").unwrap_or(body.len());
    body[..body_end].trim_end().to_string()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_tracker_basics() {
        let mut tracker = CostTracker::default();
        assert!(!tracker.is_over_budget(0.0)); // 0 = unlimited

        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 500,
        };
        tracker.record_call(&usage, 0.003, 0.015);

        assert_eq!(tracker.total_requests, 1);
        // 1K * 0.003 + 0.5K * 0.015 = 0.0105
        assert!((tracker.estimated_cost_usd - 0.0105).abs() < 0.0001);
        assert!(tracker.is_over_budget(0.01));
        assert!(!tracker.is_over_budget(1.0));
    }

    #[test]
    fn strips_fenced_java() {
        let raw = "```java\npublic class Foo {}\n```\n";
        assert_eq!(strip_code_fences(raw), "public class Foo {}");
    }

    #[test]
    fn strips_fence_without_language_tag() {
        let raw = "```\npublic class Foo {}\n```";
        assert_eq!(strip_code_fences(raw), "public class Foo {}");
    }

    #[test]
    fn discards_prose_around_fence() {
        let raw = "Here is the fixed file:\n```java\nclass A {}\n```\nLet me know!";
        assert_eq!(strip_code_fences(raw), "class A {}");
    }

    #[test]
    fn unfenced_text_passes_through() {
        let raw = "public class Foo {}\n";
        assert_eq!(strip_code_fences(raw), "public class Foo {}");
    }
}

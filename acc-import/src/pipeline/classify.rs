use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The two durable steps of an import run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Transfer,
    Index,
}

impl StepKind {
    /// Attempt ceiling inside the step, and the harness's re-invocation budget.
    pub fn max_attempts(self) -> u32 {
        match self {
            StepKind::Transfer => 3,
            StepKind::Index => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Transfer => "transfer",
            StepKind::Index => "index",
        }
    }

    fn ceiling_verb(self) -> &'static str {
        match self {
            StepKind::Transfer => "upload",
            StepKind::Index => "index",
        }
    }

    fn generic_failure(self) -> &'static str {
        match self {
            StepKind::Transfer => "Image upload failed",
            StepKind::Index => "Search indexing failed",
        }
    }

    fn rules(self) -> &'static [Rule] {
        match self {
            StepKind::Transfer => TRANSFER_RULES,
            StepKind::Index => INDEX_RULES,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Retryable { message: String, retry_after: Duration },
    /// Message still lacks the `[stepId]` prefix.
    Fatal(String),
    Unclassified,
}

enum Verdict {
    Retry { label: &'static str, after: Duration },
    Fatal { label: &'static str },
}

struct Rule {
    triggers: &'static [&'static str],
    verdict: Verdict,
}

// First match wins. "quota" on the retry rule shadows "quota exceeded" on the
// fatal one; that ordering is kept for compatibility with existing runs.
const TRANSFER_RULES: &[Rule] = &[
    Rule {
        triggers: &["rate limit", "429", "quota"],
        verdict: Verdict::Retry {
            label: "Blob storage rate limited",
            after: Duration::from_secs(60),
        },
    },
    Rule {
        triggers: &["quota exceeded", "storage full"],
        verdict: Verdict::Fatal {
            label: "Storage quota exceeded",
        },
    },
    Rule {
        triggers: &["invalid file", "unsupported", "400"],
        verdict: Verdict::Fatal {
            label: "Invalid file type or format",
        },
    },
];

const INDEX_RULES: &[Rule] = &[
    Rule {
        triggers: &["rate limit", "429", "quota"],
        verdict: Verdict::Retry {
            label: "Search index rate limited",
            after: Duration::from_secs(60),
        },
    },
    Rule {
        triggers: &["timeout", "ECONNREFUSED", "ETIMEDOUT", "network"],
        verdict: Verdict::Retry {
            label: "Network error",
            after: Duration::from_secs(30),
        },
    },
    Rule {
        triggers: &["invalid", "400"],
        verdict: Verdict::Fatal {
            label: "Invalid data for indexing",
        },
    },
];

/// Match a failure message against the step's rule table. Matching is
/// case-sensitive substring search on the raw provider text.
pub fn classify(kind: StepKind, message: &str) -> Classification {
    let Some(rule) = kind
        .rules()
        .iter()
        .find(|rule| rule.triggers.iter().any(|t| message.contains(t)))
    else {
        return Classification::Unclassified;
    };

    match rule.verdict {
        Verdict::Retry { label, after } => Classification::Retryable {
            message: format!("{}: {}", label, message),
            retry_after: after,
        },
        Verdict::Fatal { label } => Classification::Fatal(format!("{}: {}", label, message)),
    }
}

/// Fatal message for an unclassified failure at the attempt ceiling.
pub(crate) fn ceiling_message(
    kind: StepKind,
    step_id: &str,
    attempt: u32,
    started_at: &str,
    message: &str,
) -> String {
    format!(
        "[{}] Failed to {} image after {} attempts as of {}: {}",
        step_id,
        kind.ceiling_verb(),
        attempt,
        started_at,
        message
    )
}

pub(crate) fn generic_message(kind: StepKind, message: &str) -> String {
    format!("{}: {}", kind.generic_failure(), message)
}

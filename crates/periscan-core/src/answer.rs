//! Answer synthesis for setup prompts.
//!
//! The engine cannot inspect the tool's internal state machine, so
//! answers come from an ordered cascade of case-insensitive text rules:
//! conservative on anything that widens scope, affirmative only for
//! persisting the generated configuration, and always producing some
//! answer so the guided flow cannot stall on an unanswered prompt.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One entry in the rule cascade. `applies` and `respond` both receive
/// the lowercased prompt text; first match wins.
struct Rule {
    name: &'static str,
    applies: fn(&str) -> bool,
    respond: fn(&str, Option<&str>) -> String,
}

static RULES: &[Rule] = &[
    Rule {
        name: "scheme selection",
        applies: |p| p.contains("delimit choices"),
        respond: choose_scheme,
    },
    Rule {
        name: "objective-c interop",
        applies: |p| p.contains("objective-c") && (p.contains("(y)es/(n)o") || p.contains("code")),
        respond: |_, _| "n".to_string(),
    },
    Rule {
        name: "public declarations",
        applies: |p| p.contains("public") && p.contains("declarations"),
        respond: |_, _| "n".to_string(),
    },
    Rule {
        name: "save configuration",
        applies: |p| p.contains("configuration") && (p.contains("save") || p.contains(".yml")),
        respond: |_, _| "y".to_string(),
    },
    Rule {
        name: "generic yes/no",
        applies: |p| p.contains("(y)es/(n)o") || p.contains("(y/n)") || p.contains("[y/n]"),
        respond: |p, _| {
            if p.contains("save") || p.contains(".yml") {
                "y".to_string()
            } else {
                "n".to_string()
            }
        },
    },
    Rule {
        name: "generic selection",
        applies: |p| p.contains("select"),
        respond: |_, _| "1".to_string(),
    },
];

/// Produce the literal response to send for a prompt.
///
/// `preferred_scheme` is the scheme the discovery phase settled on; a
/// numbered-choice prompt offering it is answered with its index.
pub fn synthesize(prompt: &str, preferred_scheme: Option<&str>) -> String {
    let lower = prompt.to_lowercase();
    for rule in RULES {
        if (rule.applies)(&lower) {
            let response = (rule.respond)(&lower, preferred_scheme);
            debug!(
                target: "periscan::setup",
                "Prompt matched rule '{}', answering '{}'", rule.name, response
            );
            return response;
        }
    }
    // Last resort: keep the guided flow advancing.
    debug!(target: "periscan::setup", "Unmatched prompt, answering '1': {}", prompt);
    "1".to_string()
}

/// Pick the option index matching the preferred scheme, defaulting to
/// the first offered option.
fn choose_scheme(prompt: &str, preferred: Option<&str>) -> String {
    static NUMBERED_CHOICE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(\d+)[.)]?\s+([A-Za-z0-9_.-]+)").expect("Invalid numbered choice regex")
    });

    if let Some(preferred) = preferred {
        let preferred = preferred.to_lowercase();
        for caps in NUMBERED_CHOICE_RE.captures_iter(prompt) {
            if caps[2] == preferred {
                return caps[1].to_string();
            }
        }
    }
    "1".to_string()
}

//! Prompt detection in the tool's output stream.

/// Classification of one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Plain log output.
    Log,
    /// A question awaiting an answer.
    Prompt,
}

/// Classify a single output line.
///
/// A line is a prompt iff, after trimming surrounding whitespace, it
/// ends in `:` or `?`. This is a heuristic over surface text, not a
/// protocol guarantee: a log line ending in `:` is answered with the
/// synthesizer's harmless default.
pub fn classify(line: &str) -> LineKind {
    match line.trim().chars().last() {
        Some(':') | Some('?') => LineKind::Prompt,
        _ => LineKind::Log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lines_ending_in_colon_or_question_mark_are_prompts() {
        assert_eq!(classify("Select a scheme:"), LineKind::Prompt);
        assert_eq!(classify("Include Objective-C code?"), LineKind::Prompt);
        assert_eq!(
            classify("Save configuration to .periphery.yml? (y)es/(n)o:"),
            LineKind::Prompt
        );
        // Trailing whitespace does not matter.
        assert_eq!(classify("Which target? \t"), LineKind::Prompt);
    }

    #[test]
    fn other_lines_are_log_output() {
        assert_eq!(classify("Building for testing..."), LineKind::Log);
        assert_eq!(classify("warning: unused variable"), LineKind::Log);
        assert_eq!(classify(""), LineKind::Log);
        assert_eq!(classify("   "), LineKind::Log);
        assert_eq!(classify("schemes:"), LineKind::Prompt); // known false positive
    }

    proptest! {
        #[test]
        fn classification_matches_trimmed_last_char(line in ".*") {
            let expected = match line.trim().chars().last() {
                Some(':') | Some('?') => LineKind::Prompt,
                _ => LineKind::Log,
            };
            prop_assert_eq!(classify(&line), expected);
        }
    }
}

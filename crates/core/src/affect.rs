use crate::types::AffectLabel;

/// Maps reply text to the avatar's animation state.
pub trait AffectClassifier: Send + Sync {
    fn classify(&self, text: &str) -> AffectLabel;
}

/// A category needs at least this many keyword hits to beat `idle`.
pub const MIN_KEYWORD_MATCHES: usize = 2;

const CELEBRATING: &[&str] = &[
    "congratulations",
    "great job",
    "well done",
    "excellent",
    "amazing",
    "fantastic",
    "wonderful",
    "awesome",
    "perfect",
    "brilliant",
    "impressive",
    "outstanding",
    "success",
    "achievement",
    "celebrate",
    "hooray",
    "yay",
    "bravo",
    "superb",
    "🎉",
    "🎊",
    "✨",
    "🌟",
    "⭐",
    "🏆",
    "👏",
    "good job",
    "nice work",
    "proud",
];

const THINKING: &[&str] = &[
    "let me explain",
    "think about",
    "consider this",
    "ponder",
    "analyze",
    "understand",
    "concept",
    "theory",
    "principle",
    "reason",
    "because",
    "therefore",
    "complex",
    "intricate",
    "detailed",
    "specifically",
    "let's explore",
    "imagine",
    "suppose",
    "hypothesis",
    "question",
];

const CAUTIONARY: &[&str] = &[
    "careful",
    "watch out",
    "warning",
    "danger",
    "oops",
    "mistake",
    "error",
    "incorrect",
    "wrong",
    "avoid",
    "don't",
    "shouldn't",
    "risky",
    "concern",
    "worried",
    "caution",
    "alert",
    "attention",
    "important",
    "critical",
    "serious",
    "issue",
    "problem",
    "⚠️",
    "❗",
    "❌",
];

/// Keyword-frequency heuristic.
///
/// Each keyword found anywhere in the lower-cased text scores one point for
/// its category. The highest score wins if it reaches
/// [`MIN_KEYWORD_MATCHES`]; ties go to the category declared first.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    categories: Vec<(AffectLabel, &'static [&'static str])>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            categories: vec![
                (AffectLabel::Approving, CELEBRATING),
                (AffectLabel::ThinkingDeep, THINKING),
                (AffectLabel::Concerned, CAUTIONARY),
            ],
        }
    }
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn score(text: &str, keywords: &[&str]) -> usize {
        keywords
            .iter()
            .filter(|keyword| text.contains(&keyword.to_lowercase()))
            .count()
    }
}

impl AffectClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> AffectLabel {
        let lowered = text.to_lowercase();

        let mut best = (AffectLabel::Idle, 0);
        for (label, keywords) in &self.categories {
            let score = Self::score(&lowered, keywords);
            if score > best.1 {
                best = (*label, score);
            }
        }

        if best.1 >= MIN_KEYWORD_MATCHES {
            best.0
        } else {
            AffectLabel::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> AffectLabel {
        KeywordClassifier::new().classify(text)
    }

    #[test]
    fn plain_text_is_idle() {
        assert_eq!(classify("The hearing is on Monday."), AffectLabel::Idle);
        assert_eq!(classify(""), AffectLabel::Idle);
    }

    #[test]
    fn a_single_match_is_not_enough() {
        assert_eq!(classify("That was excellent."), AffectLabel::Idle);
    }

    #[test]
    fn two_celebrating_words_approve() {
        assert_eq!(
            classify("Congratulations, that is an EXCELLENT outcome!"),
            AffectLabel::Approving
        );
    }

    #[test]
    fn cautionary_words_are_concerning() {
        assert_eq!(
            classify("Be careful: this is a serious problem and you should avoid talking to them."),
            AffectLabel::Concerned
        );
    }

    #[test]
    fn analytical_reply_is_thinking() {
        assert_eq!(
            classify("Let me explain the principle, because the theory matters here."),
            AffectLabel::ThinkingDeep
        );
    }

    #[test]
    fn ties_go_to_the_first_declared_category() {
        // two celebrating hits, two cautionary hits
        assert_eq!(
            classify("Amazing work, bravo, but be careful with that mistake."),
            AffectLabel::Approving
        );
    }

    #[test]
    fn repeated_keyword_counts_once() {
        assert_eq!(classify("error error error"), AffectLabel::Idle);
    }

    #[test]
    fn emoji_keywords_count() {
        assert_eq!(classify("Well done 🎉"), AffectLabel::Approving);
    }
}

//! Category labels and the instructions sent with each capture

/// Categories offered for selection when none are configured
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Emotion Detection",
    "Gaze Analysis",
    "Facial Features",
    "Accessories",
    "Posture Analysis",
    "Age Estimation",
    "Scene Description",
    "Lighting Conditions",
];

/// Instruction used for labels without a dedicated prompt
pub const FALLBACK_PROMPT: &str =
    "Analyze this image and describe what you observe in a few short sentences.";

/// Instruction used by the single-result description
pub const DESCRIBE_PROMPT: &str =
    "Describe this image in detail, including the people, objects and setting you can see.";

const PROMPTS: &[(&str, &str)] = &[
    (
        "Emotion Detection",
        "Identify the emotions expressed by the person in this image. \
         Answer with a short comma-separated list of emotions.",
    ),
    (
        "Gaze Analysis",
        "Describe where the person in this image is looking and whether \
         they appear focused or distracted.",
    ),
    (
        "Facial Features",
        "Describe the notable facial features of the person in this image, \
         such as face shape, hair and facial hair.",
    ),
    (
        "Accessories",
        "List any accessories the person in this image is wearing, such as \
         glasses, hats, jewelry or headphones.",
    ),
    (
        "Posture Analysis",
        "Describe the posture and body position of the person in this image.",
    ),
    (
        "Age Estimation",
        "Estimate the approximate age range of the person in this image. \
         Answer with a range such as 25-35.",
    ),
    (
        "Scene Description",
        "Describe the setting and background visible in this image.",
    ),
    (
        "Lighting Conditions",
        "Describe the lighting in this image: its brightness, direction and \
         color temperature.",
    ),
];

/// Prompt for a category label. Unknown labels get [`FALLBACK_PROMPT`].
pub fn prompt_for(category: &str) -> &'static str {
    PROMPTS
        .iter()
        .find(|(label, _)| *label == category)
        .map(|(_, prompt)| *prompt)
        .unwrap_or(FALLBACK_PROMPT)
}

pub fn is_known_category(category: &str) -> bool {
    PROMPTS.iter().any(|(label, _)| *label == category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_default_category_has_prompt() {
        for category in DEFAULT_CATEGORIES {
            assert!(is_known_category(category), "{} has no prompt", category);
            assert_ne!(prompt_for(category), FALLBACK_PROMPT);
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(prompt_for("Gaze Analysis"), prompt_for("Gaze Analysis"));
        assert!(prompt_for("Emotion Detection").contains("emotions"));
    }

    #[test]
    fn test_unknown_category_falls_back() {
        assert_eq!(prompt_for("Tattoo Detection"), FALLBACK_PROMPT);
        assert_eq!(prompt_for(""), FALLBACK_PROMPT);
        // Matching is exact
        assert_eq!(prompt_for("emotion detection"), FALLBACK_PROMPT);
        assert!(!is_known_category("Tattoo Detection"));
    }

    #[test]
    fn test_prompts_are_distinct() {
        let mut prompts: Vec<_> = DEFAULT_CATEGORIES.iter().map(|c| prompt_for(c)).collect();
        prompts.sort();
        prompts.dedup();
        assert_eq!(prompts.len(), DEFAULT_CATEGORIES.len());
    }
}

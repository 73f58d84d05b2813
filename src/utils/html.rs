use ammonia;

/// Sanitizes free-text fields (result remarks, revaluation reasons and
/// comments) with ammonia's whitelist before they are stored.
///
/// Safe inline tags survive; script/iframe tags and event-handler
/// attributes are stripped. Guards against stored XSS in whatever client
/// later renders these fields.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("question 4 <script>alert(1)</script>was mis-totalled");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("question 4"));
    }

    #[test]
    fn keeps_plain_text_untouched() {
        assert_eq!(clean_html("borderline pass"), "borderline pass");
    }
}

use regex::{Regex, RegexBuilder};

use crate::config::{ConfigWarning, RenameMapping, Rule};

fn compile(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Translate a glob into an anchored regex: `*` is any run of characters,
/// `?` is exactly one, everything else is literal.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push_str("(?s)^");
    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

/// Ordered regex rules, compiled once. Rules with invalid patterns are
/// dropped and reported back to the caller.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: Vec<(Regex, Rule)>,
}

impl PatternMatcher {
    pub fn new(rules: &[Rule]) -> (Self, Vec<ConfigWarning>) {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut warnings = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            match compile(&rule.pattern) {
                Ok(re) => compiled.push((re, rule.clone())),
                Err(e) => warnings.push(ConfigWarning::InvalidPattern {
                    index,
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                }),
            }
        }
        (Self { rules: compiled }, warnings)
    }

    /// First rule whose pattern occurs anywhere in the description.
    pub fn matching_rule(&self, description: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(description))
            .map(|(_, rule)| rule)
    }

    pub fn match_category(&self, description: &str) -> Option<&str> {
        self.matching_rule(description)
            .map(|rule| rule.category.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenameMatcher {
    renames: Vec<(Regex, String)>,
}

impl RenameMatcher {
    pub fn new(renames: &[RenameMapping]) -> (Self, Vec<ConfigWarning>) {
        let mut compiled = Vec::with_capacity(renames.len());
        let mut warnings = Vec::new();
        for (index, mapping) in renames.iter().enumerate() {
            match compile(&glob_to_regex(&mapping.pattern)) {
                Ok(re) => compiled.push((re, mapping.name.clone())),
                Err(e) => warnings.push(ConfigWarning::InvalidRename {
                    index,
                    pattern: mapping.pattern.clone(),
                    message: e.to_string(),
                }),
            }
        }
        (Self { renames: compiled }, warnings)
    }

    /// New description for `description`, or None when nothing matches or
    /// the first match would leave it unchanged.
    pub fn match_rename(&self, description: &str) -> Option<&str> {
        let (_, name) = self
            .renames
            .iter()
            .find(|(re, _)| re.is_match(description))?;
        if name == description {
            return None;
        }
        Some(name.as_str())
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }
}

/// One-shot form of [`RenameMatcher::match_rename`].
pub fn match_rename<'a>(description: &str, renames: &'a [RenameMapping]) -> Option<&'a str> {
    let mapping = renames.iter().find(|m| {
        compile(&glob_to_regex(&m.pattern)).is_ok_and(|re| re.is_match(description))
    })?;
    (mapping.name != description).then_some(mapping.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rule(pattern: &str, category: &str) -> Rule {
        Rule {
            pattern: pattern.to_string(),
            category: category.to_string(),
            note: None,
        }
    }

    fn make_rename(pattern: &str, name: &str) -> RenameMapping {
        RenameMapping {
            pattern: pattern.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = vec![make_rule("UBER", "transport"), make_rule("UBER EATS", "food")];
        let (matcher, warnings) = PatternMatcher::new(&rules);
        assert!(warnings.is_empty());
        assert_eq!(matcher.match_category("UBER EATS TRIP"), Some("transport"));
    }

    #[test]
    fn test_rule_is_case_insensitive_substring() {
        let rules = vec![make_rule("whole foods", "groceries")];
        let (matcher, _) = PatternMatcher::new(&rules);
        assert_eq!(matcher.match_category("WHOLE FOODS MARKET 123"), Some("groceries"));
        assert_eq!(matcher.match_category("STARBUCKS"), None);
    }

    #[test]
    fn test_regex_rule() {
        let rules = vec![make_rule(r"^AWS.*\d+$", "hosting")];
        let (matcher, _) = PatternMatcher::new(&rules);
        assert_eq!(matcher.match_category("aws services 12345"), Some("hosting"));
        assert_eq!(matcher.match_category("PAY AWS 1"), None);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let rules = vec![make_rule("(unclosed", "broken"), make_rule("PADARIA", "bakery")];
        let (matcher, warnings) = PatternMatcher::new(&rules);
        assert_eq!(matcher.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            ConfigWarning::InvalidPattern { index: 0, .. }
        ));
        assert_eq!(matcher.match_category("PADARIA (unclosed"), Some("bakery"));
    }

    #[test]
    fn test_matching_rule_exposes_note() {
        let mut rule = make_rule("IFOOD", "delivery");
        rule.note = Some("apps".to_string());
        let (matcher, _) = PatternMatcher::new(&[rule]);
        let hit = matcher.matching_rule("IFOOD *RESTAURANTE").unwrap();
        assert_eq!(hit.note.as_deref(), Some("apps"));
    }

    #[test]
    fn test_glob_translation() {
        assert_eq!(glob_to_regex("UBER*"), "(?s)^UBER.*$");
        assert_eq!(glob_to_regex("A?C"), "(?s)^A.C$");
        assert_eq!(glob_to_regex("NETFLIX.COM*"), r"(?s)^NETFLIX\.COM.*$");
        assert_eq!(glob_to_regex("(1+1)"), r"(?s)^\(1\+1\)$");
    }

    #[test]
    fn test_rename_glob_matches_whole_description() {
        let renames = vec![make_rename("UBER*", "Uber")];
        let (matcher, warnings) = RenameMatcher::new(&renames);
        assert!(warnings.is_empty());
        assert_eq!(matcher.match_rename("UBER TRIP 123"), Some("Uber"));
        assert_eq!(matcher.match_rename("uber trip"), Some("Uber"));
        assert_eq!(matcher.match_rename("PAY UBER"), None);
    }

    #[test]
    fn test_rename_noop_is_suppressed() {
        let renames = vec![make_rename("UBER*", "Uber")];
        let (matcher, _) = RenameMatcher::new(&renames);
        assert_eq!(matcher.match_rename("Uber"), None);
        assert_eq!(match_rename("Uber", &renames), None);
        assert_eq!(match_rename("UBER TRIP 123", &renames), Some("Uber"));
    }

    #[test]
    fn test_rename_question_mark_is_single_char() {
        let renames = vec![make_rename("PIX ???", "Pix transfer")];
        let (matcher, _) = RenameMatcher::new(&renames);
        assert_eq!(matcher.match_rename("PIX ABC"), Some("Pix transfer"));
        assert_eq!(matcher.match_rename("PIX ABCD"), None);
        assert_eq!(matcher.match_rename("PIX AB"), None);
    }

    #[test]
    fn test_rename_metacharacters_are_literal() {
        let renames = vec![make_rename("AMAZON.COM*", "Amazon")];
        let (matcher, _) = RenameMatcher::new(&renames);
        assert_eq!(matcher.match_rename("AMAZON.COM BR"), Some("Amazon"));
        assert_eq!(matcher.match_rename("AMAZONXCOM BR"), None);
    }

    #[test]
    fn test_rename_first_mapping_wins() {
        let renames = vec![
            make_rename("IFOOD*", "iFood"),
            make_rename("IFOOD *MERCADO*", "iFood Mercado"),
        ];
        let (matcher, _) = RenameMatcher::new(&renames);
        assert_eq!(matcher.match_rename("IFOOD *MERCADO 1"), Some("iFood"));
    }
}

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A regex rule: descriptions matching `pattern` belong to `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// A glob rename: descriptions matching `pattern` are renamed to `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameMapping {
    pub pattern: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryGroups {
    #[serde(default)]
    pub essential: BTreeMap<String, i64>,
    #[serde(default)]
    pub lifestyle: BTreeMap<String, i64>,
}

/// On-disk shape of `rules.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub renames: Vec<RenameMapping>,
    #[serde(default)]
    pub categories: CategoryGroups,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryGroup {
    Essential,
    Lifestyle,
}

impl CategoryGroup {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Lifestyle => "lifestyle",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub id: i64,
    pub name: String,
    pub group: CategoryGroup,
}

/// Category names and ids from both groups, indexed both ways.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    entries: Vec<CategoryEntry>,
    by_name: HashMap<String, i64>,
    by_id: HashMap<i64, usize>,
}

impl CategoryTable {
    pub fn from_groups(groups: &CategoryGroups) -> Result<Self> {
        let mut table = Self::default();
        let grouped = [
            (CategoryGroup::Essential, &groups.essential),
            (CategoryGroup::Lifestyle, &groups.lifestyle),
        ];
        for (group, names) in grouped {
            for (name, id) in names {
                table.insert(name, *id, group)?;
            }
        }
        Ok(table)
    }

    fn insert(&mut self, name: &str, id: i64, group: CategoryGroup) -> Result<()> {
        if id <= 0 {
            return Err(AppError::Config(format!(
                "category '{name}' has invalid id {id}"
            )));
        }
        if self.by_name.contains_key(name) {
            return Err(AppError::Config(format!(
                "category '{name}' is defined more than once"
            )));
        }
        if let Some(&idx) = self.by_id.get(&id) {
            return Err(AppError::Config(format!(
                "category id {id} is used by both '{}' and '{name}'",
                self.entries[idx].name
            )));
        }
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, self.entries.len());
        self.entries.push(CategoryEntry {
            id,
            name: name.to_string(),
            group,
        });
        Ok(())
    }

    pub fn id_for(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    pub fn name_for(&self, id: i64) -> Option<&str> {
        self.by_id
            .get(&id)
            .map(|&idx| self.entries[idx].name.as_str())
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagTable {
    tags: BTreeMap<String, Vec<String>>,
}

impl TagTable {
    pub fn new(tags: BTreeMap<String, Vec<String>>) -> Self {
        Self { tags }
    }

    pub fn tags_for(&self, category: &str) -> &[String] {
        self.tags.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }
}

/// Problems that do not stop a run. Offending entries are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    InvalidPattern {
        index: usize,
        pattern: String,
        message: String,
    },
    InvalidRename {
        index: usize,
        pattern: String,
        message: String,
    },
    UnknownRuleCategory {
        index: usize,
        category: String,
    },
    UnknownTagCategory {
        category: String,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern {
                index,
                pattern,
                message,
            } => write!(f, "rule #{} has invalid pattern '{pattern}': {message}", index + 1),
            Self::InvalidRename {
                index,
                pattern,
                message,
            } => write!(f, "rename #{} has invalid pattern '{pattern}': {message}", index + 1),
            Self::UnknownRuleCategory { index, category } => write!(
                f,
                "rule #{} points to unknown category '{category}'",
                index + 1
            ),
            Self::UnknownTagCategory { category } => {
                write!(f, "tags defined for unknown category '{category}'")
            }
        }
    }
}

/// Validated rule tables, ready for the categorizer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub rules: Vec<Rule>,
    pub renames: Vec<RenameMapping>,
    pub categories: CategoryTable,
    pub tags: TagTable,
}

impl Config {
    pub fn from_file(file: RulesFile) -> Result<Self> {
        let categories = CategoryTable::from_groups(&file.categories)?;
        Ok(Self {
            rules: file.rules,
            renames: file.renames,
            categories,
            tags: TagTable::new(file.tags),
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: RulesFile = toml::from_str(content)?;
        Self::from_file(file)
    }

    /// Cross-reference checks between tables.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if self.categories.id_for(&rule.category).is_none() {
                warnings.push(ConfigWarning::UnknownRuleCategory {
                    index,
                    category: rule.category.clone(),
                });
            }
        }
        for category in self.tags.categories() {
            if self.categories.id_for(category).is_none() {
                warnings.push(ConfigWarning::UnknownTagCategory {
                    category: category.to_string(),
                });
            }
        }
        warnings
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "rules file not found at {}. Run `tidyspend init` to create one.",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Config::from_toml(&content)
}

pub const SAMPLE_RULES: &str = r#"# tidyspend rules
#
# Rules are tried top to bottom; the first regex that matches the
# description (case-insensitive) picks the category.
[[rules]]
pattern = "UBER|99APP"
category = "transport"
note = "ride hailing"

[[rules]]
pattern = "SUPERMERCADO|CARREFOUR"
category = "groceries"

[[rules]]
pattern = "NETFLIX|SPOTIFY"
category = "streaming"

# Renames use globs: * matches anything, ? matches one character.
# The whole description must match.
[[renames]]
pattern = "UBER*"
name = "Uber"

[[renames]]
pattern = "NETFLIX.COM*"
name = "Netflix"

[categories.essential]
groceries = 1001
transport = 1002

[categories.lifestyle]
streaming = 2001

[tags]
groceries = ["essential", "food"]
streaming = ["subscription"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rules_parse() {
        let config = Config::from_toml(SAMPLE_RULES).unwrap();
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.renames.len(), 2);
        assert_eq!(config.renames[0].pattern, "UBER*");
        assert_eq!(config.categories.len(), 3);
        assert_eq!(config.categories.id_for("groceries"), Some(1001));
        assert_eq!(config.categories.name_for(2001), Some("streaming"));
        assert_eq!(
            config.tags.tags_for("groceries"),
            &["essential".to_string(), "food".to_string()]
        );
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_rename_order_is_preserved() {
        let toml = r#"
            [[renames]]
            pattern = "ZZZ*"
            name = "last alphabetically"
            [[renames]]
            pattern = "AAA*"
            name = "first alphabetically"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.renames[0].pattern, "ZZZ*");
        assert_eq!(config.renames[1].pattern, "AAA*");
    }

    #[test]
    fn test_duplicate_id_across_groups_rejected() {
        let toml = r#"
            [categories.essential]
            rent = 10
            [categories.lifestyle]
            travel = 10
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("id 10"));
    }

    #[test]
    fn test_duplicate_name_across_groups_rejected() {
        let toml = r#"
            [categories.essential]
            health = 10
            [categories.lifestyle]
            health = 11
        "#;
        assert!(matches!(Config::from_toml(toml), Err(AppError::Config(_))));
    }

    #[test]
    fn test_non_positive_id_rejected() {
        let toml = r#"
            [categories.essential]
            nothing = 0
        "#;
        assert!(matches!(Config::from_toml(toml), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_reports_unknown_categories() {
        let toml = r#"
            [[rules]]
            pattern = "IFOOD"
            category = "delivery"
            [categories.essential]
            groceries = 1
            [tags]
            groceries = ["food"]
            pets = ["dog"]
        "#;
        let config = Config::from_toml(toml).unwrap();
        let warnings = config.validate();
        assert_eq!(
            warnings,
            vec![
                ConfigWarning::UnknownRuleCategory {
                    index: 0,
                    category: "delivery".to_string()
                },
                ConfigWarning::UnknownTagCategory {
                    category: "pets".to_string()
                },
            ]
        );
        assert_eq!(
            warnings[0].to_string(),
            "rule #1 points to unknown category 'delivery'"
        );
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = Config::from_toml("").unwrap();
        assert!(config.rules.is_empty());
        assert!(config.categories.is_empty());
        assert!(config.tags.tags_for("anything").is_empty());
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("rules.toml")).unwrap_err();
        assert!(err.to_string().contains("tidyspend init"));
    }

    #[test]
    fn test_load_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, SAMPLE_RULES).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.categories.id_for("transport"), Some(1002));
    }
}

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt::Display, path::Path};

use serde::{Deserialize, Serialize};

use super::{
    matcher::{DuplicatePolicy, ExpectedCase},
    parser::{LineGrammar, LinePatterns, OutputFilter},
    records::{RecordCheck, RecordProfile},
};

/// Expected cases shipped with the binary.
const BUILTIN_CATALOG: &str = include_str!("catalogs/builtin.json");

/// Errors raised while building or querying a [`CaseCatalog`].
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// No profile exists for the requested milestone and variant.
    #[error("No expected cases for milestone `{milestone}` with variant `{variant}`")]
    UnknownVariant {
        /// Requested milestone.
        milestone: String,
        /// Requested grading variant.
        variant:   String,
    },
    /// The catalog data itself is unusable.
    #[error("Malformed case catalog: {0}")]
    Malformed(String),
}

/// Key of one catalog entry: assignment milestone and grading variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variant {
    /// Milestone, e.g. `milestone2`.
    milestone: String,
    /// Grading variant (professor), e.g. `hugh`.
    variant:   String,
}

impl Variant {
    /// Creates a key, normalising case and surrounding whitespace.
    pub fn new(milestone: &str, variant: &str) -> Self {
        Self {
            milestone: milestone.trim().to_lowercase(),
            variant:   variant.trim().to_lowercase(),
        }
    }

    /// Returns the milestone part.
    pub fn milestone(&self) -> &str {
        &self.milestone
    }

    /// Returns the variant part.
    pub fn variant(&self) -> &str {
        &self.variant
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.milestone, self.variant)
    }
}

/// Serialized form of one catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSpec {
    /// Milestone this entry applies to.
    pub milestone:  String,
    /// Grading variant this entry applies to.
    pub variant:    String,
    /// How buckets are printed by programs of this variant. Required when
    /// `cases` is not empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar:    Option<LineGrammar>,
    /// Lines to drop before parsing.
    #[serde(default)]
    pub exclude:    Vec<String>,
    /// How repeated bucket indices are treated.
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Expected bucket cases in report order.
    #[serde(default)]
    pub cases:      Vec<ExpectedCase>,
    /// Expected records, for programs that print one record per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records:    Option<RecordCheck>,
}

/// Serialized form of a whole catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSpec {
    /// All entries.
    pub variants: Vec<VariantSpec>,
}

/// Everything the reconciler needs for one variant, compiled and immutable.
#[derive(Debug, Clone)]
pub struct VariantProfile {
    /// Key of this profile.
    key:        Variant,
    /// Expected bucket cases in report order.
    cases:      Vec<ExpectedCase>,
    /// Compiled bucket grammar, absent when there are no bucket cases.
    patterns:   Option<LinePatterns>,
    /// Compiled record check.
    records:    Option<RecordProfile>,
    /// Compiled exclusion filter.
    filter:     OutputFilter,
    /// Duplicate index handling.
    duplicates: DuplicatePolicy,
}

impl VariantProfile {
    /// Compiles and validates one catalog entry.
    pub fn compile(spec: &VariantSpec) -> Result<Self, CatalogError> {
        let key = Variant::new(&spec.milestone, &spec.variant);
        if key.milestone.is_empty() || key.variant.is_empty() {
            return Err(CatalogError::Malformed(
                "entry with an empty milestone or variant".to_string(),
            ));
        }
        if spec.cases.is_empty() && spec.records.is_none() {
            return Err(CatalogError::Malformed(format!("{key} lists no expected cases or records")));
        }
        if let Some(case) = spec.cases.iter().find(|c| c.tokens.is_empty()) {
            return Err(CatalogError::Malformed(format!(
                "{key}: case `{case}` expects no tokens and can never match"
            )));
        }

        let patterns = match (&spec.grammar, spec.cases.is_empty()) {
            (Some(grammar), _) => Some(grammar.compile()?),
            (None, true) => None,
            (None, false) => {
                return Err(CatalogError::Malformed(format!(
                    "{key} lists bucket cases but no grammar"
                )));
            }
        };
        let records = spec
            .records
            .as_ref()
            .map(RecordCheck::compile)
            .transpose()
            .map_err(|e| match e {
                CatalogError::Malformed(msg) => CatalogError::Malformed(format!("{key}: {msg}")),
                other => other,
            })?;

        Ok(Self {
            patterns,
            records,
            filter: OutputFilter::new(&spec.exclude)?,
            cases: spec.cases.clone(),
            duplicates: spec.duplicates,
            key,
        })
    }

    /// Returns the key of this profile.
    pub fn key(&self) -> &Variant {
        &self.key
    }

    /// Returns the expected cases.
    pub fn cases(&self) -> &[ExpectedCase] {
        &self.cases
    }

    /// Returns the compiled bucket grammar.
    pub fn patterns(&self) -> Option<&LinePatterns> {
        self.patterns.as_ref()
    }

    /// Returns the compiled record check.
    pub fn records(&self) -> Option<&RecordProfile> {
        self.records.as_ref()
    }

    /// Returns the output filter.
    pub fn filter(&self) -> &OutputFilter {
        &self.filter
    }

    /// Returns the duplicate index policy.
    pub fn duplicates(&self) -> DuplicatePolicy {
        self.duplicates
    }
}

/// Keyed table of immutable variant profiles.
#[derive(Debug, Clone, Default)]
pub struct CaseCatalog {
    /// Profiles by key.
    profiles: BTreeMap<Variant, VariantProfile>,
}

impl CaseCatalog {
    /// Compiles every entry of `spec`, rejecting duplicate keys.
    pub fn from_spec(spec: &CatalogSpec) -> Result<Self, CatalogError> {
        let mut profiles = BTreeMap::new();
        for entry in &spec.variants {
            let profile = VariantProfile::compile(entry)?;
            let key = profile.key().clone();
            if profiles.insert(key.clone(), profile).is_some() {
                return Err(CatalogError::Malformed(format!("{key} is listed more than once")));
            }
        }
        Ok(Self { profiles })
    }

    /// Parses a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let spec: CatalogSpec = serde_json::from_str(json)
            .map_err(|e| CatalogError::Malformed(format!("invalid catalog JSON: {e}")))?;
        Self::from_spec(&spec)
    }

    /// Reads and parses a catalog file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Malformed(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The catalog embedded in the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Looks up the profile for a milestone and grading variant.
    pub fn lookup(&self, milestone: &str, variant: &str) -> Result<&VariantProfile, CatalogError> {
        self.profiles
            .get(&Variant::new(milestone, variant))
            .ok_or_else(|| CatalogError::UnknownVariant {
                milestone: milestone.to_string(),
                variant:   variant.to_string(),
            })
    }

    /// Iterates over all known keys in order.
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.profiles.keys()
    }
}

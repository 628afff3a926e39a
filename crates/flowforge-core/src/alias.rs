use crate::error::{FlowError, Result};
use crate::template::FlowTemplate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// SiteGroup
// ---------------------------------------------------------------------------

/// One concrete binding of template aliases to sites; one task's worth of input.
///
/// Site ids are kept as the raw text the caller supplied. They are checked
/// only by [`resolve`], so a batch can be decoded without failing on a bad cell.
/// JSON callers may send site ids as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteGroup {
    #[serde(default, deserialize_with = "site_ids_as_text")]
    pub sites: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_task_id: Option<String>,
}

impl SiteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(mut self, alias: impl Into<String>, site_id: impl ToString) -> Self {
        self.sites.insert(alias.into(), site_id.to_string());
        self
    }

    /// The explicit client id, unchanged, if one was given and is not blank.
    pub fn explicit_task_id(&self) -> Option<&str> {
        self.client_task_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSiteId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl RawSiteId {
    fn into_text(self) -> String {
        match self {
            RawSiteId::Text(s) => s,
            RawSiteId::Unsigned(n) => n.to_string(),
            RawSiteId::Signed(n) => n.to_string(),
            RawSiteId::Float(n) => n.to_string(),
        }
    }
}

fn site_ids_as_text<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, RawSiteId>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(alias, id)| (alias, id.into_text())).collect())
}

// ---------------------------------------------------------------------------
// Resolution output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub alias: String,
    pub site_id: u64,
}

/// Alias → concrete site, in the template's alias order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSites {
    sites: Vec<SiteDescriptor>,
}

impl ResolvedSites {
    pub fn get(&self, alias: &str) -> Option<&SiteDescriptor> {
        self.sites.iter().find(|s| s.alias == alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteDescriptor> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn into_vec(self) -> Vec<SiteDescriptor> {
        self.sites
    }
}

// ---------------------------------------------------------------------------
// AliasIssue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AliasIssue {
    /// No mapping, or a blank cell.
    Missing { alias: String },
    /// Zero, negative, or non-numeric site id.
    Invalid { alias: String, value: String },
}

impl AliasIssue {
    pub fn alias(&self) -> &str {
        match self {
            AliasIssue::Missing { alias } | AliasIssue::Invalid { alias, .. } => alias,
        }
    }
}

impl fmt::Display for AliasIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasIssue::Missing { alias } => write!(f, "missing site for alias {alias}"),
            AliasIssue::Invalid { alias, value } => {
                write!(f, "invalid site id '{value}' for alias {alias}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

/// Bind every required alias of `template` to a strictly positive site id.
///
/// Fails with every offending alias, not just the first. Aliases in the group
/// that the template does not require are ignored.
pub fn resolve(template: &FlowTemplate, group: &SiteGroup) -> Result<ResolvedSites> {
    let mut sites = Vec::new();
    let mut issues = Vec::new();

    for alias in template.required_aliases() {
        let raw = group.sites.get(&alias).map(|s| s.trim()).unwrap_or("");
        if raw.is_empty() {
            issues.push(AliasIssue::Missing { alias });
            continue;
        }
        match raw.parse::<u64>() {
            Ok(site_id) if site_id > 0 => sites.push(SiteDescriptor { alias, site_id }),
            _ => issues.push(AliasIssue::Invalid {
                alias,
                value: raw.to_string(),
            }),
        }
    }

    if issues.is_empty() {
        Ok(ResolvedSites { sites })
    } else {
        Err(FlowError::UnresolvedAliases(issues))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

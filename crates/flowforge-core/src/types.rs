use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SiteScope
// ---------------------------------------------------------------------------

/// How many site roles an activity is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteScope {
    /// No alias assigned: the activity applies to the task as a whole.
    All,
    Single,
    Multiple,
}

impl SiteScope {
    pub fn from_alias_count(n: usize) -> Self {
        match n {
            0 => SiteScope::All,
            1 => SiteScope::Single,
            _ => SiteScope::Multiple,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SiteScope::All => "all",
            SiteScope::Single => "single",
            SiteScope::Multiple => "multiple",
        }
    }
}

impl fmt::Display for SiteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DependencyScope
// ---------------------------------------------------------------------------

/// Classification of an activity's dependency edges.
///
/// Derived from the template, never authored. See [`crate::scope::classify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    /// Dependencies (if any) run on the same site(s) as the activity.
    #[default]
    SiteLocal,
    /// Dependencies run on other sites of the same task in a coordinated pattern.
    CrossSite,
    /// Dependencies span unrelated site contexts.
    Global,
}

impl DependencyScope {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyScope::SiteLocal => "site_local",
            DependencyScope::CrossSite => "cross_site",
            DependencyScope::Global => "global",
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActivityType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    SiteSurvey,
    Installation,
    Commissioning,
    Integration,
    Acceptance,
    Notification,
    Approval,
    Documentation,
}

impl ActivityType {
    pub fn all() -> &'static [ActivityType] {
        &[
            ActivityType::SiteSurvey,
            ActivityType::Installation,
            ActivityType::Commissioning,
            ActivityType::Integration,
            ActivityType::Acceptance,
            ActivityType::Notification,
            ActivityType::Approval,
            ActivityType::Documentation,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::SiteSurvey => "site_survey",
            ActivityType::Installation => "installation",
            ActivityType::Commissioning => "commissioning",
            ActivityType::Integration => "integration",
            ActivityType::Acceptance => "acceptance",
            ActivityType::Notification => "notification",
            ActivityType::Approval => "approval",
            ActivityType::Documentation => "documentation",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown activity type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_scope_from_count() {
        assert_eq!(SiteScope::from_alias_count(0), SiteScope::All);
        assert_eq!(SiteScope::from_alias_count(1), SiteScope::Single);
        assert_eq!(SiteScope::from_alias_count(3), SiteScope::Multiple);
    }

    #[test]
    fn activity_type_parses_its_own_names() {
        for t in ActivityType::all() {
            assert_eq!(t.as_str().parse::<ActivityType>().unwrap(), *t);
        }
        assert!("teleport".parse::<ActivityType>().is_err());
    }

    #[test]
    fn dependency_scope_serializes_snake_case() {
        let s = serde_json::to_string(&DependencyScope::CrossSite).unwrap();
        assert_eq!(s, "\"cross_site\"");
        assert_eq!(DependencyScope::default(), DependencyScope::SiteLocal);
    }
}

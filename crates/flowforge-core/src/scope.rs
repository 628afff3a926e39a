//! Dependency scope classification.
//!
//! The rules are order-based rather than graph-based: an activity whose
//! dependencies live on other sites is `CrossSite` only when the sequence
//! orders form one of the recognised coordination patterns, and `Global`
//! otherwise. Irregular (non-contiguous) orders can therefore classify a
//! topologically valid edge as `Global`.

use crate::template::FlowActivity;
use crate::types::DependencyScope;
use std::collections::BTreeSet;

/// An order this far past the latest dependency still counts as "next step".
pub const NEXT_STEP_WINDOW: u32 = 2;

const SOURCE_MARKER: &str = "Source";
const TARGET_MARKER: &str = "Target";

/// Classify `activity` against its dependencies, looked up by id in `all`.
/// Ids that do not resolve are ignored.
pub fn classify(activity: &FlowActivity, all: &[FlowActivity]) -> DependencyScope {
    let deps: Vec<&FlowActivity> = activity
        .dependencies
        .iter()
        .filter_map(|id| all.iter().find(|a| &a.id == id))
        .collect();
    classify_with(activity, &deps)
}

/// Classify `activity` against an already-resolved dependency set.
pub fn classify_with(activity: &FlowActivity, deps: &[&FlowActivity]) -> DependencyScope {
    if deps.is_empty() {
        return DependencyScope::SiteLocal;
    }

    let own = &activity.assigned_site_aliases;
    let disjoint: Vec<&FlowActivity> = deps
        .iter()
        .copied()
        .filter(|d| is_disjoint(own, &d.assigned_site_aliases))
        .collect();

    if disjoint.is_empty() {
        return if deps.len() > 1 {
            DependencyScope::CrossSite
        } else {
            DependencyScope::SiteLocal
        };
    }

    if disjoint
        .iter()
        .any(|d| is_relocation_pair(own, &d.assigned_site_aliases))
    {
        return DependencyScope::Global;
    }

    if is_coordinated(activity.sequence_order, deps) {
        DependencyScope::CrossSite
    } else {
        DependencyScope::Global
    }
}

/// An `all`-scoped activity (no aliases) is disjoint from anything that has
/// an assignment, and overlaps with another `all`-scoped activity.
fn is_disjoint(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => false,
        (true, false) | (false, true) => true,
        (false, false) => a.is_disjoint(b),
    }
}

fn is_relocation_pair(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    let has = |set: &BTreeSet<String>, marker: &str| set.iter().any(|s| s.contains(marker));
    (has(a, SOURCE_MARKER) && has(b, TARGET_MARKER))
        || (has(a, TARGET_MARKER) && has(b, SOURCE_MARKER))
}

fn is_coordinated(order: u32, deps: &[&FlowActivity]) -> bool {
    let orders: Vec<u32> = deps.iter().map(|d| d.sequence_order).collect();
    let min = orders.iter().copied().min().unwrap_or(order);
    let max = orders.iter().copied().max().unwrap_or(order);

    // waits for a preceding phase
    if order >= max {
        return true;
    }
    // parallel fan-in
    if min == max {
        return true;
    }
    // next step in sequence
    order > min && order <= max + NEXT_STEP_WINDOW
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityType;

    fn act(id: &str, order: u32, aliases: &[&str]) -> FlowActivity {
        let mut a = FlowActivity::new(id, id, order, ActivityType::Installation);
        for alias in aliases {
            a = a.at(*alias);
        }
        a
    }

    #[test]
    fn no_dependencies_is_site_local() {
        let a = act("a", 5, &["Far-end"]);
        assert_eq!(classify_with(&a, &[]), DependencyScope::SiteLocal);
        let all_scoped = act("b", 1, &[]);
        assert_eq!(classify_with(&all_scoped, &[]), DependencyScope::SiteLocal);
    }

    #[test]
    fn same_site_single_dependency_is_site_local() {
        let dep = act("d", 1, &["Far-end"]);
        let a = act("a", 2, &["Far-end"]);
        assert_eq!(classify_with(&a, &[&dep]), DependencyScope::SiteLocal);
    }

    #[test]
    fn same_site_multiple_dependencies_is_cross_site() {
        let d1 = act("d1", 1, &["Far-end"]);
        let d2 = act("d2", 1, &["Far-end", "Near-end"]);
        let a = act("a", 2, &["Far-end"]);
        assert_eq!(classify_with(&a, &[&d1, &d2]), DependencyScope::CrossSite);
    }

    #[test]
    fn fan_in_from_both_ends_is_cross_site() {
        let far = act("far", 1, &["Far-end"]);
        let near = act("near", 1, &["Near-end"]);
        let email = act("email", 2, &[]);
        assert_eq!(classify_with(&email, &[&far, &near]), DependencyScope::CrossSite);
    }

    #[test]
    fn waiting_on_a_preceding_phase_is_cross_site() {
        let d1 = act("d1", 1, &["Far-end"]);
        let d2 = act("d2", 3, &["Far-end"]);
        let a = act("a", 7, &["Near-end"]);
        assert_eq!(classify_with(&a, &[&d1, &d2]), DependencyScope::CrossSite);
    }

    #[test]
    fn order_inside_the_dependency_span_is_cross_site() {
        let d1 = act("d1", 1, &["Far-end"]);
        let d2 = act("d2", 4, &["Far-end"]);
        let a = act("a", 3, &["Near-end"]);
        assert_eq!(classify_with(&a, &[&d1, &d2]), DependencyScope::CrossSite);
    }

    #[test]
    fn order_before_every_dependency_is_global() {
        let d1 = act("d1", 4, &["Far-end"]);
        let d2 = act("d2", 6, &["Far-end"]);
        let a = act("a", 2, &["Near-end"]);
        assert_eq!(classify_with(&a, &[&d1, &d2]), DependencyScope::Global);
    }

    #[test]
    fn source_target_pair_is_global() {
        let dep = act("d", 1, &["Source Site"]);
        let a = act("a", 2, &["Target Site"]);
        assert_eq!(classify_with(&a, &[&dep]), DependencyScope::Global);
        // reversed direction too
        assert_eq!(classify_with(&dep, &[&a]), DependencyScope::Global);
    }

    #[test]
    fn all_scoped_pair_overlaps() {
        let dep = act("d", 1, &[]);
        let a = act("a", 2, &[]);
        assert_eq!(classify_with(&a, &[&dep]), DependencyScope::SiteLocal);
    }

    #[test]
    fn classify_resolves_ids_and_is_deterministic() {
        let all = vec![
            act("far", 1, &["Far-end"]),
            act("near", 1, &["Near-end"]),
            act("email", 2, &[]).after("far").after("near").after("ghost"),
        ];
        let first = classify(&all[2], &all);
        let second = classify(&all[2], &all);
        assert_eq!(first, DependencyScope::CrossSite);
        assert_eq!(first, second);
    }
}

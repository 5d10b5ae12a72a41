//! # Endpoint selection
//!
//! Reconciles the caller's constraints (process, role, transport profile)
//! against normalized service metadata. Selection is a pure function over
//! immutable data: it narrows the process groups to exactly one, then
//! filters that group's endpoints by transport profile.
//!
//! "Not found" is a valid outcome and never an error; ambiguity is. When
//! the constraints leave more than one group standing after the tie-break
//! rules, the metadata itself is contradictory and the caller must know.

use bdx_core::{
    EndpointInfo, Identifier, ProcessGroup, ProcessIdentifier, ProcessInfo, Redirection,
    ServiceMetadata,
};
use thiserror::Error;
use tracing::debug;

/// The outcome of narrowing and filtering: either the matching endpoints, or
/// the redirection carried by the selected group, which the query engine
/// follows before selection is attempted again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Endpoints of the selected group, filtered by transport profile.
    /// Possibly empty: no endpoint for the requested transport is not an
    /// error.
    Endpoints(Vec<EndpointInfo>),
    /// The selected group is served by another publisher.
    Redirect(Redirection),
}

/// The process/role constraints did not converge to exactly one group.
#[derive(Error, Debug)]
#[error("{candidates} process groups match process {process} and role {role}")]
pub struct AmbiguousSelection {
    pub candidates: usize,
    pub process: String,
    pub role: String,
}

/// A candidate group together with the process entry that made it match,
/// kept for the role tie-break.
struct Candidate<'a> {
    group: &'a ProcessGroup,
    matched: Option<&'a ProcessInfo>,
}

/// Select the endpoints (or pending redirection) matching the constraints.
///
/// `process` and `role` constrain which group applies; `transport_profile`
/// filters the endpoints of the selected group. A `None` constraint means
/// "unconstrained".
pub fn select(
    metadata: &ServiceMetadata,
    process: Option<&ProcessIdentifier>,
    role: Option<&Identifier>,
    transport_profile: Option<&str>,
) -> Result<Selection, AmbiguousSelection> {
    let mut candidates: Vec<Candidate<'_>> = metadata
        .process_groups
        .iter()
        .filter_map(|group| candidate(group, process, role))
        .collect();

    if candidates.is_empty() {
        debug!("no process group matches the requested process and role");
        return Ok(Selection::Endpoints(Vec::new()));
    }

    // Tie-break rules, each applied only while more than one candidate
    // survives, and only when it leaves at least one standing.
    if candidates.len() > 1 && role.is_some() {
        // Prefer groups explicitly scoped to a role over role-agnostic ones.
        narrow(&mut candidates, |c| {
            c.matched.is_some_and(|p| !p.roles.is_empty())
        });
    }
    if candidates.len() > 1 {
        // Prefer explicit process bindings over catch-all groups.
        narrow(&mut candidates, |c| !c.group.processes().is_empty());
    }

    if candidates.len() > 1 {
        return Err(AmbiguousSelection {
            candidates: candidates.len(),
            process: constraint_display(process.map(|p| p.to_string())),
            role: constraint_display(role.map(|r| r.to_string())),
        });
    }

    let group = candidates[0].group;
    if let Some(redirection) = group.redirect() {
        debug!("selected group is redirected to another publisher");
        return Ok(Selection::Redirect(redirection.clone()));
    }

    let endpoints: Vec<EndpointInfo> = group
        .endpoints()
        .iter()
        .filter(|endpoint| {
            transport_profile
                .map_or(true, |requested| endpoint.transport_profile == requested)
        })
        .cloned()
        .collect();
    debug!(endpoints = endpoints.len(), "selected endpoints");
    Ok(Selection::Endpoints(endpoints))
}

/// Whether the group matches the process/role constraints, and through which
/// process entry. A group with an empty process list is a catch-all.
fn candidate<'a>(
    group: &'a ProcessGroup,
    process: Option<&ProcessIdentifier>,
    role: Option<&Identifier>,
) -> Option<Candidate<'a>> {
    if group.processes().is_empty() {
        return Some(Candidate {
            group,
            matched: None,
        });
    }
    let matched = group.processes().iter().find(|info| {
        process.map_or(true, |requested| info.process_id == *requested) && role_matches(info, role)
    })?;
    Some(Candidate {
        group,
        matched: Some(matched),
    })
}

fn role_matches(info: &ProcessInfo, role: Option<&Identifier>) -> bool {
    match role {
        None => true,
        Some(requested) => info.roles.is_empty() || info.roles.contains(requested),
    }
}

/// Keep only candidates satisfying `preferred`, unless that would leave
/// none.
fn narrow<'a>(candidates: &mut Vec<Candidate<'a>>, preferred: impl Fn(&Candidate<'a>) -> bool) {
    if candidates.iter().any(&preferred) {
        candidates.retain(preferred);
    }
}

fn constraint_display(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<any>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdx_core::{EndpointInfo, ProcessGroup, ServiceMetadata};
    use url::Url;

    fn id(value: &str) -> Identifier {
        value.parse().unwrap()
    }

    fn pid(value: &str) -> ProcessIdentifier {
        ProcessIdentifier::Identifier(id(value))
    }

    fn endpoint(transport: &str) -> EndpointInfo {
        EndpointInfo::new(
            transport,
            Url::parse(&format!("https://ap.example.org/{transport}")).unwrap(),
        )
    }

    fn metadata(groups: Vec<ProcessGroup>) -> ServiceMetadata {
        ServiceMetadata::new(id("iso6523::9915:p"), id("svc::s"), groups)
    }

    fn endpoints(selection: Selection) -> Vec<EndpointInfo> {
        match selection {
            Selection::Endpoints(endpoints) => endpoints,
            Selection::Redirect(_) => panic!("unexpected redirect"),
        }
    }

    #[test]
    fn catch_all_group_matches_any_process() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![],
            vec![endpoint("t1"), endpoint("t2")],
        )]);
        let result = select(&meta, Some(&pid("proc::anything")), None, None).unwrap();
        assert_eq!(endpoints(result).len(), 2);
    }

    #[test]
    fn explicit_process_binding_matches_only_its_process() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("t1")],
        )]);
        let hit = select(&meta, Some(&pid("proc::p1")), None, None).unwrap();
        assert_eq!(endpoints(hit).len(), 1);
        let miss = select(&meta, Some(&pid("proc::p2")), None, None).unwrap();
        assert!(endpoints(miss).is_empty());
    }

    #[test]
    fn no_process_sentinel_only_matches_itself() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(ProcessIdentifier::NoProcess)],
            vec![endpoint("t1")],
        )]);
        let hit = select(&meta, Some(&ProcessIdentifier::NoProcess), None, None).unwrap();
        assert_eq!(endpoints(hit).len(), 1);
        let miss = select(&meta, Some(&pid("proc::p1")), None, None).unwrap();
        assert!(endpoints(miss).is_empty());
    }

    #[test]
    fn role_scoped_group_wins_over_role_agnostic_one() {
        // Two groups for the same process: one scoped to roles, one not.
        // Requesting a scoped role must pick the scoped group, not report
        // ambiguity.
        let scoped = ProcessGroup::with_endpoints(
            vec![ProcessInfo::with_roles(
                pid("proc::p1"),
                vec![id("role::r1"), id("role::r2")],
            )],
            vec![endpoint("e1")],
        );
        let agnostic = ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("e2")],
        );
        let meta = metadata(vec![agnostic, scoped]);
        let result = endpoints(
            select(&meta, Some(&pid("proc::p1")), Some(&id("role::r1")), None).unwrap(),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].transport_profile, "e1");
    }

    #[test]
    fn explicit_process_binding_wins_over_catch_all() {
        let explicit = ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("explicit")],
        );
        let catch_all = ProcessGroup::with_endpoints(vec![], vec![endpoint("fallback")]);
        let meta = metadata(vec![catch_all, explicit]);
        let result = endpoints(select(&meta, Some(&pid("proc::p1")), None, None).unwrap());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].transport_profile, "explicit");
    }

    #[test]
    fn unresolvable_ambiguity_is_an_error() {
        let a = ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("a")],
        );
        let b = ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("b")],
        );
        let meta = metadata(vec![a, b]);
        let err = select(&meta, Some(&pid("proc::p1")), None, None).unwrap_err();
        assert_eq!(err.candidates, 2);
    }

    #[test]
    fn transport_filter_returns_matching_subset() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("http-1.0"), endpoint("http-2.0")],
        )]);
        let result = endpoints(
            select(&meta, Some(&pid("proc::p1")), None, Some("http-2.0")).unwrap(),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].transport_profile, "http-2.0");
    }

    #[test]
    fn absent_transport_profile_yields_empty_not_error() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("http-1.0"), endpoint("http-2.0")],
        )]);
        let result = endpoints(
            select(&meta, Some(&pid("proc::p1")), None, Some("http-3.0")).unwrap(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn role_mismatch_excludes_the_group() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![ProcessInfo::with_roles(pid("proc::p1"), vec![id("role::r1")])],
            vec![endpoint("t1")],
        )]);
        let result = select(&meta, Some(&pid("proc::p1")), Some(&id("role::other")), None).unwrap();
        assert!(endpoints(result).is_empty());
    }

    #[test]
    fn selected_redirected_group_surfaces_the_redirection() {
        let redirection = Redirection::new(Url::parse("https://other.example.org").unwrap());
        let meta = metadata(vec![ProcessGroup::redirected(
            vec![ProcessInfo::new(pid("proc::p1"))],
            redirection.clone(),
        )]);
        let result = select(&meta, Some(&pid("proc::p1")), None, None).unwrap();
        assert_eq!(result, Selection::Redirect(redirection));
    }

    #[test]
    fn unconstrained_query_with_single_group_returns_its_endpoints() {
        let meta = metadata(vec![ProcessGroup::with_endpoints(
            vec![ProcessInfo::new(pid("proc::p1"))],
            vec![endpoint("t1")],
        )]);
        let result = endpoints(select(&meta, None, None, None).unwrap());
        assert_eq!(result.len(), 1);
    }
}

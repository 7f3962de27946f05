//! Tenant (head office) routing
//!
//! After login the remote session sits in whichever head office the account
//! used last. [`select_tenant`] looks the (target, current) pair up in
//! [`ROUTES`] and tells the caller whether to stay, switch, or carry on
//! without knowing where it is.

mod router;

pub use router::{SessionState, TenantMismatchWarning, TenantRouter};

use serde::{Deserialize, Serialize};

/// Known head offices of the remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tenant {
    Aldeota,
    Sul,
    Bezerra,
}

impl Tenant {
    pub const ALL: [Tenant; 3] = [Tenant::Aldeota, Tenant::Sul, Tenant::Bezerra];

    pub fn name(&self) -> &'static str {
        match self {
            Tenant::Aldeota => "Aldeota",
            Tenant::Sul => "Sul",
            Tenant::Bezerra => "Bezerra",
        }
    }

    /// Company label shown in the session header, whitespace removed
    pub fn session_label(&self) -> &'static str {
        match self {
            Tenant::Aldeota => "DIGITALCOLLEGEALDEOTA-72546",
            Tenant::Sul => "DIGITALCOLLEGESUL-74070",
            Tenant::Bezerra => "DIGITALCOLLEGEBEZERRADEMENEZES-488365",
        }
    }

    /// Parse a configured tenant name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Tenant> {
        let wanted = name.trim();
        Tenant::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
    }

    /// Identify the tenant a session reports, by label or short name
    pub fn from_session(raw: &str) -> Option<Tenant> {
        let compact = compact_label(raw);
        Tenant::ALL
            .into_iter()
            .find(|t| t.session_label().eq_ignore_ascii_case(&compact))
            .or_else(|| Tenant::from_name(&compact))
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Strip all whitespace: "DIGITAL COLLEGE SUL - 74070" -> "DIGITALCOLLEGESUL-74070"
pub fn compact_label(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Action required to reach the target tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The session is already in the target tenant
    AlreadyThere,
    /// Trigger the tenant switch with this opaque value
    Switch(u32),
}

/// One row of the compatibility table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub target: Tenant,
    pub current: Tenant,
    pub route: Route,
}

const fn entry(target: Tenant, current: Tenant, route: Route) -> RouteEntry {
    RouteEntry {
        target,
        current,
        route,
    }
}

/// (target, current) -> action. Switch values are the remote company selector ids.
pub const ROUTES: [RouteEntry; 9] = [
    entry(Tenant::Aldeota, Tenant::Sul, Route::Switch(1)),
    entry(Tenant::Aldeota, Tenant::Bezerra, Route::Switch(1)),
    entry(Tenant::Sul, Tenant::Aldeota, Route::Switch(3)),
    entry(Tenant::Sul, Tenant::Bezerra, Route::Switch(3)),
    entry(Tenant::Bezerra, Tenant::Aldeota, Route::Switch(4)),
    entry(Tenant::Bezerra, Tenant::Sul, Route::Switch(4)),
    entry(Tenant::Aldeota, Tenant::Aldeota, Route::AlreadyThere),
    entry(Tenant::Sul, Tenant::Sul, Route::AlreadyThere),
    entry(Tenant::Bezerra, Tenant::Bezerra, Route::AlreadyThere),
];

/// Outcome of a routing lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    AlreadyThere { tenant: Tenant },
    Switch { target: Tenant, value: u32 },
    /// The session reported something not in the table
    Unrecognized { target: Tenant, current: String },
}

impl RouteDecision {
    /// Operator-facing message for this decision
    pub fn message(&self) -> String {
        match self {
            RouteDecision::AlreadyThere { tenant } => {
                format!("Session is already in head office {}.", tenant)
            }
            RouteDecision::Switch { target, .. } => {
                format!("Switching to head office {}.", target)
            }
            RouteDecision::Unrecognized { target, current } => format!(
                "No action taken: unrecognized combination (target {}, session '{}').",
                target, current
            ),
        }
    }
}

/// Look up how to get from the session's current tenant to `target`
pub fn select_tenant(target: Tenant, current: &str) -> RouteDecision {
    let Some(current_tenant) = Tenant::from_session(current) else {
        return RouteDecision::Unrecognized {
            target,
            current: compact_label(current),
        };
    };

    match ROUTES
        .iter()
        .find(|e| e.target == target && e.current == current_tenant)
        .map(|e| e.route)
    {
        Some(Route::AlreadyThere) => RouteDecision::AlreadyThere { tenant: target },
        Some(Route::Switch(value)) => RouteDecision::Switch { target, value },
        None => RouteDecision::Unrecognized {
            target,
            current: compact_label(current),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_covers_every_pair_once() {
        let pairs: HashSet<(Tenant, Tenant)> =
            ROUTES.iter().map(|e| (e.target, e.current)).collect();
        assert_eq!(pairs.len(), 9);
        for target in Tenant::ALL {
            for current in Tenant::ALL {
                assert!(pairs.contains(&(target, current)));
            }
        }
    }

    #[test]
    fn test_same_tenant_is_already_there() {
        for tenant in Tenant::ALL {
            assert_eq!(
                select_tenant(tenant, tenant.session_label()),
                RouteDecision::AlreadyThere { tenant }
            );
        }
    }

    #[test]
    fn test_switch_values_depend_on_target_only() {
        assert_eq!(
            select_tenant(Tenant::Aldeota, "DIGITALCOLLEGEBEZERRADEMENEZES-488365"),
            RouteDecision::Switch {
                target: Tenant::Aldeota,
                value: 1
            }
        );
        assert_eq!(
            select_tenant(Tenant::Sul, "DIGITAL COLLEGE ALDEOTA - 72546"),
            RouteDecision::Switch {
                target: Tenant::Sul,
                value: 3
            }
        );
        assert_eq!(
            select_tenant(Tenant::Bezerra, "DIGITALCOLLEGESUL-74070"),
            RouteDecision::Switch {
                target: Tenant::Bezerra,
                value: 4
            }
        );
    }

    #[test]
    fn test_routing_is_deterministic() {
        let first = select_tenant(Tenant::Aldeota, "Sul");
        for _ in 0..10 {
            let again = select_tenant(Tenant::Aldeota, "Sul");
            assert_eq!(again, first);
            assert_eq!(again.message(), first.message());
        }
        assert_eq!(
            first,
            RouteDecision::Switch {
                target: Tenant::Aldeota,
                value: 1
            }
        );
        assert_eq!(first.message(), "Switching to head office Aldeota.");
    }

    #[test]
    fn test_unknown_session_label_is_unrecognized() {
        let decision = select_tenant(Tenant::Sul, "OUTRA ESCOLA - 1");
        assert_eq!(
            decision,
            RouteDecision::Unrecognized {
                target: Tenant::Sul,
                current: "OUTRAESCOLA-1".to_string()
            }
        );
        assert!(decision.message().contains("unrecognized"));
    }

    #[test]
    fn test_tenant_names_parse_case_insensitively() {
        assert_eq!(Tenant::from_name("aldeota"), Some(Tenant::Aldeota));
        assert_eq!(Tenant::from_name(" SUL "), Some(Tenant::Sul));
        assert_eq!(Tenant::from_name("Norte"), None);
    }
}

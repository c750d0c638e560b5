//! Admin economy-mutation route table.
//!
//! The transport layer registers these endpoints behind admin
//! authentication. Every route mutates economy state, so none may be
//! reachable through a safe (`GET`/`HEAD`) method; the season simulator
//! asserts this on every run.

use serde::{Deserialize, Serialize};

/// HTTP method of an admin route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Whether the method is safe (read-only by HTTP semantics).
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

/// One admin endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdminRoute {
    /// Required method.
    pub method: HttpMethod,
    /// Route path.
    pub path: &'static str,
    /// What the endpoint changes.
    pub mutates: &'static str,
}

/// Every admin endpoint that changes economy state.
pub const ADMIN_ECONOMY_ROUTES: &[AdminRoute] = &[
    AdminRoute {
        method: HttpMethod::Put,
        path: "/admin/economy/calibration",
        mutates: "swap the live calibration",
    },
    AdminRoute {
        method: HttpMethod::Post,
        path: "/admin/economy/grant",
        mutates: "grant coins to a player from the pool",
    },
    AdminRoute {
        method: HttpMethod::Post,
        path: "/admin/economy/emission/tick",
        mutates: "force an emission drip",
    },
    AdminRoute {
        method: HttpMethod::Post,
        path: "/admin/economy/pressure",
        mutates: "steer market pressure toward a target",
    },
    AdminRoute {
        method: HttpMethod::Post,
        path: "/admin/economy/season/rollover",
        mutates: "close the season and start a new ledger",
    },
];

/// Whether every route requires a non-safe method under `/admin/`.
pub fn routes_locked(routes: &[AdminRoute]) -> bool {
    routes
        .iter()
        .all(|route| !route.method.is_safe() && route.path.starts_with("/admin/"))
}

//! Route table of the Construction Manager front end.

use cm_domain::RouteTarget;

/// Title used when a route has none.
pub const DEFAULT_TITLE: &str = "Construction Manager";

struct Route {
    name: &'static str,
    path: &'static str,
    requires_auth: bool,
    title: &'static str,
}

const ROUTES: &[Route] = &[
    Route {
        name: "dashboard",
        path: "/",
        requires_auth: true,
        title: "Strona główna",
    },
    Route {
        name: "constructionManager",
        path: "/cm",
        requires_auth: true,
        title: "Construction Manager",
    },
    Route {
        name: "cm-companies",
        path: "/cm/companies",
        requires_auth: true,
        title: "Companies",
    },
    Route {
        name: "cm-products",
        path: "/cm/products",
        requires_auth: true,
        title: "Products",
    },
    Route {
        name: "cm-users",
        path: "/cm/users",
        requires_auth: true,
        title: "Users",
    },
    Route {
        name: "login",
        path: "/auth/login",
        requires_auth: false,
        title: "Logowanie",
    },
    Route {
        name: "accessDenied",
        path: "/auth/access",
        requires_auth: false,
        title: "Brak dostępu",
    },
    Route {
        name: "error",
        path: "/auth/error",
        requires_auth: false,
        title: "Błąd uwierzytelniania",
    },
];

/// Resolves a full path (query included) to a navigation target.
///
/// Unknown paths resolve to a public `notfound` target.
#[must_use]
pub fn resolve(full_path: &str) -> RouteTarget {
    let full_path = if full_path.starts_with('/') {
        full_path.to_string()
    } else {
        format!("/{full_path}")
    };
    let path = full_path.split_once('?').map_or(full_path.as_str(), |(p, _)| p);
    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        other => other,
    };

    match ROUTES.iter().find(|route| route.path == trimmed) {
        Some(route) => {
            let target = if route.requires_auth {
                RouteTarget::protected(route.name, full_path)
            } else {
                RouteTarget::public(route.name, full_path)
            };
            target.with_title(route.title)
        }
        None => RouteTarget::public("notfound", full_path).with_title(DEFAULT_TITLE),
    }
}

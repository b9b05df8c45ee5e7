//! Endpoint classification: which requests carry the bearer credential.
//!
//! Classification is table-driven. Each rule pairs an optional HTTP method
//! with a path template made of literal segments and `{id}` wildcards; a
//! wildcard matches a purely numeric segment. Matching is whole-segment,
//! never by substring. Paths under an `admin` segment are always protected,
//! and an `auth` segment is only public through an exact, wildcard-free rule.

use reqwest::Method;

/// Login endpoint. A 401 here means bad credentials, never a stale session.
pub const LOGIN_PATH: &str = "/auth/login";

/// Profile endpoint. A 401 here means the session expired.
pub const PROFILE_PATH: &str = "/auth/me";

const ADMIN_SEGMENT: &str = "admin";
const AUTH_SEGMENT: &str = "auth";
const ID_WILDCARD: &str = "{id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Id,
}

/// One entry of the route table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    method: Option<Method>,
    template: String,
    segments: Vec<Segment>,
    access: Access,
}

impl RouteRule {
    /// Rule for `template` under `method` (`None` matches any method).
    pub fn new(method: Option<Method>, template: &str, access: Access) -> Self {
        let segments = split_segments(template)
            .map(|s| {
                if s == ID_WILDCARD {
                    Segment::Id
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        Self {
            method,
            template: template.to_string(),
            segments,
            access,
        }
    }

    /// Public for every method.
    pub fn public(template: &str) -> Self {
        Self::new(None, template, Access::Public)
    }

    /// Public for GET only; other methods fall through to later rules.
    pub fn public_get(template: &str) -> Self {
        Self::new(Some(Method::GET), template, Access::Public)
    }

    pub fn public_post(template: &str) -> Self {
        Self::new(Some(Method::POST), template, Access::Public)
    }

    pub fn protected(template: &str) -> Self {
        Self::new(None, template, Access::Protected)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Whether the template has no wildcard.
    pub fn is_exact(&self) -> bool {
        !self.segments.contains(&Segment::Id)
    }

    fn matches(&self, method: &Method, segments: &[&str]) -> bool {
        if let Some(ref m) = self.method {
            if m != method {
                return false;
            }
        }
        self.segments.len() == segments.len()
            && self.segments.iter().zip(segments).all(|(rule, seg)| match rule {
                Segment::Literal(lit) => lit.as_str() == *seg,
                Segment::Id => is_numeric_id(seg),
            })
    }
}

/// Ordered route table. The first matching rule wins; no match is protected.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Public surface of the storefront backend.
    pub fn storefront() -> Self {
        Self::new(vec![
            RouteRule::public(LOGIN_PATH),
            RouteRule::public("/auth/register"),
            RouteRule::public_post("/contact"),
            RouteRule::public_get("/products"),
            RouteRule::public_get("/products/featured"),
            RouteRule::public_get("/products/{id}"),
            RouteRule::public_get("/products/{id}/images"),
            RouteRule::public_get("/products/{id}/reviews"),
            RouteRule::public_get("/categories"),
            RouteRule::public_get("/categories/{id}"),
            RouteRule::public_get("/categories/{id}/products"),
            RouteRule::public_get("/brands"),
            RouteRule::public_get("/brands/{id}"),
            RouteRule::public_get("/brands/{id}/products"),
            RouteRule::public_get("/banners"),
            RouteRule::public_get("/settings"),
        ])
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Classify a request. Pure; the path may carry a query string.
    pub fn classify(&self, method: &Method, path: &str) -> Access {
        let segments: Vec<&str> = split_segments(route_path(path)).collect();

        if segments.iter().any(|s| *s == ADMIN_SEGMENT) {
            return Access::Protected;
        }
        let has_auth_segment = segments.iter().any(|s| *s == AUTH_SEGMENT);

        let Some(rule) = self.rules.iter().find(|r| r.matches(method, &segments)) else {
            return Access::Protected;
        };
        if has_auth_segment && !rule.is_exact() {
            return Access::Protected;
        }
        rule.access
    }

    /// Whether the credential should be attached to this request.
    pub fn requires_auth(&self, method: &Method, path: &str) -> bool {
        self.classify(method, path) == Access::Protected
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::storefront()
    }
}

/// Path portion used for matching: query and fragment removed, one trailing
/// slash tolerated.
pub fn route_path(path: &str) -> &str {
    let end = path.find(&['?', '#'][..]).unwrap_or(path.len());
    let path = &path[..end];
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Whether the path targets the admin area.
pub fn is_admin_path(path: &str) -> bool {
    split_segments(route_path(path)).any(|s| s == ADMIN_SEGMENT)
}

/// Whether the request is a login attempt.
pub fn is_login_path(path: &str) -> bool {
    route_path(path) == LOGIN_PATH
}

pub fn is_profile_path(path: &str) -> bool {
    route_path(path) == PROFILE_PATH
}

/// Segments after the leading slash. Empty segments are kept so `//x`
/// cannot line up with a template.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

fn is_numeric_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> Access {
        RouteTable::storefront().classify(&Method::GET, path)
    }

    #[test]
    fn test_exact_public_paths() {
        assert_eq!(get("/products"), Access::Public);
        assert_eq!(get("/categories"), Access::Public);
        assert_eq!(get("/auth/login"), Access::Public);
        assert_eq!(get("/auth/register"), Access::Public);
    }

    #[test]
    fn test_exact_path_tolerates_query_and_trailing_slash() {
        assert_eq!(get("/products?page=2&sort=price"), Access::Public);
        assert_eq!(get("/products/"), Access::Public);
        assert_eq!(get("/products/42?include=images"), Access::Public);
    }

    #[test]
    fn test_numeric_wildcards() {
        assert_eq!(get("/products/42"), Access::Public);
        assert_eq!(get("/products/42/reviews"), Access::Public);
        assert_eq!(get("/categories/7/products"), Access::Public);
        assert_eq!(get("/products/abc"), Access::Protected);
        assert_eq!(get("/products/42a"), Access::Protected);
        assert_eq!(get("/products/-1"), Access::Protected);
        assert_eq!(get("/products//reviews"), Access::Protected);
        assert_eq!(get("/products/42/reviews/9"), Access::Protected);
    }

    #[test]
    fn test_literal_segment_beats_wildcard() {
        assert_eq!(get("/products/featured"), Access::Public);
    }

    #[test]
    fn test_admin_segment_always_protected() {
        assert_eq!(get("/admin/products"), Access::Protected);
        assert_eq!(get("/admin/products/42"), Access::Protected);
        assert_eq!(get("/products/admin"), Access::Protected);
        assert_eq!(get("/admin/auth/login"), Access::Protected);
    }

    #[test]
    fn test_substring_is_not_a_segment() {
        // "administrators" contains "admin" but is not the admin segment;
        // it is still protected because nothing in the table matches it.
        assert_eq!(get("/administrators"), Access::Protected);
        assert_eq!(get("/products-admin"), Access::Protected);
        assert_eq!(get("/productsx"), Access::Protected);
    }

    #[test]
    fn test_auth_paths_outside_exact_list_are_protected() {
        assert_eq!(get("/auth/me"), Access::Protected);
        assert_eq!(get("/auth/logout"), Access::Protected);
    }

    #[test]
    fn test_auth_segment_blocks_pattern_match() {
        let table = RouteTable::new(vec![RouteRule::public_get("/auth/{id}")]);
        assert_eq!(table.classify(&Method::GET, "/auth/12"), Access::Protected);
    }

    #[test]
    fn test_catalog_writes_are_protected() {
        let table = RouteTable::storefront();
        assert_eq!(table.classify(&Method::POST, "/products"), Access::Protected);
        assert_eq!(table.classify(&Method::PUT, "/products/42"), Access::Protected);
        assert_eq!(table.classify(&Method::DELETE, "/products/42"), Access::Protected);
    }

    #[test]
    fn test_contact_is_public_for_post() {
        let table = RouteTable::storefront();
        assert_eq!(table.classify(&Method::POST, "/contact"), Access::Public);
        assert_eq!(table.classify(&Method::POST, "/auth/login"), Access::Public);
    }

    #[test]
    fn test_unknown_paths_are_protected() {
        assert_eq!(get("/orders"), Access::Protected);
        assert_eq!(get("/"), Access::Protected);
        assert_eq!(get(""), Access::Protected);
    }

    #[test]
    fn test_explicit_protected_rule_wins_when_first() {
        let table = RouteTable::new(vec![
            RouteRule::protected("/products/{id}"),
            RouteRule::public_get("/products/{id}"),
        ]);
        assert!(table.requires_auth(&Method::GET, "/products/1"));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(route_path("/products?x=1"), "/products");
        assert_eq!(route_path("/products#top"), "/products");
        assert_eq!(route_path("/"), "/");
        assert!(is_login_path("/auth/login?next=/admin"));
        assert!(!is_login_path("/auth/login/extra"));
        assert!(is_profile_path("/auth/me"));
        assert!(is_admin_path("/admin/categories"));
        assert!(!is_admin_path("/administrators"));
    }

    #[test]
    fn test_rules_are_reviewable() {
        let table = RouteTable::storefront();
        let login = &table.rules()[0];
        assert_eq!(login.template(), LOGIN_PATH);
        assert!(login.method().is_none());
        assert!(login.is_exact());
        assert_eq!(login.access(), Access::Public);
        assert!(table.rules().iter().all(|r| r.access() == Access::Public));
    }
}

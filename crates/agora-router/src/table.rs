//! The route table.

use http::Method;

use crate::error::RouteError;
use crate::params::PathParams;
use crate::pattern::Pattern;

/// Host value matching every host.
pub const ANY_HOST: &str = "*";

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route<H> {
    method: Method,
    host: String,
    source: String,
    pattern: Pattern,
    handler: H,
}

impl<H> Route<H> {
    /// Returns the route's method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the route's host (`*` for any).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the pattern as registered.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Returns the handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    fn accepts(&self, method: &Method, host: &str) -> bool {
        self.method == method && (self.host == ANY_HOST || self.host.eq_ignore_ascii_case(host))
    }
}

/// The result of a successful lookup.
#[derive(Debug)]
pub struct Resolved<'a, H> {
    /// The handler bound to the matched route.
    pub handler: &'a H,
    /// Captures extracted from the path.
    pub params: PathParams,
    /// The pattern that matched, as registered.
    pub pattern: &'a str,
}

/// A table of `(method, host, pattern) → handler` routes.
///
/// Routes are tried in registration order and the first match wins. The
/// table is built once at startup and only read afterwards.
///
/// # Example
///
/// ```rust
/// use agora_router::RouteTable;
/// use http::Method;
///
/// let mut table = RouteTable::new();
/// table.register(Method::GET, "*", "/met/*about", "metabase").unwrap();
/// table.register(Method::POST, "agora.local", "/login", "login").unwrap();
///
/// let resolved = table.resolve(&Method::GET, "example.org", "/met/people/knows").unwrap();
/// assert_eq!(*resolved.handler, "metabase");
/// assert_eq!(resolved.params.get("about"), Some("people/knows"));
///
/// assert!(table.resolve(&Method::POST, "example.org", "/login").is_none());
/// assert!(table.resolve(&Method::POST, "agora.local", "/login").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> RouteTable<H> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a route. `host` is matched case-insensitively; `*` matches
    /// any host.
    pub fn register(
        &mut self,
        method: Method,
        host: &str,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        let compiled = Pattern::parse(pattern)?;
        self.routes.push(Route {
            method,
            host: host.to_string(),
            source: pattern.to_string(),
            pattern: compiled,
            handler,
        });
        Ok(self)
    }

    /// Registers a route for any host.
    pub fn route(&mut self, method: Method, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.register(method, ANY_HOST, pattern, handler)
    }

    /// Registers the same handler for several methods.
    pub fn register_methods(
        &mut self,
        methods: &[Method],
        host: &str,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Clone,
    {
        for method in methods {
            self.register(method.clone(), host, pattern, handler.clone())?;
        }
        Ok(self)
    }

    /// Finds the first route matching `method`, `host` and `path`.
    #[must_use]
    pub fn resolve(&self, method: &Method, host: &str, path: &str) -> Option<Resolved<'_, H>> {
        self.routes
            .iter()
            .filter(|route| route.accepts(method, host))
            .find_map(|route| {
                route.pattern.matches(path).map(|params| Resolved {
                    handler: &route.handler,
                    params,
                    pattern: &route.source,
                })
            })
    }

    /// Returns the methods registered for paths matching `path` on `host`.
    #[must_use]
    pub fn allowed_methods(&self, host: &str, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for route in &self.routes {
            let host_ok = route.host == ANY_HOST || route.host.eq_ignore_ascii_case(host);
            if host_ok && !methods.contains(&route.method) && route.pattern.matches(path).is_some() {
                methods.push(route.method.clone());
            }
        }
        methods
    }

    /// Returns the registered routes in order.
    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_new() {
        let table: RouteTable<&str> = RouteTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_first_registered_wins() {
        let mut table = RouteTable::new();
        table.route(Method::GET, "/users/{id}", "by_id").unwrap();
        table.route(Method::GET, "/users/me", "me").unwrap();

        let resolved = table.resolve(&Method::GET, "", "/users/me").unwrap();
        assert_eq!(*resolved.handler, "by_id");
        assert_eq!(resolved.params.get("id"), Some("me"));
        assert_eq!(resolved.pattern, "/users/{id}");
    }

    #[test]
    fn test_method_matches_exactly() {
        let mut table = RouteTable::new();
        table.route(Method::GET, "/users", "list").unwrap();
        table.route(Method::POST, "/users", "create").unwrap();

        assert_eq!(*table.resolve(&Method::GET, "h", "/users").unwrap().handler, "list");
        assert_eq!(*table.resolve(&Method::POST, "h", "/users").unwrap().handler, "create");
        assert!(table.resolve(&Method::DELETE, "h", "/users").is_none());
    }

    #[test]
    fn test_host_matching() {
        let mut table = RouteTable::new();
        table.register(Method::GET, "a.example", "/", "a").unwrap();
        table.register(Method::GET, "*", "/", "fallback").unwrap();

        assert_eq!(*table.resolve(&Method::GET, "A.EXAMPLE", "/").unwrap().handler, "a");
        assert_eq!(*table.resolve(&Method::GET, "b.example", "/").unwrap().handler, "fallback");
    }

    #[test]
    fn test_register_methods_and_allowed() {
        let mut table = RouteTable::new();
        table
            .register_methods(&[Method::GET, Method::POST], "*", "/met/*about", "met")
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.allowed_methods("any", "/met/people"),
            vec![Method::GET, Method::POST]
        );
        assert!(table.allowed_methods("any", "/other").is_empty());
    }

    #[test]
    fn test_regex_route() {
        let mut table = RouteTable::new();
        table
            .route(Method::GET, r"^/(?P<domain>\w+)/(?P<predicate>\w+)$", "meta")
            .unwrap();
        let resolved = table.resolve(&Method::GET, "", "/people/knows").unwrap();
        assert_eq!(resolved.params.get("domain"), Some("people"));
        assert_eq!(resolved.params.get("predicate"), Some("knows"));
    }

    #[test]
    fn test_register_rejects_bad_pattern() {
        let mut table = RouteTable::new();
        assert!(table.route(Method::GET, "/a/*rest/b", "x").is_err());
        assert!(table.is_empty());
    }
}

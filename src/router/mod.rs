//! Request routing — map URL patterns and HTTP methods to handler functions.
//!
//! A [`Router`] owns a route table. Each entry pairs a [`Pattern`] with either a set of
//! per-method handlers or a nested sub-router mounted under that pattern as a prefix.
//!
//! | Pattern              | Example match              | Captured params        |
//! |----------------------|----------------------------|------------------------|
//! | `/users`             | `/users`                   | *(none)*               |
//! | `/users/:id`         | `/users/42?tab=posts`      | `id → 42`, `tab → posts` |
//! | mount at `/api`      | `/api/anything/below`      | delegated with `/anything/below` |
//!
//! Candidates are tried most specific first: at each segment a literal beats a parameter,
//! and a longer pattern beats one of its prefixes. Equally specific patterns keep their
//! registration order. The order is computed when routes are registered, not per request.
//!
//! Handler patterns must cover the whole path (a single trailing `/` is ignored). Mounts
//! match on a segment boundary and pass the rest of the url, query included, to the
//! sub-router. A request that matches nothing, or matches a pattern with no handler for its
//! method, goes to the not-found handler of the deepest router it reached.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::http::{Exchange, Method, StatusCode};

mod error;
mod matcher;
mod params;

pub use error::RouteError;
pub use matcher::{Matcher, Pattern};
pub use params::Params;

/// Type-erased handler: receives the request descriptor and the extracted parameters,
/// and answers through [`Exchange::respond`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so a router can be shared across threads.
/// You rarely build one directly — [`Router::get`] and friends accept plain closures.
pub type Handler = Arc<dyn Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static>;

/// What a route-table entry points at.
enum Target {
    // One slot per method, indexed by `Method::index`.
    Handlers([Option<Handler>; 4]),
    Mount(Router),
}

impl Target {
    fn describe(&self) -> &'static str {
        match self {
            Target::Handlers(_) => "method handlers",
            Target::Mount(_) => "a sub-router",
        }
    }
}

struct Route {
    pattern: Pattern,
    target: Target,
}

/// Construction-time options for a [`Router`].
///
/// # Examples
///
/// ```
/// use nestor::{Router, RouterConfig, StatusCode};
///
/// let router = Router::with_config(
///     RouterConfig::new().not_found(|ex, _params| ex.respond_text(StatusCode::NotFound, "nope")),
/// );
/// assert!(router.is_empty());
/// ```
#[derive(Default)]
pub struct RouterConfig {
    not_found: Option<Handler>,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default `404 Not Found` fallback.
    #[must_use]
    pub fn not_found<H>(mut self, handler: H) -> Self
    where
        H: Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(handler));
        self
    }
}

fn default_not_found(exchange: &mut dyn Exchange, _params: &Params) {
    exchange.respond_text(StatusCode::NotFound, "Not Found");
}

/// HTTP request router with nested sub-routers.
///
/// Routes are registered during setup through `&mut self`; dispatch only needs `&self`,
/// so a fully built router can be moved behind an `Arc` (see [`listen`](Self::listen))
/// and shared by every connection.
///
/// # Examples
///
/// ```
/// use nestor::{Router, StatusCode};
///
/// let mut api = Router::new();
/// api.get("/widgets/:id", |ex, params| {
///     let body = format!("widget {}", params.get("id").unwrap_or("?"));
///     ex.respond_text(StatusCode::Ok, &body);
/// })?;
///
/// let mut root = Router::new();
/// root.get("/ping", |ex, _| ex.respond_text(StatusCode::Ok, "pong"))?;
/// root.mount("/api", api)?;
/// # Ok::<(), nestor::RouteError>(())
/// ```
pub struct Router {
    routes: Vec<Route>,
    // Indices into `routes`, most specific first.
    order: Vec<usize>,
    not_found: Handler,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router that answers unmatched requests with `404 Not Found`.
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create an empty router from explicit options.
    pub fn with_config(config: RouterConfig) -> Self {
        let not_found: Handler = match config.not_found {
            Some(handler) => handler,
            None => Arc::new(default_not_found),
        };
        Self {
            routes: Vec::new(),
            order: Vec::new(),
            not_found,
        }
    }

    /// Register a handler for `GET` requests matching `pattern`.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn get<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static,
    {
        self.register(Method::Get, pattern, handler)
    }

    /// Register a handler for `POST` requests matching `pattern`.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn post<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static,
    {
        self.register(Method::Post, pattern, handler)
    }

    /// Register a handler for `PUT` requests matching `pattern`.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn put<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static,
    {
        self.register(Method::Put, pattern, handler)
    }

    /// Register a handler for `DELETE` requests matching `pattern`.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn delete<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static,
    {
        self.register(Method::Delete, pattern, handler)
    }

    /// Bind `handler` to `method` requests whose path matches `pattern` exactly.
    ///
    /// Several methods may share one pattern. The pattern is normalized first (see
    /// [`Pattern::parse`]).
    ///
    /// # Errors
    ///
    /// - [`RouteError::EmptyParameter`] / [`RouteError::DuplicateParameter`] — malformed pattern.
    /// - [`RouteError::Conflict`] — a sub-router is mounted at this pattern.
    /// - [`RouteError::ShapeMismatch`] — an equivalent pattern uses other parameter names.
    /// - [`RouteError::DuplicateMethod`] — `method` is already bound at this pattern.
    pub fn register<H>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError>
    where
        H: Fn(&mut dyn Exchange, &Params) + Send + Sync + 'static,
    {
        let pattern = Pattern::parse(pattern)?;
        let handler: Handler = Arc::new(handler);

        let Some(index) = self.find_same_shape(&pattern) else {
            debug!(%method, pattern = %pattern, "route registered");
            let mut slots: [Option<Handler>; 4] = Default::default();
            slots[method.index()] = Some(handler);
            self.insert(Route {
                pattern,
                target: Target::Handlers(slots),
            });
            return Ok(());
        };

        let route = &mut self.routes[index];
        if route.pattern != pattern {
            return Err(RouteError::ShapeMismatch {
                pattern: pattern.to_string(),
                existing: route.pattern.to_string(),
            });
        }
        let slots = match &mut route.target {
            Target::Handlers(slots) => slots,
            other => {
                return Err(RouteError::Conflict {
                    pattern: pattern.to_string(),
                    existing: other.describe(),
                });
            }
        };
        let slot = &mut slots[method.index()];
        if slot.is_some() {
            return Err(RouteError::DuplicateMethod {
                pattern: pattern.to_string(),
                method,
            });
        }
        *slot = Some(handler);

        debug!(%method, pattern = %pattern, "route registered");
        Ok(())
    }

    /// Mount `router` under `pattern`; the parent takes ownership of it.
    ///
    /// Requests whose path starts with `pattern` (on a segment boundary) are handed to
    /// `router` with the matched prefix removed. The sub-router sees `/` when the prefix
    /// is requested on its own. Parameters captured by `pattern` are passed down and
    /// merged under the sub-router's own parameters.
    ///
    /// # Errors
    ///
    /// - [`RouteError::EmptyParameter`] / [`RouteError::DuplicateParameter`] — malformed pattern.
    /// - [`RouteError::Conflict`] — anything is already registered at an equivalent pattern.
    pub fn mount(&mut self, pattern: &str, router: Router) -> Result<(), RouteError> {
        let pattern = Pattern::parse(pattern)?;

        if let Some(index) = self.find_same_shape(&pattern) {
            return Err(RouteError::Conflict {
                pattern: pattern.to_string(),
                existing: self.routes[index].target.describe(),
            });
        }

        debug!(pattern = %pattern, routes = router.len(), "sub-router mounted");
        self.insert(Route {
            pattern,
            target: Target::Mount(router),
        });
        Ok(())
    }

    /// Alias of [`mount`](Self::mount), for routers built with `route(prefix, sub_router)`.
    ///
    /// # Errors
    ///
    /// See [`mount`](Self::mount).
    pub fn route(&mut self, pattern: &str, router: Router) -> Result<(), RouteError> {
        self.mount(pattern, router)
    }

    fn find_same_shape(&self, pattern: &Pattern) -> Option<usize> {
        self.routes
            .iter()
            .position(|route| route.pattern.same_shape(pattern))
    }

    // Append a route and refresh the cached specificity order. `sort_by` is stable, so
    // equally specific routes stay in registration order.
    fn insert(&mut self, route: Route) {
        self.routes.push(route);
        let mut order: Vec<usize> = (0..self.routes.len()).collect();
        order.sort_by(|&a, &b| {
            self.routes[a]
                .pattern
                .cmp_specificity(&self.routes[b].pattern)
        });
        self.order = order;
    }

    /// Return the number of patterns in this router's own table (mounts count as one).
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered patterns in the order dispatch tries them.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&i| self.routes[i].pattern.as_str())
    }

    /// Resolve `exchange` to exactly one handler and invoke it.
    ///
    /// Either the matched handler or a not-found handler runs, once. Nothing is returned;
    /// handlers answer through [`Exchange::respond`].
    ///
    /// # Examples
    ///
    /// ```
    /// use nestor::{Router, StatusCode};
    /// use nestor::http::{HttpExchange, Request};
    ///
    /// let mut router = Router::new();
    /// router.get("/ping", |ex, _| ex.respond_text(StatusCode::Ok, "pong")).unwrap();
    ///
    /// let (request, _) = Request::parse(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
    /// let mut exchange = HttpExchange::new(request);
    /// router.dispatch(&mut exchange);
    ///
    /// assert_eq!(exchange.into_response().unwrap().status(), StatusCode::Ok);
    /// ```
    pub fn dispatch(&self, exchange: &mut dyn Exchange) {
        let method = exchange.method();
        let url = exchange.url().to_owned();
        debug!(%method, %url, "dispatching request");
        self.dispatch_to(method, &url, Params::new(), exchange);
    }

    fn dispatch_to(
        &self,
        method: Method,
        url: &str,
        mut params: Params,
        exchange: &mut dyn Exchange,
    ) {
        let Some((route, matcher)) = self.select(url) else {
            debug!(%method, %url, "no route matched");
            return (self.not_found)(exchange, &Params::new());
        };
        trace!(pattern = %route.pattern, %url, "route matched");

        match &route.target {
            Target::Mount(child) => {
                let rest = matcher.remainder().unwrap_or_default();
                let rest = if rest.starts_with('/') {
                    Cow::Borrowed(rest)
                } else {
                    Cow::Owned(format!("/{rest}"))
                };
                params.extend(matcher.params().unwrap_or_default());
                child.dispatch_to(method, &rest, params, exchange);
            }
            Target::Handlers(slots) => match &slots[method.index()] {
                Some(handler) => {
                    params.extend(matcher.params().unwrap_or_default());
                    handler(exchange, &params);
                }
                None => {
                    debug!(%method, pattern = %route.pattern, "no handler for method");
                    (self.not_found)(exchange, &Params::new());
                }
            },
        }
    }

    // First route, in specificity order, that accepts `url`: handlers need an exact
    // match, mounts a prefix match.
    fn select<'a>(&'a self, url: &'a str) -> Option<(&'a Route, Matcher<'a>)> {
        self.order.iter().find_map(|&i| {
            let route = &self.routes[i];
            let matcher = Matcher::new(url, &route.pattern);
            let accepted = match route.target {
                Target::Mount(_) => matcher.is_match(),
                Target::Handlers(_) => matcher.is_exact(),
            };
            accepted.then_some((route, matcher))
        })
    }

    /// Freeze the router and return a per-request hook for a transport layer.
    ///
    /// The closure shares the router through an [`Arc`], so it is cheap to clone into
    /// connection tasks. See [`Server::run`](crate::server::Server::run).
    pub fn listen(self) -> impl Fn(&mut dyn Exchange) + Clone + Send + Sync + 'static {
        let router = Arc::new(self);
        move |exchange: &mut dyn Exchange| router.dispatch(exchange)
    }
}

//! Method + path-pattern routing.
//!
//! Patterns are made of static segments and `{name}` parameters, e.g.
//! `/webpushcallback/{device_id}/{acct}`. Parameters are captured raw and
//! percent-decoded on access.

use http::Method;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RoutingError {
    #[error("path parameter '{0}' is not valid UTF-8 after percent-decoding")]
    InvalidEncoding(String),
}

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Param(String),
}

#[derive(Debug)]
struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Parses a path pattern string into a Path struct
    pub fn parse(path_str: &str) -> Self {
        let normalized_path = path_str.trim().trim_matches('/');

        let segments = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path
                .split('/')
                .map(|s| {
                    if let Some(stripped) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        PathSegment::Param(stripped.to_string())
                    } else {
                        PathSegment::Static(s.to_string())
                    }
                })
                .collect()
        };

        Path { segments }
    }

    /// Matches a request path against this pattern, segment for segment.
    fn matches<'a>(&self, request_path: &'a str) -> Option<HashMap<&str, &'a str>> {
        let normalized_path = request_path.trim_matches('/');

        let request_segments: Vec<&'a str> = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path.split('/').collect()
        };

        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (seg, req_segment) in self.segments.iter().zip(request_segments) {
            match seg {
                PathSegment::Static(s) => {
                    if req_segment != s {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.as_str(), req_segment);
                }
            }
        }

        Some(params)
    }
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, A> {
    params: HashMap<&'a str, &'a str>,
    pub action: &'a A,
}

impl<A> RouteMatch<'_, A> {
    /// Returns the raw (still percent-encoded) value of a path parameter.
    pub fn raw_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).copied()
    }

    /// Returns the percent-decoded value of a path parameter, `Ok(None)` if the
    /// route has no such parameter.
    pub fn param(&self, name: &str) -> Result<Option<String>, RoutingError> {
        self.raw_param(name)
            .map(|raw| {
                percent_decode_str(raw)
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
                    .map_err(|_| RoutingError::InvalidEncoding(name.to_string()))
            })
            .transpose()
    }
}

#[derive(Debug)]
pub struct Route<A> {
    method: Option<Method>,
    path: Path,
    action: A,
}

impl<A> Route<A> {
    /// Creates a new Route. `method` of `None` matches any method.
    pub fn new(method: Option<Method>, path: &str, action: A) -> Self {
        Self {
            method,
            path: Path::parse(path),
            action,
        }
    }

    /// Returns Some(RouteMatch) if the request matches this route, None otherwise.
    /// Trailing slash normalization is applied to incoming requests.
    pub fn matches<'a>(&'a self, method: &Method, request_path: &'a str) -> Option<RouteMatch<'a, A>> {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return None;
        }

        let params = self.path.matches(request_path)?;
        Some(RouteMatch {
            params,
            action: &self.action,
        })
    }
}

pub struct RouteActions<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteActions<A> {
    pub fn new(routes: Vec<Route<A>>) -> Self {
        Self { routes }
    }

    /// Matches the incoming request to a route, and returns the first matched route if any.
    pub fn resolve<'a, B>(&'a self, request: &'a http::Request<B>) -> Option<RouteMatch<'a, A>> {
        let path = request.uri().path();

        self.routes
            .iter()
            .find_map(|route| route.matches(request.method(), path))
    }
}

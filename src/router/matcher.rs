//! Route patterns and the per-request matcher.
//!
//! A [`Pattern`] is compiled once, when a route is registered. A [`Matcher`] is built for
//! one `(url, pattern)` pair during dispatch, answers whether the url matches and, if so,
//! how far the match reached and which parameters it captured.
//!
//! | Pattern              | Url                    | Match   | Params                   |
//! |----------------------|------------------------|---------|--------------------------|
//! | `/users`             | `/users`               | exact   | *(none)*                 |
//! | `/users/:id`         | `/users/42?tab=posts`  | exact   | `id → 42`, `tab → posts` |
//! | `/users/:id`         | `/users/42/posts`      | prefix  | `id → 42`                |
//! | `/api`               | `/apiary`              | no      |                          |

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use percent_encoding::percent_decode_str;

use super::{Params, RouteError};

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Parameter(String),
}

/// A compiled route pattern such as `/users/:id/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse and normalize a route pattern.
    ///
    /// A leading `/` is added when missing, empty segments (including a trailing slash)
    /// are dropped, and the empty pattern becomes `/`. A segment starting with `:` is a
    /// named parameter.
    ///
    /// # Errors
    ///
    /// - [`RouteError::EmptyParameter`] — a segment is a bare `:`.
    /// - [`RouteError::DuplicateParameter`] — the same name is declared twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use nestor::router::Pattern;
    ///
    /// let pattern = Pattern::parse("users/:id/").unwrap();
    /// assert_eq!(pattern.as_str(), "/users/:id");
    /// assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["id"]);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let source = format!("/{}", parts.join("/"));

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            let segment = match part.strip_prefix(':') {
                Some("") => {
                    return Err(RouteError::EmptyParameter { pattern: source });
                }
                Some(name) => {
                    let taken = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Parameter(n) if n == name));
                    if taken {
                        return Err(RouteError::DuplicateParameter {
                            pattern: source,
                            name: name.to_owned(),
                        });
                    }
                    Segment::Parameter(name.to_owned())
                }
                None => Segment::Static(part.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self { source, segments })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names in the order they appear.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Parameter(name) => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    /// `true` if both patterns match exactly the same urls, whatever their parameter names.
    pub(crate) fn same_shape(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Static(a), Segment::Static(b)) => a == b,
                    (Segment::Parameter(_), Segment::Parameter(_)) => true,
                    _ => false,
                })
    }

    /// Order two patterns by specificity, most specific first.
    ///
    /// At the first position where the kinds differ, a literal beats a parameter. When one
    /// pattern's kinds are a prefix of the other's, the longer pattern comes first.
    pub(crate) fn cmp_specificity(&self, other: &Pattern) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a, b) {
                (Segment::Static(_), Segment::Parameter(_)) => return Ordering::Less,
                (Segment::Parameter(_), Segment::Static(_)) => return Ordering::Greater,
                _ => {}
            }
        }
        other.segments.len().cmp(&self.segments.len())
    }

    // Walk the segments over `path`, returning the byte offset reached and the capture
    // ranges. Every segment must be introduced by a `/` in the path.
    fn match_prefix(&self, path: &str) -> Option<(usize, Vec<Range<usize>>)> {
        let mut pos = 0;
        let mut captures = Vec::new();

        for segment in &self.segments {
            if path.as_bytes().get(pos) != Some(&b'/') {
                return None;
            }
            let start = pos + 1;
            let end = path[start..].find('/').map_or(path.len(), |i| start + i);
            let text = &path[start..end];

            match segment {
                Segment::Static(literal) if literal == text => {}
                Segment::Static(_) => return None,
                Segment::Parameter(_) if text.is_empty() => return None,
                Segment::Parameter(_) => captures.push(start..end),
            }
            pos = end;
        }

        Some((pos, captures))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// Outcome of a successful prefix match.
#[derive(Debug)]
struct Hit {
    consumed: usize,
    captures: Vec<Range<usize>>,
}

/// One match attempt of a url against a [`Pattern`].
///
/// Matching is prefix based and stops on a segment boundary: `/users/:id` matches
/// `/users/5/extra` but `/api` does not match `/apiary`. Only the path part of the url
/// (before `?`) takes part in matching.
///
/// # Examples
///
/// ```
/// use nestor::router::{Matcher, Pattern};
///
/// let pattern = Pattern::parse("/items/:id").unwrap();
/// let matcher = Matcher::new("/items/42?sort=asc", &pattern);
///
/// assert!(matcher.is_exact());
/// let params = matcher.params().unwrap();
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.get("sort"), Some("asc"));
/// ```
#[derive(Debug)]
pub struct Matcher<'a> {
    url: &'a str,
    pattern: &'a Pattern,
    hit: Option<Hit>,
}

impl<'a> Matcher<'a> {
    pub fn new(url: &'a str, pattern: &'a Pattern) -> Self {
        let hit = pattern
            .match_prefix(path_of(url))
            .map(|(consumed, captures)| Hit { consumed, captures });
        Self { url, pattern, hit }
    }

    /// `true` if the url's path starts with the structure of the pattern.
    pub fn is_match(&self) -> bool {
        self.hit.is_some()
    }

    /// `true` if the pattern covers the whole path, ignoring one trailing `/`.
    pub fn is_exact(&self) -> bool {
        self.hit.as_ref().is_some_and(|hit| {
            let rest = &path_of(self.url)[hit.consumed..];
            rest.is_empty() || rest == "/"
        })
    }

    /// Byte offset into the url where the matched prefix ends.
    pub fn consumed(&self) -> Option<usize> {
        self.hit.as_ref().map(|hit| hit.consumed)
    }

    /// The part of the url after the matched prefix, query string included.
    pub fn remainder(&self) -> Option<&'a str> {
        self.consumed().map(|offset| &self.url[offset..])
    }

    /// Build the parameter map for a match: decoded path captures, then query pairs.
    ///
    /// Returns `None` when the url did not match.
    pub fn params(&self) -> Option<Params> {
        let hit = self.hit.as_ref()?;

        let mut params: Params = self
            .pattern
            .param_names()
            .zip(&hit.captures)
            .map(|(name, range)| (name, decode_component(&self.url[range.clone()])))
            .collect();

        if let Some((_, query)) = self.url.split_once('?') {
            params.extend(query_pairs(query));
        }

        Some(params)
    }
}

fn path_of(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Split a query string (`key=value&key2=value2`) into decoded pairs.
///
/// `+` decodes to a space, empty pairs are skipped and a key without `=` maps to an
/// empty value.
fn query_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query.split('&').filter(|pair| !pair.is_empty()).map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_query(key), decode_query(value))
    })
}

fn decode_query(raw: &str) -> String {
    decode_component(&raw.replace('+', " "))
}

//! Route patterns.
//!
//! A pattern is either a sequence of segments (`/met/{domain}/*about`) or,
//! when it starts with `^`, a regular expression matched against the whole
//! path whose named groups become captures.

use regex::Regex;

use crate::error::RouteError;
use crate::params::PathParams;

/// One segment of a segment pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches exactly this text.
    Literal(String),
    /// `{name}`: captures one segment.
    Param(String),
    /// `*name`: captures the remaining path, possibly empty. Only valid last.
    Rest(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Slash-separated segments.
    Segments(Vec<Segment>),
    /// Regular expression over the full path.
    Regex(Regex),
}

impl Pattern {
    /// Parses a pattern.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agora_router::Pattern;
    ///
    /// let pattern = Pattern::parse("/met/{domain}/*about").unwrap();
    /// let params = pattern.matches("/met/people/knows/alice").unwrap();
    /// assert_eq!(params.get("domain"), Some("people"));
    /// assert_eq!(params.get("about"), Some("knows/alice"));
    ///
    /// let pattern = Pattern::parse(r"^/user/(?P<id>\d+)$").unwrap();
    /// assert_eq!(pattern.matches("/user/42").unwrap().get("id"), Some("42"));
    /// assert!(pattern.matches("/user/bob").is_none());
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        if pattern.starts_with('^') {
            let regex = Regex::new(pattern).map_err(|e| RouteError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Self::Regex(regex));
        }

        let raw: Vec<&str> = split(pattern).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, part) in raw.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix('*') {
                if i + 1 != raw.len() {
                    return Err(RouteError::invalid(pattern, "rest capture must be last"));
                }
                Segment::Rest(capture_name(pattern, name)?)
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Segment::Param(capture_name(pattern, name)?)
            } else if part.contains(['{', '}']) {
                return Err(RouteError::invalid(pattern, "unbalanced braces"));
            } else {
                Segment::Literal((*part).to_string())
            };
            segments.push(segment);
        }
        Ok(Self::Segments(segments))
    }

    /// Matches `path`, returning the captures on success.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        match self {
            Self::Regex(regex) => {
                let caps = regex.captures(path)?;
                let mut params = PathParams::new();
                for name in regex.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        params.push(name, m.as_str());
                    }
                }
                Some(params)
            }
            Self::Segments(segments) => match_segments(segments, path),
        }
    }
}

fn match_segments(segments: &[Segment], path: &str) -> Option<PathParams> {
    let parts: Vec<&str> = split(path).collect();
    let mut params = PathParams::new();

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Rest(name) => {
                let rest = parts.get(i..).map(|p| p.join("/")).unwrap_or_default();
                params.push(name.as_str(), rest);
                return Some(params);
            }
            Segment::Literal(text) => {
                if *parts.get(i)? != text.as_str() {
                    return None;
                }
            }
            Segment::Param(name) => params.push(name.as_str(), *parts.get(i)?),
        }
    }

    (parts.len() == segments.len()).then_some(params)
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn capture_name(pattern: &str, name: &str) -> Result<String, RouteError> {
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(RouteError::invalid(pattern, "capture names must be identifiers"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = Pattern::parse("/login").unwrap();
        assert!(pattern.matches("/login").unwrap().is_empty());
        assert!(pattern.matches("/login/").is_some());
        assert!(pattern.matches("/logout").is_none());
        assert!(pattern.matches("/login/extra").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = Pattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/x").is_none());
    }

    #[test]
    fn test_param_pattern() {
        let pattern = Pattern::parse("/users/{id}/posts/{post_id}").unwrap();
        let params = pattern.matches("/users/7/posts/99").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
        assert!(pattern.matches("/users/7/posts").is_none());
    }

    #[test]
    fn test_rest_may_be_empty() {
        let pattern = Pattern::parse("/met/*about").unwrap();
        assert_eq!(pattern.matches("/met").unwrap().get("about"), Some(""));
        assert_eq!(
            pattern.matches("/met/people/knows/alice/value").unwrap().get("about"),
            Some("people/knows/alice/value")
        );
        assert!(pattern.matches("/other/people").is_none());
    }

    #[test]
    fn test_regex_pattern_is_unanchored_unless_written() {
        let pattern = Pattern::parse("^/static/").unwrap();
        assert!(pattern.matches("/static/app.js").is_some());
        assert!(pattern.matches("/api/static/").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            Pattern::parse("/files/*path/more"),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(Pattern::parse("/users/{id").is_err());
        assert!(Pattern::parse("/users/{}").is_err());
        assert!(matches!(
            Pattern::parse("^/users/(unclosed"),
            Err(RouteError::InvalidRegex { .. })
        ));
    }
}

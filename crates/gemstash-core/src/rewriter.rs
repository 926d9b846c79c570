//! Request path rewriting
//!
//! An [`EnvRewriter`] recognizes a regular expression inside both
//! representations of an inbound request path, strips the matched text and
//! exposes the named captures. The router uses it to peel off scoping
//! prefixes such as `/upstream/<escaped-url>` before normal dispatch.

use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::info;
use url::form_urlencoded;

use crate::error::RewriteError;

/// Named captures, URL-decoded
pub type Captures = BTreeMap<String, String>;

/// The two views of a request path a rewriter operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnv {
    /// Raw request target as received, including any query string
    pub request_uri: String,
    /// Path portion only, as the router dispatches on it
    pub path_info: String,
}

impl RequestEnv {
    pub fn new(request_uri: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self {
            request_uri: request_uri.into(),
            path_info: path_info.into(),
        }
    }

    /// Build both views from a raw request target (`/path?query`)
    pub fn from_request_target(target: &str) -> Self {
        let path = target.split_once('?').map_or(target, |(path, _)| path);
        Self::new(target, path)
    }
}

/// A compiled path pattern, shared read-only across requests
#[derive(Debug, Clone)]
pub struct EnvRewriter {
    regex: Regex,
}

impl EnvRewriter {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }

    /// Compile `pattern` into a rewriter
    pub fn parse(pattern: &str) -> Result<Self, RewriteError> {
        let regex = Regex::new(pattern)
            .map_err(|e| RewriteError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self::new(regex))
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Whether the pattern defines a capture group called `name`
    pub fn has_capture(&self, name: &str) -> bool {
        self.regex.capture_names().flatten().any(|n| n == name)
    }

    /// Bind this pattern to a request; no matching happens yet
    pub fn for_env<'a>(&'a self, env: &'a mut RequestEnv) -> RewriteContext<'a> {
        RewriteContext {
            regex: &self.regex,
            env,
            request_uri_match: None,
            path_info_match: None,
            captures: None,
            rewritten: false,
        }
    }
}

/// Match of the pattern against `path_info`
#[derive(Debug, Clone)]
struct PathMatch {
    range: Range<usize>,
    /// Raw text of every named group; empty when the group did not participate
    groups: Vec<(String, String)>,
}

/// One rewrite attempt against one request
///
/// Match results are computed lazily and kept for the lifetime of the
/// context.
pub struct RewriteContext<'a> {
    regex: &'a Regex,
    env: &'a mut RequestEnv,
    request_uri_match: Option<Option<Range<usize>>>,
    path_info_match: Option<Option<PathMatch>>,
    captures: Option<Captures>,
    rewritten: bool,
}

impl RewriteContext<'_> {
    /// True when both `request_uri` and `path_info` match the pattern
    pub fn matches(&mut self) -> bool {
        self.match_request_uri().is_some() && self.match_path_info().is_some()
    }

    /// Remove the matched text from both views of the request.
    ///
    /// Fails when the pattern does not match both views, or when the context
    /// has already rewritten its request.
    pub fn rewrite(&mut self) -> Result<(), RewriteError> {
        if self.rewritten {
            return Err(RewriteError::AlreadyRewritten);
        }

        let (uri_range, path_range) = self.check_match()?;
        let before = self.env.request_uri.clone();

        self.env.request_uri.replace_range(uri_range, "");
        self.env.path_info.replace_range(path_range, "");
        self.rewritten = true;

        info!("Rewriting '{}' to '{}'", before, self.env.request_uri);
        Ok(())
    }

    /// Named captures from the `path_info` match, URL-decoded
    pub fn captures(&mut self) -> Result<&Captures, RewriteError> {
        let params = match self.captures.take() {
            Some(params) => params,
            None => {
                self.check_match()?;
                self.match_path_info()
                    .map(|m| {
                        m.groups
                            .iter()
                            .map(|(name, value)| (name.clone(), unescape(value)))
                            .collect()
                    })
                    .unwrap_or_default()
            }
        };

        let params: &Captures = self.captures.insert(params);
        Ok(params)
    }

    fn match_request_uri(&mut self) -> Option<Range<usize>> {
        if self.request_uri_match.is_none() {
            let found = self.regex.find(&self.env.request_uri).map(|m| m.range());
            self.request_uri_match = Some(found);
        }
        self.request_uri_match.clone().flatten()
    }

    fn match_path_info(&mut self) -> Option<&PathMatch> {
        if self.path_info_match.is_none() {
            let regex = self.regex;
            let found = regex.captures(&self.env.path_info).and_then(|caps| {
                let whole = caps.get(0)?;
                let groups = regex
                    .capture_names()
                    .flatten()
                    .map(|name| {
                        let value = caps.name(name).map_or("", |m| m.as_str());
                        (name.to_string(), value.to_string())
                    })
                    .collect();
                Some(PathMatch {
                    range: whole.range(),
                    groups,
                })
            });
            self.path_info_match = Some(found);
        }
        self.path_info_match.as_ref().and_then(Option::as_ref)
    }

    fn check_match(&mut self) -> Result<(Range<usize>, Range<usize>), RewriteError> {
        let uri_range = self.match_request_uri();
        let path_range = self.match_path_info().map(|m| m.range.clone());

        match (uri_range, path_range) {
            (Some(uri), Some(path)) => Ok((uri, path)),
            _ => Err(RewriteError::NoMatch),
        }
    }
}

/// Decode a captured path segment the way form values are decoded
fn unescape(value: &str) -> String {
    // Literal separators must survive as part of the single decoded key
    let value = value.replace('&', "%26").replace('=', "%3D");
    form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter(pattern: &str) -> EnvRewriter {
        EnvRewriter::parse(pattern).unwrap()
    }

    #[test]
    fn test_private_key_prefix() {
        let rewriter = rewriter("/priv/(?<key>[^/]+)");
        let mut env = RequestEnv::new("/priv/abc123/gems", "/priv/abc123/gems");

        let mut context = rewriter.for_env(&mut env);
        assert!(context.matches());

        let captures = context.captures().unwrap().clone();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures["key"], "abc123");

        context.rewrite().unwrap();
        assert_eq!(env.request_uri, "/gems");
        assert_eq!(env.path_info, "/gems");
    }

    #[test]
    fn test_requires_both_views_to_match() {
        let rewriter = rewriter("^/upstream/(?<upstream_url>[^/]+)");

        let mut env = RequestEnv::new("/upstream/abc/gems", "/gems");
        assert!(!rewriter.for_env(&mut env).matches());

        let mut env = RequestEnv::new("/gems", "/upstream/abc/gems");
        assert!(!rewriter.for_env(&mut env).matches());

        let mut env = RequestEnv::new("/upstream/abc/gems?x=1", "/upstream/abc/gems");
        assert!(rewriter.for_env(&mut env).matches());
    }

    #[test]
    fn test_rewrite_without_match_fails() {
        let rewriter = rewriter("^/private");
        let mut env = RequestEnv::new("/gems/rack", "/gems/rack");

        let mut context = rewriter.for_env(&mut env);
        assert!(matches!(context.rewrite(), Err(RewriteError::NoMatch)));
        assert!(matches!(context.captures(), Err(RewriteError::NoMatch)));
        drop(context);

        assert_eq!(env, RequestEnv::new("/gems/rack", "/gems/rack"));
    }

    #[test]
    fn test_rewrite_keeps_surrounding_text() {
        let rewriter = rewriter("/v[0-9]+");
        let mut env = RequestEnv::new("/api/v1/deps?gems=rack", "/api/v1/deps");

        let mut context = rewriter.for_env(&mut env);
        context.rewrite().unwrap();
        assert!(matches!(context.rewrite(), Err(RewriteError::AlreadyRewritten)));
        drop(context);

        assert_eq!(env.request_uri, "/api/deps?gems=rack");
        assert_eq!(env.path_info, "/api/deps");
    }

    #[test]
    fn test_ranges_computed_per_view() {
        let rewriter = rewriter("/x");
        let mut env = RequestEnv::new("/prefix/x/rest", "/x/rest");

        let mut context = rewriter.for_env(&mut env);
        context.rewrite().unwrap();
        drop(context);

        assert_eq!(env.request_uri, "/prefix/rest");
        assert_eq!(env.path_info, "/rest");
    }

    #[test]
    fn test_captures_are_unescaped() {
        let rewriter = rewriter("^/upstream/(?<upstream_url>[^/]+)");
        let target = "/upstream/https%3A%2F%2Fgems.example%3A8080/gems/rack-1.0.0.gem";
        let mut env = RequestEnv::from_request_target(target);

        let mut context = rewriter.for_env(&mut env);
        let captures = context.captures().unwrap();
        assert_eq!(captures["upstream_url"], "https://gems.example:8080");

        context.rewrite().unwrap();
        drop(context);
        assert_eq!(env.request_uri, "/gems/rack-1.0.0.gem");
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let rewriter = rewriter("^/n/(?<name>[^/]+)");
        let mut env = RequestEnv::new("/n/a+b%2Bc", "/n/a+b%2Bc");

        let mut context = rewriter.for_env(&mut env);
        assert_eq!(context.captures().unwrap()["name"], "a b+c");
    }

    #[test]
    fn test_captures_memoized() {
        let rewriter = rewriter("^/(?<first>[a-z]+)(?:-(?<second>[0-9]+))?");
        let mut env = RequestEnv::new("/abc/rest", "/abc/rest");

        let mut context = rewriter.for_env(&mut env);
        let first = context.captures().unwrap().clone();
        context.rewrite().unwrap();
        let second = context.captures().unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(first["first"], "abc");
        assert_eq!(first["second"], "");
    }

    #[test]
    fn test_no_named_groups() {
        let rewriter = rewriter("^/private");
        let mut env = RequestEnv::new("/private/gems/x", "/private/gems/x");

        let mut context = rewriter.for_env(&mut env);
        assert!(context.captures().unwrap().is_empty());
        assert!(!rewriter.has_capture("key"));
    }

    #[test]
    fn test_separators_kept_in_captures() {
        let rewriter = rewriter("^/n/(?<name>[^/]+)");
        let mut env = RequestEnv::new("/n/a=1&b%3D2", "/n/a=1&b%3D2");

        let mut context = rewriter.for_env(&mut env);
        assert_eq!(context.captures().unwrap()["name"], "a=1&b=2");
    }

    #[test]
    fn test_request_target_split() {
        let env = RequestEnv::from_request_target("/specs.4.8.gz?since=1");
        assert_eq!(env.request_uri, "/specs.4.8.gz?since=1");
        assert_eq!(env.path_info, "/specs.4.8.gz");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            EnvRewriter::parse("(unclosed"),
            Err(RewriteError::InvalidPattern(_))
        ));
    }
}

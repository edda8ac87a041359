//! URL canonicalization for matching provider-reported URLs against stored
//! landing-page URLs. Providers disagree with user input on scheme, `www`,
//! trailing slash and locale prefix, so exact string comparison loses data.

use std::collections::HashSet;
use url::Url;

/// Locale path prefixes considered when widening a URL for matching.
/// Only the first path segment is ever treated as a locale.
pub const LOCALES: [&str; 5] = ["de", "en", "fr", "es", "it"];

/// Canonicalize a URL string into a comparable key: lowercased host without
/// `www.` (an explicit non-default port is kept), lowercased path without a
/// trailing slash (root keeps its `/`), query parameters lowercased and
/// sorted by key, no scheme, no fragment.
///
/// Total over all string input: malformed URLs degrade to a pure string
/// transform instead of erroring. Idempotent.
pub fn normalize(url: &str) -> String {
    let trimmed = url.trim();

    if let Ok(parsed) = Url::parse(trimmed) {
        if parsed.has_host() {
            return canonical_key(&parsed, true);
        }
        // Something exotic like mailto: or data: parsed without a host.
        return string_fallback(trimmed);
    }

    // Root-relative input resolves against a neutral dummy base; the key
    // then carries no host so it stays stable under re-normalization.
    if trimmed.starts_with('/') {
        if let Ok(base) = Url::parse("https://base.invalid") {
            if let Ok(resolved) = base.join(trimmed) {
                return canonical_key(&resolved, false);
            }
        }
    }

    string_fallback(trimmed)
}

fn canonical_key(url: &Url, include_host: bool) -> String {
    let mut key = String::new();

    if include_host {
        let host = url.host_str().unwrap_or("").to_lowercase();
        key.push_str(host.strip_prefix("www.").unwrap_or(&host));
        // The parser drops scheme-default ports, so only explicit
        // non-default ports show up in the key.
        if let Some(port) = url.port() {
            key.push(':');
            key.push_str(&port.to_string());
        }
    }

    let path = url.path().to_lowercase();
    if path == "/" {
        key.push('/');
    } else {
        key.push_str(path.trim_end_matches('/'));
    }

    // Pairs are lowercased before sorting so case-differing inputs sort
    // identically, and the serialized query is lowercased again to fold
    // percent-escape hex. A key with uppercase left in it would change
    // under a second normalize.
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
        .collect();
    if !pairs.is_empty() {
        pairs.sort();
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        key.push('?');
        key.push_str(&query.to_lowercase());
    }

    key
}

/// Best-effort transform for input `Url` refuses to parse.
fn string_fallback(input: &str) -> String {
    let mut s = input.to_lowercase();
    if let Some(rest) = s.strip_prefix("https://") {
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix("http://") {
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    if let Some(hash) = s.find('#') {
        s.truncate(hash);
    }
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// Expand one URL into the bounded set of absolute URLs a provider might
/// plausibly report for it: protocol x `www` x trailing-slash x locale-prefix
/// variants. Query string and fragment are preserved verbatim.
///
/// The set is bounded by 2 protocols x 2 hosts x (2 + 2 * locale count)
/// paths; locale handling looks at the first path segment only.
pub fn generate_variants(url: &str) -> HashSet<String> {
    let mut variants = HashSet::new();
    variants.insert(url.to_string());

    let Ok(parsed) = Url::parse(url.trim()) else {
        return variants;
    };
    let Some(host) = parsed.host_str() else {
        return variants;
    };

    let hosts = host_variants(host, parsed.port());
    let paths = path_variants(parsed.path());

    let suffix = {
        let mut s = String::new();
        if let Some(query) = parsed.query() {
            s.push('?');
            s.push_str(query);
        }
        if let Some(fragment) = parsed.fragment() {
            s.push('#');
            s.push_str(fragment);
        }
        s
    };

    for protocol in ["http", "https"] {
        for host in &hosts {
            for path in &paths {
                variants.insert(format!("{}://{}{}{}", protocol, host, path, suffix));
            }
        }
    }

    variants
}

fn host_variants(host: &str, port: Option<u16>) -> Vec<String> {
    let toggled = match host.strip_prefix("www.") {
        Some(bare) => bare.to_string(),
        None => format!("www.{}", host),
    };
    // An explicit port rides along on every host form so widened URLs
    // never cross into a differently-ported site.
    let suffix = match port {
        Some(port) => format!(":{}", port),
        None => String::new(),
    };
    vec![format!("{}{}", host, suffix), format!("{}{}", toggled, suffix)]
}

fn path_variants(path: &str) -> Vec<String> {
    let mut paths = Vec::new();
    push_with_slash_toggle(&mut paths, path);

    match leading_locale(path) {
        Some(locale) => {
            let stripped = &path[1 + locale.len()..];
            let stripped = if stripped.is_empty() { "/" } else { stripped };
            push_with_slash_toggle(&mut paths, stripped);
        }
        None => {
            for locale in LOCALES {
                let prefixed = format!("/{}{}", locale, path);
                push_with_slash_toggle(&mut paths, &prefixed);
            }
        }
    }

    paths
}

/// Returns the first path segment when it looks like a 2-letter locale.
fn leading_locale(path: &str) -> Option<&str> {
    let first = path.strip_prefix('/')?.split('/').next()?;
    if first.len() == 2 && first.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(first)
    } else {
        None
    }
}

fn push_with_slash_toggle(paths: &mut Vec<String>, path: &str) {
    paths.push(path.to_string());
    if path.len() > 1 {
        if let Some(stripped) = path.strip_suffix('/') {
            paths.push(stripped.to_string());
        } else {
            paths.push(format!("{}/", path));
        }
    }
}

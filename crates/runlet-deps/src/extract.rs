//! Dependency extraction from guest source text.
//!
//! A regex scan over the raw source, deliberately blind to comments and
//! string context. A commented-out `require` therefore still registers as
//! a dependency; callers live with the occasional spurious install.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Package name mapped to a version constraint.
pub type DependencySet = BTreeMap<String, String>;

/// Constraint attached to every extracted dependency.
pub const LATEST: &str = "latest";

/// Node's built-in modules; never treated as installable packages.
const BUILTINS: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "zlib",
    "process",
];

fn require_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap())
}

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"import\s+(?:[\w$\s{},*]+?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap()
    })
}

/// Scan `code` for third-party package references and return them with the
/// `latest` constraint. Built-ins and relative specifiers are discarded.
pub fn extract_dependencies(code: &str) -> DependencySet {
    let mut deps = DependencySet::new();

    let specifiers = require_regex()
        .captures_iter(code)
        .chain(import_regex().captures_iter(code))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str());

    for specifier in specifiers {
        if let Some(name) = canonical_package_name(specifier) {
            deps.entry(name).or_insert_with(|| LATEST.to_string());
        }
    }

    deps
}

/// Reduce an import specifier to its installable package name.
///
/// `@scope/pkg@1.0.0` and `@scope/pkg/sub` become `@scope/pkg`;
/// `lodash@4/fp` becomes `lodash`. Relative and absolute paths yield
/// nothing.
fn canonical_package_name(specifier: &str) -> Option<String> {
    if specifier.is_empty() || specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }

    let name = if let Some(rest) = specifier.strip_prefix('@') {
        let (scope, tail) = rest.split_once('/')?;
        let pkg = tail
            .split(['@', '/'])
            .next()
            .unwrap_or(tail);
        if scope.is_empty() || pkg.is_empty() {
            return None;
        }
        format!("@{scope}/{pkg}")
    } else {
        let bare = specifier
            .split(['@', '/'])
            .next()
            .unwrap_or(specifier);
        if bare.is_empty() {
            return None;
        }
        bare.to_string()
    };

    if BUILTINS.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

//! Host environment variables forwarded into the benchmark container.
//!
//! A variable is forwarded as `-e NAME=value` only when it is set to a
//! non-empty value in the calling environment. Absent or empty variables are
//! left out entirely, never passed as `NAME=`.

/// Why a variable is forwarded. Credential and extra values are redacted in printed
/// commands; proxy values are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughKind {
    Credential,
    Proxy,
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passthrough {
    pub name: &'static str,
    pub kind: PassthroughKind,
}

const fn credential(name: &'static str) -> Passthrough {
    Passthrough { name, kind: PassthroughKind::Credential }
}

const fn proxy(name: &'static str) -> Passthrough {
    Passthrough { name, kind: PassthroughKind::Proxy }
}

/// API credentials and proxy settings understood by the model clients in the image.
pub const PASSTHROUGH_VARS: &[Passthrough] = &[
    credential("OPENAI_API_KEY"),
    credential("GEMINI_API_KEY"),
    credential("AZURE_API_ID"),
    credential("AZURE_API_SECRET"),
    credential("AZURE_API_ENDPOINT"),
    proxy("http_proxy"),
    proxy("https_proxy"),
    proxy("no_proxy"),
    proxy("HTTP_PROXY"),
    proxy("HTTPS_PROXY"),
    proxy("NO_PROXY"),
];

/// A variable resolved against the environment, ready to become a `-e` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedVar {
    pub name: String,
    pub value: String,
    pub kind: PassthroughKind,
}

impl ForwardedVar {
    pub fn assignment(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Kind of a forwarded variable by name, falling back to `Extra` for names
/// that only come from the config file.
pub fn kind_of(name: &str) -> PassthroughKind {
    PASSTHROUGH_VARS
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.kind)
        .unwrap_or(PassthroughKind::Extra)
}

/// Resolve the built-in table plus `extra` names against `lookup`.
///
/// Order follows the table, then `extra` in the given order. Each name is
/// forwarded at most once.
pub fn resolve<F>(extra: &[String], lookup: F) -> Vec<ForwardedVar>
where
    F: Fn(&str) -> Option<String>,
{
    let names = PASSTHROUGH_VARS
        .iter()
        .map(|p| p.name)
        .chain(extra.iter().map(String::as_str));

    let mut seen: Vec<&str> = Vec::new();
    let mut forwarded = Vec::new();

    for name in names {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        match lookup(name) {
            Some(value) if !value.is_empty() => forwarded.push(ForwardedVar {
                name: name.to_string(),
                value,
                kind: kind_of(name),
            }),
            _ => {}
        }
    }

    forwarded
}

/// Validate a user-supplied variable name for `extra_env`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

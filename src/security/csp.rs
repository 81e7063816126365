//! Content-Security-Policy directive sets.
//!
//! A [`DirectiveSet`] maps a fixed vocabulary of directive names to either an
//! ordered, duplicate-free token list or a boolean flag. `script-src-elem`
//! always mirrors `script-src`: every mutation re-copies it, so the two can
//! never drift apart regardless of which feature touched `script-src`.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::FeatureFlags;
use crate::security::hosts::FEATURE_HOSTS;
use crate::security::nonce::Nonce;

pub const SELF: &str = "'self'";
pub const NONE: &str = "'none'";
pub const STRICT_DYNAMIC: &str = "'strict-dynamic'";
pub const DATA: &str = "data:";

/// CSP directive names understood by the builder.
///
/// Declaration order is the serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Directive {
    DefaultSrc,
    ScriptSrc,
    StyleSrc,
    ConnectSrc,
    ImgSrc,
    FontSrc,
    MediaSrc,
    FrameSrc,
    ObjectSrc,
    BaseUri,
    FormAction,
    FrameAncestors,
    ManifestSrc,
    WorkerSrc,
    ScriptSrcElem,
    ScriptSrcAttr,
    UpgradeInsecureRequests,
    ReportUri,
}

impl Directive {
    pub const ALL: [Directive; 18] = [
        Directive::DefaultSrc,
        Directive::ScriptSrc,
        Directive::StyleSrc,
        Directive::ConnectSrc,
        Directive::ImgSrc,
        Directive::FontSrc,
        Directive::MediaSrc,
        Directive::FrameSrc,
        Directive::ObjectSrc,
        Directive::BaseUri,
        Directive::FormAction,
        Directive::FrameAncestors,
        Directive::ManifestSrc,
        Directive::WorkerSrc,
        Directive::ScriptSrcElem,
        Directive::ScriptSrcAttr,
        Directive::UpgradeInsecureRequests,
        Directive::ReportUri,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Directive::DefaultSrc => "default-src",
            Directive::ScriptSrc => "script-src",
            Directive::StyleSrc => "style-src",
            Directive::ConnectSrc => "connect-src",
            Directive::ImgSrc => "img-src",
            Directive::FontSrc => "font-src",
            Directive::MediaSrc => "media-src",
            Directive::FrameSrc => "frame-src",
            Directive::ObjectSrc => "object-src",
            Directive::BaseUri => "base-uri",
            Directive::FormAction => "form-action",
            Directive::FrameAncestors => "frame-ancestors",
            Directive::ManifestSrc => "manifest-src",
            Directive::WorkerSrc => "worker-src",
            Directive::ScriptSrcElem => "script-src-elem",
            Directive::ScriptSrcAttr => "script-src-attr",
            Directive::UpgradeInsecureRequests => "upgrade-insecure-requests",
            Directive::ReportUri => "report-uri",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a single directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    Sources(Vec<String>),
    Flag(bool),
}

/// Ordered directive → value mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectiveSet {
    directives: BTreeMap<Directive, DirectiveValue>,
}

impl DirectiveSet {
    /// Deny-by-default policy that allows same-origin everywhere else.
    pub fn baseline() -> Self {
        let mut set = Self::default();
        set.extend(Directive::DefaultSrc, [NONE]);
        set.extend(Directive::ScriptSrc, [SELF, STRICT_DYNAMIC]);
        set.extend(Directive::StyleSrc, [SELF]);
        set.extend(Directive::ConnectSrc, [SELF]);
        set.extend(Directive::ImgSrc, [SELF, DATA]);
        set.extend(Directive::FontSrc, [SELF]);
        set.extend(Directive::MediaSrc, [SELF]);
        set.extend(Directive::FrameSrc, [SELF]);
        set.extend(Directive::ObjectSrc, [NONE]);
        set.extend(Directive::BaseUri, [SELF]);
        set.extend(Directive::FormAction, [SELF]);
        set.extend(Directive::FrameAncestors, [NONE]);
        set.extend(Directive::ManifestSrc, [SELF]);
        set.extend(Directive::WorkerSrc, [SELF]);
        set.extend(Directive::ScriptSrcAttr, [NONE]);
        set.set_flag(Directive::UpgradeInsecureRequests, true);
        set
    }

    /// Append tokens to a directive, skipping ones already present.
    ///
    /// A directive previously holding a flag is replaced by a source list.
    pub fn extend<I, S>(&mut self, directive: Directive, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .directives
            .entry(directive)
            .or_insert_with(|| DirectiveValue::Sources(Vec::new()));
        if matches!(entry, DirectiveValue::Flag(_)) {
            *entry = DirectiveValue::Sources(Vec::new());
        }
        if let DirectiveValue::Sources(list) = entry {
            for token in tokens {
                push_unique(list, token.into());
            }
        }
        self.mirror_script_src();
    }

    /// Insert a token directly after `anchor`, or at the front if `anchor` is absent.
    pub fn insert_after(&mut self, directive: Directive, anchor: &str, token: impl Into<String>) {
        let token = token.into();
        if let Some(DirectiveValue::Sources(list)) = self.directives.get_mut(&directive) {
            if !list.contains(&token) {
                let at = list
                    .iter()
                    .position(|t| t == anchor)
                    .map_or(0, |idx| idx + 1);
                list.insert(at, token);
            }
        } else {
            self.directives
                .insert(directive, DirectiveValue::Sources(vec![token]));
        }
        self.mirror_script_src();
    }

    /// Set a value-less directive such as `upgrade-insecure-requests`.
    pub fn set_flag(&mut self, directive: Directive, enabled: bool) {
        self.directives
            .insert(directive, DirectiveValue::Flag(enabled));
        self.mirror_script_src();
    }

    pub fn get(&self, directive: Directive) -> Option<&DirectiveValue> {
        self.directives.get(&directive)
    }

    /// Source tokens of a directive; empty for flags or absent directives.
    pub fn sources(&self, directive: Directive) -> &[String] {
        match self.directives.get(&directive) {
            Some(DirectiveValue::Sources(list)) => list,
            _ => &[],
        }
    }

    pub fn contains(&self, directive: Directive, token: &str) -> bool {
        self.sources(directive).iter().any(|t| t == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Directive, &DirectiveValue)> {
        self.directives.iter().map(|(d, v)| (*d, v))
    }

    /// Render as a single-line header value.
    pub fn to_header_value(&self) -> String {
        let mut parts = Vec::with_capacity(self.directives.len());
        for (directive, value) in &self.directives {
            match value {
                DirectiveValue::Sources(list) if list.is_empty() => {
                    parts.push(directive.as_str().to_string())
                }
                DirectiveValue::Sources(list) => {
                    parts.push(format!("{} {}", directive, list.join(" ")))
                }
                DirectiveValue::Flag(true) => parts.push(directive.as_str().to_string()),
                DirectiveValue::Flag(false) => {}
            }
        }
        parts.join("; ")
    }

    fn mirror_script_src(&mut self) {
        match self.directives.get(&Directive::ScriptSrc).cloned() {
            Some(value) => {
                self.directives.insert(Directive::ScriptSrcElem, value);
            }
            None => {
                self.directives.remove(&Directive::ScriptSrcElem);
            }
        }
    }
}

impl fmt::Display for DirectiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

fn push_unique(list: &mut Vec<String>, token: String) {
    if !list.contains(&token) {
        list.push(token);
    }
}

/// Build the directive set for a feature-flag configuration.
///
/// Pure: returns a fresh set each call.
pub fn build_directives(flags: &FeatureFlags) -> DirectiveSet {
    let mut set = DirectiveSet::baseline();
    for feature in FEATURE_HOSTS {
        if !(feature.enabled)(flags) {
            continue;
        }
        for (directive, hosts) in feature.hosts {
            set.extend(*directive, hosts.iter().copied());
        }
    }
    set
}

/// Build the per-request directive set carrying `nonce`.
///
/// The nonce lands right after `'self'` in `script-src` (mirrored to
/// `script-src-elem`) and `style-src`, ahead of any third-party host.
pub fn security_directives(flags: &FeatureFlags, nonce: &Nonce) -> DirectiveSet {
    let mut set = build_directives(flags);
    let token = nonce.source_expression();
    set.insert_after(Directive::ScriptSrc, SELF, token.clone());
    set.insert_after(Directive::StyleSrc, SELF, token);
    set
}

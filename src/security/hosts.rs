//! Third-party host allow-lists, keyed by feature flag.
//!
//! Static lookup table. Entries are applied in declaration order, which fixes
//! the order hosts appear in the rendered policy.

use crate::config::FeatureFlags;
use crate::security::csp::Directive;

/// Hosts a single feature contributes when enabled.
pub struct FeatureHosts {
    pub name: &'static str,
    pub enabled: fn(&FeatureFlags) -> bool,
    pub hosts: &'static [(Directive, &'static [&'static str])],
}

const GOOGLE_TAG_MANAGER: &str = "https://www.googletagmanager.com";
const GOOGLE_ANALYTICS: &str = "https://www.google-analytics.com";
const GOOGLE_ANALYTICS_REGION: &str = "https://region1.google-analytics.com";
const DOUBLECLICK: &str = "https://googleads.g.doubleclick.net";
const GOOGLE: &str = "https://www.google.com";
const TURNSTILE: &str = "https://challenges.cloudflare.com";

pub static FEATURE_HOSTS: &[FeatureHosts] = &[
    FeatureHosts {
        name: "analytics",
        enabled: |f| f.analytics,
        hosts: &[
            (Directive::ScriptSrc, &[GOOGLE_TAG_MANAGER]),
            (
                Directive::ConnectSrc,
                &[GOOGLE_TAG_MANAGER, GOOGLE_ANALYTICS, GOOGLE_ANALYTICS_REGION],
            ),
            (
                Directive::ImgSrc,
                &[GOOGLE_TAG_MANAGER, GOOGLE_ANALYTICS, GOOGLE_ANALYTICS_REGION],
            ),
        ],
    },
    FeatureHosts {
        name: "ads",
        enabled: |f| f.ads,
        hosts: &[
            (
                Directive::ScriptSrc,
                &["https://www.googleadservices.com", DOUBLECLICK],
            ),
            (Directive::ConnectSrc, &[DOUBLECLICK, GOOGLE]),
            (Directive::ImgSrc, &[DOUBLECLICK, GOOGLE]),
            (Directive::FrameSrc, &["https://td.doubleclick.net"]),
        ],
    },
    FeatureHosts {
        name: "fonts",
        enabled: |f| f.fonts,
        hosts: &[
            (Directive::StyleSrc, &["https://fonts.googleapis.com"]),
            (Directive::FontSrc, &["https://fonts.gstatic.com"]),
        ],
    },
    FeatureHosts {
        name: "turnstile",
        enabled: FeatureFlags::turnstile,
        hosts: &[
            (Directive::ScriptSrc, &[TURNSTILE]),
            (Directive::FrameSrc, &[TURNSTILE]),
            (Directive::ConnectSrc, &[TURNSTILE]),
        ],
    },
    FeatureHosts {
        name: "youtube",
        enabled: |f| f.youtube,
        hosts: &[
            (
                Directive::FrameSrc,
                &["https://www.youtube-nocookie.com", "https://www.youtube.com"],
            ),
            (Directive::ImgSrc, &["https://i.ytimg.com"]),
        ],
    },
    FeatureHosts {
        name: "vimeo",
        enabled: |f| f.vimeo,
        hosts: &[
            (Directive::FrameSrc, &["https://player.vimeo.com"]),
            (Directive::ImgSrc, &["https://i.vimeocdn.com"]),
            (Directive::MediaSrc, &["https://vod-progressive.akamaized.net"]),
        ],
    },
];

/// Names of the features enabled by `flags`, in table order.
pub fn enabled_features(flags: &FeatureFlags) -> Vec<&'static str> {
    FEATURE_HOSTS
        .iter()
        .filter(|feature| (feature.enabled)(flags))
        .map(|feature| feature.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_feature_touches_locked_directives() {
        for feature in FEATURE_HOSTS {
            for (directive, _) in feature.hosts {
                assert!(
                    !matches!(
                        directive,
                        Directive::DefaultSrc
                            | Directive::ObjectSrc
                            | Directive::FrameAncestors
                            | Directive::ScriptSrcElem
                    ),
                    "{} widens {}",
                    feature.name,
                    directive
                );
            }
        }
    }

    #[test]
    fn test_enabled_features_in_table_order() {
        let flags = FeatureFlags {
            vimeo: true,
            analytics: true,
            turnstile_site_key: Some("key".into()),
            ..Default::default()
        };
        assert_eq!(enabled_features(&flags), ["analytics", "turnstile", "vimeo"]);
        assert!(enabled_features(&FeatureFlags::default()).is_empty());
    }
}

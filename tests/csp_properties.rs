//! Property tests over the feature flag matrix.

use apostille_site::config::FeatureFlags;
use apostille_site::security::{
    build_directives, security_directives, Directive, DirectiveValue, Nonce,
};
use proptest::prelude::*;

fn flags() -> impl Strategy<Value = FeatureFlags> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            Just(Some("   ".to_string())),
            "[0-9A-Za-z]{8,20}".prop_map(Some),
        ],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(analytics, ads, fonts, turnstile_site_key, youtube, vimeo)| FeatureFlags {
                analytics,
                ads,
                fonts,
                turnstile_site_key,
                youtube,
                vimeo,
            },
        )
}

proptest! {
    #[test]
    fn script_src_elem_mirrors_script_src(flags in flags()) {
        let set = security_directives(&flags, &Nonce::generate());
        prop_assert_eq!(
            set.sources(Directive::ScriptSrcElem),
            set.sources(Directive::ScriptSrc)
        );
    }

    #[test]
    fn no_directive_repeats_a_token(flags in flags()) {
        let set = security_directives(&flags, &Nonce::generate());
        for (_, value) in set.iter() {
            if let DirectiveValue::Sources(tokens) = value {
                let mut seen = tokens.clone();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), tokens.len());
            }
        }
    }

    #[test]
    fn baseline_tokens_survive_every_flag(flags in flags()) {
        let baseline = build_directives(&FeatureFlags::default());
        let set = build_directives(&flags);
        for (directive, value) in baseline.iter() {
            if let DirectiveValue::Sources(tokens) = value {
                let got = set.sources(directive);
                prop_assert!(got.starts_with(tokens), "{} lost baseline tokens", directive);
            }
        }
        prop_assert!(set.contains(Directive::ObjectSrc, "'none'"));
        prop_assert!(set.contains(Directive::FrameAncestors, "'none'"));
        prop_assert!(set.contains(Directive::ScriptSrcAttr, "'none'"));
    }

    #[test]
    fn nonces_differ_only_in_the_nonce_token(flags in flags()) {
        let a = Nonce::generate();
        let b = Nonce::generate();
        let with_a = security_directives(&flags, &a).to_header_value();
        let with_b = security_directives(&flags, &b).to_header_value();
        prop_assert_ne!(&with_a, &with_b);
        prop_assert_eq!(with_a.replace(a.as_str(), "N"), with_b.replace(b.as_str(), "N"));
    }

    #[test]
    fn nonce_follows_self(flags in flags()) {
        let nonce = Nonce::generate();
        let set = security_directives(&flags, &nonce);
        let expected = nonce.source_expression();
        for directive in [Directive::ScriptSrc, Directive::StyleSrc] {
            let sources = set.sources(directive);
            prop_assert_eq!(sources[0].as_str(), "'self'");
            prop_assert_eq!(&sources[1], &expected);
        }
    }
}

#[test]
fn all_flags_off_is_baseline() {
    let off = FeatureFlags {
        turnstile_site_key: Some("  ".into()),
        ..FeatureFlags::default()
    };
    assert_eq!(
        build_directives(&off).to_header_value(),
        build_directives(&FeatureFlags::default()).to_header_value()
    );
}

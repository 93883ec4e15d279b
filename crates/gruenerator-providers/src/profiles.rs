//! Content profiles — per-request-type sampling defaults.
//!
//! Sit between the caller's explicit values and the global `dispatch.defaults`.

use gruenerator_core::types::SamplingDefaults;

const fn profile(temperature: f64, top_p: f64, max_tokens: u32) -> SamplingDefaults {
    SamplingDefaults {
        temperature,
        top_p,
        max_tokens,
    }
}

/// Exact request types.
const EXACT: &[(&str, SamplingDefaults)] = &[
    ("social", profile(0.9, 0.95, 2000)),
    ("antrag", profile(0.3, 0.9, 8000)),
    ("rede", profile(0.6, 0.95, 6000)),
    ("universal", profile(0.7, 1.0, 4000)),
    ("leichte_sprache", profile(0.3, 0.9, 4000)),
    ("image_text", profile(0.7, 0.9, 600)),
];

/// Request-type prefixes, checked after the exact table.
const PREFIXES: &[(&str, SamplingDefaults)] = &[
    ("sharepic", profile(0.7, 0.9, 600)),
    ("antrag_", profile(0.3, 0.9, 8000)),
];

/// Sampling defaults for a request type, if it has a profile.
pub fn profile_for(request_type: &str) -> Option<SamplingDefaults> {
    EXACT
        .iter()
        .find(|(name, _)| *name == request_type)
        .or_else(|| {
            PREFIXES
                .iter()
                .find(|(prefix, _)| request_type.starts_with(prefix))
        })
        .map(|(_, p)| *p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gruenerator_core::types::RequestOptions;

    #[test]
    fn test_known_profiles() {
        assert_eq!(profile_for("social"), Some(profile(0.9, 0.95, 2000)));
        assert_eq!(profile_for("antrag").unwrap().max_tokens, 8000);
        assert_eq!(profile_for("sharepic_dreizeilen").unwrap().max_tokens, 600);
        assert_eq!(profile_for("sharepic").unwrap().max_tokens, 600);
        assert_eq!(profile_for("antrag_kleine_anfrage").unwrap().temperature, 0.3);
        assert!(profile_for("unbekannt").is_none());
    }

    #[test]
    fn test_caller_beats_profile_beats_global() {
        let global = SamplingDefaults::default();
        let options = RequestOptions {
            max_tokens: Some(123),
            ..Default::default()
        };
        let resolved = options.resolve(profile_for("social").as_ref(), &global);
        assert_eq!(resolved.max_tokens, 123);
        assert_eq!(resolved.temperature, 0.9);

        let resolved = options.resolve(profile_for("other").as_ref(), &global);
        assert_eq!(resolved.temperature, 0.7);
    }
}

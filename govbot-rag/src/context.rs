//! Grounding context assembly.

use crate::config::RetrievalConfig;
use crate::document::Match;

/// Keep the matches whose score qualifies under `config`, in their original order.
pub fn qualifying<'a>(matches: &'a [Match], config: &RetrievalConfig) -> Vec<&'a Match> {
    matches.iter().filter(|m| config.qualifies(m.score)).collect()
}

/// Join the passages of qualifying matches with `\n` and cut the result to
/// at most `max_chars` characters.
///
/// No qualifying matches gives an empty string.
pub fn assemble_context(matches: &[Match], config: &RetrievalConfig, max_chars: usize) -> String {
    let joined = qualifying(matches, config)
        .iter()
        .map(|m| m.metadata.chunk.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    truncate_chars(joined, max_chars)
}

/// Source URLs of qualifying matches, in order; `None` where a match has no URL.
pub fn source_urls(matches: &[Match], config: &RetrievalConfig) -> Vec<Option<String>> {
    qualifying(matches, config).into_iter().map(|m| m.metadata.url.clone()).collect()
}

/// URL of the first qualifying match, or `""`.
pub fn primary_url(matches: &[Match], config: &RetrievalConfig) -> String {
    qualifying(matches, config)
        .first()
        .and_then(|m| m.metadata.url.clone())
        .unwrap_or_default()
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoreBound;
    use proptest::prelude::*;

    fn m(score: f32, chunk: &str, url: Option<&str>) -> Match {
        Match::new(format!("{chunk}-{score}"), score, chunk, url.map(str::to_string))
    }

    #[test]
    fn single_match_becomes_the_context() {
        let matches = vec![m(
            0.9,
            "Renewals can be done online at mvd.newmexico.gov.",
            Some("https://mvd.newmexico.gov"),
        )];

        let context = assemble_context(&matches, &RetrievalConfig::context(), 3000);

        assert_eq!(context, "Renewals can be done online at mvd.newmexico.gov.");
        assert_eq!(primary_url(&matches, &RetrievalConfig::context()), "https://mvd.newmexico.gov");
    }

    #[test]
    fn chunks_join_with_newlines_in_index_order() {
        let matches = vec![m(0.95, "one", None), m(0.5, "skipped", None), m(0.8, "two", None)];

        assert_eq!(assemble_context(&matches, &RetrievalConfig::context(), 3000), "one\ntwo");
    }

    #[test]
    fn no_qualifying_matches_gives_empty_context() {
        let matches = vec![m(0.7, "exactly at threshold", Some("https://x"))];

        assert_eq!(assemble_context(&matches, &RetrievalConfig::context(), 3000), "");
        assert_eq!(primary_url(&matches, &RetrievalConfig::context()), "");
        assert_eq!(primary_url(&[], &RetrievalConfig::source()), "");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let matches = vec![m(0.9, "ñandú señor", None)];

        assert_eq!(assemble_context(&matches, &RetrievalConfig::context(), 5), "ñandú");
    }

    #[test]
    fn urls_listing_is_inclusive_at_threshold() {
        let matches = vec![
            m(0.85, "a", Some("https://a")),
            m(0.8, "b", None),
            m(0.75, "c", Some("https://c")),
        ];

        assert_eq!(
            source_urls(&matches, &RetrievalConfig::urls()),
            vec![Some("https://a".to_string()), None]
        );
    }

    #[test]
    fn first_qualifying_match_without_url_gives_empty_string() {
        let matches = vec![m(0.9, "a", None), m(0.85, "b", Some("https://b"))];

        assert_eq!(primary_url(&matches, &RetrievalConfig::source()), "");
    }

    #[test]
    fn unscored_matches_are_skipped_even_at_zero_threshold() {
        let config = RetrievalConfig::builder()
            .min_score(0.0)
            .score_bound(ScoreBound::Inclusive)
            .build()
            .unwrap();
        let mut unscored = m(0.0, "no score", Some("https://x"));
        unscored.score = None;
        let matches = vec![unscored, m(0.0, "zero", Some("https://zero"))];

        assert_eq!(assemble_context(&matches, &config, 3000), "zero");
        assert_eq!(source_urls(&matches, &config), vec![Some("https://zero".to_string())]);
    }

    fn arb_matches() -> impl Strategy<Value = Vec<Match>> {
        proptest::collection::vec((0.0f32..=1.0f32, "[a-zé ]{0,40}"), 0..12).prop_map(|items| {
            items.into_iter().map(|(score, chunk)| m(score, &chunk, None)).collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn context_never_exceeds_budget(matches in arb_matches(), max_chars in 0usize..200) {
            let config = RetrievalConfig::builder().min_score(0.0).build().unwrap();
            let context = assemble_context(&matches, &config, max_chars);
            prop_assert!(context.chars().count() <= max_chars);
        }

        #[test]
        fn raising_threshold_never_adds_matches(
            matches in arb_matches(),
            low in 0.0f32..=1.0f32,
            delta in 0.0f32..=1.0f32,
            inclusive in any::<bool>(),
        ) {
            let bound = if inclusive { ScoreBound::Inclusive } else { ScoreBound::Exclusive };
            let lower = RetrievalConfig::builder().min_score(low).score_bound(bound).build().unwrap();
            let higher =
                RetrievalConfig::builder().min_score(low + delta).score_bound(bound).build().unwrap();
            prop_assert!(qualifying(&matches, &higher).len() <= qualifying(&matches, &lower).len());
        }
    }
}

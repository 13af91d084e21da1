//! Property-based tests for the `@content~` codec.
//!
//! However a stream of well-formed tokens is chopped into reads, the codec
//! must hand back exactly those tokens; malformed input must fail and leave
//! the carry-over clean.

use proptest::prelude::*;
use whisker_gateway::codec::{decode, encode};

// ============================================================================
// Strategies
// ============================================================================

fn arb_content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._-]{1,12}"
}

fn arb_tokens() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_content(), 1..8)
}

fn stream_of(tokens: &[String]) -> Vec<u8> {
    tokens.iter().flat_map(|t| encode(t).unwrap()).collect()
}

/// Cut `bytes` at the given (unsorted, possibly repeated) positions.
fn chop(bytes: &[u8], cuts: &[prop::sample::Index]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| bytes[w[0]..w[1]].to_vec()).collect()
}

// ============================================================================
// Round trip
// ============================================================================

proptest! {
    /// Arbitrary fragmentation never changes what is decoded.
    #[test]
    fn fragmented_stream_round_trips(
        tokens in arb_tokens(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
    ) {
        let stream = stream_of(&tokens);
        let mut carry = Vec::new();
        let mut decoded = Vec::new();
        for chunk in chop(&stream, &cuts) {
            decoded.extend(decode(&mut carry, &chunk).unwrap());
        }
        prop_assert_eq!(decoded, tokens);
        prop_assert!(carry.is_empty());
    }

    /// A stream cut short inside its last token keeps that token pending.
    #[test]
    fn truncated_stream_keeps_fragment(
        tokens in arb_tokens(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
        missing in 1usize..4,
    ) {
        let stream = stream_of(&tokens);
        let last_len = tokens.last().map(|t| t.len() + 2).unwrap_or(0);
        let keep = stream.len() - missing.min(last_len - 1);
        let truncated = &stream[..keep];

        let mut carry = Vec::new();
        let mut decoded = Vec::new();
        for chunk in chop(truncated, &cuts) {
            decoded.extend(decode(&mut carry, &chunk).unwrap());
        }
        prop_assert_eq!(&decoded[..], &tokens[..tokens.len() - 1]);
        prop_assert!(!carry.is_empty());
        prop_assert!(carry.starts_with(b"@"));
    }
}

// ============================================================================
// Malformed input
// ============================================================================

proptest! {
    /// A `~` inside a token fails the read and resets the carry-over.
    #[test]
    fn inner_tilde_fails_and_resets(
        prefix in arb_tokens(),
        head in "[a-z]{1,8}",
        tail in "[a-z]{1,8}",
    ) {
        let mut bytes = stream_of(&prefix);
        bytes.extend(format!("@{}~{}~", head, tail).into_bytes());

        let mut carry = Vec::new();
        prop_assert!(decode(&mut carry, &bytes).is_err());
        prop_assert!(carry.is_empty());

        // Nothing leaks into the next read
        prop_assert_eq!(decode(&mut carry, b"@next~").unwrap(), vec!["next".to_string()]);
    }

    /// Arbitrary bytes never panic, and an error always leaves the carry empty.
    #[test]
    fn arbitrary_bytes_never_corrupt_carry(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..6),
    ) {
        let mut carry = Vec::new();
        for chunk in chunks {
            if decode(&mut carry, &chunk).is_err() {
                prop_assert!(carry.is_empty());
            }
        }
    }
}

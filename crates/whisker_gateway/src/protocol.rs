//! What the cat says back.
//!
//! Responses are the per-token replies concatenated in token order. A store
//! failure while deciding is logged and contributes nothing, so one bad
//! round-trip never silences the rest of the batch.

use crate::error::{FramingResult, MissingFieldError};
use whisker_limbic::Cat;

pub const TOLERATED: &str = "Tolerated by the Cat";
pub const SCRATCHED: &str = "Scratched by the Cat";
pub const EATEN: &str = "Eaten by the Cat";
pub const IGNORED: &str = "Ignored by the Cat";
pub const INCORRECT_DATA: &str = "Incorrect data";

/// Below this happiness the cat hangs up on a TCP petter.
pub const ENOUGH_HAPPINESS: f64 = 0.2;

const PAIR_SEPARATOR: &str = " - ";

pub fn amused(counter: u64) -> String {
    format!("The Cat is amused by #{}", counter)
}

/// Split a feed token into `(name, food)` at the first `" - "`.
pub fn split_pair(content: &str) -> Result<(&str, &str), MissingFieldError> {
    let (name, food) = content
        .split_once(PAIR_SEPARATOR)
        .ok_or(MissingFieldError::Food)?;
    if name.is_empty() {
        return Err(MissingFieldError::Name);
    }
    if food.is_empty() {
        return Err(MissingFieldError::Food);
    }
    Ok((name, food))
}

/// Answer one TCP read: every name is a pet attempt.
pub async fn answer_pets(cat: &Cat, decoded: FramingResult<Vec<String>>) -> String {
    let names = match decoded {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!("Pet request rejected: {}", e);
            return INCORRECT_DATA.to_string();
        }
    };

    let mut response = String::new();
    for name in names {
        match cat.pet(&name).await {
            Ok(true) => response.push_str(TOLERATED),
            Ok(false) => response.push_str(SCRATCHED),
            Err(e) => tracing::error!("pet({}) failed: {:#}", name, e),
        }
    }
    response
}

/// Answer one UDP drain: every token is a `name - food` pair.
pub async fn answer_feeds(cat: &Cat, decoded: FramingResult<Vec<String>>) -> String {
    let tokens = match decoded {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("Feed request rejected: {}", e);
            return INCORRECT_DATA.to_string();
        }
    };

    let mut response = String::new();
    for token in tokens {
        let (name, food) = match split_pair(&token) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!("Feed token {:?}: {}", token, e);
                response.push_str(INCORRECT_DATA);
                continue;
            }
        };
        match cat.feed(name, food).await {
            Ok(true) => response.push_str(EATEN),
            Ok(false) => response.push_str(IGNORED),
            Err(e) => tracing::error!("feed({}, {}) failed: {:#}", name, food, e),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FramingError;
    use std::sync::Arc;
    use whisker_core::{CatConfig, RecordStore};
    use whisker_limbic::{FixedNoise, MoodState};
    use whisker_memory::SqliteStore;

    async fn cat() -> (Cat, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let noise = Arc::new(FixedNoise { whim: 1.0, coin: true });
        (Cat::with_noise(store.clone(), CatConfig::default(), noise), store)
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("bob - tuna"), Ok(("bob", "tuna")));
        assert_eq!(split_pair("bob - tuna - salad"), Ok(("bob", "tuna - salad")));
        assert_eq!(split_pair("bob"), Err(MissingFieldError::Food));
        assert_eq!(split_pair("bob - "), Err(MissingFieldError::Food));
        assert_eq!(split_pair(" - tuna"), Err(MissingFieldError::Name));
        assert_eq!(split_pair("bob-tuna"), Err(MissingFieldError::Food));
    }

    #[test]
    fn test_amused_message() {
        assert_eq!(amused(0), "The Cat is amused by #0");
        assert_eq!(amused(3), "The Cat is amused by #3");
    }

    #[tokio::test]
    async fn test_pet_responses_follow_token_order() {
        let (cat, store) = cat().await;
        cat.set_mood(MoodState::new(0.4, 0.0)).await;

        let response = answer_pets(&cat, Ok(vec!["alice".into(), "bob".into()])).await;
        assert_eq!(response, format!("{}{}", TOLERATED, TOLERATED));
        assert_eq!(store.count_users().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_framing_error_answers_incorrect_data() {
        let (cat, store) = cat().await;
        let response = answer_pets(&cat, Err(FramingError::UnterminatedDelimiter)).await;
        assert_eq!(response, INCORRECT_DATA);
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_pair_skipped_rest_of_batch_served() {
        let (cat, store) = cat().await;
        let tokens = vec!["bob".to_string(), "alice - tuna".to_string()];
        let response = answer_feeds(&cat, Ok(tokens)).await;

        assert_eq!(response, format!("{}{}", INCORRECT_DATA, EATEN));
        let window = std::time::Duration::from_secs(60);
        assert!(store.eat_events_for_user_since("bob", window).await.unwrap().is_empty());
        assert_eq!(store.eat_events_for_user_since("alice", window).await.unwrap().len(), 1);
    }
}

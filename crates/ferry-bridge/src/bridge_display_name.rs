//! Sender display-name resolution with an ordered fallback chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::bridge_contract::{SourceApiClient, SourceContext};

const FALLBACK_SUFFIX_CHARS: usize = 6;
const FALLBACK_PREFIX: &str = "SourceUser";

/// Resolves a human-readable sender name, never failing the caller.
///
/// Lookup order: group-member profile (group context only), then direct
/// profile, then a masked identifier built from the sender id. Each step has
/// its own failure boundary so one failing lookup never blocks the next.
pub struct DisplayNameResolver {
    api: Arc<dyn SourceApiClient>,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl DisplayNameResolver {
    pub fn new(api: Arc<dyn SourceApiClient>) -> Self {
        Self {
            api,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, sender_id: &str, context: &SourceContext) -> String {
        let cache_key = (context.cache_key(), sender_id.to_string());
        if let Some(name) = self.cached(&cache_key) {
            return name;
        }

        if let SourceContext::Group { group_id } = context {
            match self.api.group_member_display_name(group_id, sender_id).await {
                Ok(name) if !name.trim().is_empty() => {
                    return self.remember(cache_key, name);
                }
                Ok(_) => {}
                Err(error) => {
                    debug!("group member profile lookup failed for {sender_id}: {error:#}");
                }
            }
        }

        match self.api.user_display_name(sender_id).await {
            Ok(name) if !name.trim().is_empty() => {
                return self.remember(cache_key, name);
            }
            Ok(_) => {}
            Err(error) => {
                debug!("profile lookup failed for {sender_id}: {error:#}");
            }
        }

        masked_sender_name(sender_id)
    }

    fn cached(&self, key: &(String, String)) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn remember(&self, key: (String, String), name: String) -> String {
        let trimmed = name.trim().to_string();
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, trimmed.clone());
        trimmed
    }
}

/// Masked fallback identifier ending in the last six characters of the
/// sender id.
pub fn masked_sender_name(sender_id: &str) -> String {
    let chars: Vec<char> = sender_id.chars().collect();
    let start = chars.len().saturating_sub(FALLBACK_SUFFIX_CHARS);
    let suffix: String = chars[start..].iter().collect();
    format!("{FALLBACK_PREFIX}({suffix})")
}

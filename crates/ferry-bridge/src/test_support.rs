//! Shared fakes for exercising the bridge core without live platforms.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::bridge_contract::{FetchedContent, SourceApiClient, TargetChannelSender};

#[derive(Default)]
pub(crate) struct FakeSourceApi {
    pub group_names: HashMap<(String, String), String>,
    pub user_names: HashMap<String, String>,
    pub bot_id: Option<String>,
    pub content: HashMap<String, FetchedContent>,
    pub fail_push: bool,
    pub profile_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub pushed: Mutex<Vec<(String, String)>>,
}

impl FakeSourceApi {
    pub fn with_group_name(mut self, group_id: &str, user_id: &str, name: &str) -> Self {
        self.group_names
            .insert((group_id.to_string(), user_id.to_string()), name.to_string());
        self
    }

    pub fn with_user_name(mut self, user_id: &str, name: &str) -> Self {
        self.user_names
            .insert(user_id.to_string(), name.to_string());
        self
    }

    pub fn with_content(mut self, content_ref: &str, bytes: &[u8], content_type: Option<&str>) -> Self {
        self.content.insert(
            content_ref.to_string(),
            FetchedContent {
                bytes: bytes.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn pushed_messages(&self) -> Vec<(String, String)> {
        self.pushed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SourceApiClient for FakeSourceApi {
    async fn group_member_display_name(&self, group_id: &str, user_id: &str) -> Result<String> {
        self.group_names
            .get(&(group_id.to_string(), user_id.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no group member profile for {user_id} in {group_id}"))
    }

    async fn user_display_name(&self, user_id: &str) -> Result<String> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.user_names
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow!("no profile for {user_id}"))
    }

    async fn bot_user_id(&self) -> Result<String> {
        self.bot_id
            .clone()
            .ok_or_else(|| anyhow!("bot info unavailable"))
    }

    async fn fetch_content(&self, content_ref: &str) -> Result<FetchedContent> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.content
            .get(content_ref)
            .cloned()
            .ok_or_else(|| anyhow!("no content for ref {content_ref}"))
    }

    async fn push_text(&self, to: &str, text: &str) -> Result<()> {
        if self.fail_push {
            return Err(anyhow!("push endpoint rejected the message"));
        }
        self.pushed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeTargetSender {
    pub fail_sends: AtomicBool,
    pub sent: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeTargetSender {
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    pub fn sent_messages(&self) -> Vec<(String, Option<String>)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TargetChannelSender for FakeTargetSender {
    async fn send_text(&self, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("target channel send failed"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((text.to_string(), None));
        Ok(())
    }

    async fn send_attachment(&self, text: &str, local_path: &Path) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("target channel attachment send failed"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((text.to_string(), Some(local_path.display().to_string())));
        Ok(())
    }
}

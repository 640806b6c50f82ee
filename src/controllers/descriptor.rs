//! Agent-facing attack descriptor.
//!
//! The descriptor bundles everything an agent needs to start a task: the
//! attack recipe, references to its resource files, the hashcat mode, and
//! URLs for the dynamic uncracked-hash list and for status polling.
//! Missing resources render as explicit nulls, never omitted fields.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::Attack;
use crate::domain::ports::{
    AttackRepository, CampaignRepository, HashListRepository, ObjectStore, ResourceRepository,
};

/// Reference to one downloadable resource file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub id: Uuid,
    pub download_url: String,
    pub checksum: String,
    pub file_name: String,
}

/// The full recipe handed to an agent for one attack.
#[derive(Debug, Clone, Serialize)]
pub struct AttackDescriptor {
    pub id: Uuid,
    pub attack_mode: String,
    pub hashcat_mode: u8,
    pub mask: Option<String>,
    pub increment_mode: bool,
    pub increment_minimum: Option<i64>,
    pub increment_maximum: Option<i64>,
    pub custom_charset_1: Option<String>,
    pub custom_charset_2: Option<String>,
    pub custom_charset_3: Option<String>,
    pub custom_charset_4: Option<String>,
    pub left_rule: Option<String>,
    pub right_rule: Option<String>,
    pub disable_markov: bool,
    pub optimized: bool,
    pub workload_profile: i64,
    /// Explicit null when the attack has no word list
    pub word_list: Option<ResourceRef>,
    /// Explicit null when the attack has no rule list
    pub rule_list: Option<ResourceRef>,
    /// Explicit null when the attack has no mask list
    pub mask_list: Option<ResourceRef>,
    /// Hashcat -m mode number of the target list
    pub hash_mode: i64,
    /// Where to download the current uncracked hashes
    pub uncracked_list_url: String,
    /// Checksum of that list as of rendering
    pub uncracked_list_checksum: String,
    /// Where to poll for attack status
    pub status_url: String,
}

/// Renders descriptors and the dynamic uncracked-hash list.
pub struct DescriptorRenderer {
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    resources: Arc<dyn ResourceRepository>,
    object_store: Arc<dyn ObjectStore>,
    base_url: String,
}

impl DescriptorRenderer {
    pub fn new(
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        resources: Arc<dyn ResourceRepository>,
        object_store: Arc<dyn ObjectStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            attacks,
            campaigns,
            hash_lists,
            resources,
            object_store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Render the descriptor for one attack.
    pub async fn render(&self, attack_id: Uuid) -> Result<AttackDescriptor> {
        let attack = self
            .attacks
            .get(attack_id)
            .await
            .context("Failed to fetch attack")?
            .ok_or(DomainError::AttackNotFound(attack_id))?;

        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await
            .context("Failed to fetch campaign")?
            .ok_or(DomainError::CampaignNotFound(attack.campaign_id))?;

        let hash_list = self
            .hash_lists
            .get(campaign.hash_list_id)
            .await
            .context("Failed to fetch hash list")?
            .ok_or(DomainError::HashListNotFound(campaign.hash_list_id))?;

        let word_list = self.resource_ref(attack.word_list_id).await?;
        let rule_list = self.resource_ref(attack.rule_list_id).await?;
        let mask_list = self.resource_ref(attack.mask_list_id).await?;

        let uncracked = self.render_uncracked_list(hash_list.id).await?;

        Ok(AttackDescriptor {
            id: attack.id,
            attack_mode: attack.attack_mode.as_str().to_string(),
            hashcat_mode: attack.attack_mode.hashcat_mode(),
            mask: attack.mask.clone(),
            increment_mode: attack.increment_mode,
            increment_minimum: attack.increment_minimum,
            increment_maximum: attack.increment_maximum,
            custom_charset_1: attack.custom_charset_1.clone(),
            custom_charset_2: attack.custom_charset_2.clone(),
            custom_charset_3: attack.custom_charset_3.clone(),
            custom_charset_4: attack.custom_charset_4.clone(),
            left_rule: attack.left_rule.clone(),
            right_rule: attack.right_rule.clone(),
            disable_markov: attack.disable_markov,
            optimized: attack.optimized,
            workload_profile: attack.workload_profile,
            word_list,
            rule_list,
            mask_list,
            hash_mode: hash_list.hash_type.0,
            uncracked_list_url: self.attack_url(&attack, "hash_list"),
            uncracked_list_checksum: uncracked.checksum,
            status_url: self.attack_url(&attack, "status"),
        })
    }

    /// Render the current uncracked hashes of a list as a newline-joined
    /// document plus its checksum.
    pub async fn render_uncracked_list(&self, hash_list_id: Uuid) -> Result<UncrackedList> {
        let items = self
            .hash_lists
            .uncracked_items(hash_list_id)
            .await
            .context("Failed to list uncracked items")?;

        let mut body = String::new();
        for item in &items {
            body.push_str(&item.hash_value);
            body.push('\n');
        }

        let checksum = hex::encode(Sha256::digest(body.as_bytes()));
        Ok(UncrackedList { body, checksum })
    }

    async fn resource_ref(&self, id: Option<Uuid>) -> Result<Option<ResourceRef>> {
        let Some(id) = id else {
            return Ok(None);
        };

        let Some(resource) = self
            .resources
            .get(id)
            .await
            .context("Failed to fetch resource")?
        else {
            return Ok(None);
        };

        Ok(Some(ResourceRef {
            id: resource.id,
            download_url: self.object_store.download_url(&resource.object_key),
            checksum: resource.checksum,
            file_name: resource.file_name,
        }))
    }

    fn attack_url(&self, attack: &Attack, suffix: &str) -> String {
        format!("{}/api/v1/attacks/{}/{suffix}", self.base_url, attack.id)
    }
}

/// A rendered uncracked-hash document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncrackedList {
    pub body: String,
    pub checksum: String,
}

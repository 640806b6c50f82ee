//! Attack domain model.
//!
//! An attack is one complete hashcat invocation recipe within a campaign:
//! mode, mask/charsets, resource references, and tuning flags. Attacks own
//! tasks and progress through an explicit state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hashcat attack mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    /// Straight wordlist attack (-a 0)
    Dictionary,
    /// Single mask attack (-a 3)
    Mask,
    /// Pure brute force over a charset
    BruteForce,
    /// Hybrid wordlist + mask (-a 6)
    HybridDm,
    /// Hybrid mask + wordlist (-a 7)
    HybridMd,
    /// Mask attack with increment mode enabled
    Incremental,
}

impl Default for AttackMode {
    fn default() -> Self {
        Self::Dictionary
    }
}

impl AttackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::Mask => "mask",
            Self::BruteForce => "brute_force",
            Self::HybridDm => "hybrid_dm",
            Self::HybridMd => "hybrid_md",
            Self::Incremental => "incremental",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dictionary" => Some(Self::Dictionary),
            "mask" => Some(Self::Mask),
            "brute_force" => Some(Self::BruteForce),
            "hybrid_dm" => Some(Self::HybridDm),
            "hybrid_md" => Some(Self::HybridMd),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }

    /// The `-a` mode number hashcat expects on its command line.
    pub fn hashcat_mode(&self) -> u8 {
        match self {
            Self::Dictionary => 0,
            Self::Mask | Self::BruteForce | Self::Incremental => 3,
            Self::HybridDm => 6,
            Self::HybridMd => 7,
        }
    }

    /// Whether this mode requires a mask (directly or via a mask list).
    pub fn uses_mask(&self) -> bool {
        !matches!(self, Self::Dictionary)
    }
}

/// State of an attack in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackState {
    /// Defined, no task has accepted work yet
    Pending,
    /// At least one task is working the keyspace
    Running,
    /// Suspended together with its campaign
    Paused,
    /// Every hash cracked or keyspace finished with none left
    Completed,
    /// Keyspace enumerated but uncracked hashes remain
    Exhausted,
    /// Cancelled; tasks destroyed
    Abandoned,
    /// A fatal agent error stopped the attack
    Failed,
}

impl Default for AttackState {
    fn default() -> Self {
        Self::Pending
    }
}

impl AttackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Abandoned => "abandoned",
            Self::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" | "complete" => Some(Self::Completed),
            "exhausted" => Some(Self::Exhausted),
            "abandoned" => Some(Self::Abandoned),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Exhausted | Self::Abandoned | Self::Failed
        )
    }

    /// States in which new tasks may still be created for the attack.
    pub fn accepts_new_tasks(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [AttackState] {
        match self {
            Self::Pending => &[Self::Running, Self::Paused, Self::Abandoned],
            Self::Running => &[
                Self::Completed,
                Self::Exhausted,
                Self::Paused,
                Self::Abandoned,
                Self::Failed,
            ],
            Self::Paused => &[Self::Pending, Self::Running, Self::Abandoned],
            Self::Completed | Self::Exhausted | Self::Abandoned | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// A complete hashcat recipe applied to a campaign's hash list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// Unique identifier
    pub id: Uuid,
    /// Owning campaign
    pub campaign_id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Hashcat attack mode
    pub attack_mode: AttackMode,
    /// Mask pattern for mask-based modes
    pub mask: Option<String>,
    /// Whether increment mode is enabled
    pub increment_mode: bool,
    /// Inclusive lower bound of the increment range
    pub increment_minimum: Option<i64>,
    /// Inclusive upper bound of the increment range
    pub increment_maximum: Option<i64>,
    /// Custom charsets -1 through -4
    pub custom_charset_1: Option<String>,
    pub custom_charset_2: Option<String>,
    pub custom_charset_3: Option<String>,
    pub custom_charset_4: Option<String>,
    /// Rule applied to the left-hand dictionary in hybrid modes
    pub left_rule: Option<String>,
    /// Rule applied to the right-hand side in hybrid modes
    pub right_rule: Option<String>,
    /// Disable the markov chain optimizer
    pub disable_markov: bool,
    /// Use hashcat's optimized kernels
    pub optimized: bool,
    /// Hashcat workload profile (1-4)
    pub workload_profile: i64,
    /// Word list resource, if the mode needs one
    pub word_list_id: Option<Uuid>,
    /// Rule list resource
    pub rule_list_id: Option<Uuid>,
    /// Mask list resource
    pub mask_list_id: Option<Uuid>,
    /// Candidate-space size estimate; drives assignment ordering
    pub complexity_value: i64,
    /// Current state
    pub state: AttackState,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Attack {
    /// Create a new attack in `Pending`.
    pub fn new(campaign_id: Uuid, name: impl Into<String>, mode: AttackMode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            name: name.into(),
            attack_mode: mode,
            mask: None,
            increment_mode: false,
            increment_minimum: None,
            increment_maximum: None,
            custom_charset_1: None,
            custom_charset_2: None,
            custom_charset_3: None,
            custom_charset_4: None,
            left_rule: None,
            right_rule: None,
            disable_markov: false,
            optimized: false,
            workload_profile: 3,
            word_list_id: None,
            rule_list_id: None,
            mask_list_id: None,
            complexity_value: 0,
            state: AttackState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the mask pattern (builder form).
    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Enable increment mode over the given inclusive range.
    pub fn with_increment(mut self, minimum: i64, maximum: i64) -> Self {
        self.increment_mode = true;
        self.increment_minimum = Some(minimum);
        self.increment_maximum = Some(maximum);
        self
    }

    /// Set the complexity estimate.
    pub fn with_complexity(mut self, complexity: i64) -> Self {
        self.complexity_value = complexity;
        self
    }

    /// Attach a word list resource.
    pub fn with_word_list(mut self, id: Uuid) -> Self {
        self.word_list_id = Some(id);
        self
    }

    /// Attach a rule list resource.
    pub fn with_rule_list(mut self, id: Uuid) -> Self {
        self.rule_list_id = Some(id);
        self
    }

    /// Attach a mask list resource.
    pub fn with_mask_list(mut self, id: Uuid) -> Self {
        self.mask_list_id = Some(id);
        self
    }

    /// Check if can transition to the given state.
    pub fn can_transition_to(&self, new_state: AttackState) -> bool {
        self.state.can_transition_to(new_state)
    }

    /// Transition to a new state, enforcing the transition table.
    pub fn transition_to(&mut self, new_state: AttackState) -> Result<(), String> {
        if !self.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition attack from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check if the attack is terminal.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Validate attack fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Attack name cannot be empty".to_string());
        }
        if self.complexity_value < 0 {
            return Err("Complexity value cannot be negative".to_string());
        }
        if !(1..=4).contains(&self.workload_profile) {
            return Err(format!(
                "Workload profile must be 1-4, got {}",
                self.workload_profile
            ));
        }
        if self.attack_mode.uses_mask() && self.mask.is_none() && self.mask_list_id.is_none() {
            return Err(format!(
                "Attack mode {} requires a mask or mask list",
                self.attack_mode.as_str()
            ));
        }
        if self.attack_mode == AttackMode::Dictionary && self.word_list_id.is_none() {
            return Err("Dictionary attacks require a word list".to_string());
        }
        if let (Some(min), Some(max)) = (self.increment_minimum, self.increment_maximum) {
            if min > max {
                return Err(format!("Increment range inverted: {min} > {max}"));
            }
        }
        Ok(())
    }
}

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use tribunal_models::agent_message::SpecialistCategory;
use tribunal_models::config::AgentsConfig;
use tribunal_models::market::{EventType, MarketBrief};

use crate::claude_cli::ClaudeCliConfig;
use crate::specialist::{ClaudeSpecialist, SpecialistAgent};

use EventType::{Court, Economic, Election, Geopolitical, Policy};
use SpecialistCategory::{
    Baseline, EventIntelligence, EventScenario, PollingStatistical, PriceAction,
    SentimentNarrative,
};

/// Selection predicate for one specialist: category, mandatory flag, and the
/// event types and keywords that trigger it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialistProfile {
    pub name: &'static str,
    pub category: SpecialistCategory,
    /// Mandatory specialists run whenever their category is enabled.
    pub mandatory: bool,
    pub event_types: &'static [EventType],
    pub keywords: &'static [&'static str],
    /// One-line brief used in the specialist's system prompt.
    pub focus: &'static str,
}

impl SpecialistProfile {
    pub const fn mandatory(name: &'static str, category: SpecialistCategory, focus: &'static str) -> Self {
        Self {
            name,
            category,
            mandatory: true,
            event_types: &[],
            keywords: &[],
            focus,
        }
    }

    pub const fn triggered(
        name: &'static str,
        category: SpecialistCategory,
        event_types: &'static [EventType],
        keywords: &'static [&'static str],
        focus: &'static str,
    ) -> Self {
        Self {
            name,
            category,
            mandatory: false,
            event_types,
            keywords,
            focus,
        }
    }

    /// Why this specialist should run for `brief`, or `None` if it should not.
    /// `text` is the lowercase event and market keyword text of the brief.
    pub fn trigger(&self, brief: &MarketBrief, text: &str) -> Option<SelectionReason> {
        if self.mandatory {
            return Some(SelectionReason::Mandatory);
        }
        if self.event_types.contains(&brief.event_type) {
            return Some(SelectionReason::EventType(brief.event_type));
        }
        self.keywords
            .iter()
            .find(|k| text.contains(*k))
            .map(|k| SelectionReason::Keyword(k.to_string()))
    }
}

pub const DEFAULT_PROFILES: &[SpecialistProfile] = &[
    SpecialistProfile::mandatory(
        "market_microstructure",
        Baseline,
        "order book depth, spread, volume and what the current price implies about informed flow",
    ),
    SpecialistProfile::mandatory(
        "probability_baseline",
        Baseline,
        "base rates for this class of question and how far the market price sits from them",
    ),
    SpecialistProfile::mandatory(
        "risk_assessment",
        Baseline,
        "resolution ambiguity, settlement risk and scenarios that would invalidate either side",
    ),
    SpecialistProfile::triggered(
        "breaking_news",
        EventIntelligence,
        &[Geopolitical, Policy, Court],
        &["breaking", "announce", "report", "leak", "statement"],
        "the latest developments and whether the price has absorbed them",
    ),
    SpecialistProfile::triggered(
        "event_impact",
        EventIntelligence,
        &[Policy, Economic, Geopolitical],
        &["impact", "decision", "ruling", "sanction", "tariff"],
        "how scheduled and unscheduled events move the resolution odds",
    ),
    SpecialistProfile::triggered(
        "polling_intelligence",
        PollingStatistical,
        &[Election],
        &["poll", "vote", "election", "candidate", "approval", "primary"],
        "polling averages, house effects and historical polling error",
    ),
    SpecialistProfile::triggered(
        "historical_pattern",
        PollingStatistical,
        &[Election, Economic],
        &["history", "historical", "precedent", "record", "since"],
        "precedents and how often comparable setups resolved YES",
    ),
    SpecialistProfile::triggered(
        "media_sentiment",
        SentimentNarrative,
        &[Election, Policy],
        &["media", "press", "coverage", "news", "headline"],
        "tone and volume of mainstream coverage",
    ),
    SpecialistProfile::triggered(
        "social_sentiment",
        SentimentNarrative,
        &[],
        &["twitter", "social", "viral", "trending", "reddit", "tiktok"],
        "social media sentiment and crowd positioning",
    ),
    SpecialistProfile::triggered(
        "narrative_velocity",
        SentimentNarrative,
        &[],
        &["narrative", "momentum", "hype", "story", "meme"],
        "how fast the dominant narrative is shifting and whether price lags it",
    ),
    SpecialistProfile::triggered(
        "momentum",
        PriceAction,
        &[Economic],
        &["price", "rally", "surge", "crypto", "bitcoin", "stock", "index"],
        "recent price trend of this market and of related underlyings",
    ),
    SpecialistProfile::triggered(
        "mean_reversion",
        PriceAction,
        &[Economic],
        &["overbought", "oversold", "correction", "reversal", "spike"],
        "overreaction in the market price and the odds it reverts",
    ),
    SpecialistProfile::triggered(
        "catalyst",
        EventScenario,
        &[Court, Policy, Economic],
        &["deadline", "hearing", "meeting", "launch", "earnings", "debate"],
        "dated catalysts before expiry and how each would move the odds",
    ),
    SpecialistProfile::triggered(
        "tail_risk",
        EventScenario,
        &[Geopolitical, Court],
        &["war", "crisis", "collapse", "default", "black swan", "invasion"],
        "low-probability, high-impact scenarios the market may be mispricing",
    ),
];

pub fn default_profile(name: &str) -> Option<SpecialistProfile> {
    DEFAULT_PROFILES.iter().find(|p| p.name == name).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SelectionReason {
    Mandatory,
    EventType(EventType),
    Keyword(String),
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::Mandatory => write!(f, "mandatory"),
            SelectionReason::EventType(t) => write!(f, "event type {}", t.as_str()),
            SelectionReason::Keyword(k) => write!(f, "keyword '{k}'"),
        }
    }
}

/// A registered specialist together with its selection predicate.
#[derive(Clone)]
pub struct RegistryEntry {
    pub profile: SpecialistProfile,
    pub agent: Arc<dyn SpecialistAgent>,
}

#[derive(Clone)]
pub struct SelectedSpecialist {
    pub name: String,
    pub agent: Arc<dyn SpecialistAgent>,
    pub reason: SelectionReason,
}

/// Specialist id → selection predicate + invocation handle. Iteration and
/// selection follow registration order.
#[derive(Clone, Default)]
pub struct SpecialistRegistry {
    entries: Vec<RegistryEntry>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every default profile backed by a CLI specialist.
    pub fn with_claude_specialists(config: &AgentsConfig) -> Self {
        let mut registry = Self::new();
        for profile in DEFAULT_PROFILES {
            let cli_config = ClaudeCliConfig {
                model: config.model_for(profile.name),
                timeout: config.settings_for(profile.name).timeout,
            };
            registry.register(*profile, Arc::new(ClaudeSpecialist::new(*profile, cli_config)));
        }
        registry
    }

    /// Add a specialist. Re-registering a name replaces the earlier entry in place.
    pub fn register(&mut self, profile: SpecialistProfile, agent: Arc<dyn SpecialistAgent>) -> &mut Self {
        let entry = RegistryEntry { profile, agent };
        match self.entries.iter_mut().find(|e| e.profile.name == profile.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.profile.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.profile.name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Specialists to run for `brief`: mandatory ones plus those triggered by
    /// event type or keyword, limited to enabled categories and specialists.
    /// A panel smaller than `min_specialists` is logged, not topped up.
    pub fn select(&self, brief: &MarketBrief, config: &AgentsConfig) -> Vec<SelectedSpecialist> {
        let text = brief.keyword_text();

        let selected: Vec<SelectedSpecialist> = self
            .entries
            .iter()
            .filter(|e| config.is_category_enabled(e.profile.category))
            .filter(|e| config.is_specialist_enabled(e.profile.name))
            .filter_map(|e| {
                e.profile.trigger(brief, &text).map(|reason| SelectedSpecialist {
                    name: e.profile.name.to_string(),
                    agent: Arc::clone(&e.agent),
                    reason,
                })
            })
            .collect();

        if selected.len() < config.min_specialists {
            warn!(
                market = %brief.market_id,
                selected = selected.len(),
                minimum = config.min_specialists,
                "Fewer specialists selected than configured minimum"
            );
        } else {
            info!(market = %brief.market_id, selected = selected.len(), "Specialists selected");
        }
        selected
    }
}

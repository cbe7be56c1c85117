use async_trait::async_trait;
use chrono::Utc;
use tribunal_models::agent_message::{SpecialistCategory, SpecialistEstimate, SpecialistRequest};

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::AgentError;
use crate::parser::parse_estimate;
use crate::prompts::specialist_system_prompt;
use crate::registry::SpecialistProfile;

/// One opinion-producing specialist. Mockable for testing.
///
/// Returning `AgentError::Timeout` reports a timeout and ends the dispatch
/// unit; any other error is retried.
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn name(&self) -> &str;
    fn category(&self) -> SpecialistCategory;

    async fn evaluate(&self, request: &SpecialistRequest) -> Result<SpecialistEstimate, AgentError>;
}

/// A specialist backed by the `claude` CLI.
pub struct ClaudeSpecialist {
    pub profile: SpecialistProfile,
    pub cli_config: ClaudeCliConfig,
}

impl ClaudeSpecialist {
    pub fn new(profile: SpecialistProfile, cli_config: ClaudeCliConfig) -> Self {
        Self { profile, cli_config }
    }

    /// The configured timeout, shortened to whatever remains before the deadline.
    fn effective_config(&self, request: &SpecialistRequest) -> ClaudeCliConfig {
        let remaining = (request.deadline - Utc::now())
            .to_std()
            .unwrap_or_default();
        ClaudeCliConfig {
            model: self.cli_config.model.clone(),
            timeout: self.cli_config.timeout.min(remaining),
        }
    }
}

#[async_trait]
impl SpecialistAgent for ClaudeSpecialist {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn category(&self) -> SpecialistCategory {
        self.profile.category
    }

    async fn evaluate(&self, request: &SpecialistRequest) -> Result<SpecialistEstimate, AgentError> {
        let config = self.effective_config(request);
        if config.timeout.is_zero() {
            return Err(AgentError::Timeout(0));
        }

        let system_prompt = specialist_system_prompt(&self.profile);
        let user_prompt = serde_json::to_string(request)?;
        let raw_output = invoke_claude(&system_prompt, &user_prompt, &config).await?;
        parse_estimate(&raw_output, self.profile.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_profile;
    use crate::test_support::sample_brief;
    use std::time::Duration;
    use uuid::Uuid;

    fn request(deadline_in: chrono::Duration) -> SpecialistRequest {
        SpecialistRequest {
            request_id: Uuid::new_v4(),
            agent_name: "catalyst".to_string(),
            brief: sample_brief(),
            memory: vec![],
            deadline: Utc::now() + deadline_in,
        }
    }

    fn specialist() -> ClaudeSpecialist {
        let profile = default_profile("catalyst").unwrap();
        ClaudeSpecialist::new(
            profile,
            ClaudeCliConfig {
                model: "claude-3-5-haiku-latest".to_string(),
                timeout: Duration::from_secs(45),
            },
        )
    }

    #[test]
    fn deadline_shortens_cli_timeout() {
        let config = specialist().effective_config(&request(chrono::Duration::seconds(5)));
        assert!(config.timeout <= Duration::from_secs(5));
        assert!(config.timeout > Duration::from_secs(3));

        let config = specialist().effective_config(&request(chrono::Duration::minutes(5)));
        assert_eq!(config.timeout, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn past_deadline_is_a_timeout_without_spawning() {
        let result = specialist()
            .evaluate(&request(chrono::Duration::seconds(-1)))
            .await;
        assert!(matches!(result, Err(AgentError::Timeout(0))));
    }

    #[test]
    fn identity_comes_from_profile() {
        let s = specialist();
        assert_eq!(s.name(), "catalyst");
        assert_eq!(s.category(), SpecialistCategory::EventScenario);
    }
}

//! Persona batch generation
//!
//! Produces the personas of one stakeholder group. A malformed answer is
//! retried with a simplified prompt; any other service failure, or running
//! out of attempts, fails the group.

use crate::error::{GenerationError, SimulationError};
use crate::generation::{GenerationClient, PersonaDraft};
use crate::prompts::{persona_prompt, PromptStrategy};
use crate::registry::NameRegistry;
use crate::types::{BusinessContext, Persona, PersonaId, StakeholderGroup};

/// Simplified-prompt retries after the first malformed answer
pub const MAX_SIMPLIFIED_RETRIES: usize = 2;

/// Personas of one group plus what went sideways while producing them
#[derive(Debug, Clone, Default)]
pub struct PersonaBatch {
    pub personas: Vec<Persona>,
    pub warnings: Vec<String>,
    /// Service calls made, including retries
    pub attempts: usize,
}

/// Persona generator for one run
#[derive(Debug, Clone)]
pub struct PersonaGenerator {
    client: GenerationClient,
    temperature: f32,
    max_tokens: u32,
}

impl PersonaGenerator {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new(client: GenerationClient, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client,
            temperature,
            max_tokens,
        }
    }

    /// Generate `count` personas for `group`
    ///
    /// Names already in the registry are passed to the service as a hint, and
    /// every returned name is registered for later groups.
    ///
    /// # Errors
    /// `SimulationError::PersonaGeneration` when the service fails with a
    /// non-malformed error or every attempt came back malformed
    pub async fn generate(
        &self,
        context: &BusinessContext,
        group: &StakeholderGroup,
        count: usize,
        registry: &mut NameRegistry,
    ) -> Result<PersonaBatch, SimulationError> {
        let scope = registry.scope_key(&group.id).to_string();
        let used_names = registry.snapshot(&scope);

        let mut attempts = 0;
        let mut last_error = GenerationError::malformed("no attempt made");
        let mut drafts = None;

        for strategy in PromptStrategy::schedule(MAX_SIMPLIFIED_RETRIES) {
            attempts += 1;
            let prompt = persona_prompt(strategy, context, group, count, &used_names);
            match self
                .client
                .personas(prompt, count, self.temperature, self.max_tokens)
                .await
            {
                Ok(batch) => {
                    drafts = Some(batch);
                    break;
                }
                Err(e) if e.is_malformed() => {
                    tracing::warn!(
                        group = %group.id,
                        attempt = attempts,
                        ?strategy,
                        "malformed persona batch, retrying with simplified prompt: {}",
                        e
                    );
                    metrics::counter!("panel_persona_retries_total").increment(1);
                    last_error = e;
                }
                Err(e) => {
                    last_error = e;
                    break;
                }
            }
        }

        let Some(drafts) = drafts else {
            return Err(SimulationError::PersonaGeneration {
                group_id: group.id.clone(),
                attempts,
                source: last_error,
            });
        };

        let mut warnings = Vec::new();
        if drafts.len() != count {
            let warning = format!(
                "group '{}': requested {} personas, service returned {}",
                group.id,
                count,
                drafts.len()
            );
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }

        let mut personas = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if !registry.reserve(&scope, &draft.name) {
                let warning = format!(
                    "group '{}': persona name '{}' is already in use",
                    group.id, draft.name
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
            personas.push(into_persona(draft, &group.id));
        }

        tracing::debug!(group = %group.id, generated = personas.len(), attempts, "persona batch ready");

        Ok(PersonaBatch {
            personas,
            warnings,
            attempts,
        })
    }
}

fn into_persona(draft: PersonaDraft, group_id: &str) -> Persona {
    Persona {
        id: PersonaId::new(),
        name: draft.name.trim().to_string(),
        age: draft.age,
        background: draft.background,
        motivations: draft.motivations,
        pain_points: draft.pain_points,
        communication_style: draft.communication_style,
        demographic_details: draft.demographic_details,
        stakeholder_group_id: group_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{MockGenerationService, TargetShape};
    use crate::registry::{NameScope, GLOBAL_SCOPE};
    use serde_json::json;
    use std::sync::Arc;

    fn generator(service: MockGenerationService) -> PersonaGenerator {
        PersonaGenerator::new(GenerationClient::new(Arc::new(service)), 0.3, 1_000)
    }

    fn group() -> StakeholderGroup {
        StakeholderGroup::new("clinics", "Clinic owners").with_question("How do you book?")
    }

    #[tokio::test]
    async fn assigns_ids_and_group() {
        let mut service = MockGenerationService::new();
        service
            .expect_complete()
            .times(1)
            .returning(|_| Ok(json!([{"name": "Ana"}, {"name": "Bo"}])));

        let mut registry = NameRegistry::new(NameScope::Global);
        let batch = generator(service)
            .generate(&BusinessContext::new("idea"), &group(), 2, &mut registry)
            .await
            .unwrap();

        assert_eq!(batch.personas.len(), 2);
        assert_ne!(batch.personas[0].id, batch.personas[1].id);
        assert!(batch.personas.iter().all(|p| p.stakeholder_group_id == "clinics"));
        assert!(batch.warnings.is_empty());
        assert_eq!(registry.len(GLOBAL_SCOPE), 2);
    }

    #[tokio::test]
    async fn malformed_output_retries_with_simplified_prompt() {
        let mut service = MockGenerationService::new();
        let mut seq = mockall::Sequence::new();
        service
            .expect_complete()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(GenerationError::malformed("bad json")));
        service
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.prompt.starts_with("List "))
            .returning(|_| Ok(json!({"personas": [{"name": "Cy"}]})));

        let mut registry = NameRegistry::default();
        let batch = generator(service)
            .generate(&BusinessContext::new("idea"), &group(), 1, &mut registry)
            .await
            .unwrap();

        assert_eq!(batch.attempts, 3);
        assert_eq!(batch.personas[0].name, "Cy");
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_group() {
        let mut service = MockGenerationService::new();
        service
            .expect_complete()
            .times(1 + MAX_SIMPLIFIED_RETRIES)
            .returning(|_| Ok(json!("not a persona list")));

        let mut registry = NameRegistry::default();
        let err = generator(service)
            .generate(&BusinessContext::new("idea"), &group(), 1, &mut registry)
            .await
            .unwrap_err();

        match err {
            SimulationError::PersonaGeneration {
                group_id, attempts, ..
            } => {
                assert_eq!(group_id, "clinics");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn provider_errors_are_not_retried() {
        let mut service = MockGenerationService::new();
        service
            .expect_complete()
            .times(1)
            .returning(|_| Err(GenerationError::Provider("503".to_string())));

        let mut registry = NameRegistry::default();
        let err = generator(service)
            .generate(&BusinessContext::new("idea"), &group(), 1, &mut registry)
            .await
            .unwrap_err();
        assert!(matches!(
            err.generation_error(),
            Some(GenerationError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn count_mismatch_and_collision_become_warnings() {
        let mut service = MockGenerationService::new();
        service
            .expect_complete()
            .withf(|req| req.prompt.contains("Ana") && req.shape == TargetShape::PersonaList { count: 3 })
            .times(1)
            .returning(|_| Ok(json!([{"name": "Ana"}, {"name": "Dev"}])));

        let mut registry = NameRegistry::new(NameScope::Global);
        registry.reserve(GLOBAL_SCOPE, "Ana");

        let batch = generator(service)
            .generate(&BusinessContext::new("idea"), &group(), 3, &mut registry)
            .await
            .unwrap();

        assert_eq!(batch.personas.len(), 2);
        assert_eq!(batch.personas[0].name, "Ana");
        assert_eq!(batch.warnings.len(), 2);
    }
}

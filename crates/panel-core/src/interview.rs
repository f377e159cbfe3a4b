//! Interview simulation
//!
//! One service call per persona, no retry. Identity fields are stamped from
//! known values and the duration is derived from the answers.

use crate::config::{Depth, ResponseStyle};
use crate::error::SimulationError;
use crate::generation::{GenerationClient, InterviewDraft};
use crate::prompts::interview_prompt;
use crate::types::{
    BusinessContext, InterviewResponse, Persona, Sentiment, SimulatedInterview, StakeholderGroup,
};
use rand::Rng;

/// Shortest interview the engine reports
pub const MIN_DURATION_MINUTES: u32 = 10;

/// Bounds of the random jitter added to every duration
pub const DURATION_JITTER_MINUTES: std::ops::RangeInclusive<i32> = -2..=3;

/// Interview simulator for one run
#[derive(Debug, Clone)]
pub struct InterviewSimulator {
    client: GenerationClient,
    style: ResponseStyle,
    depth: Depth,
    temperature: f32,
}

impl InterviewSimulator {
    /// Create simulator
    #[inline]
    #[must_use]
    pub fn new(
        client: GenerationClient,
        style: ResponseStyle,
        depth: Depth,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            style,
            depth,
            temperature,
        }
    }

    /// Response style
    #[inline]
    #[must_use]
    pub fn style(&self) -> ResponseStyle {
        self.style
    }

    /// Interview depth
    #[inline]
    #[must_use]
    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Simulate one interview
    ///
    /// # Errors
    /// `SimulationError::InterviewSimulation` wrapping the service failure
    pub async fn simulate(
        &self,
        persona: &Persona,
        group: &StakeholderGroup,
        context: &BusinessContext,
    ) -> Result<SimulatedInterview, SimulationError> {
        let prompt = interview_prompt(persona, group, context, self.style, self.depth);
        let draft = self
            .client
            .interview(
                prompt,
                group.questions.len(),
                self.temperature,
                self.depth.max_tokens(),
            )
            .await
            .map_err(|source| SimulationError::InterviewSimulation {
                persona_id: persona.id,
                source,
            })?;

        let jitter = rand::rng().random_range(DURATION_JITTER_MINUTES);
        Ok(assemble(draft, persona, group, jitter))
    }
}

/// Build the final interview from a draft
fn assemble(
    draft: InterviewDraft,
    persona: &Persona,
    group: &StakeholderGroup,
    jitter: i32,
) -> SimulatedInterview {
    let responses: Vec<InterviewResponse> = draft
        .responses
        .into_iter()
        .enumerate()
        .map(|(idx, r)| InterviewResponse {
            question: r
                .question
                .filter(|q| !q.trim().is_empty())
                .or_else(|| group.questions.get(idx).cloned())
                .unwrap_or_default(),
            response_text: r.response_text,
            sentiment: r.sentiment,
            key_insights: r.key_insights,
            follow_up_questions: r.follow_up_questions,
        })
        .collect();

    let overall_sentiment = draft
        .overall_sentiment
        .unwrap_or_else(|| Sentiment::aggregate(responses.iter().map(|r| r.sentiment)));

    SimulatedInterview {
        persona_id: persona.id,
        stakeholder_group_id: group.id.clone(),
        duration_minutes: duration_minutes(&responses, jitter),
        responses,
        overall_sentiment,
    }
}

/// Interview length in minutes
///
/// Two minutes per exchange, plus 3/2/1 minutes for answers over 100 words,
/// over 50 words, or shorter; then `jitter`, floored at
/// [`MIN_DURATION_MINUTES`].
#[must_use]
pub fn duration_minutes(responses: &[InterviewResponse], jitter: i32) -> u32 {
    let talk: i64 = responses
        .iter()
        .map(|r| match r.word_count() {
            n if n > 100 => 3,
            n if n > 50 => 2,
            _ => 1,
        })
        .sum();
    let base = 2 * responses.len() as i64;
    let total = base + talk + i64::from(jitter);
    u32::try_from(total.max(i64::from(MIN_DURATION_MINUTES))).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generation::{MockGenerationService, ResponseDraft};
    use crate::types::PersonaId;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn persona() -> Persona {
        Persona {
            id: PersonaId::new(),
            name: "Rosa Ng".to_string(),
            age: 38,
            background: "Runs a bakery".to_string(),
            motivations: vec!["Less waste".to_string()],
            pain_points: vec!["Early mornings".to_string()],
            communication_style: "Direct".to_string(),
            demographic_details: serde_json::Map::new(),
            stakeholder_group_id: "bakers".to_string(),
        }
    }

    fn group() -> StakeholderGroup {
        StakeholderGroup::new("bakers", "Bakery owners")
            .with_questions(["What do you throw away?", "Would you pay for forecasts?"])
    }

    fn response(words: usize) -> InterviewResponse {
        InterviewResponse {
            question: "q".to_string(),
            response_text: vec!["word"; words].join(" "),
            sentiment: Sentiment::Neutral,
            key_insights: Vec::new(),
            follow_up_questions: Vec::new(),
        }
    }

    #[test]
    fn duration_counts_answer_lengths() {
        // 4 exchanges: base 8, talk 3 + 2 + 1 + 1
        let responses = vec![response(120), response(60), response(10), response(50)];
        assert_eq!(duration_minutes(&responses, 0), 15);
        assert_eq!(duration_minutes(&responses, 3), 18);
    }

    #[test]
    fn duration_has_a_floor() {
        assert_eq!(duration_minutes(&[response(5)], -2), MIN_DURATION_MINUTES);
        assert_eq!(duration_minutes(&[], 0), MIN_DURATION_MINUTES);
    }

    proptest! {
        #[test]
        fn prop_duration_never_below_floor(
            lengths in proptest::collection::vec(0usize..200, 0..12),
            jitter in DURATION_JITTER_MINUTES,
        ) {
            let responses: Vec<_> = lengths.into_iter().map(response).collect();
            prop_assert!(duration_minutes(&responses, jitter) >= MIN_DURATION_MINUTES);
        }
    }

    #[test]
    fn assemble_fills_missing_questions_and_sentiment() {
        let draft = InterviewDraft {
            responses: vec![
                ResponseDraft {
                    question: None,
                    response_text: "Mostly bread ends.".to_string(),
                    sentiment: Sentiment::Negative,
                    key_insights: vec![],
                    follow_up_questions: vec![],
                },
                ResponseDraft {
                    question: Some("Custom?".to_string()),
                    response_text: "Maybe.".to_string(),
                    sentiment: Sentiment::Positive,
                    key_insights: vec![],
                    follow_up_questions: vec![],
                },
            ],
            overall_sentiment: None,
        };
        let persona = persona();
        let interview = assemble(draft, &persona, &group(), 0);

        assert_eq!(interview.responses[0].question, "What do you throw away?");
        assert_eq!(interview.responses[1].question, "Custom?");
        assert_eq!(interview.overall_sentiment, Sentiment::Mixed);
        assert_eq!(interview.persona_id, persona.id);
    }

    #[tokio::test]
    async fn simulate_overwrites_identity() {
        let mut service = MockGenerationService::new();
        service.expect_complete().times(1).returning(|req| {
            assert_eq!(req.temperature, 0.9);
            Ok(json!({
                "persona_id": "someone-else",
                "stakeholder_group_id": "wrong",
                "duration_minutes": 999,
                "responses": [{"question": "What do you throw away?", "response_text": "Crusts."}]
            }))
        });

        let simulator = InterviewSimulator::new(
            GenerationClient::new(Arc::new(service)),
            ResponseStyle::Critical,
            Depth::Quick,
            0.9,
        );
        let persona = persona();
        let interview = simulator
            .simulate(&persona, &group(), &BusinessContext::new("Waste forecasting"))
            .await
            .unwrap();

        assert_eq!(interview.persona_id, persona.id);
        assert_eq!(interview.stakeholder_group_id, "bakers");
        assert!(interview.duration_minutes >= MIN_DURATION_MINUTES);
        assert!(interview.duration_minutes < 999);
    }

    #[tokio::test]
    async fn simulate_propagates_failure_without_retry() {
        let mut service = MockGenerationService::new();
        service
            .expect_complete()
            .times(1)
            .returning(|_| Err(GenerationError::malformed("truncated")));

        let simulator = InterviewSimulator::new(
            GenerationClient::new(Arc::new(service)),
            ResponseStyle::Realistic,
            Depth::Detailed,
            0.7,
        );
        let err = simulator
            .simulate(&persona(), &group(), &BusinessContext::new("idea"))
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::InterviewSimulation { .. }));
    }
}

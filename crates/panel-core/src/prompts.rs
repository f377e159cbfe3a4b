//! Prompt construction
//!
//! Persona batches are attempted with a [`PromptStrategy::Full`] prompt first
//! and fall back to [`PromptStrategy::Simplified`], which drops illustrative
//! detail and keeps only the essential fields.

use crate::config::{Depth, ResponseStyle};
use crate::types::{BusinessContext, Persona, StakeholderGroup};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Sample questions shown in persona prompts
pub const SAMPLE_QUESTIONS: usize = 3;

/// Lead-in of the line listing names the service must avoid
pub const USED_NAMES_PREFIX: &str = "These names are already taken, do not reuse them: ";

/// How much detail a persona prompt carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptStrategy {
    /// Context, description, sample questions, field guidance
    Full,
    /// Essential fields only
    Simplified,
}

impl PromptStrategy {
    /// Attempt schedule: one full prompt, then `retries` simplified ones
    pub fn schedule(retries: usize) -> impl Iterator<Item = PromptStrategy> {
        std::iter::once(Self::Full).chain(std::iter::repeat(Self::Simplified).take(retries))
    }
}

/// Build the persona batch prompt for one group
#[must_use]
pub fn persona_prompt(
    strategy: PromptStrategy,
    context: &BusinessContext,
    group: &StakeholderGroup,
    count: usize,
    used_names: &BTreeSet<String>,
) -> String {
    let mut prompt = String::new();

    match strategy {
        PromptStrategy::Full => {
            let _ = writeln!(
                prompt,
                "Create {count} distinct, realistic people who belong to the stakeholder group \"{}\" \
                 and could be interviewed about the business below.",
                group.name
            );
            prompt.push('\n');
            push_context(&mut prompt, context);
            if !group.description.is_empty() {
                let _ = writeln!(prompt, "\nGroup description: {}", group.description);
            }
            if !group.questions.is_empty() {
                prompt.push_str("\nThey will later be asked questions such as:\n");
                for q in group.questions.iter().take(SAMPLE_QUESTIONS) {
                    let _ = writeln!(prompt, "- {q}");
                }
            }
            prompt.push_str(
                "\nFor each person provide: name (full name), age, background (2-3 sentences on \
                 job, life situation and relevant history), motivations (3-4 items), pain_points \
                 (3-4 items tied to the problem), communication_style (how they talk in an \
                 interview) and demographic_details (location, income bracket, education, \
                 household as key/value pairs).\n\
                 Make them differ in age, outlook and circumstances; avoid stereotypes.\n",
            );
        }
        PromptStrategy::Simplified => {
            let _ = writeln!(
                prompt,
                "List {count} people in the group \"{}\" for this business: {}.",
                group.name, context.business_idea
            );
            prompt.push_str(
                "Fields per person: name, age, background, motivations, pain_points, \
                 communication_style, demographic_details.\n",
            );
        }
    }

    if !used_names.is_empty() {
        let names = used_names.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        let _ = writeln!(prompt, "\n{USED_NAMES_PREFIX}{names}");
    }

    let _ = write!(
        prompt,
        "\nReturn only JSON: an object with a \"personas\" array of exactly {count} entries."
    );
    prompt
}

/// Build the interview prompt for one persona
#[must_use]
pub fn interview_prompt(
    persona: &Persona,
    group: &StakeholderGroup,
    context: &BusinessContext,
    style: ResponseStyle,
    depth: Depth,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are {}, a {}-year-old member of the \"{}\" stakeholder group, taking part in a \
         customer-research interview. Stay in character throughout.",
        persona.name, persona.age, group.name
    );

    prompt.push_str("\nProfile:\n");
    let _ = writeln!(prompt, "- Background: {}", persona.background);
    if !persona.motivations.is_empty() {
        let _ = writeln!(prompt, "- Motivations: {}", persona.motivations.join("; "));
    }
    if !persona.pain_points.is_empty() {
        let _ = writeln!(prompt, "- Pain points: {}", persona.pain_points.join("; "));
    }
    if !persona.communication_style.is_empty() {
        let _ = writeln!(prompt, "- Communication style: {}", persona.communication_style);
    }
    for (key, value) in &persona.demographic_details {
        match value.as_str() {
            Some(text) => {
                let _ = writeln!(prompt, "- {key}: {text}");
            }
            None => {
                let _ = writeln!(prompt, "- {key}: {value}");
            }
        }
    }

    prompt.push('\n');
    push_context(&mut prompt, context);

    prompt.push_str("\nAnswer these questions in order:\n");
    for (idx, q) in group.questions.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {q}", idx + 1);
    }

    let _ = writeln!(prompt, "\n{}\n{}", style.guidance(), depth.answer_guidance());
    let _ = write!(
        prompt,
        "\nReturn only JSON: an object with a \"responses\" array of {} entries, each with \
         question, response_text, sentiment (positive|negative|neutral|mixed), key_insights and \
         follow_up_questions, plus an overall_sentiment.",
        group.questions.len()
    );
    prompt
}

fn push_context(prompt: &mut String, context: &BusinessContext) {
    let _ = writeln!(prompt, "Business idea: {}", context.business_idea);
    if !context.target_customer.is_empty() {
        let _ = writeln!(prompt, "Target customer: {}", context.target_customer);
    }
    if !context.problem.is_empty() {
        let _ = writeln!(prompt, "Problem: {}", context.problem);
    }
    if !context.industry.is_empty() {
        let _ = writeln!(prompt, "Industry: {}", context.industry);
    }
}

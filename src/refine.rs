//! Conversational goal refinement.
//!
//! A [`Session`] walks a small state machine: the user enters a goal
//! (`Input`), answers clarifying questions (`Questions`), the pipeline runs
//! (`Generating`), and the report lands (`Complete`). A failed run returns
//! to `Questions` with the answers preserved, so the user can retry without
//! retyping; a completed session can be restarted with a fresh goal.
//!
//! The session holds state only. It never runs the pipeline itself; the
//! caller drives transitions and stores the outcome back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{Report, ResearchGoal};
use crate::planner::normalize_goal;

/// Number of clarifying questions asked per session.
pub const QUESTION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for a research goal.
    Input,
    /// Goal captured, collecting answers to the clarifying questions.
    Questions,
    /// Pipeline run in flight.
    Generating,
    /// Report available.
    Complete,
}

/// One refinement conversation, serializable across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    pub goal: Option<String>,
    pub questions: Vec<String>,
    /// Aligned with `questions`; empty string means "skipped".
    pub answers: Vec<String>,
    pub report: Option<Report>,
    pub last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Input,
            goal: None,
            questions: Vec::new(),
            answers: Vec::new(),
            report: None,
            last_error: None,
        }
    }

    /// `Input -> Questions`: capture the goal and pose the questions.
    pub fn submit_goal(&mut self, goal: &str) -> Result<&[String], PipelineError> {
        if self.state != SessionState::Input {
            return Err(PipelineError::InvalidGoal(format!(
                "cannot submit a goal in the {:?} state",
                self.state
            )));
        }
        let goal = normalize_goal(goal);
        if goal.trim().len() < 3 {
            return Err(PipelineError::InvalidGoal(
                "research goal must be at least 3 characters".to_string(),
            ));
        }
        self.questions = clarifying_questions(&goal);
        self.goal = Some(goal);
        self.answers.clear();
        self.state = SessionState::Questions;
        Ok(&self.questions)
    }

    /// `Questions -> Generating`: record the answers and mark the run as
    /// started. Missing answers are treated as skipped.
    pub fn submit_answers(&mut self, answers: Vec<String>) -> Result<ResearchGoal, PipelineError> {
        if self.state != SessionState::Questions {
            return Err(PipelineError::InvalidGoal(format!(
                "cannot submit answers in the {:?} state",
                self.state
            )));
        }
        let mut answers = answers;
        answers.resize(self.questions.len(), String::new());
        self.answers = answers;
        self.state = SessionState::Generating;
        Ok(self.refined_goal())
    }

    /// `Generating -> Complete` on success.
    pub fn complete(&mut self, report: Report) -> Result<(), PipelineError> {
        if self.state != SessionState::Generating {
            return Err(PipelineError::InvalidGoal(format!(
                "cannot complete a run in the {:?} state",
                self.state
            )));
        }
        self.report = Some(report);
        self.last_error = None;
        self.state = SessionState::Complete;
        Ok(())
    }

    /// `Generating -> Questions` on failure, answers preserved.
    pub fn fail(&mut self, error: &PipelineError) -> Result<(), PipelineError> {
        if self.state != SessionState::Generating {
            return Err(PipelineError::InvalidGoal(format!(
                "cannot record a run failure in the {:?} state",
                self.state
            )));
        }
        self.last_error = Some(error.to_string());
        self.state = SessionState::Questions;
        Ok(())
    }

    /// `Complete -> Input`: start over with a fresh goal, keeping the
    /// session id.
    pub fn restart(&mut self) -> Result<(), PipelineError> {
        if self.state != SessionState::Complete {
            return Err(PipelineError::InvalidGoal(format!(
                "cannot restart in the {:?} state",
                self.state
            )));
        }
        self.goal = None;
        self.questions.clear();
        self.answers.clear();
        self.report = None;
        self.last_error = None;
        self.state = SessionState::Input;
        Ok(())
    }

    /// The goal the pipeline should run on: the original text plus every
    /// answered question folded in as context. Skipped questions are
    /// omitted entirely.
    pub fn refined_goal(&self) -> ResearchGoal {
        let original = self.goal.clone().unwrap_or_default();
        let qa_pairs: Vec<(String, String)> = self
            .questions
            .iter()
            .zip(self.answers.iter())
            .filter(|(_, a)| !a.trim().is_empty())
            .map(|(q, a)| (q.clone(), a.trim().to_string()))
            .collect();

        if qa_pairs.is_empty() {
            return ResearchGoal::new(original);
        }

        let context: Vec<String> = qa_pairs.iter().map(|(_, a)| a.clone()).collect();
        ResearchGoal {
            text: format!("{} ({})", original, context.join("; ")),
            original: Some(original),
            qa_pairs,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed clarifying questions, parameterized by the goal text.
pub fn clarifying_questions(goal: &str) -> Vec<String> {
    vec![
        format!(
            "Which specific aspect of \"{}\" matters most to you (e.g. theory, tooling, deployment)?",
            goal
        ),
        "Is there a particular application domain or industry to focus on?".to_string(),
        "Should the report emphasize recent work (last 2-3 years) or include foundational literature?"
            .to_string(),
    ]
}

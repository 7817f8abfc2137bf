//! Goal-to-plan expansion.
//!
//! Turns a research goal into a [`SubtopicPlan`]: the fixed canonical
//! checklist of analytical subtopics, each with search queries derived from
//! the goal text, subtopic templates, and any detected domain keywords.
//! Pure function of its input — planning never touches external state and
//! never fails.

use serde::{Deserialize, Serialize};

/// One analytical lens of the report, with its search queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtopic {
    pub name: String,
    pub description: String,
    pub queries: Vec<String>,
}

/// Ordered plan produced from one goal. Order determines section order
/// in the final report; read-only after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtopicPlan {
    pub goal: String,
    pub subtopics: Vec<Subtopic>,
}

/// The canonical subtopic checklist. Every plan emits exactly these, in
/// this order, regardless of goal content.
pub const CANONICAL_SUBTOPICS: [(&str, &str, &str); 8] = [
    (
        "Background & definitions",
        "Establish common terminology and scope to avoid ambiguity when surveying literature.",
        "survey introduction",
    ),
    (
        "State of the art",
        "Identify seminal papers and recent advances that define the field.",
        "state of the art recent advances",
    ),
    (
        "Methods & approaches",
        "Map techniques and architectures used to tackle the goal.",
        "methods approaches techniques",
    ),
    (
        "Datasets & benchmarks",
        "List public datasets and benchmarks used for comparison.",
        "datasets benchmarks",
    ),
    (
        "Evaluation metrics",
        "Clarify how progress is measured to compare methods fairly.",
        "evaluation metrics",
    ),
    (
        "Applications & case studies",
        "Show real-world usage and lessons learned.",
        "applications case studies",
    ),
    (
        "Challenges & limitations",
        "Surface practical blockers, ethical issues, and failure modes.",
        "challenges limitations failure modes",
    ),
    (
        "Open problems & research gaps",
        "Highlight under-explored areas and unanswered questions.",
        "open problems research gaps",
    ),
];

/// Domain keyword → extra query terms mixed into every subtopic's queries
/// when the keyword appears in the goal.
const DOMAIN_HINTS: [(&str, &str); 8] = [
    ("robot", "multi-agent coordination"),
    ("disaster", "search and rescue"),
    ("health", "clinical validation"),
    ("finance", "risk and compliance"),
    ("llm", "retrieval-augmented generation"),
    ("machine learning", "neural networks"),
    ("climate", "geospatial datasets"),
    ("education", "learning outcomes"),
];

const STOPWORDS: [&str; 20] = [
    "latest", "recent", "developments", "the", "a", "an", "for", "in", "of", "and", "to", "on",
    "with", "towards", "into", "about", "overview", "state", "art", "research",
];

/// Collapse whitespace and capitalize the first letter.
pub fn normalize_goal(goal: &str) -> String {
    let collapsed = goal.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => collapsed,
    }
}

/// Keyword tokens of the goal: alphanumeric runs, lowercased, stopwords and
/// short tokens removed.
pub fn extract_keywords(goal: &str) -> Vec<String> {
    goal.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() > 2 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Domain hint terms whose trigger keyword occurs in the goal.
pub fn domain_hints(goal: &str) -> Vec<String> {
    let lower = goal.to_lowercase();
    DOMAIN_HINTS
        .iter()
        .filter(|(kw, _)| lower.contains(kw))
        .map(|(_, hint)| hint.to_string())
        .collect()
}

/// Build the plan for a goal.
///
/// If the goal yields no extractable keywords, the raw goal string becomes
/// the sole query for every subtopic.
pub fn plan(goal: &str) -> SubtopicPlan {
    let goal = normalize_goal(goal);
    let keywords = extract_keywords(&goal);
    let hints = domain_hints(&goal);

    let subtopics = CANONICAL_SUBTOPICS
        .iter()
        .map(|(name, description, template)| {
            let queries = if keywords.is_empty() {
                vec![goal.clone()]
            } else {
                let mut queries = vec![format!("{} {}", goal, template)];
                for hint in &hints {
                    queries.push(format!("{} {} {}", goal, hint, template));
                }
                queries
            };
            Subtopic {
                name: name.to_string(),
                description: description.to_string(),
                queries,
            }
        })
        .collect();

    SubtopicPlan { goal, subtopics }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_emits_canonical_checklist() {
        let plan = plan("swarm robotics for disaster response");
        assert_eq!(plan.subtopics.len(), CANONICAL_SUBTOPICS.len());
        for (subtopic, (name, _, _)) in plan.subtopics.iter().zip(CANONICAL_SUBTOPICS.iter()) {
            assert_eq!(&subtopic.name, name);
            assert!(!subtopic.queries.is_empty());
        }
    }

    #[test]
    fn test_plan_is_checklist_regardless_of_goal() {
        let a = plan("quantum error correction");
        let b = plan("soil moisture sensing");
        let names_a: Vec<_> = a.subtopics.iter().map(|s| &s.name).collect();
        let names_b: Vec<_> = b.subtopics.iter().map(|s| &s.name).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_domain_hints_augment_queries() {
        let plan = plan("robot swarm coordination");
        // Every subtopic carries an extra hint-augmented query
        for subtopic in &plan.subtopics {
            assert!(subtopic.queries.len() >= 2);
            assert!(subtopic
                .queries
                .iter()
                .any(|q| q.contains("multi-agent coordination")));
        }
    }

    #[test]
    fn test_no_keywords_falls_back_to_raw_goal() {
        // Every token is a stopword or too short
        let plan = plan("the art of in");
        for subtopic in &plan.subtopics {
            assert_eq!(subtopic.queries, vec!["The art of in".to_string()]);
        }
    }

    #[test]
    fn test_normalize_goal() {
        assert_eq!(normalize_goal("  swarm   robotics  "), "Swarm robotics");
        assert_eq!(normalize_goal(""), "");
    }

    #[test]
    fn test_extract_keywords_filters_stopwords() {
        let kw = extract_keywords("the latest developments in swarm robotics");
        assert_eq!(kw, vec!["swarm", "robotics"]);
    }
}

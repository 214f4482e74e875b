//! Question sets: the build-time input surface.
//!
//! A question file is a JSON array of questions with their alternatives and
//! correct-answer marks. Loading normalizes all text once, up front, so that
//! hashing and key derivation downstream never see unnormalized input. A
//! question with an empty `correct_answers` list is treated as all-correct,
//! matching the historical file format; the loader reports how many were
//! defaulted that way so the caller can warn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::kit::Selection;
use crate::kit::format_v3::KitV3;
use crate::kit::hasher;

#[derive(Debug, Error)]
pub enum QuestionError {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("question file is not valid json")]
    Json(#[from] serde_json::Error),

    #[error("question file contains no questions")]
    Empty,

    #[error("question {id}: {reason}")]
    InvalidQuestion { id: u64, reason: &'static str },

    #[error("selection names an unknown question: {0}")]
    UnknownQuestion(String),

    #[error("selection names an unknown answer '{answer}' for question: {question}")]
    UnknownAnswer { question: String, answer: String },
}

/// A question with its correct-answer marks, fully normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub text: String,
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub is_critical: bool,
}

impl Question {
    pub fn integrity_hash(&self) -> String {
        hasher::question_hash(&self.text, &self.alternatives)
    }

    pub fn is_correct(&self, alternative: &str) -> bool {
        let normalized = hasher::norm(alternative);
        self.correct_answers.iter().any(|c| *c == normalized)
    }
}

/// Result of loading a question file.
#[derive(Debug)]
pub struct LoadedQuestions {
    pub questions: Vec<Question>,
    /// Questions whose empty `correct_answers` was defaulted to all-correct.
    pub defaulted_all_correct: usize,
}

/// Load and normalize a question file.
pub fn load_questions(path: &Path) -> Result<LoadedQuestions, QuestionError> {
    let bytes = std::fs::read(path)?;
    parse_questions(&bytes)
}

pub fn parse_questions(bytes: &[u8]) -> Result<LoadedQuestions, QuestionError> {
    let raw: Vec<Question> = serde_json::from_slice(bytes)?;
    if raw.is_empty() {
        return Err(QuestionError::Empty);
    }

    let mut defaulted = 0usize;
    let mut questions = Vec::with_capacity(raw.len());
    for mut question in raw {
        question.text = hasher::norm(&question.text);
        question.alternatives = question.alternatives.iter().map(|a| hasher::norm(a)).collect();
        question.correct_answers = question
            .correct_answers
            .iter()
            .map(|a| hasher::norm(a))
            .collect();

        validate_question(&question)?;

        if question.correct_answers.is_empty() {
            question.correct_answers = question.alternatives.clone();
            defaulted += 1;
        }

        questions.push(question);
    }

    let mut seen = BTreeSet::new();
    for question in &questions {
        if !seen.insert(question.integrity_hash()) {
            return Err(QuestionError::InvalidQuestion {
                id: question.id,
                reason: "duplicate question content",
            });
        }
    }

    Ok(LoadedQuestions {
        questions,
        defaulted_all_correct: defaulted,
    })
}

fn validate_question(question: &Question) -> Result<(), QuestionError> {
    let invalid = |reason| QuestionError::InvalidQuestion {
        id: question.id,
        reason,
    };

    if question.text.is_empty() {
        return Err(invalid("empty text"));
    }
    if question.alternatives.is_empty() {
        return Err(invalid("no alternatives"));
    }

    let unique: BTreeSet<&String> = question.alternatives.iter().collect();
    if unique.len() != question.alternatives.len() {
        return Err(invalid("duplicate alternatives after normalization"));
    }

    for correct in &question.correct_answers {
        if !question.alternatives.contains(correct) {
            return Err(invalid("correct answer not among alternatives"));
        }
    }

    Ok(())
}

/// One respondent entry in a selection file: a question and the answers
/// picked for it, all by text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub question: String,
    #[serde(default)]
    pub answers: Vec<String>,
}

pub fn load_selections(path: &Path) -> Result<Vec<SelectionEntry>, QuestionError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Resolve textual selections against a kit's embedded questions.
///
/// Matching is by normalized text on both sides; anything that does not
/// resolve is an input error, not a silent skip.
pub fn resolve_selections(
    entries: &[SelectionEntry],
    kit: &KitV3,
) -> Result<Vec<Selection>, QuestionError> {
    let mut selections = Vec::new();

    for entry in entries {
        let wanted = hasher::norm(&entry.question);
        let question = kit
            .questions
            .iter()
            .find(|q| hasher::norm(&q.text) == wanted)
            .ok_or_else(|| QuestionError::UnknownQuestion(entry.question.clone()))?;

        for answer in &entry.answers {
            let normalized = hasher::norm(answer);
            let alternative = question
                .alternatives
                .iter()
                .find(|alt| hasher::norm(alt) == normalized)
                .ok_or_else(|| QuestionError::UnknownAnswer {
                    question: entry.question.clone(),
                    answer: answer.clone(),
                })?;

            selections.push(Selection {
                q_hash: question.integrity_hash.clone(),
                alt_hash: hasher::alt_hash(alternative),
                question: question.text.clone(),
                answer: alternative.clone(),
            });
        }
    }

    Ok(selections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> Vec<u8> {
        serde_json::json!([
            {
                "id": 1,
                "text": "First pet's name?",
                "alternatives": ["Rex", "Milo", "Luna"],
                "correct_answers": ["Milo"],
                "is_critical": false
            },
            {
                "id": 2,
                "text": "Street you grew up on?",
                "alternatives": ["Elm", "Oak"],
                "correct_answers": []
            }
        ])
        .to_string()
        .into_bytes()
    }

    #[test]
    fn parse_defaults_empty_correct_answers_to_all() {
        let loaded = parse_questions(&sample_json()).unwrap();
        assert_eq!(loaded.questions.len(), 2);
        assert_eq!(loaded.defaulted_all_correct, 1);
        assert_eq!(loaded.questions[1].correct_answers, vec!["Elm", "Oak"]);
    }

    #[test]
    fn parse_rejects_empty_file_and_bad_questions() {
        assert!(matches!(
            parse_questions(b"[]"),
            Err(QuestionError::Empty)
        ));

        let dup = serde_json::json!([
            {"id": 7, "text": "Q?", "alternatives": ["a", "a"], "correct_answers": []}
        ])
        .to_string();
        assert!(matches!(
            parse_questions(dup.as_bytes()),
            Err(QuestionError::InvalidQuestion { id: 7, .. })
        ));

        let orphan = serde_json::json!([
            {"id": 8, "text": "Q?", "alternatives": ["a"], "correct_answers": ["b"]}
        ])
        .to_string();
        assert!(parse_questions(orphan.as_bytes()).is_err());
    }

    #[test]
    fn is_correct_matches_normalized_text() {
        let loaded = parse_questions(&sample_json()).unwrap();
        let q = &loaded.questions[0];
        assert!(q.is_correct("Milo"));
        // Fullwidth letters normalize to ASCII before comparison.
        assert!(q.is_correct("\u{ff2d}ilo"));
        assert!(!q.is_correct("Rex\0extra"));
    }
}

//! crates/devlingo_core/src/rows.rs
//!
//! Flat curriculum rows as the stores hand them over. Optional columns are
//! resolved here with fixed defaults so the aggregator only sees complete values.

use uuid::Uuid;

pub const DEFAULT_UNIT_TITLE: &str = "Unit";

#[derive(Debug, Clone)]
pub struct UnitRow {
    pub id: Uuid,
    pub title: Option<String>,
    pub level: Option<String>,
}

impl UnitRow {
    pub fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| DEFAULT_UNIT_TITLE.to_string())
    }

    pub fn level(&self) -> String {
        self.level
            .clone()
            .unwrap_or_else(|| format!("{} {}", DEFAULT_UNIT_TITLE, self.id))
    }
}

#[derive(Debug, Clone)]
pub struct LessonRow {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub xp_reward: Option<i32>,
}

impl LessonRow {
    pub fn description(&self) -> String {
        self.description.clone().unwrap_or_default()
    }

    /// Missing or negative rewards count as zero.
    pub fn xp_reward(&self) -> u32 {
        self.xp_reward
            .map(|xp| u32::try_from(xp).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub question_text: String,
    pub position: i32,
}

#[derive(Debug, Clone)]
pub struct OptionRow {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// The slice of a completion record the aggregator needs.
#[derive(Debug, Clone)]
pub struct CompletionRow {
    pub lesson_id: Uuid,
    pub is_completed: bool,
}

/// Everything one aggregation pass reads, fetched together.
#[derive(Debug, Clone, Default)]
pub struct CurriculumRows {
    pub units: Vec<UnitRow>,
    pub lessons: Vec<LessonRow>,
    pub questions: Vec<QuestionRow>,
    pub options: Vec<OptionRow>,
    pub completions: Vec<CompletionRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_row_falls_back_to_generic_labels() {
        let id = Uuid::new_v4();
        let row = UnitRow { id, title: None, level: None };
        assert_eq!(row.title(), "Unit");
        assert_eq!(row.level(), format!("Unit {}", id));
    }

    #[test]
    fn lesson_row_clamps_xp_and_defaults_description() {
        let mut row = LessonRow {
            id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            title: "Variables".to_string(),
            description: None,
            xp_reward: None,
        };
        assert_eq!(row.xp_reward(), 0);
        assert_eq!(row.description(), "");

        row.xp_reward = Some(-5);
        assert_eq!(row.xp_reward(), 0);

        row.xp_reward = Some(15);
        assert_eq!(row.xp_reward(), 15);
    }
}

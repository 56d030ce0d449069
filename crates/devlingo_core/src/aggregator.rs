//! crates/devlingo_core/src/aggregator.rs
//!
//! Builds the learning path: joins flat curriculum rows with a user's completion
//! facts into units -> lessons -> questions, and derives which unit is open.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::{Lesson, Question, Unit, UnitStatus};
use crate::ports::{CurriculumStore, PortResult};
use crate::rows::{CurriculumRows, LessonRow, OptionRow, QuestionRow};

/// Merges curriculum rows and completion rows into the ordered unit tree.
///
/// Pure. Exactly one unit ends up `Available` (the first one not completed)
/// unless every unit is completed, in which case none is.
pub fn aggregate(rows: CurriculumRows) -> Vec<Unit> {
    let CurriculumRows {
        units,
        lessons,
        questions,
        options,
        completions,
    } = rows;

    let completed_lessons: HashSet<Uuid> = completions
        .into_iter()
        .filter(|c| c.is_completed)
        .map(|c| c.lesson_id)
        .collect();

    let mut lessons_by_unit: HashMap<Uuid, Vec<LessonRow>> = HashMap::new();
    for lesson in lessons {
        lessons_by_unit.entry(lesson.unit_id).or_default().push(lesson);
    }

    let mut questions_by_lesson = group_questions(questions, options);

    let mut mapped: Vec<Unit> = units
        .into_iter()
        .map(|unit| {
            let lessons: Vec<Lesson> = lessons_by_unit
                .remove(&unit.id)
                .unwrap_or_default()
                .into_iter()
                .map(|row| Lesson {
                    id: row.id,
                    title: row.title.clone(),
                    description: row.description(),
                    xp: row.xp_reward(),
                    completed: completed_lessons.contains(&row.id),
                    questions: questions_by_lesson.remove(&row.id).unwrap_or_default(),
                })
                .collect();

            let unit_completed = !lessons.is_empty() && lessons.iter().all(|l| l.completed);

            Unit {
                id: unit.id,
                title: unit.title(),
                level: unit.level(),
                status: if unit_completed {
                    UnitStatus::Completed
                } else {
                    UnitStatus::Locked
                },
                lessons,
            }
        })
        .collect();

    if let Some(first_open) = mapped
        .iter_mut()
        .find(|unit| unit.status != UnitStatus::Completed)
    {
        first_open.status = UnitStatus::Available;
    }

    mapped
}

/// Attaches sorted options to their questions and groups the questions per lesson.
fn group_questions(
    questions: Vec<QuestionRow>,
    options: Vec<OptionRow>,
) -> HashMap<Uuid, Vec<Question>> {
    let mut options_by_question: HashMap<Uuid, Vec<OptionRow>> = HashMap::new();
    for option in options {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(option);
    }

    let mut questions = questions;
    questions.sort_by_key(|q| q.position);

    let mut by_lesson: HashMap<Uuid, Vec<Question>> = HashMap::new();
    for question in questions {
        let mut opts = options_by_question.remove(&question.id).unwrap_or_default();
        opts.sort_by_key(|o| o.position);

        // No flagged option is a content error; fall back to the first one.
        let correct_answer = opts.iter().position(|o| o.is_correct).unwrap_or(0);

        by_lesson.entry(question.lesson_id).or_default().push(Question {
            id: question.id,
            title: question.question_text,
            options: opts.into_iter().map(|o| o.option_text).collect(),
            correct_answer,
        });
    }
    by_lesson
}

/// Loads the five row sets concurrently and aggregates them for `user_id`.
///
/// Any failed read degrades the whole result to an empty list. Callers must read
/// an empty list as "could not load", not as "no units exist".
pub async fn load_units(store: &dyn CurriculumStore, user_id: Uuid) -> Vec<Unit> {
    match fetch_rows(store, user_id).await {
        Ok(rows) => {
            let units = aggregate(rows);
            debug!("Aggregated {} units for user {}", units.len(), user_id);
            units
        }
        Err(e) => {
            error!("Failed to load units for user {}: {}", user_id, e);
            Vec::new()
        }
    }
}

async fn fetch_rows(store: &dyn CurriculumStore, user_id: Uuid) -> PortResult<CurriculumRows> {
    let (units, lessons, completions, questions, options) = futures::try_join!(
        store.fetch_units(),
        store.fetch_lessons(),
        store.fetch_completions(user_id),
        store.fetch_questions(),
        store.fetch_options(),
    )?;

    Ok(CurriculumRows {
        units,
        lessons,
        questions,
        options,
        completions,
    })
}

/// Finds a lesson and its parent unit in an aggregated tree.
pub fn find_lesson(units: &[Unit], lesson_id: Uuid) -> Option<(&Unit, &Lesson)> {
    units.iter().find_map(|unit| {
        unit.lessons
            .iter()
            .find(|lesson| lesson.id == lesson_id)
            .map(|lesson| (unit, lesson))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use crate::rows::{CompletionRow, UnitRow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unit(title: &str) -> UnitRow {
        UnitRow {
            id: Uuid::new_v4(),
            title: Some(title.to_string()),
            level: Some(format!("Level of {}", title)),
        }
    }

    fn lesson(unit_id: Uuid, title: &str, xp: Option<i32>) -> LessonRow {
        LessonRow {
            id: Uuid::new_v4(),
            unit_id,
            title: title.to_string(),
            description: None,
            xp_reward: xp,
        }
    }

    fn question(lesson_id: Uuid, text: &str, position: i32) -> QuestionRow {
        QuestionRow {
            id: Uuid::new_v4(),
            lesson_id,
            question_text: text.to_string(),
            position,
        }
    }

    fn option(question_id: Uuid, text: &str, is_correct: bool, position: i32) -> OptionRow {
        OptionRow {
            id: Uuid::new_v4(),
            question_id,
            option_text: text.to_string(),
            is_correct,
            position,
        }
    }

    fn done(lesson_id: Uuid) -> CompletionRow {
        CompletionRow {
            lesson_id,
            is_completed: true,
        }
    }

    fn available_count(units: &[Unit]) -> usize {
        units
            .iter()
            .filter(|u| u.status == UnitStatus::Available)
            .count()
    }

    #[test]
    fn first_incomplete_unit_becomes_available() {
        let a = unit("A");
        let b = unit("B");
        let a1 = lesson(a.id, "a1", Some(10));
        let a2 = lesson(a.id, "a2", Some(10));
        let b1 = lesson(b.id, "b1", Some(10));

        let units = aggregate(CurriculumRows {
            completions: vec![done(a1.id), done(a2.id)],
            units: vec![a, b],
            lessons: vec![a1, a2, b1],
            ..Default::default()
        });

        assert_eq!(units[0].status, UnitStatus::Completed);
        assert_eq!(units[1].status, UnitStatus::Available);
    }

    #[test]
    fn units_after_the_available_one_stay_locked() {
        let rows: Vec<UnitRow> = (0..4).map(|i| unit(&format!("U{}", i))).collect();
        let lessons: Vec<LessonRow> = rows.iter().map(|u| lesson(u.id, "l", None)).collect();
        let completions = vec![done(lessons[0].id)];

        let units = aggregate(CurriculumRows {
            units: rows,
            lessons,
            completions,
            ..Default::default()
        });

        let statuses: Vec<UnitStatus> = units.iter().map(|u| u.status).collect();
        assert_eq!(
            statuses,
            vec![
                UnitStatus::Completed,
                UnitStatus::Available,
                UnitStatus::Locked,
                UnitStatus::Locked
            ]
        );
    }

    #[test]
    fn no_unit_is_available_when_everything_is_completed() {
        let a = unit("A");
        let b = unit("B");
        let a1 = lesson(a.id, "a1", None);
        let b1 = lesson(b.id, "b1", None);

        let units = aggregate(CurriculumRows {
            completions: vec![done(a1.id), done(b1.id)],
            units: vec![a, b],
            lessons: vec![a1, b1],
            ..Default::default()
        });

        assert_eq!(available_count(&units), 0);
        assert!(units.iter().all(|u| u.status == UnitStatus::Completed));
    }

    #[test]
    fn empty_unit_is_never_completed() {
        let empty = unit("Empty");
        let next = unit("Next");
        let n1 = lesson(next.id, "n1", None);

        let units = aggregate(CurriculumRows {
            completions: vec![done(n1.id)],
            units: vec![empty, next],
            lessons: vec![n1],
            ..Default::default()
        });

        assert_eq!(units[0].status, UnitStatus::Available);
        assert_eq!(units[1].status, UnitStatus::Completed);
    }

    #[test]
    fn exactly_one_available_across_completion_patterns() {
        for mask in 0u8..16 {
            let rows: Vec<UnitRow> = (0..4).map(|i| unit(&format!("U{}", i))).collect();
            let lessons: Vec<LessonRow> = rows.iter().map(|u| lesson(u.id, "l", None)).collect();
            let completions: Vec<CompletionRow> = lessons
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, l)| done(l.id))
                .collect();

            let units = aggregate(CurriculumRows {
                units: rows,
                lessons,
                completions,
                ..Default::default()
            });

            let expected = if mask == 0b1111 { 0 } else { 1 };
            assert_eq!(available_count(&units), expected, "mask {:04b}", mask);
        }
    }

    #[test]
    fn completion_requires_completed_flag() {
        let a = unit("A");
        let a1 = lesson(a.id, "a1", None);
        let a2 = lesson(a.id, "a2", None);

        let units = aggregate(CurriculumRows {
            completions: vec![
                done(a1.id),
                CompletionRow {
                    lesson_id: a2.id,
                    is_completed: false,
                },
            ],
            units: vec![a],
            lessons: vec![a1, a2],
            ..Default::default()
        });

        let lessons = &units[0].lessons;
        assert!(lessons[0].completed);
        assert!(!lessons[1].completed);
        assert_eq!(units[0].status, UnitStatus::Available);
    }

    #[test]
    fn questions_and_options_follow_position_order() {
        let a = unit("A");
        let a1 = lesson(a.id, "a1", Some(20));
        let q_second = question(a1.id, "second", 2);
        let q_first = question(a1.id, "first", 1);
        let options = vec![
            option(q_first.id, "c", false, 3),
            option(q_first.id, "a", false, 1),
            option(q_first.id, "b", true, 2),
            option(q_second.id, "x", false, 1),
        ];

        let units = aggregate(CurriculumRows {
            units: vec![a],
            lessons: vec![a1],
            questions: vec![q_second, q_first],
            options,
            ..Default::default()
        });

        let questions = &units[0].lessons[0].questions;
        assert_eq!(questions[0].title, "first");
        assert_eq!(questions[0].options, vec!["a", "b", "c"]);
        assert_eq!(questions[0].correct_answer, 1);
        assert_eq!(questions[1].title, "second");
        // Nothing flagged correct.
        assert_eq!(questions[1].correct_answer, 0);
    }

    #[test]
    fn correct_index_is_stable_under_input_reordering() {
        let a = unit("A");
        let a1 = lesson(a.id, "a1", None);
        let q = question(a1.id, "q", 1);
        let mut options = vec![
            option(q.id, "zero", false, 0),
            option(q.id, "one", false, 1),
            option(q.id, "two", true, 2),
        ];

        let first = aggregate(CurriculumRows {
            units: vec![a.clone()],
            lessons: vec![a1.clone()],
            questions: vec![q.clone()],
            options: options.clone(),
            ..Default::default()
        });
        options.reverse();
        let second = aggregate(CurriculumRows {
            units: vec![a],
            lessons: vec![a1],
            questions: vec![q],
            options,
            ..Default::default()
        });

        assert_eq!(
            first[0].lessons[0].questions[0],
            second[0].lessons[0].questions[0]
        );
        assert_eq!(second[0].lessons[0].questions[0].correct_answer, 2);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let a = unit("A");
        let a1 = lesson(a.id, "a1", Some(5));
        let rows = CurriculumRows {
            completions: vec![done(a1.id)],
            units: vec![a],
            lessons: vec![a1],
            ..Default::default()
        };

        let first = aggregate(rows.clone());
        let second = aggregate(rows);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].status, second[0].status);
        assert_eq!(first[0].lessons[0].completed, second[0].lessons[0].completed);
        assert_eq!(first[0].lessons[0].xp, 5);
    }

    #[test]
    fn orphan_lessons_are_dropped() {
        let a = unit("A");
        let orphan = lesson(Uuid::new_v4(), "orphan", None);
        let units = aggregate(CurriculumRows {
            units: vec![a],
            lessons: vec![orphan],
            ..Default::default()
        });
        assert!(units[0].lessons.is_empty());
    }

    #[test]
    fn find_lesson_returns_parent_unit() {
        let a = unit("A");
        let b = unit("B");
        let b1 = lesson(b.id, "b1", None);
        let wanted = b1.id;
        let units = aggregate(CurriculumRows {
            units: vec![a, b],
            lessons: vec![b1],
            ..Default::default()
        });

        let (parent, found) = find_lesson(&units, wanted).expect("lesson present");
        assert_eq!(parent.title, "B");
        assert_eq!(found.id, wanted);
        assert!(find_lesson(&units, Uuid::new_v4()).is_none());
    }

    //=====================================================================================
    // load_units
    //=====================================================================================

    struct FakeStore {
        rows: CurriculumRows,
        fail_options: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CurriculumStore for FakeStore {
        async fn fetch_units(&self) -> PortResult<Vec<UnitRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.units.clone())
        }

        async fn fetch_lessons(&self) -> PortResult<Vec<LessonRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.lessons.clone())
        }

        async fn fetch_questions(&self) -> PortResult<Vec<QuestionRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.questions.clone())
        }

        async fn fetch_options(&self) -> PortResult<Vec<OptionRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_options {
                return Err(PortError::Unexpected("connection reset".to_string()));
            }
            Ok(self.rows.options.clone())
        }

        async fn fetch_completions(&self, _user_id: Uuid) -> PortResult<Vec<CompletionRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.completions.clone())
        }
    }

    fn store(fail_options: bool) -> FakeStore {
        let a = unit("A");
        let a1 = lesson(a.id, "a1", Some(10));
        FakeStore {
            rows: CurriculumRows {
                units: vec![a],
                lessons: vec![a1],
                ..Default::default()
            },
            fail_options,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn load_units_aggregates_all_reads() {
        let store = store(false);
        let units = load_units(&store, Uuid::new_v4()).await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].status, UnitStatus::Available);
        assert_eq!(store.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn load_units_degrades_to_empty_on_any_failure() {
        let store = store(true);
        let units = load_units(&store, Uuid::new_v4()).await;
        assert!(units.is_empty());
    }
}

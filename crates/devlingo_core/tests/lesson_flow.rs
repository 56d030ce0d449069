use async_trait::async_trait;
use chrono::Utc;
use devlingo_core::rows::{CompletionRow, LessonRow, OptionRow, QuestionRow, UnitRow};
use devlingo_core::{
    find_lesson, load_units, CompletionRecord, CompletionRecorder, CurriculumStore,
    LessonSession, Outcome, PortResult, Step, UnitStatus,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Curriculum plus a completion table, all in memory.
struct MemoryBackend {
    units: Vec<UnitRow>,
    lessons: Vec<LessonRow>,
    questions: Vec<QuestionRow>,
    options: Vec<OptionRow>,
    completions: Mutex<HashMap<(Uuid, Uuid), u32>>,
}

#[async_trait]
impl CurriculumStore for MemoryBackend {
    async fn fetch_units(&self) -> PortResult<Vec<UnitRow>> {
        Ok(self.units.clone())
    }

    async fn fetch_lessons(&self) -> PortResult<Vec<LessonRow>> {
        Ok(self.lessons.clone())
    }

    async fn fetch_questions(&self) -> PortResult<Vec<QuestionRow>> {
        Ok(self.questions.clone())
    }

    async fn fetch_options(&self) -> PortResult<Vec<OptionRow>> {
        Ok(self.options.clone())
    }

    async fn fetch_completions(&self, user_id: Uuid) -> PortResult<Vec<CompletionRow>> {
        let completions = self.completions.lock().unwrap();
        Ok(completions
            .keys()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, lesson_id)| CompletionRow {
                lesson_id: *lesson_id,
                is_completed: true,
            })
            .collect())
    }
}

#[async_trait]
impl CompletionRecorder for MemoryBackend {
    async fn upsert_completion(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        xp_earned: u32,
    ) -> PortResult<CompletionRecord> {
        self.completions
            .lock()
            .unwrap()
            .insert((user_id, lesson_id), xp_earned);
        Ok(CompletionRecord {
            user_id,
            lesson_id,
            completed: true,
            xp_earned,
            completed_at: Utc::now(),
        })
    }
}

/// Two units with one single-question lesson each. Option "right" is correct.
fn backend() -> (MemoryBackend, Uuid, Uuid) {
    let mut units = Vec::new();
    let mut lessons = Vec::new();
    let mut questions = Vec::new();
    let mut options = Vec::new();
    let mut lesson_ids = Vec::new();

    for n in 1..=2 {
        let unit_id = Uuid::new_v4();
        units.push(UnitRow {
            id: unit_id,
            title: Some(format!("Unit {}", n)),
            level: None,
        });
        let lesson_id = Uuid::new_v4();
        lessons.push(LessonRow {
            id: lesson_id,
            unit_id,
            title: format!("Lesson {}", n),
            description: Some("Basics".to_string()),
            xp_reward: Some(10 * n),
        });
        let question_id = Uuid::new_v4();
        questions.push(QuestionRow {
            id: question_id,
            lesson_id,
            question_text: "Pick the right one".to_string(),
            position: 1,
        });
        for (position, (text, is_correct)) in [("wrong", false), ("right", true)].iter().enumerate()
        {
            options.push(OptionRow {
                id: Uuid::new_v4(),
                question_id,
                option_text: text.to_string(),
                is_correct: *is_correct,
                position: position as i32,
            });
        }
        lesson_ids.push(lesson_id);
    }

    (
        MemoryBackend {
            units,
            lessons,
            questions,
            options,
            completions: Mutex::new(HashMap::new()),
        },
        lesson_ids[0],
        lesson_ids[1],
    )
}

#[tokio::test]
async fn completing_a_lesson_unlocks_the_next_unit() {
    let (backend, first_lesson, second_lesson) = backend();
    let user_id = Uuid::new_v4();

    let units = load_units(&backend, user_id).await;
    assert_eq!(units[0].status, UnitStatus::Available);
    assert_eq!(units[1].status, UnitStatus::Locked);

    let (_, lesson) = find_lesson(&units, first_lesson).unwrap();
    let mut session = LessonSession::new(user_id, lesson).unwrap();
    session.submit_answer(Some(1)).unwrap();
    let step = session.continue_lesson(&backend).await.unwrap();
    assert_eq!(
        step,
        Step::Finished(Outcome::Success {
            correct: 1,
            incorrect: 0,
            total_xp: 10
        })
    );

    let units = load_units(&backend, user_id).await;
    assert_eq!(units[0].status, UnitStatus::Completed);
    assert_eq!(units[1].status, UnitStatus::Available);
    assert!(units[0].lessons[0].completed);
    assert!(!units[1].lessons[0].completed);

    // Finishing the last unit leaves nothing available.
    let (_, lesson) = find_lesson(&units, second_lesson).unwrap();
    let mut session = LessonSession::new(user_id, lesson).unwrap();
    session.submit_answer(Some(1)).unwrap();
    session.continue_lesson(&backend).await.unwrap();

    let units = load_units(&backend, user_id).await;
    assert!(units.iter().all(|u| u.status == UnitStatus::Completed));
}

#[tokio::test]
async fn repeat_completion_overwrites_instead_of_duplicating() {
    let (backend, first_lesson, _) = backend();
    let user_id = Uuid::new_v4();

    for _ in 0..2 {
        let units = load_units(&backend, user_id).await;
        let (_, lesson) = find_lesson(&units, first_lesson).unwrap();
        let mut session = LessonSession::new(user_id, lesson).unwrap();
        session.submit_answer(Some(1)).unwrap();
        session.continue_lesson(&backend).await.unwrap();
    }

    assert_eq!(backend.completions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn a_failed_attempt_records_nothing() {
    let (backend, first_lesson, _) = backend();
    let user_id = Uuid::new_v4();

    let units = load_units(&backend, user_id).await;
    let (_, lesson) = find_lesson(&units, first_lesson).unwrap();
    let mut session = LessonSession::new(user_id, lesson).unwrap();
    session.submit_answer(Some(0)).unwrap();
    let step = session.continue_lesson(&backend).await.unwrap();

    assert!(matches!(step, Step::Finished(Outcome::Partial { .. })));
    assert!(backend.completions.lock().unwrap().is_empty());
    let units = load_units(&backend, user_id).await;
    assert_eq!(units[0].status, UnitStatus::Available);
}

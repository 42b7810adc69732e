// Database CRUD operations
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use super::db::{DbConnection, DbResult};
use super::models::{ExerciseResult, ExerciseSummary};
use crate::hand::Handedness;
use crate::playback::{Grade, ScoreResult};

const RESULT_COLUMNS: &str = "id, created_at, exercise_id, handedness, sequence_sha256, steps,
     score, grade, elapsed_secs, accuracy, miss_resets,
     green_frames, yellow_frames, red_frames";

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn parse_uuid(row: &Row, column: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(column, e.to_string()))
}

fn parse_timestamp(row: &Row, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| conversion_error(column, e.to_string()))
}

fn parse_handedness(row: &Row, column: usize) -> rusqlite::Result<Handedness> {
    let raw: String = row.get(column)?;
    Handedness::from_string(&raw)
        .ok_or_else(|| conversion_error(column, format!("unknown handedness '{}'", raw)))
}

fn result_from_row(row: &Row) -> rusqlite::Result<ExerciseResult> {
    let grade_raw: String = row.get(7)?;
    let grade = Grade::from_string(&grade_raw)
        .ok_or_else(|| conversion_error(7, format!("unknown grade '{}'", grade_raw)))?;

    Ok(ExerciseResult {
        id: parse_uuid(row, 0)?,
        created_at: parse_timestamp(row, 1)?,
        exercise_id: row.get(2)?,
        handedness: parse_handedness(row, 3)?,
        sequence_sha256: row.get(4)?,
        steps: row.get(5)?,
        score: row.get::<_, f64>(6)? as f32,
        grade,
        elapsed_secs: row.get::<_, f64>(8)? as f32,
        accuracy: row.get::<_, f64>(9)? as f32,
        miss_resets: row.get(10)?,
        green_frames: row.get(11)?,
        yellow_frames: row.get(12)?,
        red_frames: row.get(13)?,
    })
}

// ==================== RESULT QUERIES ====================

/// Record a finished session
pub fn record_result(
    db: &DbConnection,
    exercise_id: u32,
    handedness: Handedness,
    sequence_sha256: Option<String>,
    steps: u32,
    score: &ScoreResult,
) -> DbResult<ExerciseResult> {
    let result = ExerciseResult {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        exercise_id,
        handedness,
        sequence_sha256,
        steps,
        score: score.score,
        grade: score.grade,
        elapsed_secs: score.elapsed_secs,
        accuracy: score.accuracy,
        miss_resets: score.miss_resets,
        green_frames: score.tally.green,
        yellow_frames: score.tally.yellow,
        red_frames: score.tally.red,
    };

    let conn = db.lock();
    conn.execute(
        &format!(
            "INSERT INTO exercise_results ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            RESULT_COLUMNS
        ),
        params![
            result.id.to_string(),
            result.created_at.to_rfc3339(),
            result.exercise_id,
            result.handedness.to_string(),
            result.sequence_sha256,
            result.steps,
            result.score as f64,
            result.grade.to_string(),
            result.elapsed_secs as f64,
            result.accuracy as f64,
            result.miss_resets,
            result.green_frames,
            result.yellow_frames,
            result.red_frames,
        ],
    )?;

    log::info!(
        "Recorded result {} for exercise {} ({}): {:.1} {}",
        result.id,
        exercise_id,
        handedness.to_string(),
        result.score,
        result.grade.to_string()
    );
    Ok(result)
}

/// Get a result by ID
pub fn get_result(db: &DbConnection, id: &Uuid) -> DbResult<Option<ExerciseResult>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM exercise_results WHERE id = ?1",
        RESULT_COLUMNS
    ))?;

    let result = stmt.query_row([id.to_string()], result_from_row);

    match result {
        Ok(result) => Ok(Some(result)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List results for one exercise and hand, newest first
pub fn list_results(
    db: &DbConnection,
    exercise_id: u32,
    handedness: Handedness,
) -> DbResult<Vec<ExerciseResult>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM exercise_results
         WHERE exercise_id = ?1 AND handedness = ?2
         ORDER BY created_at DESC",
        RESULT_COLUMNS
    ))?;

    let results = stmt
        .query_map(params![exercise_id, handedness.to_string()], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Highest score for one exercise and hand; earliest wins a tie
pub fn best_result(
    db: &DbConnection,
    exercise_id: u32,
    handedness: Handedness,
) -> DbResult<Option<ExerciseResult>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM exercise_results
         WHERE exercise_id = ?1 AND handedness = ?2
         ORDER BY score DESC, created_at ASC
         LIMIT 1",
        RESULT_COLUMNS
    ))?;

    let result = stmt.query_row(params![exercise_id, handedness.to_string()], result_from_row);

    match result {
        Ok(result) => Ok(Some(result)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Per (exercise, hand) attempt counts and best scores
pub fn list_exercise_summaries(db: &DbConnection) -> DbResult<Vec<ExerciseSummary>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT exercise_id, handedness, COUNT(id), MAX(score), MAX(created_at)
         FROM exercise_results
         GROUP BY exercise_id, handedness
         ORDER BY exercise_id ASC, handedness ASC",
    )?;

    let summaries = stmt
        .query_map([], |row| {
            Ok(ExerciseSummary {
                exercise_id: row.get(0)?,
                handedness: parse_handedness(row, 1)?,
                attempts: row.get(2)?,
                best_score: row.get::<_, f64>(3)? as f32,
                last_played: parse_timestamp(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summaries)
}

/// Delete every result for one exercise and hand
pub fn delete_results(
    db: &DbConnection,
    exercise_id: u32,
    handedness: Handedness,
) -> DbResult<usize> {
    let conn = db.lock();
    let deleted = conn.execute(
        "DELETE FROM exercise_results WHERE exercise_id = ?1 AND handedness = ?2",
        params![exercise_id, handedness.to_string()],
    )?;
    Ok(deleted)
}

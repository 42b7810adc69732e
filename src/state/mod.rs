// State management module
// Handles pose sequence files and the SQLite result history

pub mod db;
pub mod models;
pub mod queries;
pub mod storage;

pub use db::{init_db, open_db, open_in_memory, DbConnection, DbError, DbResult};
pub use models::{ExerciseResult, ExerciseSummary};
pub use queries::{
    best_result, delete_results, get_result, list_exercise_summaries, list_results,
    record_result,
};
pub use storage::{
    calculate_sha256, get_app_data_dir, SavedSequence, SequenceStore, StoreError, StoreResult,
};

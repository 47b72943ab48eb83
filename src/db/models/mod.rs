pub mod user_score;

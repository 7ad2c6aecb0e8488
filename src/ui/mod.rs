/// Operator-facing pieces: console prompts and near-tie figures.
pub mod plot;
pub mod prompt;

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Classifying,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub phase: Phase,
    pub processed: usize,
    pub total: usize,
    pub current_file: String,
}

pub type ProgressCallback = Box<dyn Fn(&Progress) + Send + Sync>;

//! Plain-text presentation of the recognition state.

use crate::smoother::{ProcessingState, Snapshot};

pub fn current_line(snapshot: &Snapshot) -> String {
    match &snapshot.label {
        Some(label) => {
            let marker = match snapshot.processing {
                ProcessingState::Processing => " …",
                ProcessingState::Idle => "",
            };
            format!(
                "Current: {label}{marker} ({}% confidence)",
                percent(snapshot.confidence)
            )
        }
        None => "Current: No sign detected".to_string(),
    }
}

pub fn history_line(snapshot: &Snapshot) -> String {
    if snapshot.history.is_empty() {
        "Recent: No history yet".to_string()
    } else {
        format!("Recent: {}", snapshot.history.join(", "))
    }
}

pub fn signs_line(labels: &[String]) -> String {
    format!("Recognizable signs: {}", labels.join(", "))
}

fn percent(confidence: f64) -> u32 {
    (confidence * 100.0).round() as u32
}

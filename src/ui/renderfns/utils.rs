use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

use crate::api::JobStatus;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a job status
pub fn status_color(status: JobStatus) -> Color {
  match status {
    JobStatus::Completed => Color::Green,
    JobStatus::Running => Color::Yellow,
    JobStatus::Failed => Color::Red,
    JobStatus::Pending => Color::White,
  }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  let mut size = bytes as f64;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} {}", bytes, UNITS[0])
  } else {
    format!("{:.1} {}", size, UNITS[unit])
  }
}

/// Timestamp in local time, minute precision
pub fn format_time(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

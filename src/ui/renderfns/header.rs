use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use super::utils::format_size;
use crate::api::{CacheStats, Health};
use crate::sync::{ResourceView, SyncStore};
use crate::ui::view::ShortcutInfo;

/// Draw the header bar with title, backend status, and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  store: &SyncStore,
  shortcuts: &[ShortcutInfo],
) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));
  let (health, health_color) = health_label(&store.health());

  let mut spans = vec![
    Span::styled(" painboard ", Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    separator(),
    Span::styled(format!(" {} ", health), Style::default().fg(health_color)),
    separator(),
    Span::styled(
      format!(" {} ", cache_label(&store.cache_stats())),
      Style::default().fg(Color::Gray),
    ),
    Span::raw("  "),
  ];

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::raw("   "));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Connectivity indicator. An error wins over a stale healthy value.
fn health_label(view: &ResourceView<'_, Health>) -> (String, Color) {
  match view.data {
    _ if view.is_error => ("● offline".to_string(), Color::Red),
    Some(health) if health.is_ok() => (
      format!("● {} v{}", health.service, health.version),
      Color::Green,
    ),
    Some(health) => (format!("● {}", health.status), Color::Yellow),
    None => ("○ connecting".to_string(), Color::DarkGray),
  }
}

fn cache_label(view: &ResourceView<'_, CacheStats>) -> String {
  match view.data {
    Some(stats) => format!(
      "cache {} files, {}",
      stats.file_count,
      format_size(stats.total_size_bytes)
    ),
    None if view.is_loading => "cache ...".to_string(),
    None => "cache ?".to_string(),
  }
}

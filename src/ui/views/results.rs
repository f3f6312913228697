use crate::api::AnalysisResult;
use crate::sync::SyncStore;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Clusters and app ideas of a completed job.
///
/// Reads the job entry the progress view below it keeps subscribed, so it
/// holds no subscription of its own.
pub struct ResultsView {
  job_id: String,
  scroll: u16,
}

impl ResultsView {
  pub fn new(job_id: String) -> Self {
    Self { job_id, scroll: 0 }
  }

  fn lines(result: &AnalysisResult) -> Vec<Line<'static>> {
    let heading = |text: String| {
      Line::from(Span::styled(
        text,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
      ))
    };
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
      Line::from(vec![
        Span::styled("Posts: ", dim),
        Span::raw(result.total_posts.to_string()),
        Span::styled("  Comments: ", dim),
        Span::raw(result.total_comments.to_string()),
        Span::styled("  Pain items: ", dim),
        Span::raw(result.total_pain_items.to_string()),
        Span::styled("  Clusters: ", dim),
        Span::raw(result.total_clusters.to_string()),
        Span::styled("  Ideas: ", dim),
        Span::raw(result.total_ideas.to_string()),
      ]),
      Line::default(),
      heading(format!("Clusters ({})", result.clusters.len())),
    ];

    for cluster in &result.clusters {
      lines.push(Line::from(vec![
        Span::styled(format!("{:>5} ", cluster.count), Style::default().fg(Color::Yellow)),
        Span::raw(cluster.label.clone()),
        Span::styled(format!("  avg {:.1}", cluster.avg_score), dim),
      ]));
      for example in cluster.example_texts.iter().take(2) {
        lines.push(Line::from(Span::styled(
          format!("        \"{}\"", truncate(example, 100)),
          dim,
        )));
      }
    }

    lines.push(Line::default());
    lines.push(heading(format!("App ideas ({})", result.ideas.len())));
    for idea in &result.ideas {
      lines.push(Line::from(vec![
        Span::styled(idea.idea_name.clone(), Style::default().fg(Color::Green)),
        Span::styled(format!("  [{}]", idea.mvp_complexity), dim),
      ]));
      lines.push(Line::from(format!("  {}", idea.problem_statement)));
      lines.push(Line::from(Span::styled(
        format!("  for {}", idea.target_user),
        dim,
      )));
      for function in &idea.core_functions {
        lines.push(Line::from(format!("    - {}", function)));
      }
    }
    lines
  }
}

impl View for ResultsView {
  fn handle_key(&mut self, key: KeyEvent, _store: &mut SyncStore) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
      KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
      KeyCode::Char('g') => self.scroll = 0,
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, store: &SyncStore) {
    let block = Block::default()
      .title(format!(" Results {} ", self.job_id))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let decoded = store.job(&self.job_id).data.map(|job| job.analysis_result());
    let paragraph = match decoded {
      Some(Some(result)) => Paragraph::new(Self::lines(&result))
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
      Some(None) => Paragraph::new("The job has no readable result.")
        .style(Style::default().fg(Color::DarkGray)),
      None => Paragraph::new("Job no longer exists.").style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block), area);
  }

  fn breadcrumb_label(&self) -> String {
    "Results".to_string()
  }

  fn detach(&mut self, _store: &mut SyncStore) {}

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "scroll").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

//! Bottom navigation bar and status footer
//!
//! The bar renders one label per live tab and keeps exactly one tab
//! highlighted, keyed by region id rather than ordinal so a pending
//! navigation survives unrelated removals. It is rebuilt after every
//! registry mutation; [`NavigationBar::highlight`] reports whether the
//! highlight actually moved so the page host knows to swap content.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::registry::TabRegistry;

/// Labels longer than this are truncated so nine tabs still fit on a row
const MAX_LABEL_WIDTH: usize = 18;

/// Key hints shown in the footer during normal operation
const FOOTER_HINTS: &str =
    "Ctrl+S shell | Ctrl+O cluster | Ctrl+B,<n> jump | Ctrl+N/P cycle | Ctrl+E close | Ctrl+Q quit";

/// Footer text while command-mode awaits a digit
const FOOTER_ARMED: &str = "navigate: press a tab number (1-9)";

struct TabLabel {
    region_id: u64,
    text: String,
}

/// One-line strip of tab labels with a single highlighted entry
pub struct NavigationBar {
    labels: Vec<TabLabel>,
    highlighted: Option<u64>,
}

impl NavigationBar {
    #[must_use]
    pub fn new() -> Self {
        Self {
            labels: Vec::new(),
            highlighted: None,
        }
    }

    /// Region id of the currently highlighted tab
    #[must_use]
    pub fn highlighted(&self) -> Option<u64> {
        self.highlighted
    }

    /// Rebuild the label strip from registry state. Called after every
    /// create/remove/navigate so the bar never shows a stale tab.
    pub fn rebuild(&mut self, registry: &TabRegistry) {
        self.labels = registry
            .tabs()
            .iter()
            .map(|tab| TabLabel {
                region_id: tab.region_id(),
                text: format!("{} {}", tab.ordinal() + 1, truncate_label(tab.title())),
            })
            .collect();

        // Drop a highlight that no longer points at a live tab
        if let Some(region_id) = self.highlighted {
            if !self.labels.iter().any(|label| label.region_id == region_id) {
                self.highlighted = None;
            }
        }
    }

    /// Move the highlight to `region_id`. Returns true when the highlight
    /// changed - the page host's cue to swap the visible content.
    pub fn highlight(&mut self, region_id: u64) -> bool {
        if self.highlighted == Some(region_id) {
            return false;
        }
        if self.labels.iter().any(|label| label.region_id == region_id) {
            self.highlighted = Some(region_id);
            return true;
        }
        false
    }

    /// Render the bar as a single styled line
    #[must_use]
    pub fn line(&self) -> Line<'static> {
        let mut spans = Vec::with_capacity(self.labels.len() * 2);

        for label in &self.labels {
            let style = if Some(label.region_id) == self.highlighted {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(format!(" {} ", label.text), style));
            spans.push(Span::raw(" "));
        }

        Line::from(spans)
    }
}

impl Default for NavigationBar {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_label(title: &str) -> String {
    if title.width() <= MAX_LABEL_WIDTH {
        return title.to_string();
    }

    let mut out = String::new();
    let mut width = 0;
    for c in title.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > MAX_LABEL_WIDTH - 1 {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push('…');
    out
}

/// Shared status line under the navigation bar: key hints, the command-mode
/// armed indicator, and inline status/error messages (spawn failures land
/// here instead of crashing anything).
pub struct StatusFooter {
    message: Option<String>,
    command_mode: bool,
}

impl StatusFooter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            message: None,
            command_mode: false,
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn set_command_mode(&mut self, armed: bool) {
        self.command_mode = armed;
    }

    /// Render the footer. Message beats hints; the armed state recolors
    /// the whole line so the pending digit is obvious.
    #[must_use]
    pub fn line(&self) -> Line<'static> {
        if self.command_mode {
            return Line::from(Span::styled(
                FOOTER_ARMED.to_string(),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        if let Some(ref message) = self.message {
            return Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }

        Line::from(Span::styled(
            FOOTER_HINTS.to_string(),
            Style::default().fg(Color::DarkGray),
        ))
    }
}

impl Default for StatusFooter {
    fn default() -> Self {
        Self::new()
    }
}

//! Application-level input routing
//!
//! Every key event enters here before anything else sees it. Evaluation
//! order, which the rest of the UI depends on:
//!
//! 1. Command-mode: after the `Ctrl+B` prefix the next digit is an absolute
//!    tab jump. While armed, no event reaches the focused session - the
//!    digit must not leak into the embedded shell.
//! 2. Global hotkeys, matched by key identity plus modifier so ordinary
//!    terminal input can never trigger them.
//! 3. Exit-phrase bookkeeping: printable characters and backspace maintain
//!    a trailing window of what was typed; on Enter, if the window spells
//!    the exit phrase, the active tab is closed. This mirrors how a real
//!    multiplexer notices an `exit`-style shutdown without parsing shell
//!    semantics.
//! 4. Everything unclaimed is forwarded verbatim to the active session.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Typing this word then Enter inside an embedded session closes its tab
pub const EXIT_PHRASE: &str = "exit";

/// Where a key event ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    NewShellTab,
    NewClusterTab,
    CloseActiveTab,
    NextTab,
    PreviousTab,
    /// Command-mode prefix pressed; the next digit is a tab jump
    CommandModeArmed,
    /// Absolute 1-based tab jump from a command-mode digit
    JumpToOrdinal(usize),
    /// The operator typed the exit phrase and confirmed
    CloseViaExitPhrase,
    Quit,
    /// Unclaimed; deliver to the focused session
    Forward(KeyEvent),
    /// Consumed without effect
    Ignored,
}

/// Routes keyboard events between UI chrome and the focused session
pub struct InputRouter {
    command_mode: bool,
    /// Trailing window of the last printable characters typed, exactly as
    /// long as the exit phrase
    typed: Vec<char>,
    /// The in-progress input line, for cursor-aware editing
    line: Vec<char>,
    /// Caret offset within `line`
    cursor_pos: usize,
}

impl InputRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            command_mode: false,
            typed: Vec::with_capacity(EXIT_PHRASE.len()),
            line: Vec::new(),
            cursor_pos: 0,
        }
    }

    /// True while a navigation digit is awaited; the UI footer shows this
    #[must_use]
    pub fn command_mode(&self) -> bool {
        self.command_mode
    }

    #[must_use]
    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    /// Clear transient input state. Called whenever the tab set or the
    /// focused tab changes, so a half-typed phrase never carries over.
    pub fn reset_typed(&mut self) {
        self.typed.clear();
        self.line.clear();
        self.cursor_pos = 0;
    }

    /// Route one key event. See the module docs for the evaluation order.
    pub fn route(&mut self, key: KeyEvent) -> Routed {
        // 1. Command-mode digit. Deactivates on any key, valid digit or
        //    not, and never forwards - the keystroke must not reach the
        //    embedded shell.
        if self.command_mode {
            self.command_mode = false;
            if let KeyCode::Char(c) = key.code {
                if let Some(digit) = c.to_digit(10) {
                    return Routed::JumpToOrdinal(digit as usize);
                }
            }
            return Routed::Ignored;
        }

        // 2. Global hotkeys, by key identity
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => return Routed::NewShellTab,
                KeyCode::Char('o') => return Routed::NewClusterTab,
                KeyCode::Char('e') => return Routed::CloseActiveTab,
                KeyCode::Char('n') => return Routed::NextTab,
                KeyCode::Char('p') => return Routed::PreviousTab,
                KeyCode::Char('b') => {
                    self.command_mode = true;
                    return Routed::CommandModeArmed;
                }
                KeyCode::Char('q') => return Routed::Quit,
                // Never let Ctrl+C take the host application down
                KeyCode::Char('c') => return Routed::Ignored,
                _ => {}
            }
        }

        // 3. Exit-phrase bookkeeping. The tracked keys are still forwarded;
        //    tracking is passive until Enter confirms.
        match key.code {
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.typed.push(c);
                if self.typed.len() > EXIT_PHRASE.len() {
                    self.typed.remove(0);
                }
                self.line.insert(self.cursor_pos, c);
                self.cursor_pos += 1;
            }
            KeyCode::Backspace => {
                self.typed.pop();
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    self.line.remove(self.cursor_pos);
                }
            }
            KeyCode::Left => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.cursor_pos < self.line.len() {
                    self.cursor_pos += 1;
                }
            }
            // Shell history navigation replaces the line with content we
            // cannot see; stop pretending to know what is typed
            KeyCode::Up | KeyCode::Down => {
                self.reset_typed();
            }
            KeyCode::Enter => {
                let confirmed = self.typed.iter().collect::<String>() == EXIT_PHRASE;
                self.reset_typed();
                if confirmed {
                    return Routed::CloseViaExitPhrase;
                }
            }
            _ => {}
        }

        // 4. Fallback: the session gets the event verbatim
        Routed::Forward(key)
    }
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a key event into the bytes a terminal would send to the child
/// process. Returns `None` for keys that have no terminal encoding.
#[must_use]
pub fn encode_key(key: &KeyEvent) -> Option<Vec<u8>> {
    match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                // Ctrl+letter maps to the 0x01-0x1A control range
                Some(vec![(c.to_ascii_uppercase() as u8) - b'A' + 1])
            } else {
                let mut buf = [0u8; 4];
                Some(c.encode_utf8(&mut buf).as_bytes().to_vec())
            }
        }
        KeyCode::Enter => Some(b"\r".to_vec()),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Tab => Some(b"\t".to_vec()),
        KeyCode::Esc => Some(b"\x1b".to_vec()),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn code(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_hotkeys_match_by_identity() {
        let mut router = InputRouter::new();

        assert_eq!(router.route(ctrl('s')), Routed::NewShellTab);
        assert_eq!(router.route(ctrl('o')), Routed::NewClusterTab);
        assert_eq!(router.route(ctrl('e')), Routed::CloseActiveTab);
        assert_eq!(router.route(ctrl('n')), Routed::NextTab);
        assert_eq!(router.route(ctrl('p')), Routed::PreviousTab);
        assert_eq!(router.route(ctrl('q')), Routed::Quit);
        // Plain letters are never hotkeys
        assert!(matches!(router.route(plain('s')), Routed::Forward(_)));
    }

    #[test]
    fn test_ctrl_c_is_swallowed() {
        let mut router = InputRouter::new();
        assert_eq!(router.route(ctrl('c')), Routed::Ignored);
    }

    #[test]
    fn test_command_mode_digit_jump() {
        let mut router = InputRouter::new();

        assert_eq!(router.route(ctrl('b')), Routed::CommandModeArmed);
        assert!(router.command_mode());
        assert_eq!(router.route(plain('2')), Routed::JumpToOrdinal(2));
        assert!(!router.command_mode());
    }

    #[test]
    fn test_command_mode_consumes_non_digit() {
        let mut router = InputRouter::new();

        router.route(ctrl('b'));
        // A non-digit deactivates command-mode and reaches nothing
        assert_eq!(router.route(plain('x')), Routed::Ignored);
        assert!(!router.command_mode());
        // The next 'x' is ordinary input again
        assert!(matches!(router.route(plain('x')), Routed::Forward(_)));
    }

    #[test]
    fn test_command_mode_isolates_digit_from_session() {
        let mut router = InputRouter::new();

        router.route(ctrl('b'));
        let routed = router.route(plain('7'));
        // The digit is a navigation command, never a Forward
        assert_eq!(routed, Routed::JumpToOrdinal(7));
    }

    #[test]
    fn test_exit_phrase_on_confirm() {
        let mut router = InputRouter::new();

        for c in "exit".chars() {
            assert!(matches!(router.route(plain(c)), Routed::Forward(_)));
        }
        assert_eq!(router.route(code(KeyCode::Enter)), Routed::CloseViaExitPhrase);
    }

    #[test]
    fn test_exit_phrase_uses_trailing_window() {
        let mut router = InputRouter::new();

        // The phrase spans multiple "words"; only the trailing window counts
        for c in "please exit".chars() {
            router.route(plain(c));
        }
        assert_eq!(router.route(code(KeyCode::Enter)), Routed::CloseViaExitPhrase);
    }

    #[test]
    fn test_exit_phrase_backspace_correction() {
        let mut router = InputRouter::new();

        for c in "exiy".chars() {
            router.route(plain(c));
        }
        router.route(code(KeyCode::Backspace));
        router.route(plain('t'));
        // "exiy" -> pop 'y' -> "exi" -> push 't' -> "exit"
        assert_eq!(router.route(code(KeyCode::Enter)), Routed::CloseViaExitPhrase);
    }

    #[test]
    fn test_enter_clears_window() {
        let mut router = InputRouter::new();

        for c in "exit".chars() {
            router.route(plain(c));
        }
        router.route(code(KeyCode::Enter));
        // Second Enter with an empty window must not close again
        assert!(matches!(router.route(code(KeyCode::Enter)), Routed::Forward(_)));
    }

    #[test]
    fn test_non_matching_line_forwards_enter() {
        let mut router = InputRouter::new();

        for c in "ls -la".chars() {
            router.route(plain(c));
        }
        assert!(matches!(router.route(code(KeyCode::Enter)), Routed::Forward(_)));
    }

    #[test]
    fn test_cursor_position_tracking() {
        let mut router = InputRouter::new();

        for c in "abc".chars() {
            router.route(plain(c));
        }
        assert_eq!(router.cursor_pos(), 3);
        router.route(code(KeyCode::Left));
        router.route(code(KeyCode::Left));
        assert_eq!(router.cursor_pos(), 1);
        router.route(code(KeyCode::Right));
        assert_eq!(router.cursor_pos(), 2);
        // Right never moves past the end of the line
        router.route(code(KeyCode::Right));
        router.route(code(KeyCode::Right));
        assert_eq!(router.cursor_pos(), 3);
    }

    #[test]
    fn test_history_navigation_resets_window() {
        let mut router = InputRouter::new();

        for c in "exit".chars() {
            router.route(plain(c));
        }
        router.route(code(KeyCode::Up));
        assert!(matches!(router.route(code(KeyCode::Enter)), Routed::Forward(_)));
    }

    #[test]
    fn test_encode_key_control_and_arrows() {
        assert_eq!(encode_key(&ctrl('a')), Some(vec![0x01]));
        assert_eq!(encode_key(&plain('q')), Some(b"q".to_vec()));
        assert_eq!(encode_key(&code(KeyCode::Up)), Some(b"\x1b[A".to_vec()));
        assert_eq!(encode_key(&code(KeyCode::Backspace)), Some(vec![0x7f]));
    }
}

pub mod test_helpers {
    use crate::event_source::{Event, KeyCode, SimulatedEventSource};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for key sequences fed to the application loop.
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events.push(SimulatedEventSource::key(code));
            self
        }

        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        pub fn press_tab(self) -> Self {
            self.press_key(KeyCode::Tab)
        }

        /// Types `text` into a prompt, without submitting it.
        pub fn type_text(mut self, text: &str) -> Self {
            for c in text.chars() {
                self.events
                    .push(SimulatedEventSource::key(KeyCode::Char(c)));
            }
            self
        }

        pub fn move_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        pub fn start_session(self) -> Self {
            self.press_char('n')
        }

        pub fn insert_note(self) -> Self {
            self.press_char('i')
        }

        pub fn next_page(self) -> Self {
            self.press_char('j')
        }

        pub fn sync_previous(self) -> Self {
            self.press_char('[')
        }

        pub fn sync_next(self) -> Self {
            self.press_char(']')
        }

        pub fn kill_session(self) -> Self {
            self.press_char('K')
        }

        pub fn quit(self) -> Self {
            self.press_char('q')
        }

        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// The terminal contents as text, trailing blanks trimmed.
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .start_session()
            .next_page()
            .insert_note()
            .type_text("ab")
            .press_enter()
            .quit()
            .build();

        assert_eq!(scenario.remaining(), 7);
    }
}

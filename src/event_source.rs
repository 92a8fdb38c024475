use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
pub use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

/// Input the application loop and blocking prompts read from.
pub trait EventSource {
    /// Waits up to `timeout` for an event.
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    fn read(&mut self) -> Result<Event>;

    /// True once no event can ever arrive again.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Terminal input through crossterm.
pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Replays a fixed list of events.
pub struct SimulatedEventSource {
    events: VecDeque<Event>,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    pub fn key_event(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    pub fn key(code: KeyCode) -> Event {
        Self::key_event(code, KeyModifiers::empty())
    }

    pub fn char_key(c: char) -> Event {
        let modifiers = if c.is_ascii_uppercase() {
            KeyModifiers::SHIFT
        } else {
            KeyModifiers::empty()
        };
        Self::key_event(KeyCode::Char(c), modifiers)
    }

    pub fn ctrl_char_key(c: char) -> Event {
        Self::key_event(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!self.events.is_empty())
    }

    fn read(&mut self) -> Result<Event> {
        // Running dry ends the session like a quit key would
        Ok(self
            .events
            .pop_front()
            .unwrap_or_else(|| Self::char_key('q')))
    }

    fn is_exhausted(&self) -> bool {
        self.events.is_empty()
    }
}

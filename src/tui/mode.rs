use std::collections::VecDeque;

const LOG_LINES: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Console, // typing into the command line
    Monitor,
}

// state local to the tui: what's typed, where focus is, what's been said
#[derive(Clone, Debug)]
pub struct TuiState {
    pub focus: Focus,
    pub input: String,
    pub log: VecDeque<String>,
    // false when the terminal can't report key releases
    pub reports_release: bool,
    pub shift_space_held: bool,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            focus: Focus::Console,
            input: String::new(),
            log: VecDeque::with_capacity(LOG_LINES),
            reports_release: true,
            shift_space_held: false,
        }
    }
}

impl TuiState {
    pub fn push_log(&mut self, line: impl Into<String>) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line.into());
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Console => Focus::Monitor,
            Focus::Monitor => Focus::Console,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_the_newest_lines() {
        let mut ts = TuiState::default();
        for i in 0..LOG_LINES + 5 {
            ts.push_log(format!("line {i}"));
        }
        assert_eq!(ts.log.len(), LOG_LINES);
        assert_eq!(ts.log.front().map(String::as_str), Some("line 5"));
    }
}

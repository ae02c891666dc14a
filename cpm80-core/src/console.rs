//! Console I/O abstraction for the BIOS harness.
//!
//! `ConsoleInput` and `ConsoleOutput` decouple guest keyboard/display
//! traffic from the host terminal, so scripted test sessions and a
//! live keyboard plug into the same BIOS handlers.

/// Source of guest keystrokes. `None` ends the session; a reader is
/// not restartable once exhausted.
pub trait ConsoleInput {
    fn input(&mut self) -> Option<u8>;
}

/// Sink for guest console output bytes.
pub trait ConsoleOutput {
    fn output(&mut self, byte: u8);
}

impl ConsoleInput for Box<dyn ConsoleInput> {
    fn input(&mut self) -> Option<u8> {
        (**self).input()
    }
}

impl ConsoleOutput for Box<dyn ConsoleOutput> {
    fn output(&mut self, byte: u8) {
        (**self).output(byte)
    }
}

/// Ctrl-C byte on the keyboard.
pub const CTRL_C: u8 = 0x03;
/// What the host terminal sends for backspace.
pub const HOST_BACKSPACE: u8 = 0x7F;
/// What CP/M expects for backspace.
pub const CPM_BACKSPACE: u8 = 0x08;

/// Host keyboard filter shared by interactive readers.
///
/// Translates the host backspace byte to CP/M's code and watches for
/// the shutdown convention: three Ctrl-C presses in a row end the
/// session. Any other byte resets the count.
#[derive(Debug, Default)]
pub struct KeyTranslator {
    ctrl_c_run: u8,
}

impl KeyTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one host byte. Returns the byte to hand to the guest, or
    /// `None` when the third consecutive Ctrl-C arrives.
    pub fn accept(&mut self, byte: u8) -> Option<u8> {
        if byte == CTRL_C {
            self.ctrl_c_run = self.ctrl_c_run.saturating_add(1);
            if self.ctrl_c_run >= 3 {
                return None;
            }
        } else {
            self.ctrl_c_run = 0;
        }

        Some(match byte {
            HOST_BACKSPACE => CPM_BACKSPACE,
            other => other,
        })
    }
}

/// Scripted keyboard: replays a fixed set of command lines, one byte
/// per call, then reports end of input.
pub struct ScriptedInput {
    bytes: Vec<u8>,
    pos: usize,
}

impl ScriptedInput {
    /// Build from command lines; the script is the lines joined with
    /// `\n` plus a trailing `\n`.
    pub fn new<S: AsRef<str>>(commands: &[S]) -> Self {
        let mut script = commands
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        script.push('\n');
        Self {
            bytes: script.into_bytes(),
            pos: 0,
        }
    }
}

impl ConsoleInput for ScriptedInput {
    fn input(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }
}

/// Capturing display: accumulates guest output for tests and
/// automated sessions.
#[derive(Default)]
pub struct CapturedOutput {
    buffer: Vec<u8>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw output bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Output decoded as a string (lossy UTF-8 conversion).
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

impl ConsoleOutput for CapturedOutput {
    fn output(&mut self, byte: u8) {
        self.buffer.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_sequence() {
        let mut reader = ScriptedInput::new(&["DIR", "TYPE FOO.TXT"]);
        let mut bytes = Vec::new();
        while let Some(b) = reader.input() {
            bytes.push(b);
        }
        assert_eq!(bytes, b"DIR\nTYPE FOO.TXT\n");
        // Exhausted for good.
        assert_eq!(reader.input(), None);
        assert_eq!(reader.input(), None);
    }

    #[test]
    fn test_scripted_input_empty_script() {
        let mut reader = ScriptedInput::new::<&str>(&[]);
        assert_eq!(reader.input(), Some(b'\n'));
        assert_eq!(reader.input(), None);
    }

    #[test]
    fn test_captured_output() {
        let mut writer = CapturedOutput::new();
        writer.output(b'H');
        writer.output(b'i');
        assert_eq!(writer.as_string(), "Hi");
        assert_eq!(writer.bytes(), b"Hi");
    }

    #[test]
    fn test_backspace_translation() {
        let mut keys = KeyTranslator::new();
        assert_eq!(keys.accept(HOST_BACKSPACE), Some(CPM_BACKSPACE));
    }

    #[test]
    fn test_triple_ctrl_c_cancels() {
        let mut keys = KeyTranslator::new();
        assert_eq!(keys.accept(CTRL_C), Some(CTRL_C));
        assert_eq!(keys.accept(CTRL_C), Some(CTRL_C));
        assert_eq!(keys.accept(CTRL_C), None);
    }

    #[test]
    fn test_ctrl_c_keeps_cancelling_past_the_third() {
        let mut keys = KeyTranslator::new();
        keys.accept(CTRL_C);
        keys.accept(CTRL_C);
        // An embedder may keep feeding Ctrl-C long after the first
        // cancel; the answer stays None and the counter must not wrap.
        for _ in 0..300 {
            assert_eq!(keys.accept(CTRL_C), None);
        }
    }

    #[test]
    fn test_ctrl_c_run_resets_on_other_byte() {
        let mut keys = KeyTranslator::new();
        let feed = [CTRL_C, CTRL_C, 0x41, CTRL_C, CTRL_C, CTRL_C];
        let results: Vec<_> = feed.iter().map(|&b| keys.accept(b)).collect();
        assert_eq!(
            results,
            [
                Some(CTRL_C),
                Some(CTRL_C),
                Some(0x41),
                Some(CTRL_C),
                Some(CTRL_C),
                None
            ]
        );
    }
}

//! VT byte-stream parser
//!
//! Turns raw PTY output into [`Action`]s. The parser owns UTF-8 decoding and
//! never interprets sequences itself; the dispatcher in the parent module
//! applies them to the grid.
//!
//! Every byte moves the state machine deterministically. CAN and SUB abort
//! whatever is in progress, so no input can keep it away from ground.

/// Parameters kept per CSI sequence; extra ones are dropped
pub const MAX_PARAMS: usize = 32;
/// Intermediate bytes kept per sequence
pub const MAX_INTERMEDIATES: usize = 4;
/// OSC payloads longer than this are abandoned
pub const MAX_OSC_LEN: usize = 4096;

const CAN: u8 = 0x18;
const SUB: u8 = 0x1A;
const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;
const DEL: u8 = 0x7F;

/// One parsed unit of terminal output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Printable character
    Print(char),
    /// C0 control byte
    Execute(u8),
    /// Control sequence. Private markers (`?`, `>`, ...) appear in
    /// `intermediates`.
    Csi {
        params: Vec<u16>,
        intermediates: Vec<u8>,
        final_byte: u8,
    },
    /// Escape sequence
    Esc { intermediates: Vec<u8>, final_byte: u8 },
    /// Operating system command payload
    Osc(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    OscString,
    /// ESC seen inside OSC, waiting for `\`
    OscEscape,
    /// Oversized OSC; bytes are dropped until the terminator
    OscIgnore,
}

/// Partial UTF-8 sequence
#[derive(Default)]
struct Utf8Decoder {
    buf: [u8; 4],
    have: usize,
    need: usize,
}

impl Utf8Decoder {
    fn is_pending(&self) -> bool {
        self.need > 0
    }

    fn start(&mut self, lead: u8) -> bool {
        let need = match lead {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return false,
        };
        self.buf[0] = lead;
        self.have = 1;
        self.need = need;
        true
    }

    /// Add a continuation byte; yields the character once complete
    fn push(&mut self, byte: u8) -> Option<char> {
        self.buf[self.have] = byte;
        self.have += 1;
        if self.have < self.need {
            return None;
        }
        let ch = std::str::from_utf8(&self.buf[..self.need])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.reset();
        Some(ch)
    }

    fn reset(&mut self) {
        self.have = 0;
        self.need = 0;
    }
}

#[derive(Default)]
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    intermediates: Vec<u8>,
    osc: Vec<u8>,
    /// The pending OSC overflowed and is dropped at its terminator
    osc_discard: bool,
    utf8: Utf8Decoder,
}

impl VtParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no sequence or character is partially collected
    pub fn is_ground(&self) -> bool {
        self.state == ParserState::Ground && !self.utf8.is_pending()
    }

    /// Feed one byte, emitting zero or more actions
    pub fn advance(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        if self.utf8.is_pending() {
            if (0x80..=0xBF).contains(&byte) {
                if let Some(ch) = self.utf8.push(byte) {
                    emit(Action::Print(ch));
                }
                return;
            }
            // Truncated sequence; the interrupting byte is processed normally
            self.utf8.reset();
            emit(Action::Print(char::REPLACEMENT_CHARACTER));
        }

        match byte {
            CAN | SUB => {
                self.state = ParserState::Ground;
                self.osc.clear();
                self.osc_discard = false;
                return;
            }
            ESC => {
                if self.state == ParserState::OscString {
                    self.state = ParserState::OscEscape;
                } else if self.state == ParserState::OscIgnore {
                    self.osc_discard = true;
                    self.state = ParserState::OscEscape;
                } else if self.state == ParserState::OscEscape {
                    self.dispatch_osc(emit);
                    self.enter_escape();
                } else {
                    self.enter_escape();
                }
                return;
            }
            _ => {}
        }

        match self.state {
            ParserState::Ground => self.ground(byte, emit),
            ParserState::Escape => self.escape(byte, emit),
            ParserState::EscapeIntermediate => self.escape_intermediate(byte, emit),
            ParserState::CsiEntry => self.csi_entry(byte, emit),
            ParserState::CsiParam => self.csi_param(byte, emit),
            ParserState::CsiIntermediate => self.csi_intermediate(byte, emit),
            ParserState::CsiIgnore => self.csi_ignore(byte, emit),
            ParserState::OscString => self.osc_string(byte, emit),
            ParserState::OscEscape => self.osc_escape(byte, emit),
            ParserState::OscIgnore => self.osc_ignore(byte),
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.intermediates.clear();
    }

    fn enter_csi(&mut self) {
        self.state = ParserState::CsiEntry;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
    }

    /// Abandon the current sequence and reprocess `byte` from ground
    fn abort(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        tracing::debug!("Aborted sequence in {:?} at byte {:#04x}", self.state, byte);
        self.state = ParserState::Ground;
        self.ground(byte, emit);
    }

    fn ground(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            0x20..=0x7E => emit(Action::Print(byte as char)),
            DEL => {}
            _ => {
                if !self.utf8.start(byte) {
                    emit(Action::Print(char::REPLACEMENT_CHARACTER));
                }
            }
        }
    }

    fn escape(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            b'[' => self.enter_csi(),
            b']' => {
                self.state = ParserState::OscString;
                self.osc.clear();
            }
            0x20..=0x2F => {
                self.collect(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            0x30..=0x7E => self.dispatch_esc(byte, emit),
            DEL => {}
            _ => self.abort(byte, emit),
        }
    }

    fn escape_intermediate(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            0x20..=0x2F => self.collect(byte),
            0x30..=0x7E => self.dispatch_esc(byte, emit),
            DEL => {}
            _ => self.abort(byte, emit),
        }
    }

    fn csi_entry(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            b'0'..=b'9' | b';' | b':' => {
                self.state = ParserState::CsiParam;
                self.csi_param(byte, emit);
            }
            // Private marker
            b'<'..=b'?' => {
                self.collect(byte);
                self.state = ParserState::CsiParam;
            }
            0x20..=0x2F => {
                self.collect(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => self.dispatch_csi(byte, emit),
            DEL => {}
            _ => self.abort(byte, emit),
        }
    }

    fn csi_param(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            // Sub-parameters are flattened into the parameter list
            b';' | b':' => {
                let param = self.current_param.take().unwrap_or(0);
                self.push_param(param);
            }
            b'<'..=b'?' => self.state = ParserState::CsiIgnore,
            0x20..=0x2F => {
                self.finish_param();
                self.collect(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.finish_param();
                self.dispatch_csi(byte, emit);
            }
            DEL => {}
            _ => self.abort(byte, emit),
        }
    }

    fn csi_intermediate(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            0x20..=0x2F => self.collect(byte),
            0x30..=0x3F => self.state = ParserState::CsiIgnore,
            0x40..=0x7E => self.dispatch_csi(byte, emit),
            DEL => {}
            _ => self.abort(byte, emit),
        }
    }

    fn csi_ignore(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            0x00..=0x1F => emit(Action::Execute(byte)),
            0x40..=0x7E => self.state = ParserState::Ground,
            0x80..=0xFF => self.abort(byte, emit),
            _ => {}
        }
    }

    fn osc_string(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        match byte {
            BEL => self.dispatch_osc(emit),
            0x00..=0x1F => {}
            _ => {
                if self.osc.len() >= MAX_OSC_LEN {
                    tracing::debug!("Abandoned OSC longer than {} bytes", MAX_OSC_LEN);
                    self.osc.clear();
                    self.state = ParserState::Ground;
                    return;
                }
                self.osc.push(byte);
            }
        }
    }

    fn osc_ignore(&mut self, byte: u8) {
        if byte == BEL {
            self.state = ParserState::Ground;
        }
    }

    fn osc_escape(&mut self, byte: u8, emit: &mut impl FnMut(Action)) {
        self.dispatch_osc(emit);
        if byte != b'\\' {
            // ESC started a new sequence instead of terminating the string
            self.enter_escape();
            self.escape(byte, emit);
        }
    }

    fn collect(&mut self, byte: u8) {
        if self.intermediates.len() < MAX_INTERMEDIATES {
            self.intermediates.push(byte);
        }
    }

    fn push_param(&mut self, param: u16) {
        if self.params.len() < MAX_PARAMS {
            self.params.push(param);
        }
    }

    fn finish_param(&mut self) {
        if let Some(param) = self.current_param.take() {
            self.push_param(param);
        }
    }

    fn dispatch_esc(&mut self, final_byte: u8, emit: &mut impl FnMut(Action)) {
        self.state = ParserState::Ground;
        emit(Action::Esc {
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
        });
    }

    fn dispatch_csi(&mut self, final_byte: u8, emit: &mut impl FnMut(Action)) {
        self.state = ParserState::Ground;
        emit(Action::Csi {
            params: std::mem::take(&mut self.params),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
        });
    }

    fn dispatch_osc(&mut self, emit: &mut impl FnMut(Action)) {
        self.state = ParserState::Ground;
        if std::mem::take(&mut self.osc_discard) {
            self.osc.clear();
            return;
        }
        let payload = String::from_utf8_lossy(&self.osc).into_owned();
        self.osc.clear();
        emit(Action::Osc(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(parser: &mut VtParser, bytes: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        for &b in bytes {
            parser.advance(b, &mut |a| actions.push(a));
        }
        actions
    }

    fn parse_all(bytes: &[u8]) -> Vec<Action> {
        parse(&mut VtParser::new(), bytes)
    }

    #[test]
    fn test_print_and_execute() {
        assert_eq!(
            parse_all(b"a\r\n"),
            vec![
                Action::Print('a'),
                Action::Execute(b'\r'),
                Action::Execute(b'\n')
            ]
        );
    }

    #[test]
    fn test_csi_params() {
        assert_eq!(
            parse_all(b"\x1b[5;10H"),
            vec![Action::Csi {
                params: vec![5, 10],
                intermediates: vec![],
                final_byte: b'H'
            }]
        );
        assert_eq!(
            parse_all(b"\x1b[?1049h"),
            vec![Action::Csi {
                params: vec![1049],
                intermediates: vec![b'?'],
                final_byte: b'h'
            }]
        );
        assert_eq!(
            parse_all(b"\x1b[;5H"),
            vec![Action::Csi {
                params: vec![0, 5],
                intermediates: vec![],
                final_byte: b'H'
            }]
        );
    }

    #[test]
    fn test_param_overflow_saturates() {
        let actions = parse_all(b"\x1b[99999999m");
        assert_eq!(
            actions,
            vec![Action::Csi {
                params: vec![u16::MAX],
                intermediates: vec![],
                final_byte: b'm'
            }]
        );

        let many = format!("\x1b[{}m", "1;".repeat(100));
        match &parse_all(many.as_bytes())[..] {
            [Action::Csi { params, .. }] => assert_eq!(params.len(), MAX_PARAMS),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_control_inside_csi_executes() {
        assert_eq!(
            parse_all(b"\x1b[1\n2A"),
            vec![
                Action::Execute(b'\n'),
                Action::Csi {
                    params: vec![12],
                    intermediates: vec![],
                    final_byte: b'A'
                }
            ]
        );
    }

    #[test]
    fn test_osc_terminators() {
        assert_eq!(
            parse_all(b"\x1b]0;title\x07"),
            vec![Action::Osc("0;title".into())]
        );
        assert_eq!(
            parse_all(b"\x1b]2;t\x1b\\x"),
            vec![Action::Osc("2;t".into()), Action::Print('x')]
        );
    }

    #[test]
    fn test_osc_overflow_abandoned() {
        let mut parser = VtParser::new();
        let mut bytes = b"\x1b]52;c;".to_vec();
        bytes.extend(std::iter::repeat(b'a').take(MAX_OSC_LEN + 10));
        let actions = parse(&mut parser, &bytes);
        assert!(actions.is_empty(), "oversized payload leaked: {} actions", actions.len());
        assert!(!parser.is_ground());

        assert!(parse(&mut parser, b"\x07").is_empty());
        assert!(parser.is_ground());
        assert_eq!(parse(&mut parser, b"x"), vec![Action::Print('x')]);
    }

    #[test]
    fn test_osc_overflow_ends_at_st_or_cancel() {
        let mut parser = VtParser::new();
        let mut bytes = b"\x1b]0;".to_vec();
        bytes.extend(std::iter::repeat(b'b').take(MAX_OSC_LEN + 1));
        bytes.extend(b"\x1b\\y");
        assert_eq!(parse(&mut parser, &bytes), vec![Action::Print('y')]);
        assert!(parser.is_ground());

        let mut bytes = b"\x1b]0;".to_vec();
        bytes.extend(std::iter::repeat(b'c').take(MAX_OSC_LEN + 1));
        bytes.extend(b"\x18z");
        assert_eq!(parse(&mut parser, &bytes), vec![Action::Print('z')]);

        // The discard does not leak into the next string
        assert_eq!(
            parse(&mut parser, b"\x1b]2;title\x07"),
            vec![Action::Osc("2;title".to_string())]
        );
    }

    #[test]
    fn test_utf8_decoding() {
        assert_eq!(
            parse_all("é日🎉".as_bytes()),
            vec![
                Action::Print('é'),
                Action::Print('日'),
                Action::Print('🎉')
            ]
        );
        assert_eq!(
            parse_all(b"\xffa\xe6\x97b"),
            vec![
                Action::Print(char::REPLACEMENT_CHARACTER),
                Action::Print('a'),
                Action::Print(char::REPLACEMENT_CHARACTER),
                Action::Print('b'),
            ]
        );
        // Surrogate encodings are invalid
        assert_eq!(
            parse_all(b"\xed\xa0\x80"),
            vec![Action::Print(char::REPLACEMENT_CHARACTER)]
        );
    }

    #[test]
    fn test_can_aborts_sequence() {
        assert_eq!(parse_all(b"\x1b[12\x18A"), vec![Action::Print('A')]);
        assert_eq!(parse_all(b"\x1b]0;abc\x1aB"), vec![Action::Print('B')]);
    }

    #[test]
    fn test_high_byte_aborts_csi() {
        assert_eq!(
            parse_all(b"\x1b[3\xc3\xa9"),
            vec![Action::Print('é')]
        );
    }

    proptest! {
        #[test]
        fn never_stuck_after_can(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut parser = VtParser::new();
            parse(&mut parser, &bytes);
            parse(&mut parser, &[CAN]);
            prop_assert!(parser.is_ground());
            prop_assert_eq!(parse(&mut parser, b"Z"), vec![Action::Print('Z')]);
        }
    }
}

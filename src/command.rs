/// Anything that is sent on the bus as a single command byte
pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM level commands understood by every device on the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    SearchRom = 0xF0,
    AlarmSearch = 0xEC,
    MatchRom = 0x55,
    SkipRom = 0xCC,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

use crate::address;

/// One trace record.
///
/// Commands are a closed set so the controller can match exhaustively;
/// the numeric codes are fixed by the trace file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 0: read request from the L1 data cache
    Read(address),
    /// 1: write request from the L1 data cache
    Write(address),
    /// 2: read request from the L1 instruction cache
    InstrRead(address),
    /// 3: snooped read request
    SnoopRead(address),
    /// 4: snooped write request
    SnoopWrite(address),
    /// 5: snooped read with intent to modify
    SnoopRwim(address),
    /// 6: snooped invalidate command
    SnoopInvalidate(address),
    /// 8: clear the cache and reset all state
    Clear,
    /// 9: print contents and state of each valid line
    Print,
}

/// Recoverable per-record failure: the line is reported and skipped, the
/// simulation continues.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid command code {0:?}")]
    InvalidCode(String),

    #[error("unknown command code {0}")]
    UnknownCode(u64),

    #[error("missing address operand")]
    MissingAddress,

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("address {addr:#x} exceeds the {bits} bit address space")]
    AddressOutOfRange { addr: address, bits: u32 },
}

/// Parse one trace line into a command.
///
/// Returns `Ok(None)` for blank lines and `#` comments. The address
/// operand is decimal or `0x` hex and must fit the configured address
/// width; commands 8 and 9 may omit it.
pub fn parse_record(line: &str, address_bits: u32) -> Result<Option<Command>, ParseError> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut tokens = line.split_whitespace();
    let Some(code) = tokens.next() else {
        return Ok(None);
    };
    let code: u64 = code
        .parse()
        .map_err(|_| ParseError::InvalidCode(code.to_string()))?;
    let addr = tokens
        .next()
        .map(|token| parse_address(token, address_bits))
        .transpose()?;
    let require = addr.ok_or(ParseError::MissingAddress);

    let command = match code {
        0 => Command::Read(require?),
        1 => Command::Write(require?),
        2 => Command::InstrRead(require?),
        3 => Command::SnoopRead(require?),
        4 => Command::SnoopWrite(require?),
        5 => Command::SnoopRwim(require?),
        6 => Command::SnoopInvalidate(require?),
        8 => Command::Clear,
        9 => Command::Print,
        other => return Err(ParseError::UnknownCode(other)),
    };
    Ok(Some(command))
}

fn parse_address(token: &str, bits: u32) -> Result<address, ParseError> {
    let value = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => address::from_str_radix(hex, 16),
        None => token.parse(),
    }
    .map_err(|_| ParseError::InvalidAddress(token.to_string()))?;

    if bits < 64 && value >> bits != 0 {
        return Err(ParseError::AddressOutOfRange { addr: value, bits });
    }
    Ok(value)
}

//! Bus-access scripts for the command line front end.
//!
//! One command per line, `#` starts a comment:
//!
//! ```text
//! w 4 0x1f810040 0x20      # write IFS0
//! r 1 0x1f822010           # byte read of U1STA
//! raise 113
//! clear 113
//! rx 1 0x41                # host pushes 'A' into UART1
//! dump 0x1f810020          # raw INTSTAT, no side effects
//! ```
//!
//! Addresses are physical. Values below the window size are taken as
//! offsets from the configured base.

use crate::SfrError;
use crate::bus::SfrBus;
use crate::cpu::CpuLink;
use crate::devices::uart::Uarts;
use crate::regfile::SFR_WINDOW;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read { width: usize, address: u32 },
    Write { width: usize, address: u32, value: u32 },
    Raise(usize),
    Clear(usize),
    Receive { unit: u8, byte: u8 },
    Dump(u32),
}

fn parse_number(token: &str) -> Option<u32> {
    let token = token.replace('_', "");
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

/// Parse one line. Blank and comment-only lines yield `None`.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Command>, SfrError> {
    let text = text.split('#').next().unwrap_or("").trim();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some((&verb, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let error = |message: String| SfrError::Script { line, message };
    let arg = |i: usize, what: &str| -> Result<u32, SfrError> {
        let token = args
            .get(i)
            .ok_or_else(|| error(format!("missing {}", what)))?;
        parse_number(token).ok_or_else(|| error(format!("bad {} '{}'", what, token)))
    };
    let expect_args = |n: usize| -> Result<(), SfrError> {
        if args.len() != n {
            return Err(error(format!("'{}' takes {} argument(s), got {}", verb, n, args.len())));
        }
        Ok(())
    };

    let command = match verb {
        "r" | "read" => {
            expect_args(2)?;
            Command::Read {
                width: arg(0, "width")? as usize,
                address: arg(1, "address")?,
            }
        }
        "w" | "write" => {
            expect_args(3)?;
            Command::Write {
                width: arg(0, "width")? as usize,
                address: arg(1, "address")?,
                value: arg(2, "value")?,
            }
        }
        "raise" => {
            expect_args(1)?;
            Command::Raise(arg(0, "source")? as usize)
        }
        "clear" => {
            expect_args(1)?;
            Command::Clear(arg(0, "source")? as usize)
        }
        "rx" => {
            expect_args(2)?;
            let unit = arg(0, "unit")?;
            let byte = arg(1, "byte")?;
            let (Ok(unit), Ok(byte)) = (u8::try_from(unit), u8::try_from(byte)) else {
                return Err(error("unit and byte must fit in 8 bits".to_string()));
            };
            Command::Receive { unit, byte }
        }
        "dump" => {
            expect_args(1)?;
            Command::Dump(arg(0, "address")?)
        }
        other => return Err(error(format!("unknown command '{}'", other))),
    };

    if let Command::Read { width, .. } | Command::Write { width, .. } = command {
        if !matches!(width, 1 | 2 | 4) {
            return Err(error(format!("width must be 1, 2 or 4, got {}", width)));
        }
    }
    Ok(Some(command))
}

/// Parse a whole script, keeping 1-based line numbers.
pub fn parse(text: &str) -> Result<Vec<(usize, Command)>, SfrError> {
    let mut commands = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(cmd) = parse_line(i + 1, line)? {
            commands.push((i + 1, cmd));
        }
    }
    Ok(commands)
}

/// Replays parsed commands against a bus and collects printable results.
pub struct ScriptRunner<'a, C: CpuLink> {
    bus: &'a mut SfrBus<C, Uarts>,
    output: Vec<String>,
}

impl<'a, C: CpuLink> ScriptRunner<'a, C> {
    pub fn new(bus: &'a mut SfrBus<C, Uarts>) -> Self {
        Self {
            bus,
            output: Vec::new(),
        }
    }

    fn physical(&self, line: usize, address: u32) -> Result<u32, SfrError> {
        let config = self.bus.config();
        if config.contains(address) {
            Ok(address)
        } else if address < SFR_WINDOW {
            Ok(config.base.wrapping_add(address))
        } else {
            Err(SfrError::Script {
                line,
                message: format!("address {:#010x} outside the SFR window", address),
            })
        }
    }

    fn register_name(&self, address: u32) -> String {
        let offset = self.bus.config().offset(address) & !3;
        match self.bus.table().resolve(offset) {
            Some((desc, op)) => format!("{}{}", desc.name, op.suffix()),
            None => "?".to_string(),
        }
    }

    pub fn execute(&mut self, line: usize, command: Command) -> Result<(), SfrError> {
        match command {
            Command::Read { width, address } => {
                let address = self.physical(line, address)?;
                let value = self.bus.on_bus_read(address, width)?;
                let name = self.register_name(address);
                self.output
                    .push(format!("{:#010x} {:<12} -> {:#010x}", address, name, value));
            }
            Command::Write { width, address, value } => {
                let address = self.physical(line, address)?;
                self.bus.on_bus_write(address, width, value)?;
            }
            Command::Raise(source) => {
                self.bus.raise_source(source)?;
            }
            Command::Clear(source) => {
                self.bus.clear_source(source)?;
            }
            Command::Receive { unit, byte } => {
                let (uarts, mut io) = self.bus.split_io();
                uarts.push_input(&mut io, unit, byte)?;
            }
            Command::Dump(address) => {
                let address = self.physical(line, address)?;
                let name = self.register_name(address);
                let value = self.bus.peek(self.bus.config().offset(address)).unwrap_or(0);
                self.output
                    .push(format!("{:#010x} {:<12} == {:#010x}", address, name, value));
            }
        }
        Ok(())
    }

    /// Run every command; the first bus error aborts the replay.
    pub fn run(mut self, commands: &[(usize, Command)]) -> Result<Vec<String>, SfrError> {
        for &(line, command) in commands {
            self.execute(line, command)?;
        }
        Ok(self.output)
    }
}

use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use thiserror::Error;

use crate::error::status_code;
use crate::process::{Instruction, Process};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to access trace file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },
}

/// Outcome of one executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    pub instruction: Instruction,
    pub status: i32,
    pub value: Option<u8>,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.instruction, self.status)?;
        if let Some(v) = self.value {
            write!(f, " ({})", v)?;
        }
        Ok(())
    }
}

pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Instruction>, TraceError> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_trace(&content)
}

/// Parse one instruction per line. `#` starts a comment; blank lines are skipped.
pub fn parse_trace(content: &str) -> Result<Vec<Instruction>, TraceError> {
    let mut program = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let inst = parse_instruction(line)
            .map_err(|msg| TraceError::Parse { line: index + 1, msg })?;
        program.push(inst);
    }
    Ok(program)
}

fn parse_instruction(line: &str) -> Result<Instruction, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (op, args) = tokens.split_first().ok_or_else(|| "empty instruction".to_string())?;
    let expected = match *op {
        "alloc" | "read" => 2,
        "free" => 1,
        "write" => 3,
        other => return Err(format!("unknown instruction '{}'", other)),
    };
    if args.len() != expected {
        return Err(format!("'{}' takes {} operands, got {}", op, expected, args.len()));
    }

    let inst = match *op {
        "alloc" => Instruction::Alloc { size: number(args[0])?, handle: number(args[1])? },
        "free" => Instruction::Free { handle: number(args[0])? },
        "read" => Instruction::Read { handle: number(args[0])?, offset: number(args[1])? },
        _ => Instruction::Write {
            value: args[0].parse().map_err(|_| format!("invalid byte value: {}", args[0]))?,
            handle: number(args[1])?,
            offset: number(args[2])?,
        },
    };
    Ok(inst)
}

fn number(token: &str) -> Result<usize, String> {
    token.parse().map_err(|_| format!("invalid number: {}", token))
}

/// Execute `program` on `process` in order, stopping after the first failing instruction.
pub fn run_trace(process: &Process, program: &[Instruction]) -> Vec<StepResult> {
    let mut steps = Vec::with_capacity(program.len());
    for inst in program {
        let result = process.execute(inst);
        let step = StepResult {
            instruction: *inst,
            status: status_code(&result),
            value: result.as_ref().ok().copied().flatten(),
        };
        steps.push(step);
        if let Err(e) = result {
            debug!("pid={} halts at '{}': {}", process.pid(), inst, e);
            break;
        }
    }
    steps
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[StepResult]) -> Result<(), TraceError> {
    let mut content: String = results.iter().map(|r| format!("{}\n", r)).collect();
    if content.is_empty() {
        content.push('\n');
    }
    fs::write(path.as_ref(), content)?;
    Ok(())
}

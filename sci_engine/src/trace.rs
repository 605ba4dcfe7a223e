//! Replays a recorded sequence of kernel calls against a scripted heap and
//! platform, so dispatcher behavior can be checked without an interpreter.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dispatch::{CallOutcome, KernelDispatcher};
use crate::heap::SegmentTable;
use crate::platform::{LocalTime, PlatformEvent, ScheduledEvent, ScriptedPlatform};
use crate::reg::Reg;
use crate::state::EngineState;
use crate::version::{GameId, SciVersion};
use crate::workarounds::CallOrigin;

#[derive(Debug, Clone, Deserialize)]
pub struct CallTrace {
    #[serde(default)]
    pub heap: SegmentTable,
    #[serde(default)]
    pub events: Vec<ScheduledEvent>,
    #[serde(default)]
    pub local_time: Option<LocalTime>,
    pub calls: Vec<TraceCall>,
}

/// A kernel named either by number or by name in the loaded table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KernelRef {
    Number(usize),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceCall {
    pub kernel: KernelRef,
    /// Registers in debugger notation (`0003:0010`, `-5`, `null`, `uninit`).
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub origin: Option<CallOrigin>,
}

impl CallTrace {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read call trace: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse call trace json: {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceOutcome {
    Value { value: String },
    Keep,
    Stubbed,
    Restart,
    Quit,
    Error { message: String },
}

impl From<CallOutcome> for TraceOutcome {
    fn from(outcome: CallOutcome) -> Self {
        match outcome {
            CallOutcome::Value(reg) => TraceOutcome::Value {
                value: reg.to_string(),
            },
            CallOutcome::Keep => TraceOutcome::Keep,
            CallOutcome::Stubbed => TraceOutcome::Stubbed,
            CallOutcome::Restart => TraceOutcome::Restart,
            CallOutcome::Quit => TraceOutcome::Quit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub index: usize,
    pub number: Option<usize>,
    pub kernel: String,
    pub args: Vec<String>,
    pub outcome: TraceOutcome,
    /// Accumulator after the call.
    pub accumulator: String,
    /// Input the call pumped from the platform.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<PlatformEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub game: GameId,
    pub version: SciVersion,
    pub calls: Vec<TraceRecord>,
    pub errors: usize,
    /// The trace stopped early on a quit request.
    pub quit: bool,
}

/// Runs every call of `trace` in order. Dispatch errors are recorded and
/// the trace continues; a quit outcome ends it.
pub fn run_trace(
    dispatcher: &KernelDispatcher<EngineState>,
    trace: &CallTrace,
    config: &EngineConfig,
) -> Result<TraceReport> {
    let version = dispatcher.table().version();
    let mut platform = ScriptedPlatform::new(trace.events.clone());
    if let Some(time) = trace.local_time {
        platform = platform.with_local_time(time);
    }
    let mut state =
        EngineState::new(version, trace.heap.clone(), Box::new(platform)).seed(config.random_seed);

    let mut report = TraceReport {
        game: config.game,
        version,
        calls: Vec::with_capacity(trace.calls.len()),
        errors: 0,
        quit: false,
    };
    let mut accumulator = Reg::NULL;

    for (index, call) in trace.calls.iter().enumerate() {
        let args = call
            .args
            .iter()
            .map(|arg| arg.parse::<Reg>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("call {index}: bad argument"))?;
        let origin = call
            .origin
            .clone()
            .unwrap_or_else(|| CallOrigin::unknown(config.game));

        let number = match &call.kernel {
            KernelRef::Number(number) => Some(*number),
            KernelRef::Name(name) => dispatcher.find_kernel(name),
        };
        let kernel = match (&call.kernel, number) {
            (_, Some(number)) => dispatcher
                .table()
                .name_of(number, None)
                .map_or_else(|| format!("0x{number:x}"), str::to_string),
            (KernelRef::Name(name), None) => name.clone(),
            (KernelRef::Number(number), None) => format!("0x{number:x}"),
        };

        let outcome = match number {
            None => {
                warn!("call {index}: k{kernel} does not exist in {version}");
                report.errors += 1;
                TraceOutcome::Error {
                    message: format!("no kernel named {kernel} in {version}"),
                }
            }
            Some(number) => match dispatcher.call(&mut state, number, &args, &origin) {
                Ok(outcome) => {
                    accumulator = outcome.accumulator(accumulator);
                    if outcome == CallOutcome::Quit {
                        report.quit = true;
                    }
                    outcome.into()
                }
                Err(err) => {
                    warn!("call {index}: {err}");
                    report.errors += 1;
                    TraceOutcome::Error {
                        message: err.to_string(),
                    }
                }
            },
        };
        debug!("call {index}: k{kernel} -> {outcome:?}, acc {accumulator}");

        report.calls.push(TraceRecord {
            index,
            number,
            kernel,
            args: call.args.clone(),
            outcome,
            accumulator: accumulator.to_string(),
            events: state.take_events(),
        });
        if report.quit {
            break;
        }
    }

    Ok(report)
}

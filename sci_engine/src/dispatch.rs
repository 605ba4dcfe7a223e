//! The CALLK boundary: from a kernel number and raw arguments to a native
//! call, with workarounds and signature checks in between.

use std::borrow::Cow;

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heap::{HeapInspect, RegKind};
use crate::kernel::{
    EntryPoint, KernelFunction, KernelMapEntry, KernelReturn, KernelTable, KernelTableError,
};
use crate::names::NameTables;
use crate::reg::Reg;
use crate::signature::SignatureMismatch;
use crate::workarounds::{CallOrigin, WorkaroundSolution};

/// What to do with a call whose arguments do not match the signature and
/// no workaround covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePolicy {
    /// Fail the call.
    Strict,
    /// Log and call anyway.
    Permissive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub policy: SignaturePolicy,
    /// Log every kernel call at info level.
    pub trace_calls: bool,
}

impl DispatchConfig {
    pub fn new(policy: SignaturePolicy) -> Self {
        DispatchConfig {
            policy,
            trace_calls: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Value(Reg),
    /// Accumulator unchanged.
    Keep,
    /// Nothing was called; the accumulator becomes null.
    Stubbed,
    Restart,
    Quit,
}

impl CallOutcome {
    /// Accumulator after the call, given its value before.
    pub fn accumulator(self, previous: Reg) -> Reg {
        match self {
            CallOutcome::Value(value) => value,
            CallOutcome::Stubbed => Reg::NULL,
            CallOutcome::Keep | CallOutcome::Restart | CallOutcome::Quit => previous,
        }
    }
}

impl From<KernelReturn> for CallOutcome {
    fn from(value: KernelReturn) -> Self {
        match value {
            KernelReturn::Value(reg) => CallOutcome::Value(reg),
            KernelReturn::Keep => CallOutcome::Keep,
            KernelReturn::Restart => CallOutcome::Restart,
            KernelReturn::Quit => CallOutcome::Quit,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("k{kernel}: argument {position} is uninitialized (from {origin})")]
    UninitializedArgument {
        kernel: String,
        position: usize,
        origin: CallOrigin,
    },
    #[error("k{kernel}: {mismatch} (from {origin})")]
    SignatureMismatch {
        kernel: String,
        origin: CallOrigin,
        #[source]
        mismatch: SignatureMismatch,
        /// Per-argument listing of the rejected call.
        report: String,
    },
}

enum Prepared<'a> {
    Call(Cow<'a, [Reg]>),
    Skip(CallOutcome),
}

/// Owns the name and kernel tables for one game and routes kernel calls.
pub struct KernelDispatcher<S> {
    names: NameTables,
    table: KernelTable<S>,
    config: DispatchConfig,
}

impl<S: HeapInspect + 'static> KernelDispatcher<S> {
    pub fn new(
        names: NameTables,
        map: &[KernelMapEntry<S>],
        config: DispatchConfig,
    ) -> Result<Self, KernelTableError> {
        let table = KernelTable::build(&names, map)?;
        Ok(KernelDispatcher {
            names,
            table,
            config,
        })
    }

    pub fn names(&self) -> &NameTables {
        &self.names
    }

    pub fn table(&self) -> &KernelTable<S> {
        &self.table
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Turns per-function call logging on or off; see
    /// [`KernelTable::set_debug_logging`].
    pub fn set_debug_logging(&mut self, pattern: &str, enabled: bool) -> usize {
        self.table.set_debug_logging(pattern, enabled)
    }

    fn logs_calls(&self, function: &KernelFunction<S>) -> bool {
        self.config.trace_calls || function.debug_logging
    }

    /// Kernel number of `name` for the loaded version.
    pub fn find_kernel(&self, name: &str) -> Option<usize> {
        self.table.find(name)
    }

    pub fn call(
        &self,
        state: &mut S,
        number: usize,
        args: &[Reg],
        origin: &CallOrigin,
    ) -> Result<CallOutcome, DispatchError> {
        let Some(function) = self.table.get(number) else {
            warn!(
                "kernel call 0x{number:x} out of range ({} functions), from {origin}",
                self.table.len()
            );
            return Ok(CallOutcome::Stubbed);
        };

        let logged = self.logs_calls(function);
        if logged {
            info!("k{}({}) from {origin}", function.name, format_args_list(args));
        }

        if !function.is_implemented() {
            warn!("k{} is not implemented, returning null", function.name);
            return Ok(CallOutcome::Stubbed);
        }

        let args = match self.prepare(state, function, args, origin)? {
            Prepared::Call(args) => args,
            Prepared::Skip(outcome) => return Ok(outcome),
        };

        if function.sub_functions.is_none() {
            return Ok(invoke(state, function, &args));
        }

        let Some(sub) = select_sub_function(state, function, &args) else {
            return Ok(CallOutcome::Stubbed);
        };
        if !logged && sub.debug_logging {
            info!(
                "k{}[{}]({}) from {origin}",
                function.name,
                sub.name,
                format_args_list(&args[1..])
            );
        }
        let sub_args = match self.prepare(state, sub, &args[1..], origin)? {
            Prepared::Call(args) => args,
            Prepared::Skip(outcome) => return Ok(outcome),
        };
        Ok(invoke(state, sub, &sub_args))
    }

    /// Applies substitutions, rejects uninitialized arguments and checks
    /// the signature.
    fn prepare<'a>(
        &self,
        state: &S,
        function: &KernelFunction<S>,
        args: &'a [Reg],
        origin: &CallOrigin,
    ) -> Result<Prepared<'a>, DispatchError> {
        let mut args = Cow::Borrowed(args);
        for (argument, value) in function.workarounds.substitutions(origin) {
            if argument < args.len() {
                debug!(
                    "k{}: replacing argument {argument} ({}) with {value} for {origin}",
                    function.name, args[argument]
                );
                args.to_mut()[argument] = Reg::int(value);
            } else {
                warn!(
                    "k{}: substitution for argument {argument} but only {} given",
                    function.name,
                    args.len()
                );
            }
        }

        if let Some(position) = args
            .iter()
            .position(|arg| state.classify(*arg).kind == RegKind::Uninitialized)
        {
            return Err(DispatchError::UninitializedArgument {
                kernel: function.name.clone(),
                position,
                origin: origin.clone(),
            });
        }

        let Some(signature) = function.signature.as_ref() else {
            return Ok(Prepared::Call(args));
        };
        let Err(mismatch) = signature.check(state, &args) else {
            return Ok(Prepared::Call(args));
        };

        if let Some(entry) = function.workarounds.on_mismatch(origin) {
            match entry.solution {
                WorkaroundSolution::Ignore => {
                    debug!("k{}: ignoring call from {origin}", function.name);
                    return Ok(Prepared::Skip(CallOutcome::Keep));
                }
                WorkaroundSolution::Fake(value) => {
                    debug!("k{}: faking {value} for {origin}", function.name);
                    return Ok(Prepared::Skip(CallOutcome::Value(Reg::int(value))));
                }
                WorkaroundSolution::StillCall => {
                    debug!("k{}: calling despite mismatch from {origin}", function.name);
                    return Ok(Prepared::Call(args));
                }
                WorkaroundSolution::Substitute { .. } => {}
            }
        }

        let report = signature.debug_report(state, &args);
        match self.config.policy {
            SignaturePolicy::Strict => Err(DispatchError::SignatureMismatch {
                kernel: function.name.clone(),
                origin: origin.clone(),
                mismatch,
                report,
            }),
            SignaturePolicy::Permissive => {
                warn!(
                    "k{}: {mismatch} from {origin}, calling anyway\n{report}",
                    function.name
                );
                Ok(Prepared::Call(args))
            }
        }
    }
}

fn select_sub_function<'t, S: HeapInspect>(
    state: &S,
    function: &'t KernelFunction<S>,
    args: &[Reg],
) -> Option<&'t KernelFunction<S>> {
    let Some(&selector) = args.first() else {
        warn!("k{}: no sub-function id given", function.name);
        return None;
    };
    if !matches!(
        state.classify(selector).kind,
        RegKind::Null | RegKind::Integer
    ) {
        warn!("k{}: sub-function id {selector} is a pointer", function.name);
        return None;
    }

    let id = selector.to_u16() as usize;
    match function.sub_function(id) {
        Some(sub) if sub.is_implemented() => Some(sub),
        Some(sub) => {
            warn!("k{} is not implemented, returning null", sub.name);
            None
        }
        None => {
            warn!("k{}: sub-function {id} does not exist", function.name);
            None
        }
    }
}

fn invoke<S>(state: &mut S, function: &KernelFunction<S>, args: &[Reg]) -> CallOutcome {
    match function.entry {
        EntryPoint::Native(native) => native(state, args).into(),
        EntryPoint::Empty => CallOutcome::Keep,
        EntryPoint::Unimplemented => CallOutcome::Stubbed,
    }
}

fn format_args_list(args: &[Reg]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{RegType, SegmentTable};
    use crate::kernel::KernelSubEntry;
    use crate::version::{GameId, SciVersion, VersionRange};
    use crate::workarounds::{WorkaroundEntry, ABS_WORKAROUNDS};

    #[derive(Default)]
    struct Recorder {
        heap: SegmentTable,
        seen: Vec<Vec<Reg>>,
    }

    impl HeapInspect for Recorder {
        fn classify(&self, reg: Reg) -> RegType {
            self.heap.classify(reg)
        }
    }

    fn record(state: &mut Recorder, args: &[Reg]) -> KernelReturn {
        state.seen.push(args.to_vec());
        KernelReturn::Value(Reg::int(args.len() as u16))
    }

    const FIX_FIRST: &[WorkaroundEntry] = &[WorkaroundEntry {
        game: GameId::Sq3,
        room: None,
        script: 10,
        object: "ego",
        method: "init",
        local_call_offset: None,
        solution: WorkaroundSolution::Substitute {
            argument: 0,
            value: 7,
        },
    }];

    static SUBS: &[KernelSubEntry<Recorder>] = &[
        KernelSubEntry::new(VersionRange::ALL, 0, "MixerOne", EntryPoint::Native(record), Some("i")),
        KernelSubEntry::new(VersionRange::ALL, 2, "MixerNone", EntryPoint::Unimplemented, None),
    ];

    static MAP: &[KernelMapEntry<Recorder>] = &[
        KernelMapEntry::new("Abs", EntryPoint::Native(record), Some("i")).workarounds(ABS_WORKAROUNDS),
        KernelMapEntry::new("Fixed", EntryPoint::Native(record), Some("ii")).workarounds(FIX_FIRST),
        KernelMapEntry::new("Nothing", EntryPoint::Empty, Some("(.*)")),
        KernelMapEntry::new("Mixer", EntryPoint::Native(record), None).sub_functions(SUBS),
    ];

    fn dispatcher(policy: SignaturePolicy) -> KernelDispatcher<Recorder> {
        let names = ["Abs", "Fixed", "Nothing", "Mixer", "Missing"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        let names = NameTables::from_parts(SciVersion::Sci1Late, names, Vec::new());
        KernelDispatcher::new(names, MAP, DispatchConfig::new(policy)).unwrap()
    }

    fn nowhere() -> CallOrigin {
        CallOrigin::unknown(GameId::Unknown)
    }

    #[test]
    fn out_of_range_and_unmapped_calls_are_stubbed() {
        let dispatcher = dispatcher(SignaturePolicy::Strict);
        let mut state = Recorder::default();
        let origin = nowhere();
        assert_eq!(
            dispatcher.call(&mut state, 99, &[], &origin).unwrap(),
            CallOutcome::Stubbed
        );
        assert_eq!(
            dispatcher.call(&mut state, 4, &[], &origin).unwrap(),
            CallOutcome::Stubbed
        );
        assert!(state.seen.is_empty());
    }

    #[test]
    fn strict_policy_rejects_and_permissive_calls_anyway() {
        let origin = nowhere();
        let mut state = Recorder::default();
        let strict = dispatcher(SignaturePolicy::Strict);
        let err = strict
            .call(&mut state, 0, &[Reg::int(1), Reg::int(2)], &origin)
            .unwrap_err();
        match err {
            DispatchError::SignatureMismatch { kernel, report, .. } => {
                assert_eq!(kernel, "Abs");
                assert!(report.contains("EXTRA"));
            }
            other => panic!("unexpected {other}"),
        }
        assert!(state.seen.is_empty());

        let permissive = dispatcher(SignaturePolicy::Permissive);
        let outcome = permissive
            .call(&mut state, 0, &[Reg::int(1), Reg::int(2)], &origin)
            .unwrap();
        assert_eq!(outcome, CallOutcome::Value(Reg::int(2)));
    }

    #[test]
    fn fake_workaround_skips_the_native() {
        let dispatcher = dispatcher(SignaturePolicy::Strict);
        let mut state = Recorder::default();
        let origin = CallOrigin::new(GameId::Hoyle1, 1, 1, "room1", "doit");
        let outcome = dispatcher
            .call(&mut state, 0, &[Reg::new(4, 0)], &origin)
            .unwrap();
        assert_eq!(outcome, CallOutcome::Value(Reg::int(0x3e9)));
        assert!(state.seen.is_empty());
    }

    #[test]
    fn substitution_replaces_uninitialized_argument() {
        let dispatcher = dispatcher(SignaturePolicy::Strict);
        let mut state = Recorder::default();
        let args = [Reg::uninitialized(), Reg::int(3)];

        let elsewhere = nowhere();
        assert!(matches!(
            dispatcher.call(&mut state, 1, &args, &elsewhere),
            Err(DispatchError::UninitializedArgument { position: 0, .. })
        ));

        let origin = CallOrigin::new(GameId::Sq3, 44, 10, "ego", "init");
        dispatcher.call(&mut state, 1, &args, &origin).unwrap();
        assert_eq!(state.seen, vec![vec![Reg::int(7), Reg::int(3)]]);
    }

    #[test]
    fn empty_entry_keeps_accumulator() {
        let dispatcher = dispatcher(SignaturePolicy::Strict);
        let mut state = Recorder::default();
        let outcome = dispatcher
            .call(&mut state, 2, &[Reg::int(1)], &nowhere())
            .unwrap();
        assert_eq!(outcome, CallOutcome::Keep);
        assert_eq!(outcome.accumulator(Reg::int(9)), Reg::int(9));
        assert_eq!(CallOutcome::Stubbed.accumulator(Reg::int(9)), Reg::NULL);
    }

    #[test]
    fn sub_functions_drop_the_selector_argument() {
        let dispatcher = dispatcher(SignaturePolicy::Strict);
        let mut state = Recorder::default();
        let origin = nowhere();

        let outcome = dispatcher
            .call(&mut state, 3, &[Reg::int(0), Reg::int(5)], &origin)
            .unwrap();
        assert_eq!(outcome, CallOutcome::Value(Reg::int(1)));
        assert_eq!(state.seen, vec![vec![Reg::int(5)]]);

        for args in [
            vec![],
            vec![Reg::int(1)],
            vec![Reg::int(2)],
            vec![Reg::int(40)],
            vec![Reg::new(9, 0)],
        ] {
            assert_eq!(
                dispatcher.call(&mut state, 3, &args, &origin).unwrap(),
                CallOutcome::Stubbed,
                "args {args:?}"
            );
        }
        assert_eq!(state.seen.len(), 1);
    }

    #[test]
    fn sub_function_signatures_are_checked() {
        let dispatcher = dispatcher(SignaturePolicy::Strict);
        let mut state = Recorder::default();
        assert!(matches!(
            dispatcher.call(&mut state, 3, &[Reg::int(0)], &nowhere()),
            Err(DispatchError::SignatureMismatch { ref kernel, .. }) if kernel == "MixerOne"
        ));
    }

    #[test]
    fn debug_logging_selects_single_functions() {
        let mut dispatcher = dispatcher(SignaturePolicy::Strict);
        let abs = dispatcher.table().get(0).unwrap();
        assert!(!dispatcher.logs_calls(abs));

        assert_eq!(dispatcher.set_debug_logging("Abs", true), 1);
        assert_eq!(dispatcher.set_debug_logging("MixerOne", true), 1);
        let table = dispatcher.table();
        assert!(dispatcher.logs_calls(table.get(0).unwrap()));
        assert!(!dispatcher.logs_calls(table.get(1).unwrap()));
        let mixer = table.get(3).unwrap();
        assert!(!dispatcher.logs_calls(mixer));
        assert!(dispatcher.logs_calls(mixer.sub_function(0).unwrap()));

        // flagged calls still dispatch normally
        let mut state = Recorder::default();
        let outcome = dispatcher
            .call(&mut state, 3, &[Reg::int(0), Reg::int(5)], &nowhere())
            .unwrap();
        assert_eq!(outcome, CallOutcome::Value(Reg::int(1)));

        let mut config = DispatchConfig::new(SignaturePolicy::Strict);
        config.trace_calls = true;
        let names = NameTables::from_parts(
            SciVersion::Sci1Late,
            vec!["Fixed".to_string()],
            Vec::new(),
        );
        let traced = KernelDispatcher::new(names, MAP, config).unwrap();
        assert!(traced.logs_calls(traced.table().get(0).unwrap()));
    }
}

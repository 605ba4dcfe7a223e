use sci_engine::names::default_kernel_names;
use sci_engine::platform::ScriptedPlatform;
use sci_engine::{
    CallOrigin, CallOutcome, DispatchConfig, DispatchError, EngineState, GameId, KernelDispatcher,
    NameTables, Reg, SciVersion, Segment, SegmentKind, SegmentTable, SignatureMismatch,
    SignaturePolicy, KERNEL_MAP,
};

const SOUND_OBJECT: Reg = Reg::new(1, 0x40);

fn heap() -> SegmentTable {
    let mut heap = SegmentTable::new();
    heap.insert(1, Segment::buffer(SegmentKind::Script, 0x1000));
    heap.add_object(SOUND_OBJECT);
    heap
}

fn engine(version: SciVersion) -> EngineState {
    EngineState::new(version, heap(), Box::new(ScriptedPlatform::new(Vec::new()))).seed(Some(11))
}

fn dispatcher(version: SciVersion, policy: SignaturePolicy) -> KernelDispatcher<EngineState> {
    let names = match version {
        SciVersion::Sci11 => {
            NameTables::from_parts(version, default_kernel_names(version), Vec::new())
        }
        _ => NameTables::builtin(version).expect("static tables"),
    };
    KernelDispatcher::new(names, KERNEL_MAP, DispatchConfig::new(policy)).expect("kernel table")
}

fn call(
    dispatcher: &KernelDispatcher<EngineState>,
    state: &mut EngineState,
    name: &str,
    args: &[Reg],
    origin: &CallOrigin,
) -> Result<CallOutcome, DispatchError> {
    let number = dispatcher
        .find_kernel(name)
        .unwrap_or_else(|| panic!("k{name} missing"));
    dispatcher.call(state, number, args, origin)
}

#[test]
fn fixed_signatures_require_exact_argument_counts() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci1Late);
    let origin = CallOrigin::unknown(GameId::Unknown);

    assert_eq!(
        call(&dispatcher, &mut state, "Sqrt", &[Reg::int(81)], &origin).unwrap(),
        CallOutcome::Value(Reg::int(9))
    );
    match call(&dispatcher, &mut state, "Sqrt", &[], &origin) {
        Err(DispatchError::SignatureMismatch { mismatch, .. }) => assert_eq!(
            mismatch,
            SignatureMismatch::NotEnoughArguments {
                required: 1,
                given: 0
            }
        ),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        call(&dispatcher, &mut state, "Sqrt", &[Reg::int(4), Reg::int(4)], &origin),
        Err(DispatchError::SignatureMismatch {
            mismatch: SignatureMismatch::TooManyArguments { .. },
            ..
        })
    ));
}

#[test]
fn variadic_tail_accepts_any_count_but_never_uninitialized() {
    let dispatcher = dispatcher(SciVersion::Sci11, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci11);
    let origin = CallOrigin::unknown(GameId::Unknown);

    for count in [0, 1, 5] {
        let args = vec![Reg::int(3); count];
        assert_eq!(
            call(&dispatcher, &mut state, "Empty", &args, &origin).unwrap(),
            CallOutcome::Keep
        );
    }
    assert!(matches!(
        call(
            &dispatcher,
            &mut state,
            "Empty",
            &[Reg::int(1), Reg::uninitialized()],
            &origin
        ),
        Err(DispatchError::UninitializedArgument { position: 1, .. })
    ));
}

#[test]
fn uninitialized_arguments_fail_even_when_permissive() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Permissive);
    let mut state = engine(SciVersion::Sci1Late);
    let origin = CallOrigin::new(GameId::Lsl6, 100, 82, "", "export 0");
    assert!(matches!(
        call(&dispatcher, &mut state, "Wait", &[Reg::uninitialized()], &origin),
        Err(DispatchError::UninitializedArgument { .. })
    ));
}

#[test]
fn substitution_lets_the_native_see_the_replacement() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci1Late);
    let origin = CallOrigin::new(GameId::Lsl6, 820, 82, "", "export 0");

    let outcome = call(&dispatcher, &mut state, "Wait", &[Reg::uninitialized()], &origin);
    // a zero-tick wait returns immediately without advancing the clock
    assert_eq!(outcome.unwrap(), CallOutcome::Value(Reg::int(0)));
    assert_eq!(state.platform.ticks(), 0);
}

#[test]
fn fake_and_ignore_workarounds_skip_the_native() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci1Late);

    let hoyle = CallOrigin::new(GameId::Hoyle1, 3, 3, "room3", "doit");
    assert_eq!(
        call(&dispatcher, &mut state, "Abs", &[SOUND_OBJECT], &hoyle).unwrap(),
        CallOutcome::Value(Reg::int(0x3e9))
    );

    let kq5 = CallOrigin::new(GameId::Kq5, 213, 989, "globalSound3", "fade");
    let fade = [Reg::int(10), SOUND_OBJECT];
    assert_eq!(
        call(&dispatcher, &mut state, "DoSound", &fade, &kq5).unwrap(),
        CallOutcome::Keep
    );
    assert!(state.sound.status(SOUND_OBJECT).is_none());

    let elsewhere = CallOrigin::new(GameId::Kq5, 214, 989, "globalSound3", "fade");
    assert!(call(&dispatcher, &mut state, "DoSound", &fade, &elsewhere).is_err());
}

#[test]
fn still_call_needs_the_local_call_offset() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci1Late);
    let args = [Reg::int(3), Reg::int(4), SOUND_OBJECT];

    let mut origin = CallOrigin::new(GameId::Sq4, 520, 520, "robot", "doit");
    assert!(call(&dispatcher, &mut state, "GetDistance", &args, &origin).is_err());

    origin.local_call_offset = Some(0x34);
    assert!(matches!(
        call(&dispatcher, &mut state, "GetDistance", &args, &origin).unwrap(),
        CallOutcome::Value(_)
    ));
}

#[test]
fn sub_function_selection_stubs_bad_ids() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci1Late);
    let origin = CallOrigin::unknown(GameId::Unknown);

    for args in [
        vec![],
        vec![Reg::int(40)],
        vec![SOUND_OBJECT],
        vec![Reg::int(12), SOUND_OBJECT, Reg::int(1), Reg::int(2), Reg::int(3)],
    ] {
        assert_eq!(
            call(&dispatcher, &mut state, "DoSound", &args, &origin).unwrap(),
            CallOutcome::Stubbed,
            "args {args:?}"
        );
    }

    assert_eq!(
        call(&dispatcher, &mut state, "DoSound", &[Reg::int(3)], &origin).unwrap(),
        CallOutcome::Value(Reg::int(9))
    );
}

#[test]
fn unknown_names_are_stubbed_not_rejected() {
    let dispatcher = dispatcher(SciVersion::Sci1Late, SignaturePolicy::Strict);
    let mut state = engine(SciVersion::Sci1Late);
    let origin = CallOrigin::unknown(GameId::Unknown);

    let outcome = call(&dispatcher, &mut state, "DrawPic", &[Reg::int(1)], &origin).unwrap();
    assert_eq!(outcome, CallOutcome::Stubbed);
    assert_eq!(outcome.accumulator(Reg::int(5)), Reg::NULL);
    assert_eq!(
        dispatcher
            .call(&mut state, 0x4000, &[], &origin)
            .unwrap(),
        CallOutcome::Stubbed
    );
}

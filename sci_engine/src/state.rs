use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::heap::{HeapInspect, RegType, SegmentTable};
use crate::kfuncs::lists::ListStore;
use crate::kfuncs::sound::SoundRegistry;
use crate::platform::{Platform, PlatformEvent, SystemPlatform};
use crate::reg::Reg;
use crate::version::SciVersion;

/// Everything a native kernel function may touch.
pub struct EngineState {
    pub version: SciVersion,
    pub heap: SegmentTable,
    pub lists: ListStore,
    pub sound: SoundRegistry,
    pub rng: StdRng,
    pub platform: Box<dyn Platform>,
    pub restarting: bool,
    /// Platform time of the previous kWait, in milliseconds.
    pub last_wait_ms: u64,
    /// Non-quit input seen while a kernel call was pumping events.
    pub pending_events: Vec<PlatformEvent>,
}

impl EngineState {
    pub fn new(version: SciVersion, heap: SegmentTable, platform: Box<dyn Platform>) -> Self {
        EngineState {
            version,
            heap,
            lists: ListStore::default(),
            sound: SoundRegistry::default(),
            rng: StdRng::from_entropy(),
            platform,
            restarting: false,
            last_wait_ms: 0,
            pending_events: Vec::new(),
        }
    }

    /// State with an empty heap on the wall clock.
    pub fn with_system_platform(version: SciVersion) -> Self {
        EngineState::new(version, SegmentTable::new(), Box::new(SystemPlatform::new()))
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    /// Drains platform events, keeping input for the interpreter. Returns
    /// true when the host asked to quit.
    pub fn pump_events(&mut self) -> bool {
        let mut quit = false;
        while let Some(event) = self.platform.poll_event() {
            match event {
                PlatformEvent::Quit => quit = true,
                other => self.pending_events.push(other),
            }
        }
        quit
    }

    /// Hands queued input to the caller, leaving the queue empty.
    pub fn take_events(&mut self) -> Vec<PlatformEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

impl HeapInspect for EngineState {
    fn classify(&self, reg: Reg) -> RegType {
        self.heap.classify(reg)
    }
}

//! Kernel call boundary of a Sierra SCI interpreter: name tables, the
//! per-version kernel table, argument signatures, per-game workarounds and
//! the native kernel functions behind them.

pub mod config;
pub mod dispatch;
pub mod heap;
pub mod kernel;
pub mod kfuncs;
pub mod names;
pub mod platform;
pub mod reg;
pub mod signature;
pub mod state;
pub mod trace;
pub mod version;
pub mod workarounds;

pub use config::EngineConfig;
pub use dispatch::{CallOutcome, DispatchConfig, DispatchError, KernelDispatcher, SignaturePolicy};
pub use heap::{HeapInspect, RegKind, RegType, Segment, SegmentKind, SegmentTable};
pub use kernel::{EntryPoint, KernelMapEntry, KernelReturn, KernelSubEntry, KernelTable};
pub use kfuncs::KERNEL_MAP;
pub use names::{NameTableError, NameTables};
pub use reg::Reg;
pub use signature::{Signature, SignatureError, SignatureMismatch, TypeMask};
pub use state::EngineState;
pub use version::{GameId, SciVersion, VersionRange};
pub use workarounds::{CallOrigin, WorkaroundEntry, WorkaroundSolution};

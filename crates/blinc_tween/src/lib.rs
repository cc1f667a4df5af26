//! Blinc Tween Engine
//!
//! Time-based interpolation of named fields on plain objects, composed into
//! timelines and driven by a frame scheduler.
//!
//! # Features
//!
//! - **Tweens**: Numbers, numeric arrays, hex colors, and waypoint paths with
//!   delay, repeat, yoyo, and time scaling
//! - **Easing**: Named Penner curves and CSS-style cubic beziers
//! - **Ownership**: The last tween to bind a field drives it; earlier ones let go
//! - **Timelines**: Labeled steps flattened into sequences and parallel blocks
//! - **Scheduler**: Rate-limited tickers that sleep when idle
//!
//! # Example
//!
//! ```
//! use blinc_tween::{Object, Scheduler, Target, TweenConfig};
//!
//! let mut scheduler = Scheduler::new();
//! let target = Target::new(Object::new().with("x", 0.0));
//! scheduler
//!     .create(&target, 1.0, TweenConfig::new().to("x", 100.0))
//!     .unwrap();
//!
//! scheduler.update(Some(0.5));
//! assert_eq!(target.number("x"), Some(50.0));
//! ```

pub mod config;
pub mod easing;
pub mod error;
pub mod frame;
pub mod handle;
pub mod plot;
pub mod property;
pub mod registry;
pub mod runnable;
pub mod scheduler;
pub mod target;
pub mod ticker;
pub mod timeline;
pub mod tween;
pub mod value;

pub use config::{EngineConfig, PlaybackConfig, TimelineConfig, TweenConfig};
pub use easing::{CubicBezier, EaseSpec, Easing};
pub use error::{Result, TweenError};
pub use frame::{Clock, FrameRequest, FrameSource, ManualClock, PendingFrames, SystemClock};
pub use handle::{TimelineHandle, TweenHandle};
pub use plot::render_plot;
pub use property::{PropMap, PropertyKind};
pub use registry::{PropertyKey, PropertyRegistry};
pub use runnable::{Direction, Runnable};
pub use scheduler::{Scheduler, TickerId, TimelineId, TweenId};
pub use target::{Animatable, IntoTargets, Object, ObjectId, Target};
pub use ticker::Ticker;
pub use timeline::{CallbackId, ItemRef, Step, Timeline, TimelineItem};
pub use tween::Tween;
pub use value::{Rgb, Value};

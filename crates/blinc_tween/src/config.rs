//! Tween, timeline, and engine configuration
//!
//! Every config deserializes from TOML or JSON with defaults for missing
//! keys, and exposes builder methods for programmatic use. Callbacks are
//! never serialized.

use serde::{Deserialize, Serialize};

use crate::easing::EaseSpec;
use crate::error::{Result, TweenError};
use crate::property::PropMap;
use crate::runnable::Callbacks;
use crate::target::Target;
use crate::value::Value;

/// Timing options shared by tweens and timelines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seconds before the first lap starts
    pub delay: f64,
    /// Extra laps after the first, negative for infinite
    pub repeat: i32,
    /// Seconds between laps
    #[serde(alias = "repeatDelay")]
    pub repeat_delay: f64,
    /// Alternate direction on every other lap
    pub yoyo: bool,
    /// Flip local progress
    pub inverted: bool,
    /// Start running on creation
    #[serde(alias = "autoStart")]
    pub auto_start: bool,
    /// Playback speed multiplier, must be positive
    #[serde(alias = "timeScale")]
    pub time_scale: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            delay: 0.0,
            repeat: 0,
            repeat_delay: 0.0,
            yoyo: false,
            inverted: false,
            auto_start: true,
            time_scale: 1.0,
        }
    }
}

impl PlaybackConfig {
    pub fn delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn repeat(mut self, count: i32) -> Self {
        self.repeat = count;
        self
    }

    pub fn repeat_delay(mut self, seconds: f64) -> Self {
        self.repeat_delay = seconds;
        self
    }

    pub fn yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }
}

macro_rules! playback_builders {
    () => {
        /// Builder: delay before the first lap
        pub fn delay(mut self, seconds: f64) -> Self {
            self.playback.delay = seconds;
            self
        }

        /// Builder: extra laps, `-1` loops forever
        pub fn repeat(mut self, count: i32) -> Self {
            self.playback.repeat = count;
            self
        }

        /// Builder: gap between laps
        pub fn repeat_delay(mut self, seconds: f64) -> Self {
            self.playback.repeat_delay = seconds;
            self
        }

        /// Builder: alternate direction each lap
        pub fn yoyo(mut self, yoyo: bool) -> Self {
            self.playback.yoyo = yoyo;
            self
        }

        /// Builder: flip local progress
        pub fn inverted(mut self, inverted: bool) -> Self {
            self.playback.inverted = inverted;
            self
        }

        /// Builder: start running immediately
        pub fn auto_start(mut self, auto_start: bool) -> Self {
            self.playback.auto_start = auto_start;
            self
        }

        /// Builder: playback speed multiplier
        pub fn time_scale(mut self, scale: f64) -> Self {
            self.playback.time_scale = scale;
            self
        }

        /// Builder: handler fired when the delay has elapsed
        pub fn on_start(mut self, handler: impl FnMut(&[Target]) + 'static) -> Self {
            self.callbacks.on_start = Some(Box::new(handler));
            self
        }

        /// Builder: handler fired after every evaluation that wrote values
        pub fn on_update(mut self, handler: impl FnMut(&[Target]) + 'static) -> Self {
            self.callbacks.on_update = Some(Box::new(handler));
            self
        }

        /// Builder: handler fired once when the last lap finishes
        pub fn on_complete(mut self, handler: impl FnMut(&[Target]) + 'static) -> Self {
            self.callbacks.on_complete = Some(Box::new(handler));
            self
        }

        /// Builder: handler fired at every lap boundary
        pub fn on_repeat(mut self, handler: impl FnMut(&[Target]) + 'static) -> Self {
            self.callbacks.on_repeat = Some(Box::new(handler));
            self
        }
    };
}

/// Configuration of one tween
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TweenConfig {
    /// Start values; missing fields start from the target's current value
    pub from: PropMap,
    /// End values; missing fields end at the target's current value
    pub to: PropMap,
    pub ease: EaseSpec,
    #[serde(flatten)]
    pub playback: PlaybackConfig,
    /// Keep the tween in the scheduler after it completes or is cleared
    #[serde(alias = "keepAlive")]
    pub keep_alive: bool,
    #[serde(skip)]
    pub callbacks: Callbacks,
}

impl TweenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| TweenError::Config(e.to_string()))
    }

    /// Parse from a JSON document
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| TweenError::Config(e.to_string()))
    }

    /// Builder: set a start value
    pub fn from(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.from.insert(field.into(), value.into());
        self
    }

    /// Builder: set an end value
    pub fn to(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.to.insert(field.into(), value.into());
        self
    }

    /// Builder: easing name or bezier points
    pub fn ease(mut self, ease: impl Into<EaseSpec>) -> Self {
        self.ease = ease.into();
        self
    }

    /// Builder: survive completion so the tween can be restarted
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    playback_builders!();
}

/// Configuration of one timeline
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    #[serde(flatten)]
    pub playback: PlaybackConfig,
    #[serde(skip)]
    pub callbacks: Callbacks,
}

impl TimelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    playback_builders!();
}

/// Scheduler configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick rate of the main ticker and every timeline ticker
    pub fps: u32,
    /// Request frames from the frame source automatically
    #[serde(alias = "autoUpdate")]
    pub auto_update: bool,
    /// Largest delta a ticker delivers, in multiples of its step
    #[serde(alias = "maxCatchUp")]
    pub max_catch_up: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            auto_update: true,
            max_catch_up: 4.0,
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| TweenError::Config(e.to_string()))
    }

    /// Parse from a JSON document
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| TweenError::Config(e.to_string()))
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tween_config_from_toml() {
        let config = TweenConfig::from_toml_str(
            r##"
            ease = "easeOutQuad"
            delay = 0.5
            repeat = 2
            repeatDelay = 0.25
            yoyo = true

            [from]
            x = 0

            [to]
            x = 100.0
            color = "#ff0000"
            path = [1.0, 2.0, 3.0]
            "##,
        )
        .unwrap();

        assert_eq!(config.ease, EaseSpec::Named("easeOutQuad".into()));
        assert_eq!(config.playback.delay, 0.5);
        assert_eq!(config.playback.repeat, 2);
        assert_eq!(config.playback.repeat_delay, 0.25);
        assert!(config.playback.yoyo);
        assert!(config.playback.auto_start);
        assert_eq!(config.from.get("x"), Some(&Value::Number(0.0)));
        assert_eq!(config.to.get("color"), Some(&Value::from("#ff0000")));
        assert_eq!(config.to.get("path"), Some(&Value::from([1.0, 2.0, 3.0])));
    }

    #[test]
    fn test_tween_config_from_json_with_bezier() {
        let config =
            TweenConfig::from_json_str(r#"{"to": {"x": 1}, "ease": [0.4, 0.0, 0.2, 1.0]}"#)
                .unwrap();
        assert_eq!(config.ease, EaseSpec::Bezier([0.4, 0.0, 0.2, 1.0]));
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::from_toml_str("fps = 30").unwrap();
        assert_eq!(config.fps, 30);
        assert!(config.auto_update);
        assert_eq!(config.max_catch_up, 4.0);
        assert!(EngineConfig::from_toml_str("fps = \"fast\"").is_err());
    }

    #[test]
    fn test_builders() {
        let config = TweenConfig::new()
            .from("x", 0.0)
            .to("x", 1.0)
            .ease("easeInCubic")
            .delay(1.0)
            .auto_start(false)
            .on_complete(|_| {});
        assert_eq!(config.playback.delay, 1.0);
        assert!(!config.playback.auto_start);
        assert!(config.callbacks.on_complete.is_some());
    }
}

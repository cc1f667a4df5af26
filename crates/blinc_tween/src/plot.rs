//! Text rendering of a flattened timeline schedule

use crate::timeline::{ItemRef, TimelineItem};

/// Render one row per item with a bar spanning its `[start, end]` window.
///
/// Callbacks have no width and show as a single `|` marker.
pub fn render_plot(label: &str, items: &[TimelineItem], width: usize) -> String {
    let width = width.max(1);
    let total = items.iter().map(|item| item.end).fold(0.0, f64::max);
    let column = |time: f64| -> usize {
        if total <= 0.0 {
            0
        } else {
            ((time / total) * width as f64).round().clamp(0.0, width as f64) as usize
        }
    };

    let mut out = String::new();
    out.push_str(&format!("{label} ({total:.3}s)\n"));

    for item in items {
        let (name, marker) = match item.obj {
            ItemRef::Tween(id) => (format!("{id:?}"), '='),
            ItemRef::Callback(id) => (format!("{id:?}"), '|'),
        };

        let from = column(item.start).min(width - 1);
        let to = column(item.end).max(from + 1).min(width);
        let mut bar = String::with_capacity(width);
        for col in 0..width {
            bar.push(match marker {
                '|' if col == from => '|',
                '=' if (from..to).contains(&col) => '=',
                _ => ' ',
            });
        }

        out.push_str(&format!(
            "{name:<20} {start:>7.3} {end:>7.3} [{bar}]\n",
            start = item.start,
            end = item.end
        ));
    }
    out
}

//! Sync-lead graph for watching reconciliation in real time
//!
//! Plots `remote.sync - local.sync` for every merged update. Positive values
//! mean the peer is ahead and its ball was adopted; negative values mean the
//! update was stale and ignored.

use macroquad::prelude::*;
use std::collections::VecDeque;

pub struct SyncGraph {
    // Historical data storage
    samples: VecDeque<i64>,
    max_samples: usize,

    // Graph display settings
    graph_width: f32,
    graph_height: f32,
    visible: bool,
    internal_padding: f32,

    // Symmetric vertical scale, in ticks
    scale: f32,
}

impl SyncGraph {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: 240,
            graph_width: 240.0,
            graph_height: 100.0,
            visible: false,
            internal_padding: 10.0,
            scale: 10.0,
        }
    }

    pub fn toggle_visibility(&mut self) {
        self.visible = !self.visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn record(&mut self, lead: i64) {
        self.samples.push_back(lead);
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        self.update_auto_scale();
    }

    pub fn latest(&self) -> Option<i64> {
        self.samples.back().copied()
    }

    /// Keep the largest recent lead on screen with some headroom
    fn update_auto_scale(&mut self) {
        let max_lead = self
            .samples
            .iter()
            .map(|lead| lead.unsigned_abs() as f32)
            .fold(0.0f32, f32::max);

        let desired = (max_lead * 1.2).max(10.0);
        // Smooth scale changes to prevent jittery scaling
        self.scale = self.scale * 0.9 + desired * 0.1;
    }

    /// Render the graph in the top-right corner
    pub fn render(&self) {
        if !self.visible {
            return;
        }

        let x = screen_width() - self.graph_width - 20.0;
        let y = 30.0;

        draw_rectangle(
            x,
            y,
            self.graph_width,
            self.graph_height,
            Color::from_rgba(0, 0, 0, 200),
        );
        draw_rectangle_lines(
            x,
            y,
            self.graph_width,
            self.graph_height,
            1.0,
            Color::from_rgba(120, 120, 120, 255),
        );
        draw_text("Sync lead (G to toggle)", x, y - 6.0, 14.0, WHITE);

        let usable_width = self.graph_width - self.internal_padding * 2.0;
        let usable_height = self.graph_height - self.internal_padding * 2.0;
        let left = x + self.internal_padding;
        let mid_y = y + self.internal_padding + usable_height / 2.0;

        draw_line(
            left,
            mid_y,
            left + usable_width,
            mid_y,
            1.0,
            Color::from_rgba(70, 70, 70, 255),
        );

        if self.samples.len() >= 2 {
            let step = usable_width / (self.max_samples - 1) as f32;
            let to_y = |lead: i64| {
                let clamped = (lead as f32).clamp(-self.scale, self.scale);
                mid_y - clamped / self.scale * (usable_height / 2.0)
            };

            for (i, pair) in self.samples.iter().collect::<Vec<_>>().windows(2).enumerate() {
                let x1 = left + i as f32 * step;
                let x2 = x1 + step;
                let color = if *pair[1] > 0 { ORANGE } else { GREEN };
                draw_line(x1, to_y(*pair[0]), x2, to_y(*pair[1]), 2.0, color);
            }
        }

        if let Some(latest) = self.latest() {
            draw_text(
                &format!("{:+} ticks", latest),
                x,
                y + self.graph_height + 14.0,
                14.0,
                WHITE,
            );
        }
    }
}

impl Default for SyncGraph {
    fn default() -> Self {
        Self::new()
    }
}

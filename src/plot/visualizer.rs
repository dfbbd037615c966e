use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::curve::Point;
use super::mapper::{PlotMapper, PlotSeries, PlotSettings, Viewport};
use crate::error::Result;
use crate::spectrum::frame::SpectrumFrame;
use crate::spectrum::listeners::SpectrumListener;

/// Frames staged per visualizer before the oldest are discarded.
const MAX_STAGED: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizerShape {
    #[default]
    TopOnly,
    BottomOnly,
    TopBottom,
}

impl VisualizerShape {
    /// Y-range of the viewport for a given amplitude ceiling.
    pub fn y_range(self, ceiling: f64) -> (f64, f64) {
        let ceiling = ceiling.abs();
        match self {
            VisualizerShape::TopOnly => (0.0, ceiling),
            VisualizerShape::BottomOnly => (-ceiling, 0.0),
            VisualizerShape::TopBottom => (-ceiling, ceiling),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathCommand {
    MoveTo { to: Point },
    LineTo { to: Point },
    CurveTo { to: Point, control1: Point, control2: Point },
}

/// Renderable outline handed to whatever draws the visualizer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlotPath {
    /// Stream time of the spectrum this path was built from.
    #[serde(with = "duration_secs")]
    pub position: Duration,
    pub commands: Vec<PathCommand>,
}

impl PlotPath {
    fn trace(&mut self, series: &PlotSeries, connect: bool) {
        for (i, &to) in series.points.iter().enumerate() {
            let command = if i == 0 {
                if connect {
                    PathCommand::LineTo { to }
                } else {
                    PathCommand::MoveTo { to }
                }
            } else if let Some(segment) = series.controls.as_ref().and_then(|c| c.get(i - 1)) {
                PathCommand::CurveTo {
                    to,
                    control1: segment.control1,
                    control2: segment.control2,
                }
            } else {
                PathCommand::LineTo { to }
            };
            self.commands.push(command);
        }
    }
}

struct Staged {
    due: Duration,
    position: Duration,
    values: Vec<f64>,
}

#[derive(Default)]
struct State {
    staged: VecDeque<Staged>,
    current: Option<(Duration, Vec<f64>)>,
}

/// One layer of the spectrum display.
///
/// Receives frames as a [`SpectrumListener`], holds each one back by
/// `delay` of stream time, and turns the newest due frame into a path when
/// polled. Stacking several layers with growing delays gives the trailing,
/// layered look.
pub struct Visualizer {
    mapper: PlotMapper,
    viewport: Viewport,
    shape: VisualizerShape,
    delay: Duration,
    state: Mutex<State>,
}

impl Visualizer {
    /// The shape decides the y-range; its ceiling is the larger magnitude
    /// of `viewport.min_y` and `viewport.max_y`.
    pub fn new(
        settings: PlotSettings,
        viewport: Viewport,
        shape: VisualizerShape,
        delay: Duration,
    ) -> Result<Self> {
        let (min_y, max_y) = shape.y_range(viewport.max_y.abs().max(viewport.min_y.abs()));
        let viewport = Viewport {
            min_y,
            max_y,
            ..viewport
        };
        viewport.validate()?;
        Ok(Self {
            mapper: PlotMapper::new(settings),
            viewport,
            shape,
            delay,
            state: Mutex::new(State::default()),
        })
    }

    pub fn shape(&self) -> VisualizerShape {
        self.shape
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn staged(&self) -> usize {
        self.state().staged.len()
    }

    /// Adopt the newest values due at `clock` and build the path for them.
    /// Returns `None` when nothing new became due.
    pub fn poll(&self, clock: Duration) -> Option<PlotPath> {
        let mut state = self.state();
        let mut adopted = None;
        while state.staged.front().is_some_and(|s| s.due <= clock) {
            adopted = state.staged.pop_front();
        }
        let staged = adopted?;
        let path = self.build_path(staged.position, &staged.values);
        state.current = Some((staged.position, staged.values));
        Some(path)
    }

    /// Path for the values currently shown, if any frame has been adopted.
    pub fn current_path(&self) -> Option<PlotPath> {
        let state = self.state();
        let (position, values) = state.current.as_ref()?;
        Some(self.build_path(*position, values))
    }

    fn build_path(&self, position: Duration, values: &[f64]) -> PlotPath {
        let mut path = PlotPath {
            position,
            commands: Vec::new(),
        };
        match self.shape {
            VisualizerShape::TopOnly => path.trace(&self.mapper.series(values, &self.viewport), false),
            // Negated onto the `[-m, 0]` window, so louder bins hang further down from the top edge.
            VisualizerShape::BottomOnly => {
                let negated: Vec<f64> = values.iter().map(|v| -v).collect();
                path.trace(&self.mapper.series(&negated, &self.viewport), false);
            }
            VisualizerShape::TopBottom => {
                path.trace(&self.mapper.series(values, &self.viewport), false);
                let mut mirrored: Vec<f64> = values.iter().map(|v| -v).collect();
                mirrored.reverse();
                let lower = self.mapper.series(&mirrored, &self.viewport);
                let lower = PlotSeries {
                    points: reverse_x(&lower.points, self.viewport.width),
                    controls: lower.controls.map(|segments| {
                        segments
                            .into_iter()
                            .map(|mut s| {
                                s.control1.x = self.viewport.width - s.control1.x;
                                s.control2.x = self.viewport.width - s.control2.x;
                                s
                            })
                            .collect()
                    }),
                };
                path.trace(&lower, true);
            }
        }
        path
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn reverse_x(points: &[Point], width: f64) -> Vec<Point> {
    points.iter().map(|p| Point::new(width - p.x, p.y)).collect()
}

impl SpectrumListener for Visualizer {
    fn on_spectrum(&self, frame: &SpectrumFrame) {
        let values = self.mapper.spectrum_values(frame);
        let mut state = self.state();
        if state.staged.len() == MAX_STAGED {
            state.staged.pop_front();
        }
        state.staged.push_back(Staged {
            due: frame.position() + self.delay,
            position: frame.position(),
            values,
        });
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

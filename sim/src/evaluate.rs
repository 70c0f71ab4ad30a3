//! Drive a pipeline over a recorded log and score its swipes.

use crate::replay::ReplayLog;
use slicer_core::{metrics::SessionMetrics, pipeline::Pipeline, ActionDecision};

/// Feed every frame of `log` to `pipeline` in order.
///
/// Each swipe is judged against the ground truth at the moment it lands,
/// which is the frame time plus the predictor's lookahead.
pub fn evaluate(log: &ReplayLog, pipeline: &mut Pipeline) -> SessionMetrics {
    let lookahead = pipeline.predictor.config.lookahead;
    let mut metrics = SessionMetrics::default();

    for frame in &log.frames {
        let out = pipeline.process_frame(frame);
        metrics.accumulate(&out);
        if let ActionDecision::Swipe(swipe) = out.action() {
            if let Some(truth) = log.truth_at(frame.timestamp + lookahead) {
                metrics.judge(swipe, &truth.objects);
            }
        }
    }

    metrics
}

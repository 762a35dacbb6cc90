//! Pure mapping from a model output vector to an [`Action`].

use std::time::Duration;

use screenpilot_core_types::NormalizedPoint;
use serde::{Deserialize, Serialize};

use crate::types::Action;

pub const CLASS_CLICK: usize = 0;
pub const CLASS_SWIPE: usize = 1;
pub const CLASS_TEXT_INPUT: usize = 2;

/// Fixed parameters attached to each decoded class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub click_point: NormalizedPoint,
    pub swipe_start: NormalizedPoint,
    pub swipe_end: NormalizedPoint,
    pub swipe_duration_ms: u64,
    pub text_payload: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            click_point: NormalizedPoint::CENTER,
            swipe_start: NormalizedPoint::new(0.2, 0.5),
            swipe_end: NormalizedPoint::new(0.8, 0.5),
            swipe_duration_ms: 500,
            text_payload: "hello from screenpilot".to_string(),
        }
    }
}

/// Decode `scores` with the given parameters.
///
/// The winning index is the first maximum; NaN entries never win. An
/// empty or all-NaN vector decodes to `Wait` with zero confidence.
pub fn decode(scores: &[f32], config: &DecoderConfig) -> Action {
    let Some((index, confidence)) = select_max(scores) else {
        return Action::Wait { confidence: 0.0 };
    };

    match index {
        CLASS_CLICK => Action::Click {
            confidence,
            x: config.click_point.x,
            y: config.click_point.y,
        },
        CLASS_SWIPE => Action::Swipe {
            confidence,
            start_x: config.swipe_start.x,
            start_y: config.swipe_start.y,
            end_x: config.swipe_end.x,
            end_y: config.swipe_end.y,
            duration: Duration::from_millis(config.swipe_duration_ms),
        },
        CLASS_TEXT_INPUT => Action::TextInput {
            confidence,
            text: config.text_payload.clone(),
        },
        _ => Action::Wait { confidence },
    }
}

fn select_max(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        // strict comparison keeps the first of equal maxima
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((index, score)),
        }
    }
    best
}

/// Owned decoder bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct ActionDecoder {
    config: DecoderConfig,
}

impl ActionDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn decode(&self, scores: &[f32]) -> Action {
        decode(scores, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_default(scores: &[f32]) -> Action {
        decode(scores, &DecoderConfig::default())
    }

    #[test]
    fn class_zero_is_centered_click() {
        assert_eq!(
            decode_default(&[0.9, 0.05, 0.05]),
            Action::Click {
                confidence: 0.9,
                x: 0.5,
                y: 0.5
            }
        );
    }

    #[test]
    fn class_one_is_horizontal_swipe() {
        let action = decode_default(&[0.1, 0.7, 0.2]);
        assert_eq!(
            action,
            Action::Swipe {
                confidence: 0.7,
                start_x: 0.2,
                start_y: 0.5,
                end_x: 0.8,
                end_y: 0.5,
                duration: Duration::from_millis(500),
            }
        );
    }

    #[test]
    fn class_two_carries_configured_text() {
        let config = DecoderConfig {
            text_payload: "typed".into(),
            ..DecoderConfig::default()
        };
        assert_eq!(
            decode(&[0.0, 0.1, 0.8, 0.1], &config),
            Action::TextInput {
                confidence: 0.8,
                text: "typed".into()
            }
        );
    }

    #[test]
    fn other_classes_wait() {
        assert_eq!(
            decode_default(&[0.1, 0.1, 0.1, 0.6]),
            Action::Wait { confidence: 0.6 }
        );
        let mut wide = vec![0.0f32; 512];
        wide[511] = 3.5;
        assert_eq!(decode_default(&wide), Action::Wait { confidence: 3.5 });
    }

    #[test]
    fn ties_resolve_to_first_index() {
        assert_eq!(
            decode_default(&[0.4, 0.4, 0.2]),
            Action::Click {
                confidence: 0.4,
                x: 0.5,
                y: 0.5
            }
        );
        assert_eq!(
            decode_default(&[0.1, 0.45, 0.45]).kind(),
            crate::ActionKind::Swipe
        );
    }

    #[test]
    fn confidence_is_raw_score() {
        assert_eq!(decode_default(&[-2.0, -3.0]).confidence(), -2.0);
        assert_eq!(decode_default(&[12.5, 1.0]).confidence(), 12.5);
    }

    #[test]
    fn nan_never_wins() {
        assert_eq!(
            decode_default(&[f32::NAN, 0.2, 0.1]).kind(),
            crate::ActionKind::Swipe
        );
        assert_eq!(
            decode_default(&[f32::NAN, f32::NAN]),
            Action::Wait { confidence: 0.0 }
        );
    }

    #[test]
    fn empty_output_waits() {
        assert_eq!(decode_default(&[]), Action::Wait { confidence: 0.0 });
    }

    #[test]
    fn decoding_is_deterministic() {
        let decoder = ActionDecoder::default();
        let scores = [0.3, 0.3, 0.3, 0.1];
        assert_eq!(decoder.decode(&scores), decoder.decode(&scores));
    }
}

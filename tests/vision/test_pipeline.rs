// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR pipeline tests
//!
//! Drive the Pipeline with deterministic detector/recognizer doubles and check:
//! - Empty detections produce an empty result
//! - Boxes are mapped back to original coordinates and transcribed in order
//! - Degenerate boxes are filtered in working space
//! - Crops outside the image skip the recognizer
//! - Any recognition failure fails the whole run

use crate::support::{
    detector_handle, draw_block, recognizer_handle, white_image, FixedDetector, InkDetector,
    InkRecognizer, MockRecognizer,
};
use fabstir_ocr_node::vision::ocr::{DetectionConfig, Pipeline, Quad};
use fabstir_ocr_node::vision::{OcrError, RecognitionError};

/// 400x200 images work at 352x160
const RATIO_W: f64 = 352.0 / 400.0;
const RATIO_H: f64 = 160.0 / 200.0;

fn pipeline() -> Pipeline {
    Pipeline::new(DetectionConfig::default())
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    // =============================================================================
    // End-to-end with ink doubles
    // =============================================================================

    /// Test 1: Blank white image yields no lines
    #[test]
    fn test_blank_image_has_no_lines() {
        let image = white_image(400, 200);

        let result = pipeline()
            .run(
                &image,
                &detector_handle(InkDetector),
                &recognizer_handle(InkRecognizer::new("HELLO")),
            )
            .unwrap();

        assert!(result.text_lines.is_empty());
        assert_eq!(result.rtparams.image_size, "400x200");
        assert_eq!(result.rtparams.working_size, "352x160");
    }

    /// Test 2: One printed word gives one quad near its box and its text
    #[test]
    fn test_single_word() {
        let mut image = white_image(400, 200);
        draw_block(&mut image, 100, 80, 200, 40);

        let result = pipeline()
            .run(
                &image,
                &detector_handle(InkDetector),
                &recognizer_handle(InkRecognizer::new("HELLO")),
            )
            .unwrap();

        assert_eq!(result.text_lines.len(), 1);
        let line = &result.text_lines[0];
        assert_eq!(line.text, "HELLO");

        let expected = [[100.0, 80.0], [300.0, 80.0], [300.0, 120.0], [100.0, 120.0]];
        for (got, want) in line.quad.points.iter().zip(expected.iter()) {
            assert!(
                (got[0] - want[0]).abs() <= 6.0 && (got[1] - want[1]).abs() <= 6.0,
                "corner {:?} too far from {:?}",
                got,
                want
            );
        }
        assert!(result.timing.overall >= result.timing.net);
    }

    // =============================================================================
    // Coordinate mapping and filtering
    // =============================================================================

    /// Test 3: Working coordinates map back through the resize ratios
    #[test]
    fn test_ratio_mapping() {
        let image = white_image(400, 200);
        let working = Quad::from_rect(88.0, 40.0, 44.0, 16.0, 0.9);

        let result = pipeline()
            .run(
                &image,
                &detector_handle(FixedDetector {
                    quads: vec![working],
                }),
                &recognizer_handle(InkRecognizer::new("x")),
            )
            .unwrap();

        let quad = result.text_lines[0].quad;
        for (got, w) in quad.points.iter().zip(working.points.iter()) {
            assert!((got[0] - w[0] / RATIO_W).abs() < 1e-9);
            assert!((got[1] - w[1] / RATIO_H).abs() < 1e-9);
        }
        assert!((quad.points[0][0] - 100.0).abs() < 1e-9);
        assert!((quad.points[0][1] - 50.0).abs() < 1e-9);
        assert_eq!(quad.score, 0.9);
    }

    /// Test 4: Boxes with a leading edge under 5 working pixels are dropped
    #[test]
    fn test_short_edges_filtered() {
        let image = white_image(400, 200);
        let quads = vec![
            Quad::from_rect(10.0, 10.0, 4.0, 20.0, 0.9),
            Quad::from_rect(10.0, 40.0, 40.0, 3.0, 0.9),
            Quad::from_rect(10.0, 80.0, 40.0, 12.0, 0.9),
        ];

        let result = pipeline()
            .run(
                &image,
                &detector_handle(FixedDetector { quads }),
                &recognizer_handle(InkRecognizer::new("x")),
            )
            .unwrap();

        assert_eq!(result.text_lines.len(), 1);
        for line in &result.text_lines {
            let working = line.quad.to_working(RATIO_H, RATIO_W);
            assert!(working.edge_len(0, 1) >= 5.0);
            assert!(working.edge_len(3, 0) >= 5.0);
        }
    }

    /// Test 5: Output order follows detection order
    #[test]
    fn test_order_preserved() {
        let image = white_image(400, 200);
        let quads = vec![
            Quad::from_rect(10.0, 100.0, 60.0, 20.0, 0.5),
            Quad::from_rect(10.0, 10.0, 60.0, 20.0, 0.9),
        ];

        let mut recognizer = MockRecognizer::new();
        let mut calls = 0;
        recognizer.expect_transcribe().times(2).returning(move |_| {
            calls += 1;
            Ok(vec![format!("line{}", calls), "alternative".to_string()])
        });

        let result = pipeline()
            .run(
                &image,
                &detector_handle(FixedDetector { quads }),
                &recognizer_handle(recognizer),
            )
            .unwrap();

        let texts: Vec<&str> = result.text_lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["line1", "line2"]);
        assert_eq!(result.text_lines[0].quad.score, 0.5);
    }

    // =============================================================================
    // Recognition edge cases
    // =============================================================================

    /// Test 6: A crop fully outside the image gives "" without calling the recognizer
    #[test]
    fn test_crop_outside_image() {
        let image = white_image(400, 200);
        let quads = vec![Quad::from_rect(500.0, 500.0, 20.0, 20.0, 0.9)];

        let mut recognizer = MockRecognizer::new();
        recognizer.expect_transcribe().times(0);

        let result = pipeline()
            .run(
                &image,
                &detector_handle(FixedDetector { quads }),
                &recognizer_handle(recognizer),
            )
            .unwrap();

        assert_eq!(result.text_lines.len(), 1);
        assert_eq!(result.text_lines[0].text, "");
    }

    /// Test 7: A single recognition failure fails the whole run
    #[test]
    fn test_recognition_failure_is_fatal() {
        let image = white_image(400, 200);
        let quads = vec![
            Quad::from_rect(10.0, 10.0, 60.0, 20.0, 0.9),
            Quad::from_rect(10.0, 100.0, 60.0, 20.0, 0.9),
        ];

        let mut recognizer = MockRecognizer::new();
        let mut calls = 0;
        recognizer.expect_transcribe().returning(move |_| {
            calls += 1;
            if calls == 2 {
                Err(RecognitionError::Inference("session crashed".to_string()))
            } else {
                Ok(vec!["ok".to_string()])
            }
        });

        let err = pipeline()
            .run(
                &image,
                &detector_handle(FixedDetector { quads }),
                &recognizer_handle(recognizer),
            )
            .unwrap_err();

        assert!(matches!(err, OcrError::Recognition(_)));
    }

    /// Test 8: Passing a recognizer where a detector is expected is rejected
    #[test]
    fn test_swapped_handles_rejected() {
        let image = white_image(64, 64);
        let detector = detector_handle(InkDetector);
        let recognizer = recognizer_handle(InkRecognizer::new("x"));

        let err = pipeline().run(&image, &recognizer, &detector).unwrap_err();
        assert!(matches!(err, OcrError::ModelKindMismatch { .. }));
    }
}

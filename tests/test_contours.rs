// tests/test_contours.rs — Integration tests for the Contours operator.
//
// Synthetic frames are built as BGRA8 buffers through the public API only.

use vivid_vision::contour_trace::RetrievalMode;
use vivid_vision::pixel::{PixelBuffer, PixelView, OPAQUE_BLACK, TRANSPARENT};
use vivid_vision::{Contours, Operator, SkipReason};

// ===== Scene builders =====

fn gray_px(v: u8) -> [u8; 4] {
    [v, v, v, 255]
}

/// Black frame with filled squares `(x, y, side, intensity)`.
fn squares(w: usize, h: usize, rects: &[(usize, usize, usize, u8)]) -> PixelBuffer {
    let mut buf = PixelBuffer::filled(w, h, OPAQUE_BLACK);
    for &(x0, y0, side, v) in rects {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                buf.set_pixel(x, y, gray_px(v));
            }
        }
    }
    buf
}

fn bytes_of(view: &PixelView<'_>) -> Vec<u8> {
    (0..view.height()).flat_map(|y| view.row(y).to_vec()).collect()
}

// ===== End-to-end =====

#[test]
fn black_frame_yields_no_contours_and_transparent_output() {
    let frame = PixelBuffer::filled(64, 64, OPAQUE_BLACK);
    for (t1, t2) in [(0.0, 0.0), (100.0, 200.0), (255.0, 255.0)] {
        let mut c = Contours::new();
        c.set_thresholds(t1, t2);
        c.process(&frame.view());
        assert_eq!(c.contour_count(), 0, "thresholds ({t1}, {t2})");
        let out = c.output();
        assert!(out.is_valid());
        assert_eq!((out.width(), out.height()), (64, 64));
        for y in 0..64 {
            for x in 0..64 {
                assert_eq!(out.pixel(x, y), TRANSPARENT);
            }
        }
    }
}

#[test]
fn every_retrieval_mode_finds_the_square() {
    let frame = squares(64, 64, &[(16, 16, 24, 255)]);
    for mode in [
        RetrievalMode::OuterOnly,
        RetrievalMode::AllFlat,
        RetrievalMode::TwoLevelHierarchy,
        RetrievalMode::FullTree,
    ] {
        let mut c = Contours::new();
        c.set_mode(mode);
        c.process(&frame.view());
        assert!(c.contour_count() >= 1, "{mode:?}");
    }
}

#[test]
fn outer_only_never_exceeds_all_flat() {
    let frame = squares(96, 64, &[(8, 8, 30, 255), (50, 12, 20, 160)]);
    let count = |mode| {
        let mut c = Contours::new();
        c.set_mode(mode);
        c.process(&frame.view());
        c.contour_count()
    };
    assert!(count(RetrievalMode::OuterOnly) <= count(RetrievalMode::AllFlat));
}

#[test]
fn raising_high_threshold_never_adds_contours() {
    // Three squares of increasing contrast, well separated.
    let frame = squares(128, 48, &[(8, 12, 20, 10), (48, 12, 20, 30), (88, 12, 20, 50)]);
    let mut counts = Vec::new();
    for t2 in (25..=255).step_by(10) {
        let mut c = Contours::new();
        c.set_thresholds(20.0, t2 as f32);
        c.process(&frame.view());
        counts.push(c.contour_count());
    }
    assert!(counts[0] > 0);
    for pair in counts.windows(2) {
        assert!(pair[1] <= pair[0], "counts not monotone: {counts:?}");
    }
}

#[test]
fn line_width_and_colour_reach_the_canvas() {
    let frame = squares(64, 64, &[(20, 20, 20, 255)]);
    let mut c = Contours::new();
    c.set_color([1.0, 0.0, 0.0, 0.5]);
    c.set_line_width(4.0);
    c.process(&frame.view());
    let out = c.output();
    let drawn: Vec<[u8; 4]> = (0..64)
        .flat_map(|y| (0..64).map(move |x| (x, y)))
        .map(|(x, y)| out.pixel(x, y))
        .filter(|px| *px != TRANSPARENT)
        .collect();
    assert!(!drawn.is_empty());
    assert!(drawn.iter().all(|px| *px == [0, 0, 255, 127]));
}

// ===== Lifecycle =====

#[test]
fn second_process_is_a_no_op() {
    let frame = squares(64, 64, &[(20, 20, 20, 255)]);
    let mut c = Contours::new();
    c.process(&frame.view());
    let first = bytes_of(&c.output());
    c.process(&frame.view());
    assert_eq!(c.cook_count(), 1);
    assert_eq!(bytes_of(&c.output()), first);

    c.new_frame(1);
    c.process(&frame.view());
    assert_eq!(c.cook_count(), 2);
    assert_eq!(bytes_of(&c.output()), first);
}

#[test]
fn invalid_view_leaves_output_unchanged() {
    let frame = squares(64, 64, &[(20, 20, 20, 255)]);
    let mut c = Contours::new();
    c.process(&frame.view());
    let before = bytes_of(&c.output());

    c.new_frame(1);
    c.process(&PixelView::invalid());
    assert_eq!(c.last_skip(), Some(SkipReason::NoInput));
    assert_eq!(c.cook_count(), 1);
    assert!(!c.needs_cook());
    assert_eq!(bytes_of(&c.output()), before);
}

#[test]
fn undersized_input_is_skipped() {
    let frame = squares(64, 64, &[(20, 20, 20, 255)]);
    let tiny = PixelBuffer::filled(10, 10, [255, 255, 255, 255]);
    let mut c = Contours::new();
    c.process(&frame.view());
    let before = bytes_of(&c.output());

    c.new_frame(1);
    c.process(&tiny.view());
    assert_eq!(c.last_skip(), Some(SkipReason::TooSmall { width: 10, height: 10 }));
    assert_eq!(bytes_of(&c.output()), before);
}

#[test]
fn skip_before_first_cook_keeps_output_invalid() {
    let mut c = Contours::new();
    c.process(&PixelView::invalid());
    assert!(!c.output().is_valid());
    assert_eq!(c.cook_count(), 0);
}

#[test]
fn set_param_by_name_clamps_and_dirties() {
    let frame = squares(64, 64, &[(20, 20, 20, 255)]);
    let mut c = Contours::new();
    c.process(&frame.view());
    c.set_param("lineWidth", 50.0).unwrap();
    assert_eq!(c.param("lineWidth"), Some(20.0));
    assert!(c.needs_cook());
    assert!(c.set_param("nope", 1.0).is_err());
}

// tests/test_optical_flow.rs — Integration tests for the OpticalFlow operator.

use vivid_vision::farneback::FarnebackParams;
use vivid_vision::pixel::{PixelBuffer, PixelView, OPAQUE_BLACK};
use vivid_vision::{OpticalFlow, Operator, SkipReason, VizMode};

// ===== Scene builders =====

/// Smooth grey texture shifted right by `dx` pixels.
fn texture(w: usize, h: usize, dx: f32) -> PixelBuffer {
    let mut buf = PixelBuffer::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let xf = x as f32 - dx;
            let v = 128.0 + 60.0 * (xf / 4.0).sin() + 50.0 * (y as f32 / 5.0).cos();
            let v = v.clamp(0.0, 255.0) as u8;
            buf.set_pixel(x, y, [v, v, v, 255]);
        }
    }
    buf
}

fn bytes_of(view: &PixelView<'_>) -> Vec<u8> {
    (0..view.height()).flat_map(|y| view.row(y).to_vec()).collect()
}

fn run_pair(flow: &mut OpticalFlow, a: &PixelBuffer, b: &PixelBuffer) {
    flow.new_frame(0);
    flow.process(&a.view());
    flow.new_frame(1);
    flow.process(&b.view());
}

// ===== Flow =====

#[test]
fn first_frame_has_nothing_to_compare() {
    let frame = texture(64, 64, 0.0);
    let mut f = OpticalFlow::new();
    f.process(&frame.view());
    assert!(f.has_previous_frame());
    assert_eq!(f.max_flow_magnitude(), None);
    let out = f.output();
    for y in 0..64 {
        for x in 0..64 {
            assert_eq!(out.pixel(x, y), OPAQUE_BLACK);
        }
    }
}

#[test]
fn identical_frames_give_zero_flow() {
    let frame = texture(64, 64, 0.0);
    let mut f = OpticalFlow::new();
    f.set_scale(1.0);
    run_pair(&mut f, &frame, &frame);
    let max = f.max_flow_magnitude().expect("flow after two frames");
    assert!(max < 1e-3, "max flow {max}");
}

#[test]
fn identical_small_frames_render_black_magnitude() {
    let frame = texture(32, 32, 0.0);
    let mut f = OpticalFlow::new();
    f.set_viz_mode(VizMode::MagnitudeOnly);
    run_pair(&mut f, &frame, &frame);
    assert_eq!(f.working_size(32, 32), (16, 16));
    let out = f.output();
    assert_eq!((out.width(), out.height()), (32, 32));
    for y in 0..32 {
        for x in 0..32 {
            let [b, g, r, a] = out.pixel(x, y);
            assert!(b <= 5 && g <= 5 && r <= 5, "({x},{y}) = {:?}", [b, g, r]);
            assert_eq!(a, 255);
        }
    }
}

#[test]
fn horizontal_shift_is_detected() {
    let a = texture(64, 64, 0.0);
    let b = texture(64, 64, 1.0);
    let mut f = OpticalFlow::new();
    f.set_scale(1.0);
    f.set_viz_mode(VizMode::ColorWheel);
    run_pair(&mut f, &a, &b);
    let max = f.max_flow_magnitude().expect("flow");
    assert!(max > 0.3, "max flow {max}");
    let out = f.output();
    let lit = (0..64).any(|y| (0..64).any(|x| out.pixel(x, y)[..3] != [0, 0, 0]));
    assert!(lit, "colour wheel should show motion");
}

#[test]
fn arrow_overlay_keeps_the_input_underneath() {
    let frame = texture(64, 64, 0.0);
    let mut f = OpticalFlow::new();
    f.set_viz_mode(VizMode::ArrowOverlay);
    run_pair(&mut f, &frame, &frame);
    // No motion, no arrows: the overlay is the input frame.
    assert_eq!(bytes_of(&f.output()), bytes_of(&frame.view()));
}

#[test]
fn resolution_change_restarts_comparison() {
    let big = texture(64, 64, 0.0);
    let small = texture(48, 48, 0.0);
    let mut f = OpticalFlow::new();
    f.set_scale(1.0);
    run_pair(&mut f, &big, &big);
    assert!(f.max_flow_magnitude().is_some());

    f.new_frame(2);
    f.process(&small.view());
    assert_eq!(f.max_flow_magnitude(), None);
    assert!(f.has_previous_frame());
    assert_eq!(f.output().width(), 48);

    f.new_frame(3);
    f.process(&small.view());
    assert!(f.max_flow_magnitude().is_some());
}

#[test]
fn farneback_params_round_trip_through_setters() {
    let mut f = OpticalFlow::new();
    let p = FarnebackParams {
        pyr_scale: 0.4,
        levels: 3,
        win_size: 15,
        iterations: 2,
        poly_n: 7,
        poly_sigma: 1.5,
    };
    f.set_farneback_params(&p);
    assert_eq!(f.farneback_params(), p);
    assert!(f.needs_cook());
}

// ===== Lifecycle =====

#[test]
fn invalid_view_keeps_output_and_history() {
    let frame = texture(64, 64, 0.0);
    let mut f = OpticalFlow::new();
    f.process(&frame.view());
    let before = bytes_of(&f.output());

    f.new_frame(1);
    f.process(&PixelView::invalid());
    assert_eq!(f.last_skip(), Some(SkipReason::NoInput));
    assert!(f.has_previous_frame());
    assert_eq!(bytes_of(&f.output()), before);

    f.new_frame(2);
    f.process(&PixelBuffer::new(10, 10).view());
    assert_eq!(f.last_skip(), Some(SkipReason::TooSmall { width: 10, height: 10 }));
    assert_eq!(bytes_of(&f.output()), before);
}

#[test]
fn cleanup_forgets_previous_frame() {
    let frame = texture(64, 64, 0.0);
    let mut f = OpticalFlow::new();
    run_pair(&mut f, &frame, &frame);
    f.cleanup();
    assert!(!f.has_previous_frame());
    assert_eq!(f.max_flow_magnitude(), None);
    assert!(!f.output().is_valid());
    assert!(f.needs_cook());
}

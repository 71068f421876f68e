//! # Video Compositor Tests
//!
//! Frame reconstruction from a synthetic raster: publication on v-sync, blanking,
//! orientation and presentation through a renderer.

use crate::common::mocks::video::{CapturingRenderer, MockRenderer};
use cosim_core::common::constants::ALPHA_OPAQUE;
use cosim_core::video::{Frame, Rotation, VideoCompositor};
use pretty_assertions::assert_eq;
use rstest::rstest;

const W: u32 = 12;
const H: u32 = 7;
const BLANK: u32 = 0xFFFF_FFFF;

fn pixel(x: u32, y: u32) -> u32 {
    ALPHA_OPAQUE | (y << 8) | (x + 1)
}

/// One scan line: `W` samples, then two horizontally blanked ones.
fn line(v: &mut VideoCompositor, row: Option<u32>, v_sync: bool) {
    for x in 0..W {
        match row {
            Some(y) => v.clock(false, false, false, v_sync, pixel(x, y)),
            None => v.clock(false, true, false, v_sync, BLANK),
        }
    }
    for _ in 0..2 {
        v.clock(true, row.is_none(), false, v_sync, BLANK);
    }
}

/// One full frame: `H` active lines, then two blanked lines with v-sync on the first.
fn scan(v: &mut VideoCompositor, with_vsync: bool) {
    for y in 0..H {
        line(v, Some(y), false);
    }
    line(v, None, with_vsync);
    line(v, None, false);
}

fn reference() -> Frame {
    let mut f = Frame::new(W, H);
    for y in 0..H {
        for x in 0..W {
            assert!(f.set(x, y, pixel(x, y)));
        }
    }
    f
}

fn composite(rotation: Rotation, vflip: bool) -> Frame {
    let mut v = VideoCompositor::new(W, H, rotation, vflip, 8);
    scan(&mut v, true);
    assert_eq!(v.frame_count(), 1);
    v.last_frame().clone()
}

#[test]
fn one_frame_per_vsync_falling_edge() {
    let mut v = VideoCompositor::new(W, H, Rotation::None, false, 8);
    for n in 1..=3 {
        scan(&mut v, true);
        assert_eq!(v.frame_count(), n);
    }
    let frame = v.last_frame();
    assert_eq!((frame.width(), frame.height()), (W, H));
    assert_eq!(*frame, reference());
}

#[test]
fn blanked_samples_are_never_written() {
    let mut v = VideoCompositor::new(W, H, Rotation::None, false, 8);
    scan(&mut v, true);
    assert!(v.last_frame().pixels().iter().all(|&p| p != BLANK));
}

#[test]
fn missing_vsync_publishes_nothing() {
    let mut v = VideoCompositor::new(W, H, Rotation::None, false, 8);
    let mut renderer = MockRenderer::new();
    let _ = renderer.expect_upload().times(0);

    for _ in 0..3 {
        scan(&mut v, false);
    }

    assert_eq!(v.frame_count(), 0);
    assert!(!v.update_texture(&mut renderer));
    assert!(v.last_frame().pixels().iter().all(|&p| p == ALPHA_OPAQUE));
}

#[test]
fn texture_is_uploaded_once_per_publication() {
    let mut v = VideoCompositor::new(W, H, Rotation::None, false, 8);
    let mut renderer = MockRenderer::new();
    let _ = renderer
        .expect_upload()
        .withf(|frame, meta| frame.width() == W && frame.height() == H && meta.frame_count > 0)
        .times(2)
        .return_const(());

    scan(&mut v, true);
    assert!(v.update_texture(&mut renderer));
    assert!(!v.update_texture(&mut renderer));
    scan(&mut v, true);
    assert!(v.update_texture(&mut renderer));
}

#[test]
fn renderer_sees_latest_frame_and_metadata() {
    let mut v = VideoCompositor::new(W, H, Rotation::Clockwise, true, 8);
    let mut renderer = CapturingRenderer::default();
    scan(&mut v, true);
    scan(&mut v, true);

    assert!(v.update_texture(&mut renderer));

    assert_eq!(renderer.frames.len(), 1);
    let (frame, meta) = &renderer.frames[0];
    assert_eq!(meta.frame_count, 2);
    assert_eq!(meta.rotation, Rotation::Clockwise);
    assert!(meta.vflip);
    assert_eq!((frame.width(), frame.height()), (H, W));
}

#[rstest]
#[case(Rotation::Clockwise)]
#[case(Rotation::CounterClockwise)]
fn rotation_is_applied_at_write_time(#[case] rotation: Rotation) {
    let rotated = composite(rotation, false);
    assert_eq!((rotated.width(), rotated.height()), (H, W));
    assert_eq!(rotated, reference().rotated(rotation));
}

#[test]
fn clockwise_then_anticlockwise_restores_upright_output() {
    let upright = composite(Rotation::None, false);
    let clockwise = composite(Rotation::Clockwise, false);
    assert_eq!(clockwise.rotated(Rotation::CounterClockwise), upright);
}

#[rstest]
#[case(Rotation::None)]
#[case(Rotation::Clockwise)]
fn vflip_inverts_rows_after_rotation(#[case] rotation: Rotation) {
    let flipped = composite(rotation, true);
    assert_eq!(flipped, reference().rotated(rotation).flipped_vertically());
}

#[test]
fn rotation_change_resizes_and_restarts_raster() {
    let mut v = VideoCompositor::new(W, H, Rotation::None, false, 8);
    line(&mut v, Some(0), false);
    v.set_rotation(Rotation::CounterClockwise);

    assert_eq!(v.output_size(), (H, W));
    assert_eq!(v.position(), (0, 0));
    scan(&mut v, true);
    assert_eq!(*v.last_frame(), reference().rotated(Rotation::CounterClockwise));
}

#[test]
fn reset_restarts_counters() {
    let mut v = VideoCompositor::new(W, H, Rotation::None, false, 8);
    scan(&mut v, true);
    v.reset();
    assert_eq!(v.frame_count(), 0);
    assert!(v.last_frame().pixels().iter().all(|&p| p == ALPHA_OPAQUE));

    let mut renderer = MockRenderer::new();
    let _ = renderer.expect_upload().times(0);
    assert!(!v.update_texture(&mut renderer));
}

#[test]
fn ppm_dump_has_header_and_rgb_payload() {
    let frame = reference();
    let mut out = Vec::new();
    frame.write_ppm(&mut out).unwrap();

    let header = format!("P6\n{W} {H}\n255\n");
    assert!(out.starts_with(header.as_bytes()));
    assert_eq!(out.len(), header.len() + (W * H * 3) as usize);
    // First pixel: R = x + 1 = 1, G = y = 0, B = 0.
    assert_eq!(&out[header.len()..header.len() + 3], &[1, 0, 0]);
}

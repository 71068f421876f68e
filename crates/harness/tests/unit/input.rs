//! # Input Latch Tests

use crate::common::mocks::input::MockInputSource;
use cosim_core::input::InputLatch;
use mockall::predicate::lt;
use rstest::rstest;

#[test]
fn read_queries_each_input_once() {
    let mut latch = InputLatch::new(12).unwrap();
    let mut source = MockInputSource::new();
    let _ = source
        .expect_is_active()
        .with(lt(12))
        .times(12)
        .returning(|i| i == 0 || i == 3 || i == 11);

    latch.read(&source);

    assert_eq!(latch.compose_bus_value(), 0b1000_0000_1001);
    assert!(latch.get(3));
    assert!(!latch.get(4));
}

#[test]
fn latched_value_holds_until_next_read() {
    let mut latch = InputLatch::new(4).unwrap();
    let mut pressed = MockInputSource::new();
    let _ = pressed.expect_is_active().returning(|_| true);
    latch.read(&pressed);
    assert_eq!(latch.compose_bus_value(), 0b1111);

    latch.set(1, false);
    assert_eq!(latch.compose_bus_value(), 0b1101);

    latch.clear();
    assert_eq!(latch.compose_bus_value(), 0);
}

#[test]
fn out_of_range_indices_are_ignored() {
    let mut latch = InputLatch::new(2).unwrap();
    latch.set(5, true);
    assert!(!latch.get(5));
    assert_eq!(latch.compose_bus_value(), 0);
}

#[test]
fn sixty_four_inputs_fill_the_mask() {
    let mut latch = InputLatch::new(64).unwrap();
    let mut source = MockInputSource::new();
    let _ = source.expect_is_active().returning(|_| true);
    latch.read(&source);
    assert_eq!(latch.compose_bus_value(), u64::MAX);
}

#[rstest]
#[case(0)]
#[case(65)]
fn invalid_counts_are_rejected(#[case] count: usize) {
    assert!(InputLatch::new(count).is_err());
}

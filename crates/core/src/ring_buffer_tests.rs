// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn evicts_oldest_past_capacity() {
    let mut buf = RingBuffer::new(3);
    buf.push(1);
    buf.push(2);
    buf.push(3);
    buf.push(4);
    assert_eq!(buf.as_vec(), vec![2, 3, 4]);
}

#[test]
fn len_tracks_pushes_up_to_capacity() {
    let mut buf = RingBuffer::new(2);
    assert!(buf.is_empty());
    buf.push("a");
    assert_eq!(buf.len(), 1);
    buf.push("b");
    buf.push("c");
    assert_eq!(buf.len(), 2);
}

#[test]
#[should_panic(expected = "positive")]
fn zero_capacity_panics() {
    let _: RingBuffer<i32> = RingBuffer::new(0);
}

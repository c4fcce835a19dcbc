// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end dispatch over a real loopback `TcpStream`, acting as a stand-in
//! coordinator on one end and `run_dispatcher` on the other. These scenarios
//! are the fixed end-to-end fixtures that any conforming worker must
//! reproduce bit-for-bit.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use cruncher::run_dispatcher;
use cruncher_engine::{Engine, DEFAULT_EXPONENT_BITS};
use cruncher_proto::wire;

fn spawn_worker_side(window_bits: u32) -> (TcpStream, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept worker connection");
        let engine = Engine::start(2, DEFAULT_EXPONENT_BITS, window_bits);
        let mut writer = stream.try_clone().expect("clone for writing");
        run_dispatcher(&mut stream, &mut writer, &engine).expect("dispatch loop");
    });
    let coordinator = TcpStream::connect(addr).expect("connect as coordinator");
    (coordinator, handle)
}

fn send_subscribe(conn: &mut TcpStream, sub_id: u64, modulus_hex: &str) {
    conn.write_all(&[b's']).unwrap();
    wire::write_u64(conn, sub_id).unwrap();
    wire::write_cstr(conn, modulus_hex).unwrap();
}

fn send_add_entry(conn: &mut TcpStream, sub_id: u64, stream_id: u64, base_hex: &str) {
    conn.write_all(&[b'a']).unwrap();
    wire::write_u64(conn, sub_id).unwrap();
    wire::write_u64(conn, stream_id).unwrap();
    wire::write_cstr(conn, base_hex).unwrap();
}

fn send_contribute(conn: &mut TcpStream, stream_id: u64, round: u64, datum_hex: &str) {
    conn.write_all(&[b'c']).unwrap();
    wire::write_u64(conn, stream_id).unwrap();
    wire::write_u64(conn, round).unwrap();
    wire::write_cstr(conn, datum_hex).unwrap();
}

fn emit_and_read(conn: &mut TcpStream, round: u64) -> Vec<(u64, String)> {
    conn.write_all(&[b'r']).unwrap();
    wire::write_u64(conn, round).unwrap();
    let count = wire::read_u64(conn).unwrap();
    (0..count)
        .map(|_| {
            let sub_id = wire::read_u64(conn).unwrap();
            let result_hex = wire::read_cstr(conn).unwrap();
            (sub_id, result_hex)
        })
        .collect()
}

fn finish(conn: TcpStream, handle: thread::JoinHandle<()>) {
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn s1_single_subscription_single_stream() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "65"); // modulus 101
    send_add_entry(&mut conn, 1, 1, "2");
    send_contribute(&mut conn, 1, 1, "a"); // datum 10

    // 2^10 mod 101 = 1024 mod 101 = 14 = 0xe
    assert_eq!(emit_and_read(&mut conn, 1), vec![(1, "e".to_string())]);

    finish(conn, handle);
}

#[test]
fn s2_two_contributions_same_round() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "65"); // modulus 101
    send_add_entry(&mut conn, 1, 1, "2");
    send_add_entry(&mut conn, 1, 2, "3");
    send_contribute(&mut conn, 1, 1, "4");
    send_contribute(&mut conn, 2, 1, "3");

    // (2^4 * 3^3) mod 101 = (16 * 27) mod 101 = 432 mod 101 = 28 = 0x1c
    assert_eq!(emit_and_read(&mut conn, 1), vec![(1, "1c".to_string())]);

    finish(conn, handle);
}

#[test]
fn s3_multi_subscription_isolation() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "7");
    send_subscribe(&mut conn, 2, "b"); // modulus 11
    send_add_entry(&mut conn, 1, 1, "3");
    send_add_entry(&mut conn, 2, 1, "3");
    send_contribute(&mut conn, 1, 1, "5");

    let fields = emit_and_read(&mut conn, 1);
    assert_eq!(
        fields,
        vec![
            (1, "5".to_string()), // 3^5 mod 7 = 243 mod 7 = 5
            (2, "1".to_string()), // 3^5 mod 11 = 243 mod 11 = 1
        ]
    );

    finish(conn, handle);
}

#[test]
fn s4_stream_unknown_to_subscription_is_a_no_op() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "65");
    send_add_entry(&mut conn, 1, 1, "2");
    send_contribute(&mut conn, 99, 1, "5");

    assert_eq!(emit_and_read(&mut conn, 1), vec![(1, "1".to_string())]);

    finish(conn, handle);
}

#[test]
fn s5_round_reuse_after_reply() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "65");
    send_add_entry(&mut conn, 1, 1, "2");

    send_contribute(&mut conn, 1, 1, "a");
    assert_eq!(emit_and_read(&mut conn, 1), vec![(1, "e".to_string())]);

    send_contribute(&mut conn, 1, 1, "a");
    assert_eq!(emit_and_read(&mut conn, 1), vec![(1, "e".to_string())]);

    finish(conn, handle);
}

#[test]
fn s6_table_width_does_not_change_the_result() {
    for window_bits in [0u32, 1, 4, 8] {
        let (mut conn, handle) = spawn_worker_side(window_bits);
        send_subscribe(&mut conn, 1, "65");
        send_add_entry(&mut conn, 1, 1, "2");
        send_contribute(&mut conn, 1, 1, "a");

        let fields = emit_and_read(&mut conn, 1);
        assert_eq!(
            fields,
            vec![(1, "e".to_string())],
            "window width {window_bits} disagreed"
        );

        finish(conn, handle);
    }
}

#[test]
fn removing_a_subscription_excludes_it_from_later_rounds() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "65");
    send_add_entry(&mut conn, 1, 1, "2");
    conn.write_all(&[b'd']).unwrap();
    wire::write_u64(&mut conn, 1).unwrap();

    send_contribute(&mut conn, 1, 1, "a");
    assert_eq!(emit_and_read(&mut conn, 1), Vec::new());

    finish(conn, handle);
}

#[test]
fn subscription_removed_mid_round_still_completes_that_round() {
    let (mut conn, handle) = spawn_worker_side(0);
    send_subscribe(&mut conn, 1, "65");
    send_add_entry(&mut conn, 1, 1, "2");

    // Opens round 1 and clones sub 1's Arc into that round's Computation
    // before the subscription is removed from the registry.
    send_contribute(&mut conn, 1, 1, "a");
    conn.write_all(&[b'd']).unwrap();
    wire::write_u64(&mut conn, 1).unwrap();

    // The round's existing Computation for sub 1 is still reachable
    // through its Arc clone, so this still accumulates into it.
    send_contribute(&mut conn, 1, 1, "a");

    // 2^10 * 2^10 mod 101 = 2^20 mod 101 = 1048576 mod 101 = 95 = 0x5f
    assert_eq!(emit_and_read(&mut conn, 1), vec![(1, "5f".to_string())]);

    finish(conn, handle);
}

#[test]
fn status_command_returns_the_fixed_banner() {
    let (mut conn, handle) = spawn_worker_side(0);
    conn.write_all(&[b'i']).unwrap();
    let mut banner = [0u8; 8];
    conn.read_exact(&mut banner).unwrap();
    assert_eq!(&banner, cruncher_proto::STATUS_BANNER);

    finish(conn, handle);
}
